use clap::{ArgAction, Parser, ValueEnum, builder::BoolishValueParser};
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://kumorfm.ai/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4030";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "kumo-rfm-mcpd", version, about = "KumoRFM MCP daemon.")]
struct CliArgs {
    #[arg(long, env = "KUMO_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    #[arg(
        long,
        env = "KUMO_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    request_timeout_secs: u64,

    #[arg(
        long = "stdio",
        env = "KUMO_RFM_ENABLE_STDIO",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long = "http",
        env = "KUMO_RFM_HTTP_SERVE",
        default_value_t = false,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    http_serve: bool,

    #[arg(long, env = "KUMO_RFM_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    http_addr: SocketAddr,

    #[arg(
        long,
        env = "KUMO_RFM_HTTP_STATEFUL",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    http_stateful: bool,

    #[arg(long, env = "KUMO_RFM_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
pub struct RfmConfig {
    pub api_url: String,
    pub request_timeout: Duration,
    pub enable_stdio: bool,
    pub http_serve: bool,
    pub http_addr: SocketAddr,
    /// Keep per-client MCP sessions on the HTTP transport.
    pub http_stateful: bool,
    pub log_format: LogFormat,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSetting(&'static str),
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "missing required setting: {name}"),
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl RfmConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

impl TryFrom<CliArgs> for RfmConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let api_url = args.api_url.trim().trim_end_matches('/').to_string();
        if api_url.is_empty() {
            return Err(ConfigError::MissingSetting("KUMO_API_URL"));
        }
        if args.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "KUMO_REQUEST_TIMEOUT_SECS",
                value: args.request_timeout_secs.to_string(),
            });
        }
        if !args.enable_stdio && !args.http_serve {
            return Err(ConfigError::InvalidSetting {
                name: "KUMO_RFM_ENABLE_STDIO/KUMO_RFM_HTTP_SERVE",
                value: "no transport enabled".to_string(),
            });
        }

        Ok(Self {
            api_url,
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            enable_stdio: args.enable_stdio,
            http_serve: args.http_serve,
            http_addr: args.http_addr,
            http_stateful: args.http_stateful,
            log_format: args.log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            enable_stdio: true,
            http_serve: false,
            http_addr: DEFAULT_MCP_HTTP_ADDR.parse().expect("valid MCP addr"),
            http_stateful: true,
            log_format: LogFormat::Text,
        }
    }

    #[test]
    fn defaults_parse() {
        let config = RfmConfig::try_from(base_args()).expect("config should parse");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert!(config.enable_stdio);
    }

    #[test]
    fn requires_a_transport() {
        let mut args = base_args();
        args.enable_stdio = false;
        assert!(matches!(
            RfmConfig::try_from(args),
            Err(ConfigError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn requires_an_api_url() {
        let mut args = base_args();
        args.api_url = "  ".to_string();
        assert!(matches!(
            RfmConfig::try_from(args),
            Err(ConfigError::MissingSetting("KUMO_API_URL"))
        ));
    }

    #[test]
    fn parses_flags() {
        let args = CliArgs::try_parse_from([
            "kumo-rfm-mcpd",
            "--http",
            "true",
            "--stdio",
            "false",
            "--http-stateful",
            "no",
            "--log-format",
            "json",
            "--api-url",
            "http://localhost:8080/api/",
        ])
        .expect("flags parse");
        let config = RfmConfig::try_from(args).expect("config should parse");
        assert!(config.http_serve);
        assert!(!config.enable_stdio);
        assert!(!config.http_stateful);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.api_url, "http://localhost:8080/api");
    }
}
