use std::{error::Error, fmt};

use crate::graph::GraphError;
use crate::inference::InferenceError;
use crate::source::LoadError;

pub mod session;
pub mod update;

pub use session::{CredentialSource, ProcessEnv, Session};
pub use update::{UpdateOutcome, apply_update};

#[derive(Debug)]
pub enum ControlError {
    /// The named environment variable holding the credential is not set.
    MissingCredential(&'static str),
    Authentication(String),
    NotMaterialized,
    InvalidInput(String),
    Graph(GraphError),
    Inference {
        operation: &'static str,
        source: InferenceError,
    },
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredential(var) => {
                write!(f, "missing credential: environment variable {var} is not set")
            }
            Self::Authentication(message) => write!(f, "authentication failed: {message}"),
            Self::NotMaterialized => write!(
                f,
                "graph is not materialized; call materialize_graph after the last graph change"
            ),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::Graph(err) => write!(f, "{err}"),
            Self::Inference { operation, source } => write!(f, "{operation} failed: {source}"),
        }
    }
}

impl Error for ControlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Graph(err) => Some(err),
            Self::Inference { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<GraphError> for ControlError {
    fn from(err: GraphError) -> Self {
        Self::Graph(err)
    }
}

impl From<LoadError> for ControlError {
    fn from(err: LoadError) -> Self {
        Self::Graph(GraphError::Load(err))
    }
}

impl ControlError {
    /// Whether the failure leaves the session unusable until the process restarts.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingCredential(_) | Self::Authentication(_))
    }
}
