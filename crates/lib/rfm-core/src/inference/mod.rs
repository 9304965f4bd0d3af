//! Interfaces to the remote inference service and the query options it accepts.

mod http;

use std::str::FromStr;
use std::sync::Arc;
use std::{error::Error, fmt};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rfm_store::GraphMetadata;
use rfm_store::schema::{DEFAULT_MAX_PQ_ITERATIONS, MAX_NUM_NEIGHBOR_HOPS};
use serde::{Serialize, Serializer};
use serde_json::Value;

pub use http::{HttpInferenceService, HttpModelHandle};

const ANCHOR_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug)]
pub enum InferenceError {
    Transport(String),
    Api { status: u16, body: String },
    Decode(String),
    NotAuthenticated,
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "request failed: {message}"),
            Self::Api { status, body } => write!(f, "API error ({status}): {body}"),
            Self::Decode(message) => write!(f, "could not decode response: {message}"),
            Self::NotAuthenticated => write!(f, "client is not authenticated"),
        }
    }
}

impl Error for InferenceError {}

/// Remote service that authenticates callers and turns graph metadata into models.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Validates `credential` and remembers it for subsequent calls.
    ///
    /// # Errors
    /// Returns `InferenceError` if the service rejects the credential.
    async fn authenticate(&self, credential: &str) -> Result<(), InferenceError>;

    /// Builds a queryable model from the graph.
    ///
    /// # Errors
    /// Returns `InferenceError` if the service cannot materialize the graph.
    async fn materialize(&self, graph: &GraphMetadata)
    -> Result<Arc<dyn ModelHandle>, InferenceError>;
}

/// Opaque handle to a materialized model.
#[async_trait]
pub trait ModelHandle: Send + Sync + fmt::Debug {
    /// # Errors
    /// Returns `InferenceError` if the query fails remotely.
    async fn predict(&self, query: &str, options: &QueryOptions) -> Result<Value, InferenceError>;

    /// # Errors
    /// Returns `InferenceError` if the query fails remotely.
    async fn evaluate(&self, query: &str, options: &QueryOptions)
    -> Result<Value, InferenceError>;

    /// Checks a query without running it.
    ///
    /// # Errors
    /// Returns `InferenceError` if the query is rejected.
    async fn parse(&self, query: &str) -> Result<(), InferenceError>;
}

/// The point in time predictions are made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorTime {
    /// Use each entity's own time column.
    Entity,
    Timestamp(NaiveDateTime),
}

impl FromStr for AnchorTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("entity") {
            return Ok(Self::Entity);
        }
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(trimmed, ANCHOR_TIME_FORMAT) {
            return Ok(Self::Timestamp(timestamp));
        }
        if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::Timestamp(timestamp.naive_utc()));
        }
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(Self::Timestamp)
            .ok_or_else(|| {
                format!(
                    "invalid anchor time '{s}': expected 'entity', 'YYYY-MM-DD', 'YYYY-MM-DD hh:mm:ss' or RFC 3339"
                )
            })
    }
}

impl Serialize for AnchorTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Entity => serializer.serialize_str("entity"),
            Self::Timestamp(timestamp) => {
                serializer.collect_str(&timestamp.format(ANCHOR_TIME_FORMAT))
            }
        }
    }
}

/// Trades runtime for the number of in-context examples sampled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Fast,
    Normal,
    Best,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "normal" => Ok(Self::Normal),
            "best" => Ok(Self::Best),
            _ => Err(format!(
                "invalid run mode '{s}': expected 'fast', 'normal' or 'best'"
            )),
        }
    }
}

/// Options forwarded with predictive queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_time: Option<AnchorTime>,
    pub run_mode: RunMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_neighbors: Option<Vec<u32>>,
    pub max_pq_iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<String>>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            anchor_time: None,
            run_mode: RunMode::default(),
            num_neighbors: None,
            max_pq_iterations: DEFAULT_MAX_PQ_ITERATIONS,
            metrics: None,
        }
    }
}

impl QueryOptions {
    /// Checks option bounds before anything is sent.
    ///
    /// # Errors
    /// Returns a message describing the first invalid option.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(num_neighbors) = &self.num_neighbors
            && num_neighbors.len() > MAX_NUM_NEIGHBOR_HOPS
        {
            return Err(format!(
                "num_neighbors supports at most {MAX_NUM_NEIGHBOR_HOPS} hops, got {}",
                num_neighbors.len()
            ));
        }
        if self.max_pq_iterations == 0 {
            return Err("max_pq_iterations must be positive".to_string());
        }
        Ok(())
    }
}
