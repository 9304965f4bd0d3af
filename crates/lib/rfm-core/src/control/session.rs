//! A single user session: authentication state, graph metadata, and the model handle.

use std::fmt;
use std::sync::Arc;

use rfm_store::schema::{ENV_API_KEY, mask_credential};
use rfm_store::{
    AddTableMetadata, GraphMetadata, LinkMetadata, MaterializeSummary, SessionStatus,
    TableMetadata, UpdateGraphMetadata, UpdatedGraphMetadata,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::graph::{GraphStore, render_mermaid};
use crate::inference::{InferenceService, ModelHandle, QueryOptions};
use crate::source::TableLoader;

use super::ControlError;
use super::update::apply_update;

/// Supplies the API credential on demand.
pub trait CredentialSource: Send + Sync {
    fn credential(&self) -> Option<String>;
}

/// Reads the credential from the `KUMO_API_KEY` environment variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl CredentialSource for ProcessEnv {
    fn credential(&self) -> Option<String> {
        std::env::var(ENV_API_KEY)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// Why initialization failed. Replayed on every later attempt.
#[derive(Debug, Clone)]
enum InitFailure {
    MissingCredential,
    Rejected(String),
}

impl InitFailure {
    fn to_error(&self) -> ControlError {
        match self {
            Self::MissingCredential => ControlError::MissingCredential(ENV_API_KEY),
            Self::Rejected(message) => ControlError::Authentication(message.clone()),
        }
    }
}

pub struct Session {
    name: String,
    credential: Option<String>,
    init_failure: Option<InitFailure>,
    graph: GraphStore,
    model: Option<Arc<dyn ModelHandle>>,
    loader: Arc<dyn TableLoader>,
    service: Arc<dyn InferenceService>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("initialized", &self.is_initialized())
            .field("graph", &self.graph)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl Session {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        loader: Arc<dyn TableLoader>,
        service: Arc<dyn InferenceService>,
    ) -> Self {
        Self {
            name: name.into(),
            credential: None,
            init_failure: None,
            graph: GraphStore::new(),
            model: None,
            loader,
            service,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.credential.is_some()
    }

    #[must_use]
    pub const fn graph(&self) -> &GraphStore {
        &self.graph
    }

    #[must_use]
    pub const fn is_materialized(&self) -> bool {
        self.model.is_some()
    }

    /// Authenticates the session on first use. Later calls are no-ops.
    ///
    /// A missing or rejected credential is remembered and reported again without
    /// retrying; only a fresh session can recover.
    ///
    /// # Errors
    /// Returns `ControlError::MissingCredential` if no credential is available, or
    /// `ControlError::Authentication` if the service rejects it.
    pub async fn initialize(&mut self, credentials: &dyn CredentialSource) -> Result<(), ControlError> {
        if self.is_initialized() {
            return Ok(());
        }
        if let Some(failure) = &self.init_failure {
            return Err(failure.to_error());
        }

        let Some(credential) = credentials.credential() else {
            warn!(session = %self.name, "{ENV_API_KEY} is not set");
            return Err(self.fail(InitFailure::MissingCredential));
        };
        if let Err(err) = self.service.authenticate(&credential).await {
            let message = err.to_string();
            warn!(session = %self.name, error = %message, "authentication failed");
            return Err(self.fail(InitFailure::Rejected(message)));
        }

        info!(session = %self.name, "session initialized");
        self.credential = Some(credential);
        Ok(())
    }

    fn fail(&mut self, failure: InitFailure) -> ControlError {
        let err = failure.to_error();
        self.init_failure = Some(failure);
        err
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            name: self.name.clone(),
            initialized: self.is_initialized(),
            credential: self.credential.as_deref().map(mask_credential),
            tables: self.graph.table_names(),
            num_links: self.graph.links().len(),
            materialized: self.is_materialized(),
        }
    }

    #[must_use]
    pub fn graph_metadata(&self) -> GraphMetadata {
        self.graph.get()
    }

    /// Loads and registers a table. Performs blocking file I/O.
    ///
    /// # Errors
    /// Returns `ControlError::Graph` if the table cannot be added.
    pub fn add_table(&mut self, request: &AddTableMetadata) -> Result<TableMetadata, ControlError> {
        let table = self.graph.add_table(self.loader.as_ref(), request)?;
        self.invalidate_model();
        Ok(table)
    }

    /// Removes a table and returns the links that referenced it.
    ///
    /// # Errors
    /// Returns `ControlError::Graph` if the table does not exist.
    pub fn remove_table(&mut self, name: &str) -> Result<Vec<LinkMetadata>, ControlError> {
        let removed = self.graph.remove_table(name)?;
        self.invalidate_model();
        Ok(removed)
    }

    /// # Errors
    /// Returns `ControlError::Graph` if the link is invalid or already present.
    pub fn link(&mut self, link: &LinkMetadata) -> Result<(), ControlError> {
        self.graph.link(link)?;
        self.invalidate_model();
        Ok(())
    }

    /// # Errors
    /// Returns `ControlError::Graph` if the link does not exist.
    pub fn unlink(&mut self, link: &LinkMetadata) -> Result<(), ControlError> {
        self.graph.unlink(link)?;
        self.invalidate_model();
        Ok(())
    }

    /// Applies a best-effort batch update. May perform blocking file I/O.
    pub fn update_graph_metadata(&mut self, request: &UpdateGraphMetadata) -> UpdatedGraphMetadata {
        let outcome = apply_update(&mut self.graph, self.loader.as_ref(), request);
        if outcome.mutated {
            self.invalidate_model();
        }
        outcome.result
    }

    /// # Errors
    /// Returns `ControlError::Graph` listing every violation found.
    pub fn validate(&self) -> Result<(), ControlError> {
        self.graph.validate().map_err(ControlError::from)
    }

    /// Adds links between columns and primary keys with matching names.
    ///
    /// # Errors
    /// Returns `ControlError::Graph` if the graph already has links.
    pub fn infer_links(&mut self) -> Result<Vec<LinkMetadata>, ControlError> {
        let added = self.graph.infer_links()?;
        if !added.is_empty() {
            self.invalidate_model();
        }
        Ok(added)
    }

    #[must_use]
    pub fn mermaid(&self, show_columns: bool) -> String {
        render_mermaid(&self.graph.get(), show_columns)
    }

    /// Drops all tables, links, and the model handle. Authentication is kept.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.model = None;
        info!(session = %self.name, "session cleared");
    }

    /// Validates the graph and asks the inference service for a model.
    ///
    /// # Errors
    /// Returns `ControlError::Graph` if validation fails, or `ControlError::Inference`
    /// if the service call fails. Any previous model handle is kept on failure.
    pub async fn materialize(&mut self) -> Result<MaterializeSummary, ControlError> {
        self.graph.validate()?;
        let graph = self.graph.get();
        let model = self
            .service
            .materialize(&graph)
            .await
            .map_err(|source| ControlError::Inference {
                operation: "materialize",
                source,
            })?;

        let summary = MaterializeSummary::of(&graph);
        info!(
            session = %self.name,
            tables = summary.num_tables,
            links = summary.num_links,
            rows = summary.num_rows,
            "graph materialized"
        );
        self.model = Some(model);
        Ok(summary)
    }

    /// # Errors
    /// Returns `ControlError` if the options are invalid, no model is materialized,
    /// or the prediction fails.
    pub async fn predict(&self, query: &str, options: &QueryOptions) -> Result<Value, ControlError> {
        options.validate().map_err(ControlError::InvalidInput)?;
        self.model()?
            .predict(query, options)
            .await
            .map_err(|source| ControlError::Inference {
                operation: "predict",
                source,
            })
    }

    /// # Errors
    /// Returns `ControlError` if the options are invalid, no model is materialized,
    /// or the evaluation fails.
    pub async fn evaluate(&self, query: &str, options: &QueryOptions) -> Result<Value, ControlError> {
        options.validate().map_err(ControlError::InvalidInput)?;
        self.model()?
            .evaluate(query, options)
            .await
            .map_err(|source| ControlError::Inference {
                operation: "evaluate",
                source,
            })
    }

    /// # Errors
    /// Returns `ControlError` if no model is materialized or the query is rejected.
    pub async fn validate_query(&self, query: &str) -> Result<(), ControlError> {
        self.model()?
            .parse(query)
            .await
            .map_err(|source| ControlError::Inference {
                operation: "validate_query",
                source,
            })
    }

    fn model(&self) -> Result<&Arc<dyn ModelHandle>, ControlError> {
        self.model.as_ref().ok_or(ControlError::NotMaterialized)
    }

    fn invalidate_model(&mut self) {
        if self.model.take().is_some() {
            debug!(session = %self.name, "graph changed, model handle dropped");
        }
    }
}
