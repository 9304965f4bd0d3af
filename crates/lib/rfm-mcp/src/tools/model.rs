use rfm_core::inference::{AnchorTime, QueryOptions, RunMode};
use rfm_store::schema::DEFAULT_MAX_PQ_ITERATIONS;
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::KumoRfmMcp;
use crate::helpers::{self, ToolFailure, ToolResult};

/// Parameters for running a predictive query.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct QueryParams {
    /// Predictive query, e.g. `PREDICT COUNT(orders.*, 0, 30, days)>0 FOR users.user_id=1`.
    pub query: String,
    /// `entity`, or a timestamp (`YYYY-MM-DD`, `YYYY-MM-DD hh:mm:ss`, RFC 3339).
    /// Defaults to the latest timestamp in the data.
    pub anchor_time: Option<String>,
    /// `fast` (default), `normal` or `best`.
    pub run_mode: Option<String>,
    /// Neighbors sampled per hop, at most 6 hops.
    pub num_neighbors: Option<Vec<u32>>,
    /// Iterations spent collecting in-context examples (default 20).
    pub max_pq_iterations: Option<u32>,
    /// Metrics to report; only used by `evaluate`.
    pub metrics: Option<Vec<String>>,
}

impl QueryParams {
    fn options(&self) -> ToolResult<QueryOptions> {
        let anchor_time = self
            .anchor_time
            .as_deref()
            .map(str::parse::<AnchorTime>)
            .transpose()
            .map_err(ToolFailure::Domain)?;
        let run_mode = self
            .run_mode
            .as_deref()
            .map(str::parse::<RunMode>)
            .transpose()
            .map_err(ToolFailure::Domain)?
            .unwrap_or_default();
        Ok(QueryOptions {
            anchor_time,
            run_mode,
            num_neighbors: self.num_neighbors.clone(),
            max_pq_iterations: self.max_pq_iterations.unwrap_or(DEFAULT_MAX_PQ_ITERATIONS),
            metrics: self.metrics.clone(),
        })
    }
}

/// Parameters for checking a predictive query.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ValidateQueryParams {
    pub query: String,
}

#[tool_router(router = tool_router_model, vis = "pub")]
impl KumoRfmMcp {
    #[tool(description = "Run a predictive query on the materialized graph and return the predictions.")]
    async fn predict(
        &self,
        Parameters(params): Parameters<QueryParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let options = params.options()?;
            let session = self.session().await?;
            let predictions = session.lock().await.predict(&params.query, &options).await?;
            Ok(predictions)
        }
        .await;
        helpers::respond("Prediction failed", "Predictions generated", result)
    }

    #[tool(description = "Evaluate a predictive query against historical ground truth and return metrics.")]
    async fn evaluate(
        &self,
        Parameters(params): Parameters<QueryParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let options = params.options()?;
            let session = self.session().await?;
            let metrics = session.lock().await.evaluate(&params.query, &options).await?;
            Ok(metrics)
        }
        .await;
        helpers::respond("Evaluation failed", "Evaluation completed", result)
    }

    #[tool(description = "Check a predictive query against the materialized graph without running it.")]
    async fn validate_query(
        &self,
        Parameters(params): Parameters<ValidateQueryParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let result: ToolResult<_> = async {
            let session = self.session().await?;
            session.lock().await.validate_query(&params.query).await?;
            Ok(params.query)
        }
        .await;
        helpers::respond("Query is invalid", "Query is valid", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> QueryParams {
        QueryParams {
            query: "PREDICT users.age FOR users.user_id=1".to_string(),
            anchor_time: None,
            run_mode: None,
            num_neighbors: None,
            max_pq_iterations: None,
            metrics: None,
        }
    }

    #[test]
    fn defaults_fill_missing_options() {
        let options = params().options().expect("options");
        assert_eq!(options, QueryOptions::default());
    }

    #[test]
    fn malformed_options_are_domain_errors() {
        let mut bad = params();
        bad.anchor_time = Some("soon".to_string());
        assert!(matches!(bad.options(), Err(ToolFailure::Domain(_))));

        let mut bad = params();
        bad.run_mode = Some("turbo".to_string());
        assert!(matches!(bad.options(), Err(ToolFailure::Domain(_))));

        let mut good = params();
        good.anchor_time = Some("entity".to_string());
        good.run_mode = Some("best".to_string());
        let options = good.options().expect("options");
        assert_eq!(options.anchor_time, Some(AnchorTime::Entity));
        assert_eq!(options.run_mode, RunMode::Best);
    }
}
