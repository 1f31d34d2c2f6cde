use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::server::AppState;
use crate::chain::{ChainAdapter, PrivyConfig, PrivyWalletAdapter, SimulatedWallet};
use crate::engine::{ActionExecutor, Advisor, Planner, PlannerConfig};
use crate::types::{AgentAction, AgentContext, AgentPlan};

const DEFAULT_WALLET_ID: &str = "simulated-wallet";

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub context: AgentContext,
    pub api_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub plan: Option<AgentPlan>,
    pub user_id: Option<String>,
    pub wallet_id: Option<String>,
    pub privy_config: Option<PrivyConfig>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    pub action: AgentAction,
    pub api_key: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsRequest {
    pub api_key: Option<String>,
}

#[derive(Serialize)]
pub struct Explanation {
    pub explanation: String,
}

#[derive(Serialize)]
pub struct Suggestions {
    pub suggestions: Vec<String>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let planner = if state.llm.is_some() { "gemini" } else { "templates" };
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "services": {
            "twitter": state.verification.twitter_mode(),
            "attestation": state.verification.attestation_provider(),
            "planner": planner,
        }
    }))
}

pub async fn create_plan(
    State(state): State<AppState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AgentPlan>>, ApiError> {
    let Json(request) = payload?;
    let goal = request.goal.trim();
    if goal.is_empty() {
        return Err(ApiError::BadRequest("Goal is required".to_string()));
    }

    let planner = Planner::new(
        state.llm_for(request.api_key.as_deref()),
        PlannerConfig::default(),
    );
    let plan = planner.create_plan(goal, &request.context).await;
    state.plans.save_plan(&plan).await?;

    Ok(ApiResponse::ok(plan))
}

pub async fn execute_plan(
    State(state): State<AppState>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AgentPlan>>, ApiError> {
    let Json(request) = payload?;
    let plan = match request.plan {
        Some(plan) if !plan.actions.is_empty() => plan,
        _ => {
            return Err(ApiError::BadRequest(
                "A plan with at least one action is required".to_string(),
            ))
        }
    };

    let wallet_id = request
        .wallet_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| DEFAULT_WALLET_ID.to_string());

    let adapter: Arc<dyn ChainAdapter> = match request.privy_config {
        Some(privy) => Arc::new(PrivyWalletAdapter::new(
            privy,
            wallet_id.clone(),
            state.config.chain_id,
        )),
        None => Arc::new(SimulatedWallet::new(wallet_id.clone())),
    };

    log::info!(
        "Executing plan {} for user {} with {} wallet {}",
        plan.id,
        request.user_id.as_deref().unwrap_or("anonymous"),
        adapter.name(),
        wallet_id
    );

    let executor = ActionExecutor::new(adapter, state.executor.clone());
    let plan = executor.execute_plan(plan).await;
    state.plans.save_plan(&plan).await?;

    Ok(ApiResponse::ok(plan))
}

pub async fn get_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<AgentPlan>>, ApiError> {
    let plan = state
        .plans
        .get_plan(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Plan {} not found", id)))?;
    Ok(ApiResponse::ok(plan))
}

pub async fn explain_action(
    State(state): State<AppState>,
    payload: Result<Json<ExplainRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Explanation>>, ApiError> {
    let Json(request) = payload?;
    let advisor = Advisor::new(state.llm_for(request.api_key.as_deref()));
    let explanation = advisor.explain_action(&request.action).await;
    Ok(ApiResponse::ok(Explanation { explanation }))
}

pub async fn suggestions(
    State(state): State<AppState>,
    request: Option<Json<SuggestionsRequest>>,
) -> Result<Json<ApiResponse<Suggestions>>, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let history: Vec<AgentPlan> = state
        .plans
        .list_plans(None)
        .await?
        .into_iter()
        .filter(|plan| plan.status.is_terminal())
        .collect();

    let advisor = Advisor::new(state.llm_for(request.api_key.as_deref()));
    let suggestions = advisor.optimization_suggestions(&history).await;
    Ok(ApiResponse::ok(Suggestions { suggestions }))
}
