use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::templates::create_fallback_actions;
use crate::providers::{LLMProvider, Message};
use crate::types::{ActionPriority, ActionType, AgentAction, AgentContext, AgentPlan};

pub const CAPABILITIES: [&str; 6] = [
    "Bridge FLOW tokens from Flow EVM to Base USDC using 1inch Fusion+",
    "Deposit USDC into the Flow ETF vault",
    "Withdraw vault shares back to USDC",
    "Call Flow ETF vault and token contracts (approve, transfer, read state)",
    "Rebalance portfolio allocations according to risk tolerance",
    "Analyze portfolio performance, risk and market conditions",
];

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Upper bound on the model call before falling back to templates
    pub timeout: Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAction {
    #[serde(rename = "type")]
    action_type: ActionType,
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    estimated_duration: Option<Value>,
    #[serde(default)]
    priority: Option<ActionPriority>,
}

/// Turns a free-text goal into an ordered plan of typed actions.
pub struct Planner {
    llm_provider: Option<Arc<dyn LLMProvider>>,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(llm_provider: Option<Arc<dyn LLMProvider>>, config: PlannerConfig) -> Self {
        Self {
            llm_provider,
            config,
        }
    }

    /// Template-only planner, used when no model is configured.
    pub fn offline() -> Self {
        Self::new(None, PlannerConfig::default())
    }

    pub fn has_model(&self) -> bool {
        self.llm_provider.is_some()
    }

    /// Never fails: any model problem degrades to the keyword templates.
    pub async fn create_plan(&self, goal: &str, context: &AgentContext) -> AgentPlan {
        let stamp = Utc::now().timestamp_millis();

        let actions = match self.generate_actions(goal, context, stamp).await {
            Ok(actions) if !actions.is_empty() => actions,
            Ok(_) => {
                log::warn!("Model returned no actions for goal '{}', using templates", goal);
                create_fallback_actions(goal, context, stamp)
            }
            Err(e) => {
                log::warn!("Planning via model failed ({}), using templates", e);
                create_fallback_actions(goal, context, stamp)
            }
        };

        log::info!("Created plan with {} actions for goal '{}'", actions.len(), goal);
        AgentPlan::new(format!("plan_{}", stamp), goal, actions)
    }

    async fn generate_actions(
        &self,
        goal: &str,
        context: &AgentContext,
        stamp: i64,
    ) -> Result<Vec<AgentAction>> {
        let llm = self
            .llm_provider
            .as_ref()
            .ok_or_else(|| anyhow!("no language model configured"))?;

        let messages = vec![
            Message::system(build_system_prompt(context)),
            Message::user(format!("User goal: {}", goal)),
        ];

        let response = tokio::time::timeout(self.config.timeout, llm.complete(messages))
            .await
            .map_err(|_| anyhow!("model call timed out after {:?}", self.config.timeout))??;

        parse_actions(&response, stamp)
    }
}

pub fn build_system_prompt(context: &AgentContext) -> String {
    let capabilities = CAPABILITIES
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an autonomous DeFi agent managing a crypto index fund on Flow EVM.

User context:
- User ID: {}
- Wallet address: {}
- Wallet balance: {}
- Portfolio value: {}
- Risk tolerance: {}
- Chain: {}
- Current allocations: {}

Capabilities:
{}

Break the user's goal into an ordered list of actions. Respond with a JSON array only.
Each element must have:
- "type": one of "bridge", "contract_interaction", "deposit", "withdraw", "rebalance", "analysis"
- "description": short human-readable summary
- "parameters": object with the values the action needs
- "estimatedDuration": seconds (number)
- "priority": "low", "medium" or "high""#,
        context.user_id(),
        context.wallet_address(),
        context.balance(),
        context.portfolio_value(),
        context.risk_tolerance(),
        context.chain(),
        context.allocations_summary(),
        capabilities
    )
}

/// Extracts the JSON array embedded in free-text model output.
pub fn parse_actions(response: &str, stamp: i64) -> Result<Vec<AgentAction>> {
    let start = response
        .find('[')
        .ok_or_else(|| anyhow!("no JSON array in model response"))?;
    let end = response
        .rfind(']')
        .filter(|end| *end > start)
        .ok_or_else(|| anyhow!("unterminated JSON array in model response"))?;

    let raw: Vec<RawAction> = serde_json::from_str(&response[start..=end])?;

    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let description = if raw.description.is_empty() {
                format!("{} action", raw.action_type.as_str())
            } else {
                raw.description
            };
            let mut action = AgentAction::new(
                format!("action_{}_{}", stamp, index),
                raw.action_type,
                description,
                raw.parameters,
            );
            action.estimated_duration = raw.estimated_duration.as_ref().and_then(|d| match d {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim_end_matches('s').trim().parse().ok(),
                _ => None,
            });
            action.priority = raw.priority;
            action
        })
        .collect())
}
