use serde_json::{json, Map, Value};

use crate::types::{ActionPriority, ActionType, AgentAction, AgentContext};

/// Keyword groups tried in this order; each match contributes one action.
const KEYWORD_GROUPS: [(&[&str], ActionType); 5] = [
    (&["bridge"], ActionType::Bridge),
    (&["deposit", "invest"], ActionType::Deposit),
    (&["rebalance", "optimize"], ActionType::Rebalance),
    (&["withdraw"], ActionType::Withdraw),
    (&["analyze", "check", "status"], ActionType::Analysis),
];

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn template(action_type: ActionType, id: String, context: &AgentContext) -> AgentAction {
    match action_type {
        ActionType::Bridge => {
            let mut parameters = params(json!({
                "fromChain": "flow",
                "toChain": "base",
                "fromToken": "FLOW",
                "toToken": "USDC",
                "amount": "10",
            }));
            if let Some(address) = &context.wallet_address {
                parameters.insert("recipient".to_string(), json!(address));
            }
            AgentAction::new(
                id,
                action_type,
                "Bridge FLOW to Base as USDC via 1inch Fusion+",
                parameters,
            )
            .with_estimate(300)
            .with_priority(ActionPriority::High)
        }
        ActionType::Deposit => AgentAction::new(
            id,
            action_type,
            "Deposit USDC into the Flow ETF vault",
            params(json!({ "token": "usdc", "amount": "100" })),
        )
        .with_estimate(60)
        .with_priority(ActionPriority::High),
        ActionType::Rebalance => AgentAction::new(
            id,
            action_type,
            "Rebalance the ETF portfolio toward target allocations",
            params(json!({
                "strategy": "risk_adjusted",
                "riskTolerance": context.risk_tolerance(),
            })),
        )
        .with_estimate(120)
        .with_priority(ActionPriority::Medium),
        ActionType::Withdraw => AgentAction::new(
            id,
            action_type,
            "Withdraw vault shares as USDC",
            params(json!({ "shares": "100", "tokenOut": "usdc" })),
        )
        .with_estimate(60)
        .with_priority(ActionPriority::Medium),
        ActionType::Analysis => AgentAction::new(
            id,
            action_type,
            "Analyze current portfolio performance and risk",
            params(json!({ "analysisType": "portfolio" })),
        )
        .with_estimate(30)
        .with_priority(ActionPriority::Low),
        ActionType::ContractInteraction => AgentAction::new(
            id,
            action_type,
            "Interact with the Flow ETF vault contract",
            params(json!({ "method": "totalAssets()", "args": [] })),
        )
        .with_estimate(30)
        .with_priority(ActionPriority::Low),
    }
}

/// Keyword-matched action list used whenever the model's plan is unusable.
pub fn create_fallback_actions(goal: &str, context: &AgentContext, stamp: i64) -> Vec<AgentAction> {
    let lowered = goal.to_lowercase();

    let mut actions: Vec<AgentAction> = KEYWORD_GROUPS
        .iter()
        .filter(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
        .enumerate()
        .map(|(index, (_, action_type))| {
            template(*action_type, format!("action_{}_{}", stamp, index), context)
        })
        .collect();

    if actions.is_empty() {
        actions.push(
            AgentAction::new(
                format!("action_{}_0", stamp),
                ActionType::Analysis,
                format!("Analyze portfolio and recommend next steps for: {}", goal),
                params(json!({ "analysisType": "general", "goal": goal })),
            )
            .with_estimate(30)
            .with_priority(ActionPriority::Medium),
        );
    }

    actions
}
