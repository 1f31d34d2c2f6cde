use anyhow::{anyhow, Result};
use std::sync::Arc;

use crate::providers::{LLMProvider, Message};
use crate::types::{ActionType, AgentAction, AgentPlan, PlanStatus};

/// Advisory text about actions and past plans. Nothing here feeds execution.
pub struct Advisor {
    llm_provider: Option<Arc<dyn LLMProvider>>,
}

impl Advisor {
    pub fn new(llm_provider: Option<Arc<dyn LLMProvider>>) -> Self {
        Self { llm_provider }
    }

    pub async fn explain_action(&self, action: &AgentAction) -> String {
        match self.model_explanation(action).await {
            Ok(text) => text,
            Err(e) => {
                log::debug!("Explanation via model unavailable: {}", e);
                template_explanation(action)
            }
        }
    }

    async fn model_explanation(&self, action: &AgentAction) -> Result<String> {
        let llm = self
            .llm_provider
            .as_ref()
            .ok_or_else(|| anyhow!("no language model configured"))?;

        let messages = vec![
            Message::system(
                "You explain DeFi actions to non-technical users in two or three sentences. \
                 Mention what happens to their funds and any risk.",
            ),
            Message::user(format!(
                "Action type: {}\nDescription: {}\nParameters: {}",
                action.action_type.as_str(),
                action.description,
                serde_json::to_string(&action.parameters)?
            )),
        ];

        let text = llm.complete(messages).await?;
        Ok(text.trim().to_string())
    }

    pub async fn optimization_suggestions(&self, history: &[AgentPlan]) -> Vec<String> {
        match self.model_suggestions(history).await {
            Ok(suggestions) if !suggestions.is_empty() => suggestions,
            Ok(_) => history_suggestions(history),
            Err(e) => {
                log::debug!("Suggestions via model unavailable: {}", e);
                history_suggestions(history)
            }
        }
    }

    async fn model_suggestions(&self, history: &[AgentPlan]) -> Result<Vec<String>> {
        let llm = self
            .llm_provider
            .as_ref()
            .ok_or_else(|| anyhow!("no language model configured"))?;

        let summary = history
            .iter()
            .map(|plan| {
                format!(
                    "- goal '{}' ({}): {}",
                    plan.goal,
                    plan.status.as_str(),
                    plan.actions
                        .iter()
                        .map(|a| format!("{}={}", a.action_type.as_str(), a.status.as_str()))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let messages = vec![
            Message::system(
                "You review a DeFi agent's past plans and suggest optimizations. \
                 Reply with one suggestion per line, each starting with '-'.",
            ),
            Message::user(format!("Plan history:\n{}", summary)),
        ];

        let response = llm.complete(messages).await?;
        Ok(parse_bullets(&response))
    }
}

fn parse_bullets(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('-') || line.starts_with('*'))
        .map(|line| line.trim_start_matches(['-', '*']).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn template_explanation(action: &AgentAction) -> String {
    let amount = action.param_str("amount").unwrap_or_else(|| "the requested".to_string());
    match action.action_type {
        ActionType::Bridge => format!(
            "Moves {} {} from {} to {} as {}. Cross-chain transfers can take several minutes to settle.",
            amount,
            action.param_str("fromToken").unwrap_or_else(|| "FLOW".to_string()),
            action.param_str("fromChain").unwrap_or_else(|| "flow".to_string()),
            action.param_str("toChain").unwrap_or_else(|| "base".to_string()),
            action.param_str("toToken").unwrap_or_else(|| "USDC".to_string()),
        ),
        ActionType::Deposit => format!(
            "Deposits {} USDC into the ETF vault in exchange for vault shares.",
            amount
        ),
        ActionType::Withdraw => "Redeems vault shares and returns the proceeds as USDC.".to_string(),
        ActionType::ContractInteraction => format!(
            "Calls {} on contract {}.",
            action.param_str("method").unwrap_or_else(|| "a method".to_string()),
            action
                .param_str("contractAddress")
                .unwrap_or_else(|| "the vault".to_string()),
        ),
        ActionType::Rebalance => {
            "Shifts the portfolio back toward its target allocation. No funds leave the vault."
                .to_string()
        }
        ActionType::Analysis => {
            "Reviews the portfolio and market conditions. Read-only, no transactions are sent."
                .to_string()
        }
    }
}

fn history_suggestions(history: &[AgentPlan]) -> Vec<String> {
    if history.is_empty() {
        return vec!["Run a portfolio analysis to establish a baseline.".to_string()];
    }

    let mut suggestions = Vec::new();
    let failed: Vec<&AgentPlan> = history
        .iter()
        .filter(|p| p.status == PlanStatus::Failed)
        .collect();

    if !failed.is_empty() {
        suggestions.push(format!(
            "{} of {} plans failed; check parameters before executing similar goals.",
            failed.len(),
            history.len()
        ));
    }
    if failed
        .iter()
        .filter_map(|p| p.first_failure())
        .any(|a| a.action_type == ActionType::Deposit)
    {
        suggestions.push("Bridge to USDC before depositing; the vault only accepts USDC.".to_string());
    }

    let bridges = history
        .iter()
        .flat_map(|p| &p.actions)
        .filter(|a| a.action_type == ActionType::Bridge && a.is_completed())
        .count();
    if bridges > 1 {
        suggestions.push("Batch bridge transfers to save on cross-chain fees.".to_string());
    }

    if suggestions.is_empty() {
        suggestions.push("Recent plans completed cleanly; consider a periodic rebalance.".to_string());
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockLLMProvider;
    use crate::types::ActionStatus;
    use serde_json::{json, Map};

    fn action(action_type: ActionType, status: ActionStatus) -> AgentAction {
        let mut params = Map::new();
        params.insert("amount".to_string(), json!("5"));
        let mut action = AgentAction::new("a".to_string(), action_type, "test", params);
        action.status = status;
        action
    }

    fn plan(status: PlanStatus, actions: Vec<AgentAction>) -> AgentPlan {
        let mut plan = AgentPlan::new("plan_1".to_string(), "goal", actions);
        plan.status = status;
        plan
    }

    #[tokio::test]
    async fn test_explain_without_model() {
        let advisor = Advisor::new(None);
        let text = advisor
            .explain_action(&action(ActionType::Bridge, ActionStatus::Pending))
            .await;
        assert!(text.contains("5 FLOW"));
    }

    #[tokio::test]
    async fn test_explain_with_model() {
        let advisor = Advisor::new(Some(Arc::new(MockLLMProvider::with_response(
            "  This moves your tokens.  ",
        ))));
        let text = advisor
            .explain_action(&action(ActionType::Deposit, ActionStatus::Pending))
            .await;
        assert_eq!(text, "This moves your tokens.");
    }

    #[tokio::test]
    async fn test_model_suggestions_parsed() {
        let advisor = Advisor::new(Some(Arc::new(MockLLMProvider::with_response(
            "Here you go:\n- Bridge less often\n* Deposit earlier\n-\nthanks",
        ))));
        let suggestions = advisor.optimization_suggestions(&[]).await;
        assert_eq!(suggestions, vec!["Bridge less often", "Deposit earlier"]);
    }

    #[tokio::test]
    async fn test_history_suggestions_flag_failed_deposit() {
        let advisor = Advisor::new(None);
        let history = vec![plan(
            PlanStatus::Failed,
            vec![action(ActionType::Deposit, ActionStatus::Failed)],
        )];
        let suggestions = advisor.optimization_suggestions(&history).await;

        assert_eq!(suggestions.len(), 2);
        assert!(suggestions[1].contains("only accepts USDC"));
    }

    #[test]
    fn test_history_suggestions_empty() {
        assert_eq!(history_suggestions(&[]).len(), 1);
    }
}
