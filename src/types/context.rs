use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of the user's wallet and portfolio handed to the planner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentContext {
    pub user_id: Option<String>,
    pub wallet_address: Option<String>,
    pub wallet_id: Option<String>,
    pub balance: Option<String>,
    pub portfolio_value: Option<String>,
    pub risk_tolerance: Option<String>,
    pub chain: Option<String>,
    pub current_allocations: BTreeMap<String, f64>,
}

impl AgentContext {
    pub fn user_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or("unknown")
    }

    pub fn wallet_address(&self) -> &str {
        self.wallet_address.as_deref().unwrap_or("unknown")
    }

    pub fn balance(&self) -> &str {
        self.balance.as_deref().unwrap_or("unknown")
    }

    pub fn portfolio_value(&self) -> &str {
        self.portfolio_value.as_deref().unwrap_or("unknown")
    }

    pub fn risk_tolerance(&self) -> &str {
        self.risk_tolerance.as_deref().unwrap_or("moderate")
    }

    pub fn chain(&self) -> &str {
        self.chain.as_deref().unwrap_or("flow")
    }

    pub fn allocations_summary(&self) -> String {
        if self.current_allocations.is_empty() {
            return "none reported".to_string();
        }
        self.current_allocations
            .iter()
            .map(|(token, pct)| format!("{} {:.1}%", token, pct))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_missing_fields() {
        let context: AgentContext = serde_json::from_str("{}").unwrap();
        assert_eq!(context.user_id(), "unknown");
        assert_eq!(context.risk_tolerance(), "moderate");
        assert_eq!(context.chain(), "flow");
        assert_eq!(context.allocations_summary(), "none reported");
    }

    #[test]
    fn test_allocations_summary() {
        let context: AgentContext = serde_json::from_str(
            r#"{"walletAddress": "0xabc", "currentAllocations": {"BTC": 40, "ETH": 60}}"#,
        )
        .unwrap();
        assert_eq!(context.wallet_address(), "0xabc");
        assert_eq!(context.allocations_summary(), "BTC 40.0%, ETH 60.0%");
    }
}
