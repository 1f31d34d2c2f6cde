use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ActionId, ActionStatus, ActionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPriority {
    Low,
    Medium,
    High,
}

/// One typed operation inside a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAction {
    pub id: ActionId,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub description: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<ActionPriority>,
}

impl AgentAction {
    pub fn new(
        id: ActionId,
        action_type: ActionType,
        description: impl Into<String>,
        parameters: Map<String, Value>,
    ) -> Self {
        Self {
            id,
            action_type,
            description: description.into(),
            parameters,
            status: ActionStatus::Pending,
            result: None,
            error: None,
            timestamp: Utc::now(),
            tx_hash: None,
            estimated_duration: None,
            priority: None,
        }
    }

    pub fn with_estimate(mut self, seconds: u64) -> Self {
        self.estimated_duration = Some(seconds);
        self
    }

    pub fn with_priority(mut self, priority: ActionPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// String view of a parameter. Numbers are rendered as their decimal text.
    pub fn param_str(&self, key: &str) -> Option<String> {
        match self.parameters.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn mark_executing(&mut self) {
        self.status = ActionStatus::Executing;
        self.timestamp = Utc::now();
    }

    pub fn mark_completed(&mut self, result: Option<Value>, tx_hash: Option<String>) {
        self.status = ActionStatus::Completed;
        self.result = result;
        self.tx_hash = tx_hash;
        self.error = None;
        self.timestamp = Utc::now();
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = ActionStatus::Failed;
        self.error = Some(error.into());
        self.timestamp = Utc::now();
    }

    pub fn is_completed(&self) -> bool {
        self.status == ActionStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == ActionStatus::Failed
    }
}

/// Outcome of a single action handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            tx_hash: None,
            result: Some(result),
            error: None,
        }
    }

    pub fn with_tx(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            tx_hash: None,
            result: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deposit_action() -> AgentAction {
        let mut params = Map::new();
        params.insert("token".to_string(), json!("usdc"));
        params.insert("amount".to_string(), json!(250));
        AgentAction::new(
            "action_1_0".to_string(),
            ActionType::Deposit,
            "Deposit into the vault",
            params,
        )
    }

    #[test]
    fn test_new_action_is_pending() {
        let action = deposit_action();
        assert_eq!(action.status, ActionStatus::Pending);
        assert!(action.result.is_none());
        assert!(action.tx_hash.is_none());
    }

    #[test]
    fn test_param_str_renders_numbers() {
        let action = deposit_action();
        assert_eq!(action.param_str("token").as_deref(), Some("usdc"));
        assert_eq!(action.param_str("amount").as_deref(), Some("250"));
        assert_eq!(action.param_str("missing"), None);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut action = deposit_action();
        action.mark_executing();
        assert_eq!(action.status, ActionStatus::Executing);

        action.mark_completed(Some(json!({"ok": true})), Some("0xabc".to_string()));
        assert!(action.is_completed());
        assert_eq!(action.tx_hash.as_deref(), Some("0xabc"));

        let mut failing = deposit_action();
        failing.mark_failed("boom");
        assert!(failing.is_failed());
        assert_eq!(failing.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let mut action = deposit_action().with_estimate(30);
        action.mark_completed(None, Some("0xdef".to_string()));
        let json = serde_json::to_value(&action).unwrap();

        assert_eq!(json["type"], "deposit");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["txHash"], "0xdef");
        assert_eq!(json["estimatedDuration"], 30);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_deserialize_contract_interaction() {
        let action: AgentAction = serde_json::from_value(json!({
            "id": "action_9_1",
            "type": "contract_interaction",
            "description": "Call approve",
            "parameters": {"contractAddress": "0x01"},
            "status": "pending",
            "timestamp": "2024-01-01T00:00:00Z",
            "priority": "high"
        }))
        .unwrap();

        assert_eq!(action.action_type, ActionType::ContractInteraction);
        assert_eq!(action.priority, Some(ActionPriority::High));
    }
}
