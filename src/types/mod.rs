pub mod action;
pub mod context;
pub mod plan;
pub mod verification;

pub use action::{ActionPriority, AgentAction, ExecutionResult};
pub use context::AgentContext;
pub use plan::AgentPlan;
pub use verification::{
    AttestationReceipt, BioChallenge, Expiring, OAuthSession, VerificationMethod, VerificationRecord,
};

use serde::{Deserialize, Serialize};

pub type ActionId = String;
pub type PlanId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Bridge,
    ContractInteraction,
    Deposit,
    Withdraw,
    Rebalance,
    Analysis,
}

impl ActionType {
    pub const ALL: [ActionType; 6] = [
        ActionType::Bridge,
        ActionType::ContractInteraction,
        ActionType::Deposit,
        ActionType::Withdraw,
        ActionType::Rebalance,
        ActionType::Analysis,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ActionType::Bridge => "bridge",
            ActionType::ContractInteraction => "contract_interaction",
            ActionType::Deposit => "deposit",
            ActionType::Withdraw => "withdraw",
            ActionType::Rebalance => "rebalance",
            ActionType::Analysis => "analysis",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,   // Created by the planner
    Executing, // Handler in flight
    Completed,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Executing => "executing",
            ActionStatus::Completed => "completed",
            ActionStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Planning,
    Executing,
    Completed,
    Failed,
}

impl PlanStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PlanStatus::Planning => "planning",
            PlanStatus::Executing => "executing",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Completed | PlanStatus::Failed)
    }
}
