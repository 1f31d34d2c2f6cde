use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AgentAction, PlanId, PlanStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPlan {
    pub id: PlanId,
    pub goal: String,
    pub actions: Vec<AgentAction>,
    pub status: PlanStatus,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl AgentPlan {
    pub fn new(id: PlanId, goal: impl Into<String>, actions: Vec<AgentAction>) -> Self {
        let now = Utc::now();
        Self {
            id,
            goal: goal.into(),
            actions,
            status: PlanStatus::Planning,
            created: now,
            updated: now,
        }
    }

    pub fn set_status(&mut self, status: PlanStatus) {
        self.status = status;
        self.updated = Utc::now();
    }

    /// Final status after execution: completed only when every action completed.
    pub fn settle(&mut self) -> PlanStatus {
        let status = if self.actions.iter().all(AgentAction::is_completed) {
            PlanStatus::Completed
        } else {
            PlanStatus::Failed
        };
        self.set_status(status);
        status
    }

    pub fn completed_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_completed()).count()
    }

    pub fn first_failure(&self) -> Option<&AgentAction> {
        self.actions.iter().find(|a| a.is_failed())
    }
}
