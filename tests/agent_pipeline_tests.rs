//! End-to-end planning and execution against the simulated wallet.

use anyhow::Result;
use std::sync::{Arc, Mutex};

use etf_agent::chain::SimulatedWallet;
use etf_agent::engine::{ActionExecutor, ExecutionObserver, ExecutorConfig, Planner, PlannerConfig};
use etf_agent::providers::{LLMProvider, Message, MockLLMProvider};
use etf_agent::types::{ActionStatus, ActionType, AgentAction, AgentContext, AgentPlan, PlanStatus};

/// Provider that always errors, forcing template planning
struct UnavailableProvider;

#[async_trait::async_trait]
impl LLMProvider for UnavailableProvider {
    async fn complete(&self, _messages: Vec<Message>) -> Result<String> {
        anyhow::bail!("503 Service Unavailable")
    }
}

#[derive(Default)]
struct CountingObserver {
    progress: Mutex<usize>,
    completed: Mutex<Option<PlanStatus>>,
}

impl ExecutionObserver for CountingObserver {
    fn on_progress(&self, _action: &AgentAction) {
        *self.progress.lock().unwrap() += 1;
    }

    fn on_complete(&self, plan: &AgentPlan) {
        *self.completed.lock().unwrap() = Some(plan.status);
    }
}

fn context() -> AgentContext {
    AgentContext {
        wallet_address: Some("0x52908400098527886E0F7030069857D2E4169EE7".to_string()),
        ..AgentContext::default()
    }
}

#[tokio::test]
async fn test_bridge_goal_without_model() {
    let plan = Planner::offline()
        .create_plan("Bridge 5 FLOW to Base USDC", &context())
        .await;

    assert_eq!(plan.status, PlanStatus::Planning);
    assert_eq!(plan.actions.len(), 1);
    assert_eq!(plan.actions[0].action_type, ActionType::Bridge);
    assert_eq!(plan.actions[0].param_str("fromChain").as_deref(), Some("flow"));
    assert!(plan.id.starts_with("plan_"));
}

#[tokio::test]
async fn test_bridge_keyword_yields_exactly_one_bridge() {
    let planner = Planner::offline();
    for goal in ["BRIDGE now", "please bridge and bridge again", "rebalance, then Bridge"] {
        let plan = planner.create_plan(goal, &context()).await;
        let bridges = plan
            .actions
            .iter()
            .filter(|a| a.action_type == ActionType::Bridge)
            .count();
        assert_eq!(bridges, 1, "goal: {}", goal);
    }
}

#[tokio::test]
async fn test_unrecognized_goal_yields_single_analysis() {
    let plan = Planner::offline()
        .create_plan("make me rich", &context())
        .await;

    assert_eq!(plan.actions.len(), 1);
    assert_eq!(plan.actions[0].action_type, ActionType::Analysis);
}

#[tokio::test]
async fn test_model_failure_degrades_to_templates() {
    let llm: Arc<dyn LLMProvider> = Arc::new(UnavailableProvider);
    let planner = Planner::new(Some(llm), PlannerConfig::default());
    let plan = planner.create_plan("withdraw my shares", &context()).await;

    assert_eq!(plan.actions.len(), 1);
    assert_eq!(plan.actions[0].action_type, ActionType::Withdraw);
}

#[tokio::test]
async fn test_planned_and_executed_with_model() {
    let llm: Arc<dyn LLMProvider> = Arc::new(MockLLMProvider::with_response(
        r#"Here is your plan:
        [
          {"type": "deposit", "description": "Deposit USDC", "parameters": {"token": "usdc", "amount": 250}},
          {"type": "analysis", "description": "Review", "parameters": {}, "estimatedDuration": "30s"}
        ]"#,
    ));
    let planner = Planner::new(Some(llm), PlannerConfig::default());
    let plan = planner.create_plan("invest 250 USDC", &context()).await;
    assert_eq!(plan.actions.len(), 2);

    let observer = Arc::new(CountingObserver::default());
    let executor = ActionExecutor::new(
        Arc::new(SimulatedWallet::deterministic("wallet-1")),
        ExecutorConfig::immediate(),
    )
    .with_observer(observer.clone());

    let plan = executor.execute_plan(plan).await;

    assert_eq!(plan.status, PlanStatus::Completed);
    assert!(plan.actions.iter().all(|a| a.status == ActionStatus::Completed));
    assert!(plan.actions[0].tx_hash.is_some());
    assert_eq!(*observer.progress.lock().unwrap(), 4);
    assert_eq!(*observer.completed.lock().unwrap(), Some(PlanStatus::Completed));
}

#[tokio::test]
async fn test_failed_deposit_leaves_later_actions_pending() {
    let llm: Arc<dyn LLMProvider> = Arc::new(MockLLMProvider::with_response(
        r#"[
          {"type": "deposit", "description": "Deposit ETH", "parameters": {"token": "ETH", "amount": "1"}},
          {"type": "rebalance", "description": "Rebalance", "parameters": {}},
          {"type": "analysis", "description": "Review", "parameters": {}}
        ]"#,
    ));
    let planner = Planner::new(Some(llm), PlannerConfig::default());
    let plan = planner.create_plan("deposit ETH", &context()).await;

    let wallet = Arc::new(SimulatedWallet::deterministic("wallet-1"));
    let executor = ActionExecutor::new(wallet.clone(), ExecutorConfig::immediate());
    let plan = executor.execute_plan(plan).await;

    assert_eq!(plan.status, PlanStatus::Failed);
    assert_eq!(
        plan.actions[0].error.as_deref(),
        Some("Only USDC deposits are supported")
    );
    assert!(plan.actions[1..]
        .iter()
        .all(|a| a.status == ActionStatus::Pending));
    assert_eq!(wallet.calls(), 0);
}
