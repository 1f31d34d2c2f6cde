use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::chain::abi::to_base_units;
use crate::chain::{BridgeRequest, ChainAdapter, ContractCall};
use crate::types::{ActionType, AgentAction, AgentPlan, ExecutionResult, PlanStatus};

pub const DEFAULT_VAULT_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Configuration for the Action Executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Pause between consecutive actions of a plan
    pub action_delay: Duration,
    pub rebalance_delay: Duration,
    pub analysis_delay: Duration,
    /// ETF vault receiving deposits and withdrawals
    pub vault_address: String,
    pub usdc_decimals: u32,
    pub share_decimals: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            action_delay: Duration::from_secs(1),
            rebalance_delay: Duration::from_secs(2),
            analysis_delay: Duration::from_millis(1500),
            vault_address: DEFAULT_VAULT_ADDRESS.to_string(),
            usdc_decimals: 6,
            share_decimals: 18,
        }
    }
}

impl ExecutorConfig {
    /// No artificial pacing; used by tests and the CLI.
    pub fn immediate() -> Self {
        Self {
            action_delay: Duration::ZERO,
            rebalance_delay: Duration::ZERO,
            analysis_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Progress hooks invoked while a plan runs.
pub trait ExecutionObserver: Send + Sync {
    fn on_progress(&self, _action: &AgentAction) {}
    fn on_complete(&self, _plan: &AgentPlan) {}
    fn on_error(&self, _action: &AgentAction, _error: &str) {}
}

/// Runs plan actions one at a time against a chain adapter.
pub struct ActionExecutor {
    adapter: Arc<dyn ChainAdapter>,
    observer: Option<Arc<dyn ExecutionObserver>>,
    config: ExecutorConfig,
}

impl ActionExecutor {
    pub fn new(adapter: Arc<dyn ChainAdapter>, config: ExecutorConfig) -> Self {
        Self {
            adapter,
            observer: None,
            config,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Execute a single action, recording the outcome on it
    pub async fn execute_action(&self, action: &mut AgentAction) -> ExecutionResult {
        action.mark_executing();
        self.notify_progress(action);

        let outcome = match action.action_type {
            ActionType::Bridge => self.execute_bridge(action).await,
            ActionType::Deposit => self.execute_deposit(action).await,
            ActionType::Withdraw => self.execute_withdraw(action).await,
            ActionType::ContractInteraction => self.execute_contract_interaction(action).await,
            ActionType::Rebalance => self.execute_rebalance(action).await,
            ActionType::Analysis => self.execute_analysis(action).await,
        };

        let result = match outcome {
            Ok(result) => {
                if result.success {
                    action.mark_completed(result.result.clone(), result.tx_hash.clone());
                } else {
                    let error = result
                        .error
                        .clone()
                        .unwrap_or_else(|| "Action failed".to_string());
                    action.mark_failed(error);
                }
                result
            }
            Err(e) => {
                let error = e.to_string();
                log::error!("Action {} ({}) failed: {}", action.id, action.action_type.as_str(), error);
                action.mark_failed(error.clone());
                if let Some(observer) = &self.observer {
                    observer.on_error(action, &error);
                }
                ExecutionResult::failure(error)
            }
        };

        self.notify_progress(action);
        result
    }

    /// Execute every action in order, stopping at the first failure
    pub async fn execute_plan(&self, mut plan: AgentPlan) -> AgentPlan {
        plan.set_status(PlanStatus::Executing);
        log::info!("Executing plan {} ({} actions)", plan.id, plan.actions.len());

        for index in 0..plan.actions.len() {
            if index > 0 && !self.config.action_delay.is_zero() {
                tokio::time::sleep(self.config.action_delay).await;
            }

            let result = self.execute_action(&mut plan.actions[index]).await;
            plan.set_status(PlanStatus::Executing);

            if !result.success {
                log::warn!(
                    "Plan {} stopped at action {}: {}",
                    plan.id,
                    plan.actions[index].id,
                    result.error.as_deref().unwrap_or("unknown error")
                );
                break;
            }
        }

        let status = plan.settle();
        log::info!("Plan {} finished: {}", plan.id, status.as_str());

        if let Some(observer) = &self.observer {
            observer.on_complete(&plan);
        }
        plan
    }

    fn notify_progress(&self, action: &AgentAction) {
        if let Some(observer) = &self.observer {
            observer.on_progress(action);
        }
    }

    fn required(action: &AgentAction, key: &str) -> Result<String> {
        action
            .param_str(key)
            .ok_or_else(|| anyhow!("{} action is missing '{}'", action.action_type.as_str(), key))
    }

    async fn execute_bridge(&self, action: &AgentAction) -> Result<ExecutionResult> {
        let request = BridgeRequest {
            from_chain: action.param_str("fromChain").unwrap_or_else(|| "flow".to_string()),
            to_chain: action.param_str("toChain").unwrap_or_else(|| "base".to_string()),
            from_token: action.param_str("fromToken").unwrap_or_else(|| "FLOW".to_string()),
            to_token: action.param_str("toToken").unwrap_or_else(|| "USDC".to_string()),
            amount: Self::required(action, "amount")?,
            recipient: action.param_str("recipient"),
        };

        let receipt = self.adapter.execute_bridge(&request).await?;

        Ok(ExecutionResult::ok(json!({
            "bridge": request,
            "status": receipt.status,
            "details": receipt.details,
        }))
        .with_tx(receipt.tx_hash))
    }

    async fn execute_deposit(&self, action: &AgentAction) -> Result<ExecutionResult> {
        let token = action.param_str("token").unwrap_or_default();
        if !token.eq_ignore_ascii_case("usdc") {
            return Ok(ExecutionResult::failure("Only USDC deposits are supported"));
        }

        let amount = Self::required(action, "amount")?;
        let units = to_base_units(&amount, self.config.usdc_decimals)?;
        let call = ContractCall {
            contract_address: self.config.vault_address.clone(),
            method: "deposit(uint256)".to_string(),
            args: vec![json!(units.to_string())],
            value: None,
        };

        let receipt = self.adapter.execute_contract_interaction(&call).await?;

        Ok(ExecutionResult::ok(json!({
            "deposited": amount,
            "token": "USDC",
            "vault": self.config.vault_address,
            "status": receipt.status,
        }))
        .with_tx(receipt.tx_hash))
    }

    async fn execute_withdraw(&self, action: &AgentAction) -> Result<ExecutionResult> {
        let token_out = action.param_str("tokenOut").unwrap_or_default();
        if !token_out.eq_ignore_ascii_case("usdc") {
            return Ok(ExecutionResult::failure("Only USDC withdrawals are supported"));
        }

        let shares = action
            .param_str("shares")
            .or_else(|| action.param_str("amount"))
            .ok_or_else(|| anyhow!("withdraw action is missing 'shares'"))?;
        let units = to_base_units(&shares, self.config.share_decimals)?;
        let call = ContractCall {
            contract_address: self.config.vault_address.clone(),
            method: "withdraw(uint256)".to_string(),
            args: vec![json!(units.to_string())],
            value: None,
        };

        let receipt = self.adapter.execute_contract_interaction(&call).await?;

        Ok(ExecutionResult::ok(json!({
            "sharesRedeemed": shares,
            "tokenOut": "USDC",
            "vault": self.config.vault_address,
            "status": receipt.status,
        }))
        .with_tx(receipt.tx_hash))
    }

    async fn execute_contract_interaction(&self, action: &AgentAction) -> Result<ExecutionResult> {
        let args = match action.parameters.get("args") {
            Some(Value::Array(values)) => values.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.clone()],
        };
        let call = ContractCall {
            contract_address: action
                .param_str("contractAddress")
                .unwrap_or_else(|| self.config.vault_address.clone()),
            method: Self::required(action, "method")?,
            args,
            value: action.param_str("value"),
        };

        let receipt = self.adapter.execute_contract_interaction(&call).await?;

        Ok(ExecutionResult::ok(json!({
            "contractAddress": call.contract_address,
            "method": call.method,
            "status": receipt.status,
            "details": receipt.details,
        }))
        .with_tx(receipt.tx_hash))
    }

    async fn execute_rebalance(&self, action: &AgentAction) -> Result<ExecutionResult> {
        tokio::time::sleep(self.config.rebalance_delay).await;

        let strategy = action
            .param_str("strategy")
            .unwrap_or_else(|| "risk_adjusted".to_string());

        Ok(ExecutionResult::ok(json!({
            "rebalanced": true,
            "strategy": strategy,
            "newAllocations": {
                "BTC": 35.0,
                "ETH": 30.0,
                "FLOW": 20.0,
                "USDC": 15.0,
            },
            "trades": 3,
            "estimatedGasCost": "0.0021",
        })))
    }

    async fn execute_analysis(&self, action: &AgentAction) -> Result<ExecutionResult> {
        tokio::time::sleep(self.config.analysis_delay).await;

        let balances = match self.adapter.get_wallet_balance().await {
            Ok(balance) => json!(balance.balances),
            Err(e) => {
                log::warn!("Balance lookup for analysis failed: {}", e);
                Value::Null
            }
        };

        Ok(ExecutionResult::ok(json!({
            "analysisType": action
                .param_str("analysisType")
                .unwrap_or_else(|| "portfolio".to_string()),
            "portfolioHealth": "good",
            "riskScore": 6.2,
            "diversification": "moderate",
            "balances": balances,
            "recommendations": [
                "Maintain a USDC buffer of at least 10%",
                "Rebalance when any allocation drifts more than 5%",
                "Review bridge fees before moving small amounts",
            ],
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainError, SimulatedWallet, TxReceipt, WalletBalance};
    use crate::types::ActionStatus;
    use async_trait::async_trait;
    use serde_json::Map;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl ExecutionObserver for RecordingObserver {
        fn on_progress(&self, action: &AgentAction) {
            self.events
                .lock()
                .unwrap()
                .push(format!("progress:{}:{}", action.id, action.status.as_str()));
        }

        fn on_complete(&self, plan: &AgentPlan) {
            self.events
                .lock()
                .unwrap()
                .push(format!("complete:{}", plan.status.as_str()));
        }

        fn on_error(&self, action: &AgentAction, _error: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("error:{}", action.id));
        }
    }

    /// Wallet whose every call is refused.
    struct RejectingWallet;

    #[async_trait]
    impl ChainAdapter for RejectingWallet {
        fn name(&self) -> &str {
            "rejecting"
        }

        async fn execute_bridge(&self, _request: &BridgeRequest) -> Result<TxReceipt, ChainError> {
            Err(ChainError::Unsupported("bridge".to_string()))
        }

        async fn execute_contract_interaction(
            &self,
            _call: &ContractCall,
        ) -> Result<TxReceipt, ChainError> {
            Err(ChainError::Rejected {
                status: 403,
                body: "denied".to_string(),
            })
        }

        async fn get_wallet_balance(&self) -> Result<WalletBalance, ChainError> {
            Err(ChainError::Rejected {
                status: 403,
                body: "denied".to_string(),
            })
        }

        async fn sign_message(&self, _message: &str) -> Result<String, ChainError> {
            Err(ChainError::Unsupported("sign".to_string()))
        }
    }

    fn action(id: &str, action_type: ActionType, params: Value) -> AgentAction {
        let parameters = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        AgentAction::new(id.to_string(), action_type, "test action", parameters)
    }

    fn simulated_executor() -> (ActionExecutor, Arc<SimulatedWallet>) {
        let wallet = Arc::new(SimulatedWallet::deterministic("wallet-1"));
        let executor = ActionExecutor::new(wallet.clone(), ExecutorConfig::immediate());
        (executor, wallet)
    }

    #[test]
    fn test_executor_config_default() {
        let config = ExecutorConfig::default();
        assert_eq!(config.action_delay, Duration::from_secs(1));
        assert_eq!(config.usdc_decimals, 6);
        assert!(ExecutorConfig::immediate().action_delay.is_zero());
    }

    #[tokio::test]
    async fn test_deposit_rejects_non_usdc() {
        let (executor, wallet) = simulated_executor();
        let mut deposit = action(
            "a1",
            ActionType::Deposit,
            json!({"token": "ETH", "amount": "1"}),
        );

        let result = executor.execute_action(&mut deposit).await;

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Only USDC deposits are supported")
        );
        assert_eq!(deposit.status, ActionStatus::Failed);
        assert_eq!(wallet.calls(), 0);
    }

    #[tokio::test]
    async fn test_token_check_is_case_insensitive() {
        let (executor, _) = simulated_executor();
        let mut deposit = action(
            "a1",
            ActionType::Deposit,
            json!({"token": "USDC", "amount": "100"}),
        );
        let mut withdraw = action(
            "a2",
            ActionType::Withdraw,
            json!({"shares": "10", "tokenOut": "Usdc"}),
        );

        assert!(executor.execute_action(&mut deposit).await.success);
        assert!(executor.execute_action(&mut withdraw).await.success);
        assert_eq!(deposit.tx_hash.as_deref(), Some(format!("0x{:064x}", 1).as_str()));

        let mut bad = action(
            "a3",
            ActionType::Withdraw,
            json!({"shares": "10", "tokenOut": "flow"}),
        );
        let result = executor.execute_action(&mut bad).await;
        assert_eq!(
            result.error.as_deref(),
            Some("Only USDC withdrawals are supported")
        );
    }

    #[tokio::test]
    async fn test_contract_interaction_requires_method() {
        let observer = Arc::new(RecordingObserver::default());
        let (executor, _) = simulated_executor();
        let executor = executor.with_observer(observer.clone());
        let mut call = action("a1", ActionType::ContractInteraction, json!({}));

        let result = executor.execute_action(&mut call).await;

        assert!(!result.success);
        assert!(call.error.as_deref().unwrap().contains("method"));
        assert!(observer
            .events
            .lock()
            .unwrap()
            .contains(&"error:a1".to_string()));
    }

    #[tokio::test]
    async fn test_rebalance_and_analysis_results() {
        let (executor, _) = simulated_executor();
        let mut rebalance = action("a1", ActionType::Rebalance, json!({}));
        let mut analysis = action("a2", ActionType::Analysis, json!({}));

        let result = executor.execute_action(&mut rebalance).await;
        assert_eq!(result.result.unwrap()["strategy"], "risk_adjusted");

        executor.execute_action(&mut analysis).await;
        let analysis_result = analysis.result.unwrap();
        assert_eq!(analysis_result["analysisType"], "portfolio");
        assert_eq!(analysis_result["balances"]["USDC"], "500.0");
    }

    #[tokio::test]
    async fn test_plan_stops_at_first_failure() {
        let (executor, _) = simulated_executor();
        let plan = AgentPlan::new(
            "plan_1".to_string(),
            "deposit then analyze",
            vec![
                action("a1", ActionType::Analysis, json!({})),
                action("a2", ActionType::Deposit, json!({"token": "ETH", "amount": "1"})),
                action("a3", ActionType::Rebalance, json!({})),
            ],
        );

        let plan = executor.execute_plan(plan).await;

        assert_eq!(plan.status, PlanStatus::Failed);
        assert_eq!(plan.actions[0].status, ActionStatus::Completed);
        assert_eq!(plan.actions[1].status, ActionStatus::Failed);
        assert_eq!(plan.actions[2].status, ActionStatus::Pending);
        assert_eq!(plan.first_failure().unwrap().id, "a2");
    }

    #[tokio::test]
    async fn test_adapter_errors_fail_the_plan() {
        let observer = Arc::new(RecordingObserver::default());
        let executor = ActionExecutor::new(Arc::new(RejectingWallet), ExecutorConfig::immediate())
            .with_observer(observer.clone());
        let plan = AgentPlan::new(
            "plan_2".to_string(),
            "bridge",
            vec![action("b1", ActionType::Bridge, json!({"amount": "10"}))],
        );

        let plan = executor.execute_plan(plan).await;

        assert_eq!(plan.status, PlanStatus::Failed);
        assert!(plan.actions[0]
            .error
            .as_deref()
            .unwrap()
            .contains("not supported"));
        let events = observer.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "progress:b1:executing".to_string(),
                "error:b1".to_string(),
                "progress:b1:failed".to_string(),
                "complete:failed".to_string(),
            ]
        );
    }
}
