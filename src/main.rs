use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use etf_agent::api::{serve, AppState};
use etf_agent::chain::SimulatedWallet;
use etf_agent::engine::{ActionExecutor, ExecutionObserver, Planner, PlannerConfig};
use etf_agent::providers::LLMProvider;
use etf_agent::{AgentAction, AgentContext, AgentPlan, Config};

#[derive(Parser)]
#[command(name = "etf-agent")]
#[command(about = "Goal planning, execution and Twitter verification for the Flow ETF", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML config file; environment variables override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the plan generated for a goal
    Plan {
        #[arg(help = "Investment goal")]
        goal: String,
    },
    /// Plan a goal and execute it against a simulated wallet
    Run {
        #[arg(help = "Investment goal")]
        goal: String,
        #[arg(long, default_value = "cli-wallet")]
        wallet_id: String,
    },
}

struct ConsoleObserver;

impl ExecutionObserver for ConsoleObserver {
    fn on_progress(&self, action: &AgentAction) {
        println!(
            "  [{:?}] {} {}",
            action.status,
            action.action_type.as_str(),
            action.description
        );
    }

    fn on_complete(&self, plan: &AgentPlan) {
        println!(
            "Plan {} finished: {:?} ({}/{} actions completed)",
            plan.id,
            plan.status,
            plan.completed_count(),
            plan.actions.len()
        );
    }

    fn on_error(&self, action: &AgentAction, error: &str) {
        eprintln!("  action {} errored: {}", action.id, error);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.port);
            let state = AppState::from_config(config).await?;
            serve(state, port).await?
        }
        Commands::Plan { goal } => {
            let plan = planner(&config).create_plan(&goal, &AgentContext::default()).await;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Run { goal, wallet_id } => run_goal(&config, &goal, &wallet_id).await?,
    }

    Ok(())
}

fn planner(config: &Config) -> Planner {
    let llm = config
        .gemini_api_key
        .as_ref()
        .map(|key| Arc::new(config.gemini_provider(key)) as Arc<dyn LLMProvider>);
    let planner = Planner::new(llm, PlannerConfig::default());
    if !planner.has_model() {
        log::info!("GEMINI_API_KEY not set, planning from keyword templates");
    }
    planner
}

async fn run_goal(config: &Config, goal: &str, wallet_id: &str) -> Result<()> {
    let context = AgentContext {
        wallet_id: Some(wallet_id.to_string()),
        ..AgentContext::default()
    };

    let plan = planner(config).create_plan(goal, &context).await;
    println!("Plan {} for goal: {}", plan.id, goal);
    for (i, action) in plan.actions.iter().enumerate() {
        println!("  {}. {} - {}", i + 1, action.action_type.as_str(), action.description);
    }

    let executor = ActionExecutor::new(
        Arc::new(SimulatedWallet::new(wallet_id)),
        config.executor_config(),
    )
    .with_observer(Arc::new(ConsoleObserver));

    let plan = executor.execute_plan(plan).await;
    if let Some(action) = plan.first_failure() {
        println!(
            "Stopped at {}: {}",
            action.id,
            action.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}
