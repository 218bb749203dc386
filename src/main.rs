use anyhow::Result;
use clap::{Parser, Subcommand};
use forge::errors::{
    CheckpointError, DispatchError, LoopError, PacketError, PlanError, SchedulerError, StoreError,
    VerificationError,
};
use std::path::PathBuf;
use std::process::ExitCode;

mod cmd;

#[derive(Parser)]
#[command(name = "forge")]
#[command(version, about = "Autonomous agentic development orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Assume "yes" at every interactive checkpoint (non-interactive mode).
    #[arg(long, global = true)]
    pub yes: bool,

    /// Path to the workspace directory, relative to the project root unless absolute.
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Read/write the governance settings file at this path instead of
    /// `<workspace>/01-governance/settings.json`.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Project root. Defaults to the current directory.
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Worker runtime adapter to dispatch against.
    #[arg(long, global = true, default_value = "claude-code")]
    pub runtime: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the workspace skeleton and default settings.
    Init {
        #[arg(long)]
        name: Option<String>,
    },
    /// Read-only environment audit.
    Doctor,
    /// Dispatch an architect worker to write a plan document.
    Plan {
        phase: String,
        #[arg(long, default_value_t = 1)]
        plan_number: u32,
    },
    /// Dispatch workers wave by wave against the current task graph.
    Execute,
    /// Run the Verification Ladder against the current task graph.
    Verify,
    /// Promote scars, prune checkpoints, close out the loop position.
    Unify,
    /// Chain plan -> execute -> verify -> unify.
    Run {
        phase: String,
        #[arg(long, default_value_t = 1)]
        plan_number: u32,
    },
    /// Interactively roll back to a prior checkpoint.
    Recover { checkpoint_id: String },
    /// Show the current loop position and task graph summary.
    Status,
    /// List recorded scars and the active prevention-rule digest.
    Scars,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .try_init();

    match run(cli).await {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let workspace = cli.workspace.as_deref();
    let settings = cli.settings.as_deref();

    match &cli.command {
        Commands::Init { name } => {
            let name = name.clone().unwrap_or_else(|| {
                project_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "project".to_string())
            });
            cmd::cmd_init(&project_dir, workspace, settings, &name)
        }
        Commands::Doctor => {
            let findings = cmd::cmd_doctor(&project_dir, workspace, settings)?;
            if findings.iter().any(|f| !f.ok) {
                anyhow::bail!("one or more environment checks failed");
            }
            Ok(())
        }
        Commands::Plan { phase, plan_number } => {
            cmd::cmd_plan(&project_dir, workspace, settings, phase, *plan_number, &cli.runtime).await
        }
        Commands::Execute => {
            cmd::cmd_execute(&project_dir, workspace, settings, &cli.runtime, cli.yes).await
        }
        Commands::Verify => cmd::cmd_verify(&project_dir, workspace, settings).await,
        Commands::Unify => cmd::cmd_unify(&project_dir, workspace, settings),
        Commands::Run { phase, plan_number } => {
            cmd::cmd_run(&project_dir, workspace, settings, phase, *plan_number, &cli.runtime).await
        }
        Commands::Recover { checkpoint_id } => {
            cmd::cmd_recover(&project_dir, workspace, settings, checkpoint_id, cli.yes)
        }
        Commands::Status => cmd::cmd_status(&project_dir, workspace, settings),
        Commands::Scars => cmd::cmd_scars(&project_dir, workspace, settings),
    }
}

/// §6 exit codes: 0 success, 1 user-correctable failure, 2 infrastructure
/// failure, 3 unexpected internal error. Downcasts against the typed error
/// enums from `errors.rs` rather than guessing from the message text.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<StoreError>().is_some() {
        return 1;
    }
    if let Some(e) = err.downcast_ref::<DispatchError>() {
        return match e {
            DispatchError::SpawnFailed(_) => 2,
            _ => 1,
        };
    }
    if let Some(e) = err.downcast_ref::<SchedulerError>() {
        return match e {
            SchedulerError::ThreeConsecutiveFailures { .. } => 1,
            _ => 1,
        };
    }
    if err.downcast_ref::<VerificationError>().is_some() {
        return 1;
    }
    if let Some(e) = err.downcast_ref::<CheckpointError>() {
        return match e {
            CheckpointError::Git(_) => 2,
            _ => 1,
        };
    }
    if err.downcast_ref::<PacketError>().is_some() {
        return 1;
    }
    if err.downcast_ref::<PlanError>().is_some() {
        return 1;
    }
    if err.downcast_ref::<LoopError>().is_some() {
        return 1;
    }
    3
}
