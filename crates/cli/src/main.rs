//! `dispatch` — operator CLI for the service-request workflow engine.
//!
//! State is a JSON snapshot file (`--store`); every mutating command loads
//! it, runs the engine operation, and writes it back. Business denials
//! exit 1 with a friendly message; infrastructure failures exit 2 with the
//! categorized error.

mod admin;
mod ops;
mod store;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use dispatch_engine::{
    EngineConfig, LogNotifier, MemoryInventory, NotificationSender, WorkflowEngine,
};
use dispatch_storage::MemoryStore;

use crate::store::FileStore;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Service-request workflow toolchain.
#[derive(Parser)]
#[command(name = "dispatch", version, about = "Service-request workflow toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Path to the JSON store snapshot
    #[arg(long, global = true, default_value = "dispatch-store.json")]
    store: PathBuf,

    /// Optional TOML engine configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List workflow definitions, or show one kind in full
    Definitions {
        /// connection_request | technical_service | call_center_direct
        kind: Option<String>,
    },

    /// Create a new service request
    Initiate {
        /// Workflow kind
        workflow: String,
        /// Owning client id
        #[arg(long)]
        client: String,
        #[arg(long)]
        description: Option<String>,
        /// low | medium | high | urgent
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Staff override for the starting role
        #[arg(long)]
        initial_role: Option<String>,
        /// Staff member creating on the client's behalf
        #[arg(long)]
        staff_id: Option<String>,
        /// Role of the creating staff member
        #[arg(long)]
        staff_role: Option<String>,
    },

    /// Execute a transition on a request
    Transition {
        id: String,
        /// Action name (e.g. assign_to_technician)
        action: String,
        /// Acting role
        #[arg(long)]
        role: String,
        /// Acting person's id
        #[arg(long)]
        actor: String,
        #[arg(long)]
        comment: Option<String>,
        /// Technician id for assignment actions
        #[arg(long)]
        technician: Option<String>,
        #[arg(long)]
        diagnostics: Option<String>,
        /// Equipment line as item=quantity; repeatable
        #[arg(long = "equipment")]
        equipment: Vec<String>,
        /// Extra data field as key=value (value parsed as JSON when
        /// possible); repeatable
        #[arg(long = "data")]
        data: Vec<String>,
    },

    /// Complete a request with client feedback
    Complete {
        id: String,
        #[arg(long)]
        rating: Option<u8>,
        #[arg(long)]
        comment: Option<String>,
        #[arg(long)]
        actor: String,
    },

    /// Show a request
    Show { id: String },

    /// Show a request's transition history
    History { id: String },

    /// List non-terminal requests older than the staleness threshold
    Stuck {
        #[arg(long, default_value = "24")]
        hours: u64,
    },

    /// List recovery actions applicable to a request
    RecoveryOptions { id: String },

    /// Apply an admin recovery action
    Recover {
        id: String,
        /// force_transition | reset_to_previous | force_complete |
        /// reassign_role
        action: String,
        /// Acting admin id
        #[arg(long)]
        admin: String,
        /// Target role for force_transition
        #[arg(long)]
        to_role: Option<String>,
        /// Rating for force_complete
        #[arg(long)]
        rating: Option<u8>,
        /// New assignee for reassign_role
        #[arg(long)]
        new_actor: Option<String>,
    },

    /// Run the inventory reconciliation sweep
    Reconcile,

    /// Seed warehouse stock (item and quantity)
    SeedStock {
        item: String,
        quantity: i64,
    },

    /// Run the storage conformance suite against the memory backend
    Conformance,
}

/// Everything a command needs: the engine over the loaded snapshot, the
/// inventory handle, and the file to save back to.
pub(crate) struct Context {
    pub engine: WorkflowEngine<MemoryStore>,
    pub inventory: Arc<MemoryInventory>,
    pub file: FileStore,
    pub output: OutputFormat,
}

impl Context {
    fn open(cli: &Cli) -> Result<Self, String> {
        let file = FileStore::new(cli.store.clone());
        let state = file.load()?;
        let store = MemoryStore::from_snapshot(state.store);
        let inventory = Arc::new(MemoryInventory::from_snapshot(state.inventory));

        let config = match &cli.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
                toml::from_str::<EngineConfig>(&raw)
                    .map_err(|e| format!("cannot parse {}: {}", path.display(), e))?
            }
            None => EngineConfig::default(),
        };

        let engine = WorkflowEngine::new(
            store,
            Arc::new(LogNotifier::new()) as Arc<dyn NotificationSender>,
            inventory.clone() as Arc<dyn dispatch_engine::InventoryManager>,
        )
        .with_config(config);

        Ok(Context {
            engine,
            inventory,
            file,
            output: cli.output,
        })
    }

    /// Persist the backends back to the snapshot file.
    pub(crate) fn save(&self) -> Result<(), String> {
        self.file.save(self.engine.store(), &self.inventory)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    process::exit(run(cli).await);
}

async fn run(cli: Cli) -> i32 {
    let ctx = match Context::open(&cli) {
        Ok(ctx) => ctx,
        Err(message) => {
            eprintln!("error: {}", message);
            return 2;
        }
    };

    let result = match &cli.command {
        Commands::Definitions { kind } => ops::definitions(&ctx, kind.as_deref()),
        Commands::Initiate {
            workflow,
            client,
            description,
            priority,
            initial_role,
            staff_id,
            staff_role,
        } => {
            ops::initiate(
                &ctx,
                workflow,
                client,
                description.as_deref(),
                priority,
                initial_role.as_deref(),
                staff_id.as_deref(),
                staff_role.as_deref(),
            )
            .await
        }
        Commands::Transition {
            id,
            action,
            role,
            actor,
            comment,
            technician,
            diagnostics,
            equipment,
            data,
        } => {
            ops::transition(
                &ctx,
                id,
                action,
                role,
                actor,
                comment.as_deref(),
                technician.as_deref(),
                diagnostics.as_deref(),
                equipment,
                data,
            )
            .await
        }
        Commands::Complete {
            id,
            rating,
            comment,
            actor,
        } => ops::complete(&ctx, id, *rating, comment.as_deref(), actor).await,
        Commands::Show { id } => ops::show(&ctx, id).await,
        Commands::History { id } => ops::history(&ctx, id).await,
        Commands::Stuck { hours } => admin::stuck(&ctx, *hours).await,
        Commands::RecoveryOptions { id } => admin::recovery_options(&ctx, id).await,
        Commands::Recover {
            id,
            action,
            admin,
            to_role,
            rating,
            new_actor,
        } => {
            admin::recover(
                &ctx,
                id,
                action,
                admin,
                to_role.as_deref(),
                *rating,
                new_actor.as_deref(),
            )
            .await
        }
        Commands::Reconcile => admin::reconcile(&ctx).await,
        Commands::SeedStock { item, quantity } => admin::seed_stock(&ctx, item, *quantity),
        Commands::Conformance => admin::conformance(&ctx).await,
    };

    match result {
        Ok(code) => code,
        Err(message) => {
            eprintln!("error: {}", message);
            2
        }
    }
}
