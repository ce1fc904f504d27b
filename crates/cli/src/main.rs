//! Order Profiles CLI - schema setup and split-profile migration tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply the database schema
//! op-cli db migrate
//!
//! # Create the billing and shipping profile categories
//! op-cli provision
//!
//! # Show what the migration would do to one order
//! op-cli plan 42 --order-type default
//!
//! # Migrate existing orders without switching the mode flag
//! op-cli migrate --order-type default --chunk-size 100
//!
//! # Switch an order type to split profiles
//! op-cli enable --order-type default
//!
//! # Show the mode and order count of an order type
//! op-cli status --order-type default
//! ```
//!
//! # Commands
//!
//! - `db migrate` - Run database migrations
//! - `provision` - Clone the shared profile category
//! - `plan` - Dry-run plan for a single order
//! - `migrate` - Run the batch migration
//! - `enable` - Full one-way switch to split profiles
//! - `status` - Order type mode and existing order count

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use order_profiles_core::{OrderId, OrderTypeId};

mod commands;

use commands::OutputFormat;

#[derive(Parser)]
#[command(name = "op-cli")]
#[command(author, version, about = "Split billing/shipping profile migration tools")]
struct Cli {
    /// Output format for reports
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database schema management
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    /// Create the billing and shipping profile categories
    Provision {
        /// Order type the categories are provisioned for
        #[arg(long, default_value = "default")]
        order_type: OrderTypeId,
    },
    /// Print the migration plan for one order without writing anything
    Plan {
        /// Order to plan
        order_id: OrderId,

        /// Order type whose targets apply
        #[arg(long)]
        order_type: OrderTypeId,
    },
    /// Migrate existing orders to split profiles
    Migrate {
        /// Order type to migrate
        #[arg(long)]
        order_type: OrderTypeId,

        /// Orders per chunk (overrides `OP_CHUNK_SIZE`)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Only migrate these orders
        #[arg(long = "order")]
        orders: Vec<OrderId>,
    },
    /// Switch an order type to split profiles
    Enable {
        /// Order type to switch
        #[arg(long)]
        order_type: OrderTypeId,

        /// Switch even if some orders failed to migrate
        #[arg(long)]
        accept_partial: bool,

        /// Orders per chunk (overrides `OP_CHUNK_SIZE`)
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Show the profile mode and order count of an order type
    Status {
        #[arg(long)]
        order_type: OrderTypeId,
    },
}

#[derive(Subcommand)]
enum DbAction {
    /// Apply pending schema migrations
    Migrate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.log_json);

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let format = cli.format;
    match cli.command {
        Commands::Db { action } => match action {
            DbAction::Migrate => commands::db::migrate().await?,
        },
        Commands::Provision { order_type } => {
            commands::profiles::provision(&order_type, format).await?;
        }
        Commands::Plan {
            order_id,
            order_type,
        } => commands::profiles::plan(order_id, &order_type, format).await?,
        Commands::Migrate {
            order_type,
            chunk_size,
            orders,
        } => commands::profiles::migrate(&order_type, chunk_size, &orders, format).await?,
        Commands::Enable {
            order_type,
            accept_partial,
            chunk_size,
        } => {
            commands::profiles::enable(&order_type, accept_partial, chunk_size, format).await?;
        }
        Commands::Status { order_type } => {
            commands::profiles::status(&order_type, format).await?;
        }
    }
    Ok(())
}
