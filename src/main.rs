//! # Knowledge Harness CLI (`kh`)
//!
//! The `kh` binary manages per-tenant chatbot knowledge: ingest a business's
//! section text, inspect the resulting chunks, and preview the context and
//! prompt a bot would receive for a message.
//!
//! ## Usage
//!
//! ```bash
//! kh --config ./config/kh.toml --client <id> [--bot <type>] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kh init` | Create the SQLite database and run schema migrations |
//! | `kh ingest <file>` | Replace a tenant's knowledge from a TOML/JSON section file |
//! | `kh rechunk` | Rebuild chunks from the tenant's stored raw sections |
//! | `kh retrieve "<query>"` | Show the grouped, capped context for a message |
//! | `kh prompt "<message>"` | Print the assembled chat messages as JSON |
//! | `kh chunks` | List stored chunks |
//! | `kh purge` | Delete every chunk of a tenant variant |
//!
//! ## Examples
//!
//! ```bash
//! kh init
//! kh --client acme ingest ./data/acme.toml
//! kh --client acme retrieve "do you have vegan pizza"
//! kh --client villas --bot realestate prompt "any 3 bedroom units?"
//! kh --client acme chunks --section faqs
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use knowledge_harness::models::{TenantKey, DEFAULT_BOT_TYPE};
use knowledge_harness::{chunks, config, ingest, logging, migrate, retrieve};

/// Knowledge Harness CLI: per-tenant knowledge ingestion and retrieval for
/// business chatbots.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "kh",
    about = "Knowledge Harness: per-tenant knowledge ingestion and retrieval for business chatbots",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/kh.toml`.
    #[arg(long, global = true, default_value = "./config/kh.toml")]
    config: PathBuf,

    /// Client (business) identifier. Required by every command except `init`.
    #[arg(long, global = true)]
    client: Option<String>,

    /// Bot variant, e.g. `restaurant` or `realestate`.
    #[arg(long, global = true, default_value = DEFAULT_BOT_TYPE)]
    bot: String,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Ingest a section file for the tenant.
    ///
    /// The file maps section names (`menu`, `offers`, `hours`, `faqs`,
    /// `listings`, `paymentPlans`, `policies`, `other`) to raw text. All
    /// existing chunks of the tenant variant are replaced.
    Ingest {
        /// Path to a `.toml` or `.json` section file.
        file: PathBuf,

        /// Show per-section chunk counts without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Re-chunk the tenant's stored raw sections.
    Rechunk,

    /// Show the retrieved context for a message.
    Retrieve {
        /// The user message. An empty string lists the most recent chunks.
        query: String,

        /// Print the retrieval as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the chat messages assembled for a message.
    Prompt {
        /// The user message.
        message: String,

        /// Rules prompt text.
        #[arg(long, conflicts_with = "rules_file")]
        rules: Option<String>,

        /// Read the rules prompt from a file.
        #[arg(long)]
        rules_file: Option<PathBuf>,
    },

    /// List stored chunks.
    Chunks {
        /// Only list chunks of this section, in source order.
        #[arg(long)]
        section: Option<String>,

        /// Maximum number of recent chunks when no section is given.
        #[arg(long)]
        limit: Option<usize>,

        /// Print chunks as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete every chunk of the tenant variant.
    Purge,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging);

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized successfully.");
        return Ok(());
    }

    // A missing --client is rejected the same way as a blank one.
    let tenant = TenantKey::new(cli.client.as_deref().unwrap_or(""), Some(&cli.bot))?;

    match cli.command {
        Commands::Init => {}
        Commands::Ingest { file, dry_run } => {
            ingest::run_ingest(&cfg, &tenant, &file, dry_run).await?;
        }
        Commands::Rechunk => {
            ingest::run_rechunk(&cfg, &tenant).await?;
        }
        Commands::Retrieve { query, json } => {
            retrieve::run_retrieve(&cfg, &tenant, &query, json).await?;
        }
        Commands::Prompt {
            message,
            rules,
            rules_file,
        } => {
            retrieve::run_prompt(&cfg, &tenant, &message, rules, rules_file.as_deref()).await?;
        }
        Commands::Chunks {
            section,
            limit,
            json,
        } => {
            chunks::run_chunks(&cfg, &tenant, section.as_deref(), limit, json).await?;
        }
        Commands::Purge => {
            ingest::run_purge(&cfg, &tenant).await?;
        }
    }

    Ok(())
}
