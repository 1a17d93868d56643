//! `transflow-admin` -- maintenance tool for active revision mappings and
//! vendor request identifiers.
//!
//! # Environment variables
//!
//! | Variable                     | Required | Default | Description                       |
//! |------------------------------|----------|---------|-----------------------------------|
//! | `DATABASE_URL`               | yes      | --      | PostgreSQL connection string      |
//! | `DB_MAX_CONNECTIONS`         | no       | `5`     | Connection pool size              |
//! | `VENDOR_IDENTIFIER_CODE`     | no       | `WEB`   | Requester code in new identifiers |
//! | `VENDOR_IDENTIFIER_SEQUENCE` | no       | --      | Sequence the vendor draws from    |

mod config;

use anyhow::Context;
use chrono::Datelike;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transflow_core::audit::{self, actions};
use transflow_core::mapping::{MappingTarget, Scope};
use transflow_core::request_identifier::next_identifier;
use transflow_core::store::MappingStore;
use transflow_core::types::{validate_langcode, ContentRef, DbId, RevisionId};
use transflow_db::repositories::{ActiveRevisionRepo, PgMappingStore, RequestIdentifierRepo};

use config::AdminConfig;

#[derive(Parser)]
#[command(name = "transflow-admin")]
#[command(about = "Inspect and repair active revision mappings")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    Any,
    Published,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Any => Scope::Any,
            ScopeArg::Published => Scope::Published,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Print the mappings of an item as JSON
    Show { entity_type: String, entity_id: String },
    /// List items that have mappings, most recently changed first
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Write a mapping without checking candidates (0 hides the translation)
    Set {
        entity_type: String,
        entity_id: String,
        langcode: String,
        revision_id: RevisionId,
        #[arg(long, value_enum, default_value = "any")]
        scope: ScopeArg,
    },
    /// Remove the mapping of a language (every scope unless --scope is given)
    Remove {
        entity_type: String,
        entity_id: String,
        langcode: String,
        #[arg(long, value_enum)]
        scope: Option<ScopeArg>,
    },
    /// Delete every mapping of an item
    Clear { entity_type: String, entity_id: String },
    /// Delete records left without any language rows
    PurgeEmpty,
    /// Show the identifier the next vendor request for an item would get
    NextIdentifier { entity_type: String, entity_id: String },
    /// Allocate and record the next vendor request identifier for an item
    Reserve { entity_type: String, entity_id: String },
    /// Mark a vendor request as sent
    MarkSent { request_id: DbId },
    /// Record the number the vendor assigned to a request
    AssignNumber { request_id: DbId, number: i64 },
    /// Overwrite the global vendor number
    SetNumber { number: i64 },
    /// Ask the vendor for a new number on the next request
    ForceNew {
        /// Clear a pending request instead
        #[arg(long)]
        off: bool,
    },
    /// List the vendor requests recorded for an item
    Requests { entity_type: String, entity_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transflow_admin=info,transflow::audit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AdminConfig::from_env()?;

    let pool = transflow_db::create_pool(&config.database_url, config.max_connections)
        .await
        .context("Failed to connect to database")?;
    transflow_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::debug!(max_connections = config.max_connections, "Database pool ready");

    let store = PgMappingStore::new(pool.clone());

    match cli.command {
        Command::Migrate => {
            transflow_db::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Migrations applied");
        }
        Command::Show {
            entity_type,
            entity_id,
        } => {
            let item = ContentRef::new(entity_type, entity_id);
            match store.get_mappings_for_item(&item).await? {
                Some(record) => print_json(&record)?,
                None => println!("{item} has no mappings"),
            }
        }
        Command::List { limit } => {
            let summaries = ActiveRevisionRepo::list_summaries(&pool, limit).await?;
            print_json(&summaries)?;
        }
        Command::Set {
            entity_type,
            entity_id,
            langcode,
            revision_id,
            scope,
        } => {
            validate_langcode(&langcode)?;
            anyhow::ensure!(revision_id >= 0, "Revision id must not be negative");
            let item = ContentRef::new(entity_type, entity_id);
            let scope = Scope::from(scope);
            let target = MappingTarget::from_revision_id(revision_id);
            let record = store.set_mapping(&item, &langcode, scope, target).await?;
            audit::record(
                actions::MAPPING_SET,
                &item,
                &audit::describe_write(&langcode, scope, target),
            );
            print_json(&record)?;
        }
        Command::Remove {
            entity_type,
            entity_id,
            langcode,
            scope,
        } => {
            let item = ContentRef::new(entity_type, entity_id);
            let remaining = store
                .remove_mapping(&item, &langcode, scope.map(Scope::from))
                .await?;
            audit::record(
                actions::MAPPING_REMOVED,
                &item,
                &format!("Removed mapping for '{langcode}'"),
            );
            match remaining {
                Some(record) => print_json(&record)?,
                None => println!("{item} has no mappings left"),
            }
        }
        Command::Clear {
            entity_type,
            entity_id,
        } => {
            let item = ContentRef::new(entity_type, entity_id);
            if store.remove_all_mappings(&item).await? {
                audit::record(actions::MAPPINGS_CLEARED, &item, "Cleared all mappings");
                println!("Cleared mappings of {item}");
            } else {
                println!("{item} has no mappings");
            }
        }
        Command::PurgeEmpty => {
            let purged = ActiveRevisionRepo::purge_empty(&pool).await?;
            tracing::info!(purged, "Purged empty active revision records");
        }
        Command::NextIdentifier {
            entity_type,
            entity_id,
        } => {
            let item = ContentRef::new(entity_type, entity_id);
            let context = RequestIdentifierRepo::context_for(&pool, &item).await?;
            let allocation = next_identifier(&config.identifiers, &context, current_year());
            print_json(&allocation)?;
        }
        Command::Reserve {
            entity_type,
            entity_id,
        } => {
            let item = ContentRef::new(entity_type, entity_id);
            let (allocation, request) =
                RequestIdentifierRepo::reserve(&pool, &config.identifiers, &item, current_year())
                    .await?;
            println!("{}", allocation.identifier);
            print_json(&request)?;
        }
        Command::MarkSent { request_id } => {
            anyhow::ensure!(
                RequestIdentifierRepo::mark_sent(&pool, request_id).await?,
                "Vendor request {request_id} not found"
            );
            println!("Vendor request {request_id} marked as sent");
        }
        Command::AssignNumber { request_id, number } => {
            let request = RequestIdentifierRepo::record_assigned_number(&pool, request_id, number)
                .await?
                .with_context(|| format!("Vendor request {request_id} not found"))?;
            println!("{}", request.identifier());
        }
        Command::SetNumber { number } => {
            RequestIdentifierRepo::set_global_number(&pool, number).await?;
            tracing::info!(number, "Global vendor number updated");
        }
        Command::ForceNew { off } => {
            RequestIdentifierRepo::force_new_number(&pool, !off).await?;
            tracing::info!(force_new = !off, "Force-new flag updated");
        }
        Command::Requests {
            entity_type,
            entity_id,
        } => {
            let item = ContentRef::new(entity_type, entity_id);
            let requests = RequestIdentifierRepo::list_for_item(&pool, &item).await?;
            print_json(&requests)?;
        }
    }

    Ok(())
}

fn current_year() -> i32 {
    chrono::Utc::now().year()
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
