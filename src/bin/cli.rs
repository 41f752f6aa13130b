use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::{Row, SqlitePool};

use catalog_api::authz::{PermissionStore, SqlitePermissionStore};
use catalog_api::db;

#[derive(Parser, Debug)]
#[command(author, version, about = "catalog-api administration tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Create a role
    CreateRole { name: String },
    /// Grant a role to a user, identified by xid. Use this to bootstrap the first admin.
    AssignRole { xid: String, role: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();
    let pool = get_pool().await?;

    match cli.command {
        Commands::MigrateRun => {
            let migrator = get_migrator().await?;
            migrator.run(&pool).await.context("failed to apply migrations")?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::CreateRole { name } => {
            let store = SqlitePermissionStore::new(pool);
            let role = store.create_role(name.trim()).await?;
            println!("Created role {} (id {})", role.name, role.id);
        }
        Commands::AssignRole { xid, role } => {
            let store = SqlitePermissionStore::new(pool);
            store.assign_role_to_user(xid.trim(), role.trim()).await?;
            println!("Assigned role {} to user {}", role.trim(), xid.trim());
        }
    }

    Ok(())
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    db::connect(&database_url).await
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let tracked = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'")
        .fetch_optional(pool)
        .await?;

    let applied: HashSet<i64> = if tracked.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} Name", "Status", "Version");
    for migration in migrator.iter() {
        let status = if applied.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // ./migrations when run from the repo root, otherwise the crate's own folder
    let local = Path::new("./migrations");
    let path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = path.display().to_string();
    sqlx::migrate::Migrator::new(path)
        .await
        .with_context(|| format!("failed to load migrations from {display}"))
}
