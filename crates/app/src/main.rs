use std::sync::Arc;

use clap::Parser;
use engine::{Session, SqliteStore};
use migration::{Migrator, MigratorTrait};
use narrator::{GeminiNarrator, NarrativeService};

use crate::{cli::Cli, error::Result, settings::Settings};

mod cli;
mod commands;
mod error;
mod settings;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli.global)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "finquest={level},engine={level},narrator={level}",
            level = settings.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let database = parse_database(&settings.database_url).await?;
    let store = Arc::new(SqliteStore::new(database));

    let mut session = Session::builder()
        .store(store)
        .user_id(&settings.user)
        .currency(settings.currency()?)
        .start()
        .await?;

    let narrator = build_narrator(&settings)?;
    let outcome = commands::run(&mut session, narrator.as_ref(), cli.command).await;
    session.sign_out();
    outcome
}

async fn parse_database(url: &str) -> Result<sea_orm::DatabaseConnection> {
    tracing::debug!("connecting to {url}");
    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

fn build_narrator(settings: &Settings) -> Result<Box<dyn NarrativeService>> {
    let mut narrator = GeminiNarrator::new(settings.gemini_api_key.clone())?;
    if let Some(model) = &settings.gemini_model {
        narrator = narrator.model(model);
    }
    if !narrator.is_configured() {
        tracing::info!("no Gemini API key configured, AI features are offline");
    }
    Ok(Box::new(narrator))
}
