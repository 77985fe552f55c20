use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use vigil::{
    cmd::{ReplayArgs, replay},
    config::AppConfig,
    persistence::{SqliteJournal, UpdateJournal},
    providers::SpoolSource,
    supervisor::Supervisor,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the detection supervisor and the command server.
    Run {
        /// Directory containing `app.yaml`.
        #[arg(long)]
        config_dir: Option<String>,
    },
    /// Counts the detections in a JSON-lines file and prints the counters.
    Replay(ReplayArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config_dir } => run_supervisor(config_dir.as_deref()).await?,
        Commands::Replay(args) => replay::execute(args).await?,
    }

    Ok(())
}

async fn run_supervisor(config_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!("Loading application configuration...");
    let config = AppConfig::new(config_dir)?;
    tracing::debug!(
        database_url = %config.database_url,
        spool_path = %config.source.spool_path.display(),
        "Configuration loaded."
    );

    let journal = Arc::new(SqliteJournal::new(&config.database_url).await?);
    journal.run_migrations().await?;
    tracing::info!("Database migrations completed.");

    let source = SpoolSource::new(config.source.spool_path.clone());

    let supervisor = Supervisor::builder()
        .config(config)
        .journal(Arc::clone(&journal) as Arc<dyn UpdateJournal>)
        .source(Box::new(source))
        .build()
        .await?;

    tracing::info!("Supervisor initialized, starting detection...");
    let result = supervisor.run().await;

    journal.close().await;
    result?;
    Ok(())
}
