use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use sitepulse::analytics::{build_delay_forecast, build_risk_insights};
use sitepulse::config::{Config, ConfigOverrides};
use sitepulse::output::json::render_json;
use sitepulse::output::table::{render_forecast_table, render_risk_table};
use sitepulse::seed::{seed_demo, DEMO_EMAIL, DEMO_PASSWORD};
use sitepulse::server::run_server;
use sitepulse::store::ProjectStore;

const RISK_LOG_WINDOW: usize = 10;
const DELAY_LOG_WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "sitepulse",
    about = "Construction project tracking with risk and delay analytics"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    db: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the REST API server.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Score a project's current execution risk.
    Risk { project_id: String },
    /// Forecast a project's delay.
    Predict { project_id: String },
    /// Load the demo account, project, tasks and logs.
    Seed,
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    let (host, port) = match &cli.command {
        Commands::Serve { host, port } => (host.clone(), *port),
        _ => (None, None),
    };
    config.apply_overrides(ConfigOverrides {
        db_path: cli.db.clone(),
        host,
        port,
    });

    match &cli.command {
        Commands::Serve { .. } => run_server(config).await,
        Commands::Risk { project_id } => {
            let store = ProjectStore::open(&config.resolved_db_path())?;
            let (project, tasks, logs) = load_snapshot(&store, project_id, RISK_LOG_WINDOW)?;
            let insights = build_risk_insights(&project, &tasks, &logs, Utc::now());
            match cli.output {
                OutputFormat::Table => println!("{}", render_risk_table(&insights)),
                OutputFormat::Json => println!("{}", render_json(&insights)?),
            }
            Ok(())
        }
        Commands::Predict { project_id } => {
            let store = ProjectStore::open(&config.resolved_db_path())?;
            let (project, tasks, logs) = load_snapshot(&store, project_id, DELAY_LOG_WINDOW)?;
            let forecast = build_delay_forecast(&project, &tasks, &logs, Utc::now());
            match cli.output {
                OutputFormat::Table => println!("{}", render_forecast_table(&forecast)),
                OutputFormat::Json => println!("{}", render_json(&forecast)?),
            }
            Ok(())
        }
        Commands::Seed => {
            let store = ProjectStore::open(&config.resolved_db_path())?;
            let project_id = seed_demo(&store)?;
            println!("Demo seed completed.");
            println!("Login email: {DEMO_EMAIL}");
            println!("Login password: {DEMO_PASSWORD}");
            println!("Project id: {project_id}");
            Ok(())
        }
        Commands::Config { init, show } => {
            if *init {
                Config::write_template(&config_path)?;
                println!("Wrote config template to {}", config_path.display());
            }
            if *show || !*init {
                println!("{}", render_json(&config)?);
            }
            Ok(())
        }
    }
}

fn load_snapshot(
    store: &ProjectStore,
    project_id: &str,
    log_window: usize,
) -> Result<(
    sitepulse::domain::Project,
    Vec<sitepulse::domain::Task>,
    Vec<sitepulse::domain::DailyLog>,
)> {
    let project = store
        .get_project(project_id)?
        .ok_or_else(|| anyhow!("project not found: {project_id}"))?;
    let tasks = store.list_tasks(project_id)?;
    let logs = store.list_daily_logs(project_id, Some(log_window))?;
    Ok((project, tasks, logs))
}
