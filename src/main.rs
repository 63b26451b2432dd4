//! sqlform - a tiny web form for running SQL.

use std::sync::Arc;

use sqlform::cli::Cli;
use sqlform::config::{self, Config, ConnectionConfig};
use sqlform::db::{self, setup, Connector, DatabaseBackend, MockConnector};
use sqlform::error::{QueryFormError, Result};
use sqlform::logging;
use sqlform::query::QueryRunner;
use sqlform::web::{self, App, Server};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    // Load .env before anything reads the environment
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse_args();
    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring .env file: {e}"),
    }

    if let Err(e) = run(cli).await {
        error!("{}", e.summary());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    cli.validate()?;

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let connector: Arc<dyn Connector> = if cli.mock_db {
        warn!("Using mock database; results are canned");
        Arc::new(MockConnector::new())
    } else {
        let connection = resolve_connection(&cli, &config)?;
        info!("Connection: {}", connection.display_string());
        prepare_database(&cli, &connection).await?;
        db::connector_for(&connection)?
    };

    let runner = QueryRunner::from_settings(connector, cli.cache_enabled(&config));
    info!(
        "Result cache {}",
        if runner.caching_enabled() { "enabled" } else { "disabled" }
    );

    let server = Server::bind(cli.bind_addr(&config)).await?;
    println!("sqlform is running at http://{}", server.local_addr());

    let app = App::new(Arc::new(runner), config.server.title.clone());
    web::serve(server, app, shutdown_signal()).await
}

/// Resolves the connection with precedence: CLI argument, config file,
/// `DATABASE_URL`, then the bundled example database.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<ConnectionConfig> {
    let mut connection = match cli.to_connection_config()? {
        Some(conn) => conn,
        None => {
            let url = config
                .database
                .url
                .clone()
                .or_else(|| std::env::var(config::DATABASE_URL_ENV).ok())
                .unwrap_or_else(|| config::DEFAULT_DATABASE_URL.to_string());
            ConnectionConfig::from_connection_string(&url)?
        }
    };

    connection.apply_env_defaults();
    Ok(connection)
}

/// Runs `--init-db` and `--seed` against the SQLite file.
async fn prepare_database(cli: &Cli, connection: &ConnectionConfig) -> Result<()> {
    if !cli.init_db && cli.seed.is_none() {
        return Ok(());
    }

    let path = match (connection.backend, &connection.path) {
        (DatabaseBackend::Sqlite, Some(path)) => path,
        _ => {
            return Err(QueryFormError::config(
                "--init-db and --seed are only supported for SQLite databases",
            ))
        }
    };

    if cli.init_db {
        setup::create_example_database(path).await?;
    }
    if let Some(seed) = &cli.seed {
        setup::run_seed_file(path, seed).await?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
