use std::sync::Arc;

use clap::Parser;
use auxilium_core::AuxiliumConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use auxilium_server::http;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "auxilium.toml")]
    config: String,

    /// Probe database connectivity and exit.
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match AuxiliumConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Connect to DB
    let pool = match auxilium_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match auxilium_core::db::health_check(&pool).await {
            Ok(v) => println!("PostgreSQL connected: {}", v),
            Err(e) => {
                println!("PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }
        println!("Auxilium DB health check passed");
        return Ok(());
    }

    auxilium_core::db::init_schema(&pool).await?;

    let state = Arc::new(http::HttpState::from_config(pool, config)?);

    // Startup probe of the classifier, informational only: analyses degrade
    // to a recorded reason when the service is down.
    use auxilium_core::classifier::EmergencyClassifier;
    if state.classifier.ping().await {
        tracing::info!("Classifier reachable");
    } else {
        tracing::warn!("Classifier unreachable — AI analyses will record an error reason");
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
