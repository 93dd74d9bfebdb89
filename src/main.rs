use clap::{Parser, Subcommand};
use estatex_api::RestApi;
use estatex_storage::{train_price_model, DataSource, EngineManager, ModelStore, TrainingConfig, DEFAULT_MODEL_PATH};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Property recommendations and price estimates
#[derive(Parser, Debug)]
#[command(name = "estatex")]
#[command(about = "Property recommendation and price estimation service", long_about = None)]
struct Args {
    /// Listing source: an http(s) URL or a path to a JSON export
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Path of the persisted price model
    #[arg(long, env = "ESTATEX_MODEL_PATH", default_value = DEFAULT_MODEL_PATH, global = true)]
    model_path: PathBuf,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load listings and serve the HTTP API
    Serve {
        /// HTTP API port
        #[arg(long, default_value_t = 5000)]
        http_port: u16,

        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },
    /// Train the price model and save it to the model path
    Train {
        /// Number of trees in the forest
        #[arg(long, default_value_t = 100)]
        trees: usize,

        /// Fraction of listings held out for evaluation
        #[arg(long, default_value_t = 0.1)]
        test_size: f64,

        /// Seed for the split and bootstrap sampling
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Maximum depth of each tree
        #[arg(long)]
        max_depth: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let source = match args.database_url.as_deref() {
        Some(url) => Some(DataSource::from_url(url)?),
        None => None,
    };
    let models = ModelStore::new(&args.model_path);

    match args.command {
        Command::Serve { http_port, host } => serve(source, models, host, http_port).await,
        Command::Train {
            trees,
            test_size,
            seed,
            max_depth,
        } => {
            let Some(source) = source else {
                anyhow::bail!("DATABASE_URL not found in environment");
            };
            let config = TrainingConfig {
                n_estimators: trees,
                test_size,
                seed,
                max_depth,
            };
            let report = train_price_model(&source, &models, &config).await?;
            info!(
                "Trained on {} listings ({} dropped), {} held out",
                report.train_size, report.dropped, report.test_size
            );
            Ok(())
        }
    }
}

async fn serve(source: Option<DataSource>, models: ModelStore, host: String, http_port: u16) -> anyhow::Result<()> {
    info!("Starting EstateX v{}", env!("CARGO_PKG_VERSION"));
    if let Some(source) = &source {
        info!("Listing source: {}", source.describe());
    }
    info!("Model path: {:?}", models.path());
    if !models.exists() {
        info!("No trained price model yet, /predict will answer 503 until one is saved");
    }

    // the engine is fully built before the server accepts requests
    let manager = Arc::new(EngineManager::init(source.as_ref(), models).await);
    info!("Recommendation engine ready with {} properties", manager.engine().len());

    let http_handle = std::thread::spawn(move || {
        info!("Starting HTTP server on {}:{}", host, http_port);
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(manager, &host, http_port).await {
                error!("HTTP server error: {}", e);
            }
        })
    });

    info!("HTTP API: http://localhost:{}/", http_port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    Ok(())
}
