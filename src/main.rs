//! Mindpop server entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Open the store
//!   6. Build LLM, image and speech providers
//!   7. Spawn Ctrl-C → shutdown signal watcher
//!   8. Serve the HTTP API until shutdown

use mindpop::api::{self, ApiState};
use mindpop::error::AppError;
use mindpop::llm::providers::{build_images, build_llm};
use mindpop::speech::Transcriber;
use mindpop::store::Store;
use mindpop::{config, logger};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Optional file.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some())?;

    info!(
        server_name = %config.server_name,
        bind = %config.bind,
        work_dir = %config.work_dir.display(),
        uploads_dir = %config.uploads_dir.display(),
        llm_provider = %config.llm.provider,
        image_provider = %config.images.provider,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    let store = Store::open(&config.db_path())?;
    info!(db = %store.db_path().display(), "store ready");

    let llm = build_llm(&config.llm, config.llm_api_key.clone())
        .map_err(|e| AppError::Config(format!("llm provider: {e}")))?;
    let images = build_images(&config.images, config.image_api_key.clone())
        .map_err(|e| AppError::Config(format!("image provider: {e}")))?;
    let transcriber = Transcriber::new(&config.dyslexia);
    if !transcriber.is_configured() {
        warn!("no transcriber configured; /api/dyslexia/run will fail");
    }

    let shutdown = CancellationToken::new();

    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            ctrlc_token.cancel();
        }
    });

    let state = ApiState::new(config, store, llm, images, transcriber);
    api::run(state, shutdown).await
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: mindpop [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    //   -v → warn, -vv → info, -vvv → debug, -vvvv+ → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, config_path }
}
