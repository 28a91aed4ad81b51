//! Handler for the `run` command.

use tracing::info;

use crate::adapter::inbound::cli::command::RunArgs;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::lifecycle::{self, ConfigSource};

/// Execute the run command.
///
/// Returns once a shutdown signal has been handled, or with the startup
/// error when the runtime could not start.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    if args.json_logs {
        config.logging.format = "json".to_string();
    }
    config.init_logging();
    info!(
        config = %args.config.display(),
        version = env!("CARGO_PKG_VERSION"),
        "eolica-runtime starting"
    );

    let mut handle = lifecycle::start(ConfigSource::Loaded(config)).await?;

    tokio::select! {
        () = shutdown_signal() => {
            info!("Shutdown signal received");
        }
        () = handle.stopped() => {
            info!("Scheduler exited on its own");
        }
    }

    handle.stop().await;
    Ok(())
}

/// Resolve on Ctrl-C, or on SIGTERM where available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
