use clap::Parser;
use grblsend::app::{self, EXIT_FAILURE, EXIT_SUCCESS};
use grblsend::cli::Cli;
use grblsend::{init_logging, AbortSignal, BUILD_DATE, VERSION};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_format) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    tracing::debug!("grblsend {} (built {})", VERSION, BUILD_DATE);

    // Ctrl-C raises the abort signal; the blocking session notices it at its
    // next poll, sends a feed hold and releases the port.
    let abort = AbortSignal::new();
    let watcher = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted by user");
            watcher.raise();
        }
    });

    let code = match tokio::task::spawn_blocking(move || app::run(&cli, abort)).await {
        Ok(Ok(())) => EXIT_SUCCESS,
        Ok(Err(e)) => {
            tracing::error!("{:#}", e);
            app::exit_code(&e)
        }
        Err(e) => {
            tracing::error!("Session task failed: {}", e);
            EXIT_FAILURE
        }
    };

    ExitCode::from(code)
}
