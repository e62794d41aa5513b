use std::{path::PathBuf, process::ExitCode, sync::Arc};

use tokio_util::sync::CancellationToken;

use acb_core::{
    config::Config,
    logging::{ActivityLog, DailyFileLog},
    orchestrator::{Orchestrator, RunOutcome},
};
use acb_telegram::TelegramService;

mod prompt;

use prompt::TerminalPrompt;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = acb_core::logging::init("acb") {
        eprintln!("cannot initialize diagnostics: {e}");
    }

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let cfg = match Config::load(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            // Log dir is unknown until config loads; use the working directory.
            DailyFileLog::new(".").error(&format!("Fatal error: {e}"));
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        path = %cfg.config_path.display(),
        accounts = cfg.accounts.len(),
        "configuration loaded"
    );

    let log: Arc<dyn ActivityLog> = Arc::new(DailyFileLog::new(&cfg.log_dir));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => shutdown.cancel(),
                Err(e) => tracing::error!(error = %e, "cannot listen for Ctrl+C"),
            }
        });
    }

    let orchestrator = Orchestrator::from_config(
        &cfg,
        Arc::new(TelegramService::new(
            cfg.connect_retries,
            cfg.connect_retry_delay,
        )),
        Arc::new(TerminalPrompt::new()),
        log,
    );

    match orchestrator.run(&cfg.accounts, shutdown).await {
        RunOutcome::NoClients => tracing::info!("nothing to run"),
        RunOutcome::Interrupted => tracing::info!("interrupted during startup"),
        RunOutcome::Stopped { clients } => tracing::info!(clients, "stopped"),
    }

    ExitCode::SUCCESS
}
