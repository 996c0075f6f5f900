//! cinedex - terminal client for the movie and TV database.
//!
//! Restores the stored session at startup, then runs one command against
//! the backend. Expired access tokens are renewed transparently.

mod commands;
mod format;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cinedex_core::{ApiClient, Config, SessionStatus};

use commands::{Command, CommandContext};

/// Log file name prefix inside the log directory
const LOG_FILE_PREFIX: &str = "cinedex.log";

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). Events go to stderr and,
/// when `log_dir` is available, to a daily rolling file. The returned guard
/// flushes the file writer and must outlive the program's work.
fn init_tracing(log_dir: Option<std::path::PathBuf>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load()?;
    config.apply_env()?;

    let _log_guard = init_tracing(config.log_dir().ok());
    info!(api = %config.api_base_url(), backend = %config.token_backend(), "cinedex starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    if command == Command::Help {
        print!("{}", commands::USAGE);
        return Ok(());
    }

    let session = config.build_session()?;
    let status = session.initialize().await;
    if let Some(reason) = session.snapshot().signed_out.filter(|r| r.is_forced()) {
        info!(?reason, "Stored session ended at startup");
        eprintln!("Your session has expired. Run `cinedex login` to sign in again.");
    }

    if command.requires_login() && status == SessionStatus::Anonymous {
        anyhow::bail!("Not logged in. Run `cinedex login` first.");
    }

    let api = ApiClient::new(&session);
    let was_authenticated = session.is_authenticated();
    let result = commands::run(
        command,
        CommandContext {
            config: &mut config,
            session: &session,
            api: &api,
        },
    )
    .await;

    // a failed token renewal mid-command signs the user out
    let forced = session.snapshot().signed_out.is_some_and(|r| r.is_forced());
    if was_authenticated && !session.is_authenticated() && forced {
        eprintln!("Your session has expired. Run `cinedex login` to sign in again.");
    }

    info!("cinedex finished");
    result
}
