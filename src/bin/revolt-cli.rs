//! Interactive terminal client for Revolt.
//!
//! # Usage
//!
//! ```bash
//! # Log in (first run) or reuse the saved token
//! revolt-cli
//!
//! # Talk to a self-hosted instance
//! revolt-cli --api-url https://chat.example.org/api --ws-url wss://chat.example.org/ws
//!
//! # Plain output, diagnostics in a file
//! REVOLT_LOG=debug revolt-cli --no-color --log-file revolt.log
//! ```
//!
//! Once in a channel, type to send and `/help` for commands.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use arrrg::CommandLine;
use tokio::sync::mpsc;

use revolt_cli::chat::{
    CliArgs, CliOptions, ConfigStore, ConsoleInput, Renderer, Session, Shutdown,
    TerminalRenderer, authenticate,
};
use revolt_cli::client::ChatApi;
use revolt_cli::gateway::Gateway;
use revolt_cli::{RevoltClient, crash, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let (args, _) = CliArgs::from_command_line_relaxed("revolt-cli [OPTIONS]");
    let options = CliOptions::from(args);
    if let Err(err) = logging::init(options.log_file.as_deref()) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }
    crash::install_panic_hook();

    match run(options).await {
        Ok(Shutdown::Failed(err)) => {
            report_crash("session", &err.to_string());
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Logs in, connects and runs the session.  Errors returned here are startup
/// failures; runtime failures come back as [`Shutdown::Failed`].
async fn run(options: CliOptions) -> revolt_cli::Result<Shutdown> {
    let store = ConfigStore::new(&options.config_path);
    let mut config = store.load();
    let mut renderer = TerminalRenderer::with_color(config.color && options.use_color);

    let api: Arc<dyn ChatApi> = Arc::new(RevoltClient::with_options(
        Some(options.api_url.clone()),
        Some(options.autumn_url.clone()),
        options.timeout,
    )?);
    let mut input = ConsoleInput::spawn()?;

    let token = authenticate(api.as_ref(), &store, &mut config, &mut input, &mut renderer).await?;

    renderer.print_info("Connecting to Revolt...");
    let (gateway, events) = Gateway::connect(&options.ws_url, &token).await?;

    let (signal_tx, signals) = mpsc::unbounded_channel();
    if let Err(err) = ctrlc::set_handler(move || {
        let _ = signal_tx.send(());
    }) {
        tracing::warn!("failed to install signal handler: {err}");
    }

    let session = Session::new(
        api,
        gateway,
        events,
        token,
        Box::new(input),
        Box::new(renderer),
    )
    .with_config(store, config)
    .with_signals(signals);
    Ok(session.run().await)
}

fn report_crash(origin: &str, detail: &str) {
    eprintln!("Fatal error: {detail}");
    match crash::write_crash_report(Path::new("."), origin, detail) {
        Ok(path) => eprintln!("Crash details written to {}", path.display()),
        Err(err) => eprintln!("Could not write crash details: {err}"),
    }
}
