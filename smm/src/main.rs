use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use smm::cli::{Cli, Command};
use smm::engine::Engine;
use smm::stream;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let cli = Cli::parse();

    let filter = cli
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cancel = setup_signal_handlers();

    match cli.command {
        Command::Run(args) => {
            let _ = dotenvy::dotenv(); // load .env if present

            let credentials = match gateio::Credentials::from_env() {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, "credentials required");
                    std::process::exit(1);
                }
            };

            let config = match args.engine_config() {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, "invalid configuration");
                    std::process::exit(1);
                }
            };

            let gate = gateio::GateConfig::usdt_futures(Some(credentials));
            let engine = Engine::new(config, gate);
            if let Err(e) = engine.run(cancel).await {
                tracing::error!(error = %e, "market maker fatal error");
                std::process::exit(1);
            }
        }

        Command::Book(args) => {
            info!(contract = %args.contract, depth = args.depth, "book stream starting");
            if let Err(e) = stream::run_book(&args.contract, args.depth, &args.cadence, cancel).await
            {
                tracing::error!(error = %e, "book stream error");
                std::process::exit(1);
            }
        }
    }
}

/// Register SIGINT and SIGTERM handlers that trigger the returned token.
fn setup_signal_handlers() -> CancellationToken {
    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received SIGINT, shutting down");
        cancel_clone.cancel();
    });

    #[cfg(unix)]
    {
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");
            sig.recv().await;
            info!("received SIGTERM, shutting down");
            cancel_clone.cancel();
        });
    }

    cancel
}
