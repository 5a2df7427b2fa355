mod cli;
mod config;
mod llm;

use clap::Parser;
use cli::{Cli, Commands};
use digest_core::DigestError;
use std::process::ExitCode;
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // stdout is reserved for command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => cli::run::run(args, &cli.config).await,
        Commands::Chats(args) => cli::chats::run(args, &cli.config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_failure(&e);
            ExitCode::FAILURE
        }
    }
}

fn report_failure(err: &anyhow::Error) {
    match err.downcast_ref::<DigestError>() {
        Some(digest_err) => match digest_err.response_body() {
            Some(body) => error!(kind = digest_err.kind(), body = %body, "{}", digest_err),
            None => error!(kind = digest_err.kind(), "{}", digest_err),
        },
        None => error!("{:#}", err),
    }
}
