// ABOUTME: Main entry point for the portal-chat service and client
// ABOUTME: Initializes logging and config, then runs the server or a client command

use anyhow::Result;
use clap::Parser;
use portal_chat::{
    cli::{Cli, Command},
    commands::{self, ClientContext},
    config::Config,
    logging, server,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Set up panic hook to log panics before they crash the process
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\n╔══════════════════════════════════════════════════════════╗");
        eprintln!("║ PANIC! portal-chat crashed with the following error:     ║");
        eprintln!("╚══════════════════════════════════════════════════════════╝\n");
        eprintln!("{}", panic_info);
        eprintln!("\nBacktrace:");
        eprintln!("{:?}", std::backtrace::Backtrace::force_capture());
    }));

    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let mut config = Config::load()?;
    if let Some(url) = cli.url {
        config.client.base_url = url;
    }

    let _log_guard = logging::init_logging(&config.logging)?;

    match cli.command {
        Command::Serve => {
            tracing::info!(
                host = %config.server.host,
                port = config.server.port,
                storage = %config.storage.path,
                participants = config.participants.len(),
                "Configuration loaded"
            );
            server::start_server(&config).await?;
        }
        Command::Capability => commands::capability(&config.client),
        command => {
            let ctx = ClientContext::connect(&config.client).await?;
            match command {
                Command::Whoami => commands::whoami(&ctx),
                Command::Conversations => commands::conversations(&ctx).await?,
                Command::Open {
                    counterpart,
                    mark_read,
                } => commands::open(&ctx, &counterpart, mark_read).await?,
                Command::Send { counterpart, text } => {
                    commands::send(&ctx, &counterpart, &text).await?
                }
                Command::Signal {
                    counterpart,
                    message,
                } => commands::signal(&ctx, &counterpart, &message).await?,
                Command::Serve | Command::Capability => unreachable!("handled above"),
            }
        }
    }

    Ok(())
}
