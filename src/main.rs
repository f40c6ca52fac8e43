/// Chat Client - Main entry point
///
/// A command-line client for the chat service
use anyhow::Context;
use chat_client::{client::ChatClient, config::Config};
use log::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    // Initialize logger with appropriate level based on verbose flag
    let log_level = if config.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_default_env()
        .format_timestamp_millis()
        .init();

    info!("Starting chat client");
    info!("Server: {}", config.server);

    let mut client = ChatClient::new(&config).context("Failed to initialize client")?;

    client.run().await.context("Client loop failed")?;

    Ok(())
}
