mod api;
mod cloudflare;
mod config;
mod error;
mod updater;


use anyhow::Result;
use clap::Parser;
use log::info;

#[derive(Parser, Debug)]
#[command(name = "dnslink-rust")]
#[command(about = "A small service that points Cloudflare zones at new IPFS/IPNS content")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration first (before logger init)
    let config = config::Config::load(&args.config)?;

    // Initialize logger with config log level (env var takes precedence)
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.server.log_level)
    ).init();

    info!("Loading configuration from: {}", args.config);
    info!(
        "Loaded {} target(s): {:?}",
        config.targets.len(),
        config.targets.iter().map(|t| &t.name).collect::<Vec<_>>()
    );

    // Create router
    let app = api::create_router(config.clone());

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server listening on http://{}", addr);
    info!("DNSLink endpoint: GET /dnslink/{{target}}/{{link}}");

    axum::serve(listener, app).await?;

    Ok(())
}
