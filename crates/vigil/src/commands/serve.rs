//! Serve command - runs the HTTP API in the foreground.

use std::net::SocketAddr;

use anyhow::{Context as _, Result};
use clap::Args;
use console::{Style, style};

use vigil_domain::{RequestHandler, Services};
use vigil_server::{Server, ServerConfig};

use super::Context;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides `[server] bind`)
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to listen on (overrides `[server] port`)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Allow cross-origin requests
    #[arg(long)]
    pub cors: bool,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config_reporting()?;
    let source_count = loaded.loaded_from().len();
    let mut config = loaded.config;

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let addr: SocketAddr = config
        .server
        .address()
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.server.address()))?;

    tracing::info!(
        addr = %addr,
        config_files = source_count,
        "Starting vigil server"
    );
    let services = Services::from_config(&config).context("Failed to initialize services")?;
    let handler = RequestHandler::new(services);

    let server_config = ServerConfig::new()
        .with_bind_address(addr)
        .with_request_logging(config.server.request_logging)
        .with_cors(args.cors);
    let server = Server::new(handler, server_config);

    if !ctx.json_output {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Vigil Server").bold());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("  {} http://{}", dim.apply_to("Listening:"), addr);
        println!("  {} {}", dim.apply_to("Model:"), config.llm.model);
        println!(
            "  {} {}",
            dim.apply_to("Retriever:"),
            config.retriever.url.as_deref().unwrap_or("(none)")
        );
        println!();
        println!("{}", dim.apply_to("Press Ctrl-C to stop."));
    }

    server.run().await.context("Server failed")?;
    Ok(())
}
