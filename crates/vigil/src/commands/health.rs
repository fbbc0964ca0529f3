//! Health command - queries a running server.

use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;
use console::{Style, style};
use serde::{Deserialize, Serialize};

use super::Context;

/// Arguments for the health command.
#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Server URL (default: derived from `[server]` config)
    #[arg(long, env = "VIGIL_SERVER_URL")]
    pub server: Option<String>,
}

/// Health body as returned by `GET /health`.
#[derive(Debug, Deserialize, Serialize)]
struct HealthBody {
    status: String,
    uptime_seconds: f64,
    error_rate: f64,
    total_requests: u64,
    avg_latency_ms: f64,
    version: String,
}

/// Run the health command.
pub async fn run(args: HealthArgs, ctx: &Context) -> Result<()> {
    let server_url = match args.server {
        Some(url) => url,
        None => format!("http://{}", ctx.load_config()?.config.server.address()),
    };
    let url = format!("{}/health", server_url.trim_end_matches('/'));

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("Could not reach server at {}", server_url))?;
    // 503 still carries a health body
    let body: HealthBody = response
        .json()
        .await
        .context("Unexpected response from /health")?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let status_style = match body.status.as_str() {
        "healthy" => Style::new().green(),
        "degraded" => Style::new().yellow(),
        _ => Style::new().red(),
    };

    println!();
    println!("{}", style("Vigil Server Health").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();
    println!(
        "  {} {}",
        dim.apply_to("Status:"),
        status_style.apply_to(format!("● {}", body.status))
    );
    println!("  {} {}", dim.apply_to("Version:"), body.version);
    println!("  {} {}", dim.apply_to("Server:"), server_url);
    println!("  {} {:.0}s", dim.apply_to("Uptime:"), body.uptime_seconds);
    println!("  {} {}", dim.apply_to("Requests:"), body.total_requests);
    println!(
        "  {} {:.1}%",
        dim.apply_to("Error rate:"),
        body.error_rate * 100.0
    );
    println!(
        "  {} {:.1}ms",
        dim.apply_to("Avg latency:"),
        body.avg_latency_ms
    );
    println!();

    Ok(())
}
