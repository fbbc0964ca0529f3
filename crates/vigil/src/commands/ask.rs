//! Ask command - answers one question in-process.

use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use vigil_domain::{Answer, AnswerOutcome, RequestHandler, Services};

use super::Context;

/// Arguments for the ask command.
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    pub query: String,

    /// User the question is asked on behalf of (keys conversation memory)
    #[arg(short, long, default_value = "cli")]
    pub user: String,
}

/// Run the ask command.
pub async fn run(args: AskArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config_reporting()?;
    let services =
        Services::from_config(&loaded.config).context("Failed to initialize services")?;
    let handler = RequestHandler::new(services);

    let spinner = (!ctx.json_output).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Thinking...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let answer = handler.handle_detailed(&args.user, &args.query).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    tracing::info!(
        user_id = %args.user,
        outcome = %answer.outcome,
        cached = answer.cached,
        "Answered query"
    );

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer, ctx.verbose);
    }

    Ok(())
}

fn print_answer(answer: &Answer, verbose: bool) {
    let dim = Style::new().dim();
    let outcome_style = match answer.outcome {
        AnswerOutcome::Pass | AnswerOutcome::Cached => Style::new().green(),
        AnswerOutcome::MaxIterationsReached => Style::new().yellow(),
        _ => Style::new().red(),
    };

    println!();
    println!("{}", answer.response);
    println!();
    println!(
        "{} {}",
        dim.apply_to("outcome:"),
        outcome_style.apply_to(answer.outcome)
    );

    if verbose && let Some(scores) = &answer.scores {
        println!("{}", dim.apply_to("─".repeat(40)));
        println!(
            "  {} {:.2} ({} loops)",
            dim.apply_to("Groundedness:"),
            scores.groundedness,
            scores.groundedness_loops
        );
        println!(
            "  {} {:.2} ({} loops)",
            dim.apply_to("Precision:"),
            scores.precision,
            scores.precision_loops
        );
        println!("  {} {}", dim.apply_to("Tokens:"), scores.tokens_used);
    }
}
