//! `polyroute ask` -- route one query and print the answer.
//!
//! # Example
//!
//! ```text
//! polyroute ask "What is the capital of France?"
//! polyroute ask --session chat-42 explain how DNS caching works
//! ```

use std::path::Path;

use clap::Args;
use polyroute_core::bootstrap;
use polyroute_core::classifier;

use super::load_config;

/// Arguments for the `polyroute ask` subcommand.
#[derive(Args)]
pub struct AskArgs {
    /// The query. Multiple words are joined with spaces.
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Session id used for routing context and the usage log.
    #[arg(short, long, default_value = "cli")]
    pub session: String,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Run the ask command.
pub async fn run(args: AskArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let query = args.query.join(" ");
    let tier = classifier::classify(&query);

    let ctx = bootstrap::bootstrap(&config).await?;
    let generation = ctx.router.generate_response(&args.session, &query).await;

    if args.json {
        let out = serde_json::json!({
            "session": args.session,
            "tier": tier,
            "backend": generation.backend,
            "text": generation.text,
            "exhausted": generation.is_exhausted(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", generation.text);
    match &generation.backend {
        Some(backend) => eprintln!("\n[{tier} -> {backend}]"),
        None => eprintln!("\n[{tier} -> no backend available]"),
    }
    Ok(())
}
