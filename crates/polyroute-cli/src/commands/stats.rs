//! `polyroute stats` -- per-backend usage aggregates.
//!
//! Reads the usage database named in the config (`api_stats.db` by
//! default). A database that does not exist yet is reported, not created,
//! and an existing one is opened read-only so its schema is never migrated.

use std::path::Path;

use clap::Args;
use comfy_table::{Table, presets::UTF8_FULL};
use polyroute_core::usage::SqliteUsageRecorder;

use super::load_config;

/// Arguments for the `polyroute stats` subcommand.
#[derive(Args)]
pub struct StatsArgs {
    /// Also show the stored routing summary for this session.
    #[arg(short, long)]
    pub session: Option<String>,

    /// Print the aggregates as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Run the stats command.
pub async fn run(args: StatsArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let path = &config.usage.database_path;
    if !path.exists() {
        println!("No usage recorded yet ({} not found).", path.display());
        return Ok(());
    }

    let db = SqliteUsageRecorder::open_read_only(path).await?;
    let stats = db.stats().await?;
    let session = match &args.session {
        Some(id) => db.session_summary(id).await?,
        None => None,
    };

    if args.json {
        let out = serde_json::json!({ "backends": stats, "session": session });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if stats.is_empty() {
        println!("No usage recorded yet.");
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(["BACKEND", "CALLS", "AVG TIME", "SUCCESS RATE"]);
        for s in &stats {
            table.add_row([
                s.backend.clone(),
                s.calls.to_string(),
                format!("{:.2}s", s.avg_latency_secs),
                format!("{:.1}%", s.success_rate()),
            ]);
        }
        println!("API usage stats:");
        println!("{table}");
    }

    if let Some(id) = &args.session {
        match session {
            Some(s) => {
                println!();
                println!("Session {id}:");
                println!(
                    "  Last backend:  {}",
                    s.last_backend.as_ref().map_or("-", |b| b.as_str())
                );
                println!("  Last tier:     {}", s.last_tier.as_deref().unwrap_or("-"));
                println!("  Switches:      {}", s.switch_count);
                println!("  Status:        {}", s.status);
                println!("  Last used:     {}", s.last_used.to_rfc3339());
            }
            None => println!("\nSession {id}: not found"),
        }
    }
    Ok(())
}
