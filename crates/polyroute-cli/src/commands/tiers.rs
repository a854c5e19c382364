//! `polyroute tiers` -- show configured backends and tier priorities.
//!
//! Reads credentials from the environment exactly as `ask` does, so the
//! output is the table the router would actually use.

use std::path::Path;

use comfy_table::{Table, presets::UTF8_FULL};
use polyroute_core::tier_table::TierTable;
use polyroute_llm::registry;
use polyroute_types::BackendId;

use super::load_config;

/// Run the tiers command.
pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let specs = registry::discover_from_env(&config);
    if specs.is_empty() {
        anyhow::bail!(
            "no backends configured: set at least one of GROQ_API_KEY, \
             OPENROUTER_API_KEY, GOOGLE_API_KEY, DEEPSEEK_API_KEY"
        );
    }

    let mut backends = Table::new();
    backends.load_preset(UTF8_FULL);
    backends.set_header(["BACKEND", "VENDOR", "MODEL", "RPM", "TIMEOUT"]);
    for spec in &specs {
        backends.add_row([
            spec.id.to_string(),
            spec.vendor.to_string(),
            spec.model.clone(),
            spec.rpm.to_string(),
            format!("{}s", spec.timeout.as_secs()),
        ]);
    }
    println!("{backends}");

    let ids: Vec<BackendId> = specs.iter().map(|s| s.id.clone()).collect();
    let table = TierTable::build(&ids);

    let mut tiers = Table::new();
    tiers.load_preset(UTF8_FULL);
    tiers.set_header(["TIER", "PRIORITY"]);
    for (tier, list) in table.iter() {
        let order: Vec<&str> = list.iter().map(BackendId::as_str).collect();
        tiers.add_row([tier.to_string(), order.join(" > ")]);
    }
    println!("{tiers}");
    Ok(())
}
