//! Tier -> backend priority lists.
//!
//! Each tier has a hand-tuned preference order. At startup the orders are
//! filtered down to the backends that are actually configured, and any
//! configured backend an order does not mention is appended in
//! configuration order, so every backend is reachable from every tier and
//! no list can name a backend that does not exist.

use std::collections::HashSet;

use polyroute_types::{BackendId, Tier};

/// One position in a preference order.
#[derive(Debug, Clone, Copy)]
enum Slot {
    /// A specific backend id.
    Id(&'static str),
    /// Every configured `openrouter_N` not named elsewhere in the order.
    OtherOpenRouters,
}

use Slot::{Id, OtherOpenRouters};

const SIMPLE_ORDER: &[Slot] = &[
    Id("openrouter_1"),
    Id("openrouter_2"),
    Id("openrouter_0"),
    OtherOpenRouters,
    Id("gemini"),
    Id("deepseek"),
    Id("groq"),
];

const MEDIUM_ORDER: &[Slot] = &[
    Id("openrouter_0"),
    Id("gemini"),
    Id("openrouter_1"),
    OtherOpenRouters,
    Id("groq"),
    Id("deepseek"),
];

const COMPLEX_ORDER: &[Slot] = &[
    Id("groq"),
    Id("gemini"),
    Id("deepseek"),
    Id("openrouter_0"),
    Id("openrouter_2"),
    Id("openrouter_1"),
    OtherOpenRouters,
];

fn order_for(tier: Tier) -> &'static [Slot] {
    match tier {
        Tier::Simple => SIMPLE_ORDER,
        Tier::Medium => MEDIUM_ORDER,
        Tier::Complex => COMPLEX_ORDER,
    }
}

/// Immutable tier -> ordered backend ids mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTable {
    simple: Vec<BackendId>,
    medium: Vec<BackendId>,
    complex: Vec<BackendId>,
}

impl TierTable {
    /// Build the table for `configured` backends, given in configuration
    /// order. Duplicate ids in `configured` are ignored after the first.
    pub fn build(configured: &[BackendId]) -> Self {
        Self {
            simple: resolve(order_for(Tier::Simple), configured),
            medium: resolve(order_for(Tier::Medium), configured),
            complex: resolve(order_for(Tier::Complex), configured),
        }
    }

    /// Ordered backend ids for `tier`.
    pub fn priorities(&self, tier: Tier) -> &[BackendId] {
        match tier {
            Tier::Simple => &self.simple,
            Tier::Medium => &self.medium,
            Tier::Complex => &self.complex,
        }
    }

    /// Iterate `(tier, priorities)` in tier order.
    pub fn iter(&self) -> impl Iterator<Item = (Tier, &[BackendId])> {
        Tier::ALL.into_iter().map(|t| (t, self.priorities(t)))
    }
}

fn resolve(order: &[Slot], configured: &[BackendId]) -> Vec<BackendId> {
    let named: HashSet<&str> = order
        .iter()
        .filter_map(|slot| match slot {
            Id(id) => Some(*id),
            OtherOpenRouters => None,
        })
        .collect();

    let mut seen: HashSet<&str> = HashSet::with_capacity(configured.len());
    let mut out = Vec::with_capacity(configured.len());

    for slot in order {
        match slot {
            Id(want) => {
                if let Some(id) = configured.iter().find(|c| c.as_str() == *want) {
                    push_unique(id, &mut seen, &mut out);
                }
            }
            OtherOpenRouters => {
                for id in configured
                    .iter()
                    .filter(|c| c.is_openrouter() && !named.contains(c.as_str()))
                {
                    push_unique(id, &mut seen, &mut out);
                }
            }
        }
    }

    for id in configured {
        push_unique(id, &mut seen, &mut out);
    }
    out
}

fn push_unique<'a>(id: &'a BackendId, seen: &mut HashSet<&'a str>, out: &mut Vec<BackendId>) {
    if seen.insert(id.as_str()) {
        out.push(id.clone());
    }
}
