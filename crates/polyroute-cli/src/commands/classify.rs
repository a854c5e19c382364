//! `polyroute classify` -- show which tier a query lands in.
//!
//! Runs the classifier only; no backend is contacted.

use clap::Args;
use polyroute_core::classifier;

/// Arguments for the `polyroute classify` subcommand.
#[derive(Args)]
pub struct ClassifyArgs {
    /// The query. Multiple words are joined with spaces.
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Also print the word count and the keyword that decided the tier.
    #[arg(long)]
    pub explain: bool,
}

/// Run the classify command.
pub fn run(args: ClassifyArgs) {
    let query = args.query.join(" ");
    let result = classifier::analyze(&query);

    println!("{}", result.tier);
    if args.explain {
        println!("words:   {}", result.word_count);
        println!("keyword: {}", result.matched.unwrap_or("(none)"));
    }
}
