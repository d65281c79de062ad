//! Leeches command implementation.

use super::{load_log, CliError};
use std::path::Path;
use weapon_deck::{CardSummary, Deck, KnowledgeCatalog, LeechPolicy};

/// Runs the leeches command.
pub fn run(path: &Path, threshold: u32, window: usize, format: &str) -> Result<(), CliError> {
    let log = load_log(path)?;
    let policy = LeechPolicy::new(threshold, window)?;
    let leeches = Deck::standard(policy, KnowledgeCatalog::default()).get_leeches(&log);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(leeches.as_slice())?),
        _ => print_text_output(&leeches),
    }
    Ok(())
}

fn print_text_output(leeches: &[CardSummary]) {
    if leeches.is_empty() {
        println!("No leeches.");
        return;
    }
    println!("{:<30} {:<11} {:>7} {:>6}", "CARD", "STATE", "REVIEWS", "LAPSES");
    for card in leeches {
        println!(
            "{:<30} {:<11} {:>7} {:>6}",
            card.key.to_string(),
            card.state.as_str(),
            card.review_count,
            card.lapse_count
        );
    }
}
