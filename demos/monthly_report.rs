use cashbook_analyzer::{analyze, ExtractedLedger};
use std::error::Error;

// Extractor output for a month of a small coffee shop plus the owner's household.
const LEDGER_JSON: &str = include_str!("../tests/fixtures/coffee_shop.json");

fn main() -> Result<(), Box<dyn Error>> {
    // Pass a path to analyze a saved extraction instead of the bundled sample.
    let ledger = match std::env::args().nth(1) {
        Some(path) => ExtractedLedger::from_file(path)?,
        None => ExtractedLedger::from_json(LEDGER_JSON)?,
    };
    let analysis = analyze(&ledger);

    let accounts = &analysis.accounts;
    println!(
        "Business: {} ({})",
        accounts.business_balance,
        accounts.business_status.label()
    );
    println!(
        "Personal: {} ({})",
        accounts.personal_balance,
        accounts.personal_status.label()
    );
    println!(
        "Total:    {} ({})\n",
        accounts.total_balance,
        accounts.total_status.label()
    );

    println!("{}", analysis.analysis_text());
    println!("{}", analysis.report.to_text());
    println!("{}", analysis.report.to_markdown());
    println!("{}\n", ledger.incomes_tsv());
    println!("{}", ledger.expenses_tsv());

    Ok(())
}
