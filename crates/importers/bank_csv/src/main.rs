use anyhow::{Context, Result};
use bank_csv::BankCsvImporter;
use ledger_core::StatementImporter;
use std::env;
use std::path::Path;

fn main() -> Result<()> {
    // Usage:
    //   bank_csv <sbi|iob|kvb> <account_number> [file1.csv ...] [output_path]
    //
    // The account number (or its tail) ties statements to one account; for
    // iob it is the digits embedded in the downloaded filename.
    //
    // Defaults:
    //   output_path: <bank>_transactions.json
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut csv_files: Vec<String> = Vec::new();
    let mut other_args: Vec<String> = Vec::new();
    for arg in args.iter().skip(1) {
        if arg.to_lowercase().ends_with(".csv") {
            csv_files.push(arg.clone());
        } else {
            other_args.push(arg.clone());
        }
    }

    let (Some(bank), Some(account_number)) = (other_args.first(), other_args.get(1)) else {
        println!("❌ Missing bank name or account number.");
        println!("   Expected: bank_csv <sbi|iob|kvb> <account_number> statement.csv [output.json]");
        return Ok(());
    };

    let importer: BankCsvImporter = match bank.as_str() {
        "sbi" => bank_csv::sbi(account_number),
        "iob" => bank_csv::iob(account_number),
        "kvb" => bank_csv::kvb(account_number),
        other => {
            println!("❌ Unknown bank '{}'. Supported: sbi, iob, kvb", other);
            return Ok(());
        }
    };

    if csv_files.is_empty() {
        println!("❌ No CSV input files given.");
        println!("   Expected: bank_csv <sbi|iob|kvb> <account_number> statement.csv [output.json]");
        return Ok(());
    }

    let default_output = format!("{}_transactions.json", bank);
    let output_path = other_args
        .get(2)
        .map(|s| s.as_str())
        .unwrap_or(default_output.as_str());

    let mut merged = ledger_core::ImportResult::default();

    println!("📖 Parsing {} {} file(s)", csv_files.len(), bank.to_uppercase());
    for file in &csv_files {
        let path = Path::new(file);
        if !importer.identify(path) {
            println!(
                "  ⚠ {} does not match account ...{}, skipping",
                file, account_number
            );
            continue;
        }
        let result = importer
            .extract(path)
            .with_context(|| format!("Cannot parse {}", file))?;
        println!(
            "  ✓ {}: {} transaction(s), {} row(s) skipped",
            file,
            result.transactions.len(),
            result.diagnostics.rows_skipped
        );
        merged.merge(result);
    }

    merged.transactions.sort_by_key(|t| t.date);

    if merged.diagnostics.has_anomalies() {
        println!("⚠ Diagnostics: {:?}", merged.diagnostics);
    }

    let out = serde_json::json!({ "transactions": merged.transactions });
    std::fs::write(output_path, serde_json::to_string_pretty(&out)?)
        .with_context(|| format!("Cannot write {}", output_path))?;
    println!(
        "💾 Wrote {} transaction(s) to {}",
        merged.transactions.len(),
        output_path
    );

    Ok(())
}
