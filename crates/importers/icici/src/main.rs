use anyhow::{Context, Result};
use icici::IciciImporter;
use ledger_core::StatementImporter;
use std::env;
use std::path::Path;

fn main() -> Result<()> {
    // Usage:
    //   icici <account_suffix> [file1.csv file2.csv ...] [output_path]
    //
    // The account suffix is the tail of the 12-digit account number printed
    // in the statement preamble; files that do not carry it are skipped.
    //
    // Defaults:
    //   output_path: icici_transactions.json
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut account_number: Option<String> = None;
    let mut csv_files: Vec<String> = Vec::new();
    let mut other_args: Vec<String> = Vec::new();
    for arg in args.iter().skip(1) {
        if arg.to_lowercase().ends_with(".csv") {
            csv_files.push(arg.clone());
        } else if account_number.is_none() && arg.chars().all(|c| c.is_ascii_digit()) {
            account_number = Some(arg.clone());
        } else {
            other_args.push(arg.clone());
        }
    }

    let Some(account_number) = account_number else {
        println!("❌ No account number given.");
        println!("   Expected: icici <account_suffix> statement.csv [more files...] [output.json]");
        return Ok(());
    };
    if csv_files.is_empty() {
        println!("❌ No CSV input files given.");
        println!("   Expected: icici <account_suffix> statement.csv [more files...] [output.json]");
        return Ok(());
    }

    let output_path = other_args
        .first()
        .map(|s| s.as_str())
        .unwrap_or("icici_transactions.json");

    let importer = IciciImporter::new(&account_number);
    let mut merged = ledger_core::ImportResult::default();

    println!("📖 Parsing {} ICICI file(s)", csv_files.len());
    for file in &csv_files {
        let path = Path::new(file);
        if !importer.identify(path) {
            println!(
                "  ⚠ {} does not mention account ...{}, skipping",
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
