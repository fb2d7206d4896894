//! Layout-driven importer for plain bank account CSVs.
//!
//! The Indian banks all export the same statement shape: a few preamble
//! lines, then a header, then one row per cash movement with separate
//! debit and credit columns. Only the column names, date format, preamble
//! length, and identification rule differ, so each bank is a `BankLayout`
//! plus a `BrokerProfile` rather than its own parser.

use chrono::NaiveDate;
use csv::ReaderBuilder;
use ledger_core::{
    import_rows, AccountTemplates, BrokerProfile, ImportError, ImportResult, KindMap, Row,
    StatementImporter, TxnKind,
};
use regex::Regex;
use rust_decimal::Decimal;
use std::io::Read;
use std::path::Path;

/// How an adapter claims a file.
#[derive(Debug, Clone)]
pub enum IdentifyRule {
    /// Filename as downloaded: the prefix, then the configured account
    /// digits, then anything, then `.csv`.
    FilenamePrefix(&'static str),
    /// Scan the first `window` lines for `pattern`; its first capture must
    /// end with the configured account number.
    AccountScan { pattern: &'static str, window: usize },
}

/// Everything that varies between one bank's CSV export and another's.
#[derive(Debug, Clone)]
pub struct BankLayout {
    pub name: &'static str,
    pub preamble_lines: usize,
    pub date_column: &'static str,
    pub date_format: &'static str,
    pub narration_column: &'static str,
    pub debit_column: &'static str,
    pub credit_column: &'static str,
    pub identify: IdentifyRule,
}

pub struct BankCsvImporter {
    layout: BankLayout,
    profile: BrokerProfile,
    account_number: String,
}

impl BankCsvImporter {
    pub fn new(layout: BankLayout, profile: BrokerProfile, account_number: &str) -> Self {
        BankCsvImporter {
            layout,
            profile,
            account_number: account_number.to_string(),
        }
    }

    pub fn profile(&self) -> &BrokerProfile {
        &self.profile
    }

    pub fn layout(&self) -> &BankLayout {
        &self.layout
    }

    /// For account-scan layouts: whether the preamble names the configured
    /// account number. This is what lets several accounts at the same bank
    /// coexist over one pile of downloads.
    pub fn matches_account(&self, preamble: &str) -> bool {
        let IdentifyRule::AccountScan { pattern, window } = &self.layout.identify else {
            return false;
        };
        let Ok(re) = Regex::new(pattern) else {
            return false;
        };
        for line in preamble.lines().take(*window) {
            if let Some(caps) = re.captures(line) {
                if caps[1].ends_with(&self.account_number) {
                    return true;
                }
            }
        }
        false
    }

    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<ImportResult, ImportError> {
        let file = std::fs::File::open(path.as_ref())?;
        self.parse_reader(file)
    }

    pub fn parse_reader<R: Read>(&self, mut reader: R) -> Result<ImportResult, ImportError> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;

        if matches!(self.layout.identify, IdentifyRule::AccountScan { .. })
            && !self.matches_account(&buf)
        {
            return Err(ImportError::format(
                self.layout.name,
                format!(
                    "account number ending {} not found in preamble",
                    self.account_number
                ),
            ));
        }

        let body = skip_preamble(&buf, self.layout.preamble_lines);
        if !body
            .lines()
            .next()
            .unwrap_or("")
            .contains(self.layout.date_column)
        {
            return Err(ImportError::format(
                self.layout.name,
                format!("missing {} header after preamble", self.layout.date_column),
            ));
        }

        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(body.as_bytes());

        // Columns are looked up by header name so extra columns (balance,
        // cheque number) pass through untouched.
        let headers = csv_reader
            .headers()
            .map_err(|e| ImportError::Parse(e.to_string()))?
            .clone();
        let col = |name: &str| headers.iter().position(|h| h.trim() == name);
        let (Some(date_i), Some(narration_i), Some(debit_i), Some(credit_i)) = (
            col(self.layout.date_column),
            col(self.layout.narration_column),
            col(self.layout.debit_column),
            col(self.layout.credit_column),
        ) else {
            return Err(ImportError::format(
                self.layout.name,
                "statement is missing an expected column",
            ));
        };

        let mut rows: Vec<Row> = Vec::new();
        let mut skipped = 0usize;

        for (idx, record) in csv_reader.records().enumerate() {
            let rec = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(row = idx, error = %e, "skipping malformed csv row");
                    skipped += 1;
                    continue;
                }
            };

            let date = match NaiveDate::parse_from_str(
                rec.get(date_i).unwrap_or("").trim(),
                self.layout.date_format,
            ) {
                Ok(d) => d,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };

            let debit = parse_decimal_opt(rec.get(debit_i).unwrap_or("")).unwrap_or(Decimal::ZERO);
            let credit =
                parse_decimal_opt(rec.get(credit_i).unwrap_or("")).unwrap_or(Decimal::ZERO);

            // Signed convention: credits flow in, debits flow out.
            let (kind, amount) = if !debit.is_zero() {
                ("withdrawal", -debit)
            } else if !credit.is_zero() {
                ("deposit", credit)
            } else {
                skipped += 1;
                continue;
            };

            rows.push(Row::cash(
                date,
                kind,
                amount,
                &self.profile.currency,
                rec.get(narration_i).unwrap_or("").trim(),
            ));
        }

        let mut result = import_rows(rows, &self.profile, &[]);
        result.diagnostics.rows_skipped += skipped;
        Ok(result)
    }
}

impl StatementImporter for BankCsvImporter {
    fn name(&self) -> &'static str {
        self.layout.name
    }

    fn identify(&self, path: &Path) -> bool {
        if !path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
        {
            return false;
        }
        match &self.layout.identify {
            IdentifyRule::FilenamePrefix(prefix) => {
                let Some(filename) = path.file_name().and_then(|s| s.to_str()) else {
                    return false;
                };
                Regex::new(&format!(
                    r"^{}{}.*\.csv$",
                    prefix,
                    regex::escape(&self.account_number)
                ))
                .map(|re| re.is_match(filename))
                .unwrap_or(false)
            }
            IdentifyRule::AccountScan { .. } => {
                let Ok(content) = std::fs::read_to_string(path) else {
                    return false;
                };
                self.matches_account(&content)
            }
        }
    }

    fn extract(&self, path: &Path) -> Result<ImportResult, ImportError> {
        self.parse_file(path)
    }
}

// ------------------------
// Bank layouts
// ------------------------

/// SBI savings statement, downloaded as TSV-disguised-as-xls and converted
/// to CSV; the account number sits in a "Account Number : _NNN" preamble
/// line.
pub fn sbi(account_number: &str) -> BankCsvImporter {
    BankCsvImporter::new(
        BankLayout {
            name: "sbi",
            preamble_lines: 20,
            date_column: "Value Date",
            date_format: "%d %b %Y",
            narration_column: "Description",
            debit_column: "Debit",
            credit_column: "Credit",
            identify: IdentifyRule::AccountScan {
                pattern: r"Account Number\s*:\s*,?\s*_?(\d+)",
                window: 18,
            },
        },
        indian_bank_profile("sbi", "SBI"),
        account_number,
    )
}

/// IOB statement; no preamble, and files are claimed by their downloaded
/// name (iob + the account's last digits).
pub fn iob(lastfour: &str) -> BankCsvImporter {
    BankCsvImporter::new(
        BankLayout {
            name: "iob",
            preamble_lines: 0,
            date_column: "Value Date",
            date_format: "%d-%b-%Y",
            narration_column: "Narration",
            debit_column: "Debit",
            credit_column: "Credit",
            identify: IdentifyRule::FilenamePrefix("iob"),
        },
        indian_bank_profile("iob", "IOB"),
        lastfour,
    )
}

/// KVB internet-banking export; the 16-digit account number appears quoted
/// in the preamble.
pub fn kvb(account_number: &str) -> BankCsvImporter {
    BankCsvImporter::new(
        BankLayout {
            name: "kvb",
            preamble_lines: 13,
            date_column: "Value Date",
            date_format: "%d-%m-%Y",
            narration_column: "Description",
            debit_column: "Debit",
            credit_column: "Credit",
            identify: IdentifyRule::AccountScan {
                pattern: r#"Account Number:,="(\d{16})""#,
                window: 9,
            },
        },
        indian_bank_profile("kvb", "KVB"),
        account_number,
    )
}

fn indian_bank_profile(name: &'static str, bank: &str) -> BrokerProfile {
    BrokerProfile {
        name,
        currency: "INR".to_string(),
        money_dp: 2,
        quantity_dp: 4,
        fees_included_in_gross: false,
        per_sell_charge: None,
        kinds: KindMap::new()
            .with("deposit", TxnKind::Wire)
            .with("withdrawal", TxnKind::Wire),
        accounts: AccountTemplates {
            root: format!("Assets:IN:{}", bank),
            cash: format!("Assets:IN:{}:Savings", bank),
            dividends: format!("Income:IN:{}:{{}}:Dividend", bank),
            gains: format!("Income:IN:{}:{{}}:PnL", bank),
            fees: format!("Expenses:Financial:Fees:{}", bank),
            interest: format!("Income:IN:Interest:{}", bank),
            withholding: "Expenses:IN:WithholdingTax".to_string(),
            external: "Expenses:Uncategorized".to_string(),
            review: "Expenses:FixMe".to_string(),
        },
    }
}

fn skip_preamble(buf: &str, lines: usize) -> &str {
    let mut rest = buf;
    for _ in 0..lines {
        match rest.split_once('\n') {
            Some((_, tail)) => rest = tail,
            None => return "",
        }
    }
    rest
}

fn parse_decimal_opt(s: &str) -> Option<Decimal> {
    let t = s.trim();
    if t.is_empty() || t == "-" || t == "--" {
        return None;
    }
    t.replace(',', "").parse::<Decimal>().ok()
}
