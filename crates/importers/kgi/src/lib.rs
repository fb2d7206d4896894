use chrono::NaiveDate;
use csv::ReaderBuilder;
use ledger_core::{
    import_rows, AccountTemplates, BrokerProfile, ImportError, ImportResult, KindMap, Row,
    StatementImporter, TxnKind,
};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

pub const PARSER_NAME: &str = "kgi";

/// Hand-maintained trade ledger for the Thai broker KGI. No preamble, but
/// numbers come comma-grouped ("107,869.00") and dividend/interest rows
/// carry withholding tax in their own column.
#[derive(Debug, Deserialize)]
struct KgiRecord {
    #[serde(rename = "Symbol")]
    symbol: String,
    #[serde(rename = "TransactionDate")]
    date: String,
    #[serde(rename = "TransactionType")]
    txn_type: String,
    #[serde(rename = "Quantity")]
    quantity: String,
    #[serde(rename = "Price")]
    price: String,
    #[serde(rename = "Value")]
    value: String,
    #[serde(rename = "Commission")]
    commission: String,
    #[serde(rename = "Tax")]
    tax: String,
    #[serde(rename = "Amount")]
    _amount: String,
    #[serde(rename = "Description")]
    description: String,
}

pub struct KgiImporter {
    profile: BrokerProfile,
}

impl Default for KgiImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl KgiImporter {
    pub fn new() -> Self {
        KgiImporter {
            profile: default_profile(),
        }
    }

    pub fn with_profile(profile: BrokerProfile) -> Self {
        KgiImporter { profile }
    }

    pub fn profile(&self) -> &BrokerProfile {
        &self.profile
    }

    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<ImportResult, ImportError> {
        let file = std::fs::File::open(path.as_ref())?;
        self.parse_reader(file)
    }

    pub fn parse_reader<R: Read>(&self, mut reader: R) -> Result<ImportResult, ImportError> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;

        if !buf.lines().next().unwrap_or("").contains("TransactionDate") {
            return Err(ImportError::format(
                PARSER_NAME,
                "missing TransactionDate header",
            ));
        }

        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(buf.as_bytes());

        let mut rows: Vec<Row> = Vec::new();
        let mut skipped = 0usize;

        for (idx, record) in csv_reader.deserialize::<KgiRecord>().enumerate() {
            let rec = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(row = idx, error = %e, "skipping malformed csv row");
                    skipped += 1;
                    continue;
                }
            };

            let date = match NaiveDate::parse_from_str(rec.date.trim(), "%d/%m/%Y") {
                Ok(d) => d,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            if rec.txn_type.trim().is_empty() {
                skipped += 1;
                continue;
            }

            let symbol = rec.symbol.trim().to_string();
            rows.push(Row {
                date,
                kind: rec.txn_type.trim().to_string(),
                symbol: if symbol.is_empty() { None } else { Some(symbol) },
                quantity: parse_decimal_opt(&rec.quantity).map(|q| q.abs()),
                price: parse_decimal_opt(&rec.price),
                // Value is the gross figure: trade value for buys/sells,
                // gross dividend/interest before withholding.
                gross_amount: parse_decimal_opt(&rec.value),
                commission: parse_decimal_opt(&rec.commission)
                    .map(|c| c.abs())
                    .unwrap_or(Decimal::ZERO),
                tax_withheld: parse_decimal_opt(&rec.tax)
                    .map(|t| t.abs())
                    .unwrap_or(Decimal::ZERO),
                currency: self.profile.currency.clone(),
                order_id: None,
                trade_id: None,
                narration: rec.description.trim().to_string(),
            });
        }

        let mut result = import_rows(rows, &self.profile, &[]);
        result.diagnostics.rows_skipped += skipped;
        Ok(result)
    }
}

impl StatementImporter for KgiImporter {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn identify(&self, path: &Path) -> bool {
        let Some(filename) = path.file_name().and_then(|s| s.to_str()) else {
            return false;
        };
        Regex::new(r"^kgi\d{6,8}\.csv$")
            .map(|re| re.is_match(filename))
            .unwrap_or(false)
    }

    fn extract(&self, path: &Path) -> Result<ImportResult, ImportError> {
        self.parse_file(path)
    }
}

fn default_profile() -> BrokerProfile {
    BrokerProfile {
        name: PARSER_NAME,
        currency: "THB".to_string(),
        money_dp: 2,
        quantity_dp: 4,
        fees_included_in_gross: false,
        per_sell_charge: None,
        kinds: KindMap::new()
            .with("BUY", TxnKind::Buy)
            .with("SELL", TxnKind::Sell)
            .with("Dividend", TxnKind::Dividend)
            .with("Interest", TxnKind::Interest)
            .with("Fee", TxnKind::Fee)
            .with("Wire", TxnKind::Wire),
        accounts: AccountTemplates {
            root: "Assets:TH:Investment:KGI".to_string(),
            cash: "Assets:TH:Investment:KGI:Cash".to_string(),
            dividends: "Income:TH:Investment:{}:Dividend".to_string(),
            gains: "Income:TH:Investment:{}:PnL".to_string(),
            fees: "Expenses:Financial:Fees:KGI".to_string(),
            interest: "Income:TH:Interest:KGI".to_string(),
            withholding: "Expenses:TH:WithholdingTax:{}".to_string(),
            external: "Assets:SG:DBS:Savings".to_string(),
            review: "Expenses:FixMe".to_string(),
        },
    }
}

fn parse_decimal_opt(s: &str) -> Option<Decimal> {
    let t = s.trim();
    if t.is_empty() || t == "-" || t == "--" {
        return None;
    }
    t.replace(',', "").parse::<Decimal>().ok()
}
