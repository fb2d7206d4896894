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

pub const PARSER_NAME: &str = "rksv";

/// Tradebook export from the Indian broker RKSV: lowercase headers, one row
/// per fill, fees stated separately from the trade amount. Fills of one
/// order share an order_id and consolidate into a single transaction.
#[derive(Debug, Deserialize)]
struct RksvRecord {
    trade_date: String,
    tradingsymbol: String,
    trade_type: String,
    quantity: String,
    price: String,
    amount: String,
    fees: String,
    order_id: String,
}

pub struct RksvImporter {
    profile: BrokerProfile,
}

impl Default for RksvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl RksvImporter {
    pub fn new() -> Self {
        RksvImporter {
            profile: default_profile(),
        }
    }

    pub fn with_profile(profile: BrokerProfile) -> Self {
        RksvImporter { profile }
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

        if !buf.lines().next().unwrap_or("").starts_with("trade_date,tradingsymbol") {
            return Err(ImportError::format(
                PARSER_NAME,
                "missing trade_date,tradingsymbol header",
            ));
        }

        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(buf.as_bytes());

        let mut rows: Vec<Row> = Vec::new();
        let mut skipped = 0usize;

        for (idx, record) in csv_reader.deserialize::<RksvRecord>().enumerate() {
            let rec = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(row = idx, error = %e, "skipping malformed csv row");
                    skipped += 1;
                    continue;
                }
            };

            let date = match NaiveDate::parse_from_str(rec.trade_date.trim(), "%Y-%m-%d") {
                Ok(d) => d,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };

            let symbol = rec.tradingsymbol.trim().to_string();
            let order_id = rec.order_id.trim().to_string();
            let narration = format!(
                "{} {} with TradeRef {}",
                rec.trade_type.trim(),
                symbol,
                order_id
            );
            rows.push(Row {
                date,
                kind: rec.trade_type.trim().to_string(),
                symbol: if symbol.is_empty() { None } else { Some(symbol) },
                quantity: parse_decimal_opt(&rec.quantity).map(|q| q.abs()),
                price: parse_decimal_opt(&rec.price),
                // The amount column is the bare trade value; fees come on
                // top of it.
                gross_amount: parse_decimal_opt(&rec.amount),
                commission: parse_decimal_opt(&rec.fees)
                    .map(|f| f.abs())
                    .unwrap_or(Decimal::ZERO),
                tax_withheld: Decimal::ZERO,
                currency: self.profile.currency.clone(),
                order_id: if order_id.is_empty() { None } else { Some(order_id) },
                trade_id: None,
                narration,
            });
        }

        let mut result = import_rows(rows, &self.profile, &[]);
        result.diagnostics.rows_skipped += skipped;
        Ok(result)
    }
}

impl StatementImporter for RksvImporter {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn identify(&self, path: &Path) -> bool {
        let Some(filename) = path.file_name().and_then(|s| s.to_str()) else {
            return false;
        };
        Regex::new(r"^rksv\d{8}\.csv$")
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
        currency: "INR".to_string(),
        money_dp: 2,
        quantity_dp: 4,
        fees_included_in_gross: false,
        per_sell_charge: None,
        kinds: KindMap::new()
            .with("buy", TxnKind::Buy)
            .with("sell", TxnKind::Sell),
        accounts: AccountTemplates {
            root: "Assets:IN:RKSV".to_string(),
            cash: "Assets:IN:RKSV:Cash".to_string(),
            dividends: "Income:IN:RKSV:{}:Dividend".to_string(),
            gains: "Income:IN:RKSV:{}:PnL".to_string(),
            fees: "Expenses:Financial:Fees:RKSV".to_string(),
            interest: "Income:IN:Interest:RKSV".to_string(),
            withholding: "Expenses:IN:WithholdingTax".to_string(),
            external: "Assets:IN:ICICIBank:Savings".to_string(),
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
