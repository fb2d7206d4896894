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

pub const PARSER_NAME: &str = "etrade";

/// Preamble lines before the column header in an ETrade export.
const SKIP_LINES: usize = 3;

#[derive(Debug, Deserialize)]
struct EtradeRecord {
    #[serde(rename = "TransactionDate")]
    date: String,
    #[serde(rename = "TransactionType")]
    txn_type: String,
    #[serde(rename = "SecurityType")]
    _security_type: String,
    #[serde(rename = "Symbol")]
    symbol: String,
    #[serde(rename = "Quantity")]
    quantity: String,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Price")]
    price: String,
    #[serde(rename = "Commission")]
    commission: String,
    #[serde(rename = "Description")]
    description: String,
}

pub struct EtradeImporter {
    profile: BrokerProfile,
}

impl Default for EtradeImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl EtradeImporter {
    pub fn new() -> Self {
        EtradeImporter {
            profile: default_profile(),
        }
    }

    pub fn with_profile(profile: BrokerProfile) -> Self {
        EtradeImporter { profile }
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

        // The export carries a few lines of account preamble above the
        // actual column header.
        let body = skip_preamble(&buf, SKIP_LINES);
        if !body.lines().next().unwrap_or("").contains("TransactionDate") {
            return Err(ImportError::format(
                PARSER_NAME,
                "missing TransactionDate header after preamble",
            ));
        }

        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(body.as_bytes());

        let mut rows: Vec<Row> = Vec::new();
        let mut skipped = 0usize;

        for (idx, record) in csv_reader.deserialize::<EtradeRecord>().enumerate() {
            let rec = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(row = idx, error = %e, "skipping malformed csv row");
                    skipped += 1;
                    continue;
                }
            };

            let date = match NaiveDate::parse_from_str(rec.date.trim(), "%m/%d/%y") {
                Ok(d) => d,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };

            let quantity = parse_decimal_opt(&rec.quantity);
            let price = parse_decimal_opt(&rec.price);
            let amount = parse_decimal_opt(&rec.amount);
            if amount.is_none() && (quantity.is_none() || price.is_none()) {
                skipped += 1;
                continue;
            }

            let symbol = rec.symbol.trim().to_string();
            rows.push(Row {
                date,
                kind: rec.txn_type.trim().to_string(),
                symbol: if symbol.is_empty() { None } else { Some(symbol) },
                quantity: quantity.map(|q| q.abs()),
                price,
                // The Amount column is the signed cash delta: inflows
                // positive, outflows negative.
                gross_amount: amount,
                commission: parse_decimal_opt(&rec.commission)
                    .map(|c| c.abs())
                    .unwrap_or(Decimal::ZERO),
                tax_withheld: Decimal::ZERO,
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

impl StatementImporter for EtradeImporter {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn identify(&self, path: &Path) -> bool {
        let Some(filename) = path.file_name().and_then(|s| s.to_str()) else {
            return false;
        };
        // Files as downloaded: etrade followed by a date stamp.
        Regex::new(r"^etrade\d{6,8}\.csv$")
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
        currency: "USD".to_string(),
        money_dp: 2,
        quantity_dp: 4,
        // The Amount column is the settled cash figure, commission already
        // folded in.
        fees_included_in_gross: true,
        per_sell_charge: None,
        kinds: KindMap::new()
            .with("Bought", TxnKind::Buy)
            .with("Sold", TxnKind::Sell)
            .with("Dividend", TxnKind::Dividend)
            .with("Qualified Dividend", TxnKind::Dividend)
            .with("Tax", TxnKind::Tax)
            .with("Tax Withholding", TxnKind::Tax)
            .with("Interest", TxnKind::Interest)
            .with("Interest Income", TxnKind::Interest)
            .with("Fee", TxnKind::Fee)
            .with("MISC", TxnKind::Fee)
            .with("Wire", TxnKind::Wire)
            .with("Wire In", TxnKind::Wire)
            .with("Wire Out", TxnKind::Wire),
        accounts: AccountTemplates {
            root: "Assets:US:ETrade".to_string(),
            cash: "Assets:US:ETrade:Cash".to_string(),
            dividends: "Income:US:ETrade:{}:Dividend".to_string(),
            gains: "Income:US:ETrade:{}:PnL".to_string(),
            fees: "Expenses:Financial:Fees:ETrade".to_string(),
            interest: "Income:US:Interest:ETrade".to_string(),
            withholding: "Expenses:US:WithholdingTax:{}".to_string(),
            external: "Assets:US:Bank:Checking".to_string(),
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
    if t.is_empty() || t == "--" {
        return None;
    }
    t.replace(',', "").parse::<Decimal>().ok()
}
