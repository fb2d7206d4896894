use chrono::NaiveDate;
use ledger_core::{
    import_rows, AccountTemplates, BrokerProfile, Charge, ImportError, ImportResult, KindMap,
    Row, StatementImporter, TxnKind,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

pub const PARSER_NAME: &str = "zerodha";

// ------------------------
// XML shape
// ------------------------
//
// A contract note wraps one or more contracts; each contract carries its
// trades plus a grandtotals block with every contract-level charge stated
// once for the whole note.

#[derive(Debug, Deserialize)]
struct ContractNote {
    issuer: Option<Issuer>,
    #[serde(default)]
    contracts: Contracts,
}

#[derive(Debug, Deserialize)]
struct Issuer {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Contracts {
    #[serde(rename = "contract", default)]
    items: Vec<Contract>,
}

#[derive(Debug, Deserialize)]
struct Contract {
    id: Option<String>,
    timestamp: Option<String>,
    #[serde(default)]
    trades: Trades,
    #[serde(default)]
    totals: Totals,
}

#[derive(Debug, Default, Deserialize)]
struct Trades {
    #[serde(rename = "trade", default)]
    items: Vec<TradeNode>,
}

#[derive(Debug, Deserialize)]
struct TradeNode {
    #[serde(rename = "@instrument_id", default)]
    instrument_id: String,
    id: Option<String>,
    order_id: Option<String>,
    #[serde(rename = "type")]
    side: Option<String>,
    quantity: Option<String>,
    average_price: Option<String>,
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Totals {
    #[serde(default)]
    grandtotals: GrandTotals,
}

#[derive(Debug, Default, Deserialize)]
struct GrandTotals {
    #[serde(rename = "grandtotal", default)]
    items: Vec<GrandTotal>,
}

#[derive(Debug, Deserialize)]
struct GrandTotal {
    name: Option<String>,
    value: Option<String>,
}

// ------------------------
// Importer
// ------------------------

pub struct ZerodhaImporter {
    profile: BrokerProfile,
}

impl Default for ZerodhaImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ZerodhaImporter {
    pub fn new() -> Self {
        ZerodhaImporter {
            profile: default_profile(),
        }
    }

    pub fn with_profile(profile: BrokerProfile) -> Self {
        ZerodhaImporter { profile }
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

        if !buf.contains("<contract_note") {
            return Err(ImportError::format(
                PARSER_NAME,
                "not a contract_note document",
            ));
        }

        let note: ContractNote =
            quick_xml::de::from_str(&buf).map_err(|e| ImportError::Parse(e.to_string()))?;

        let mut merged = ImportResult::default();
        for contract in &note.contracts.items {
            merged.merge(self.process_contract(contract));
        }
        Ok(merged)
    }

    /// Each contract runs through the pipeline on its own: its grandtotal
    /// charges are spread over its own orders only, never across contracts.
    fn process_contract(&self, contract: &Contract) -> ImportResult {
        let contract_id = contract.id.as_deref().unwrap_or("unknown");

        let Some(date) = contract
            .timestamp
            .as_deref()
            .and_then(|t| NaiveDate::parse_from_str(t.trim(), "%Y-%m-%d").ok())
        else {
            tracing::warn!(contract = contract_id, "skipping contract with bad timestamp");
            let mut result = ImportResult::default();
            result.diagnostics.rows_skipped += contract.trades.items.len();
            return result;
        };

        let mut rows: Vec<Row> = Vec::new();
        for trade in &contract.trades.items {
            let symbol = extract_symbol(&trade.instrument_id);
            rows.push(Row {
                date,
                kind: trade.side.clone().unwrap_or_default(),
                symbol: Some(symbol),
                quantity: parse_decimal(trade.quantity.as_deref()).map(|q| q.abs()),
                price: parse_decimal(trade.average_price.as_deref()),
                gross_amount: parse_decimal(trade.value.as_deref()),
                commission: Decimal::ZERO,
                tax_withheld: Decimal::ZERO,
                currency: self.profile.currency.clone(),
                order_id: trade.order_id.clone(),
                trade_id: trade.id.clone(),
                narration: format!("Contract {}", contract_id),
            });
        }

        let charges: Vec<Charge> = contract
            .totals
            .grandtotals
            .items
            .iter()
            .filter_map(|g| {
                let name = g.name.as_deref()?.trim();
                if name.is_empty() || name == "None" {
                    return None;
                }
                let amount = parse_decimal(g.value.as_deref())?;
                Some(Charge::new(name, amount))
            })
            .collect();

        import_rows(rows, &self.profile, &charges)
    }
}

impl StatementImporter for ZerodhaImporter {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn identify(&self, path: &Path) -> bool {
        if !path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("xml"))
            .unwrap_or(false)
        {
            return false;
        }
        let Ok(content) = std::fs::read_to_string(path) else {
            return false;
        };
        if !content.contains("<contract_note") {
            return false;
        }
        match quick_xml::de::from_str::<ContractNote>(&content) {
            Ok(note) => note
                .issuer
                .and_then(|i| i.name)
                .map(|n| n.contains("Zerodha"))
                .unwrap_or(false),
            Err(_) => false,
        }
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
        // Flat depository charge levied on every sell, stated outside the
        // contract note totals.
        per_sell_charge: Some(Charge::new("Demat", Decimal::new(1350, 2))),
        kinds: KindMap::new()
            .with("B", TxnKind::Buy)
            .with("S", TxnKind::Sell)
            .with("buy", TxnKind::Buy)
            .with("sell", TxnKind::Sell),
        accounts: AccountTemplates {
            root: "Assets:IN:Zerodha".to_string(),
            cash: "Assets:IN:Zerodha:Cash".to_string(),
            dividends: "Income:IN:Zerodha:{}:Dividend".to_string(),
            gains: "Income:IN:Zerodha:{}:PnL".to_string(),
            fees: "Expenses:Financial:Fees:Zerodha".to_string(),
            interest: "Income:IN:Interest:Zerodha".to_string(),
            withholding: "Expenses:IN:WithholdingTax".to_string(),
            external: "Assets:IN:ICICIBank:Savings".to_string(),
            review: "Expenses:FixMe".to_string(),
        },
    }
}

/// Instrument ids come as "NSE:INFY - EQ / INE009A01021"; the ticker is the
/// piece between the colon and the segment suffix.
fn extract_symbol(instrument_id: &str) -> String {
    instrument_id
        .split(':')
        .nth(1)
        .and_then(|rest| rest.split(" - ").next())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or("UNKNOWN")
        .to_string()
}

fn parse_decimal(s: Option<&str>) -> Option<Decimal> {
    let t = s?.trim();
    if t.is_empty() || t == "None" || t == "null" {
        return None;
    }
    t.replace(',', "").parse::<Decimal>().ok()
}
