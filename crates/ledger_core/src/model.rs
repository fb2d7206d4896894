use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// One normalized statement line, produced by a format adapter.
///
/// `kind` is the raw type label exactly as the source reports it; the
/// per-adapter kind map turns it into a `TxnKind` later. Amount fields are
/// decimal-exact, never floats.
#[derive(Debug, Clone)]
pub struct Row {
    pub date: NaiveDate,
    pub kind: String,
    pub symbol: Option<String>,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub gross_amount: Option<Decimal>,
    pub commission: Decimal,
    pub tax_withheld: Decimal,
    pub currency: String,
    pub order_id: Option<String>,
    pub trade_id: Option<String>,
    pub narration: String,
}

impl Row {
    /// A cash-only row with no instrument attached (interest, fees, wires).
    pub fn cash(date: NaiveDate, kind: &str, amount: Decimal, currency: &str, narration: &str) -> Self {
        Row {
            date,
            kind: kind.to_string(),
            symbol: None,
            quantity: None,
            price: None,
            gross_amount: Some(amount),
            commission: Decimal::ZERO,
            tax_withheld: Decimal::ZERO,
            currency: currency.to_string(),
            order_id: None,
            trade_id: None,
            narration: narration.to_string(),
        }
    }

    /// Stated value of a trade row: the gross amount when the source reports
    /// one, `|quantity * price|` otherwise. `None` when neither is derivable.
    pub fn stated_value(&self) -> Option<Decimal> {
        if let Some(g) = self.gross_amount {
            return Some(g.abs());
        }
        match (self.quantity, self.price) {
            (Some(q), Some(p)) => Some((q * p).abs()),
            _ => None,
        }
    }
}

/// A named fee/tax component attached to a row or to a whole contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Charge {
    pub name: String,
    pub amount: Decimal,
}

impl Charge {
    pub fn new(name: &str, amount: Decimal) -> Self {
        Charge {
            name: name.to_string(),
            amount,
        }
    }
}

/// A number in a commodity: money in a currency, or instrument units in a
/// ticker symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Amount {
    pub number: Decimal,
    pub commodity: String,
}

impl Amount {
    pub fn new(number: Decimal, commodity: &str) -> Self {
        Amount {
            number,
            commodity: commodity.to_string(),
        }
    }
}

/// One leg of a transaction. `units: None` is the elided auto-balancing leg
/// whose amount the downstream ledger engine computes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Posting {
    pub account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<Amount>,
    /// Per-unit acquisition cost, attached when opening a position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<Amount>,
    /// Per-unit trade price, attached when closing so the ledger engine can
    /// compute the realized gain against the recorded cost basis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Amount>,
}

impl Posting {
    pub fn simple(account: String, number: Decimal, currency: &str) -> Self {
        Posting {
            account,
            units: Some(Amount::new(number, currency)),
            cost: None,
            price: None,
        }
    }

    pub fn elided(account: String) -> Self {
        Posting {
            account,
            units: None,
            cost: None,
            price: None,
        }
    }

    /// Cash-equivalent weight of this leg in a currency, used by the balance
    /// check. Instrument legs weigh in at cost (opens) or price (closes).
    pub fn weight(&self) -> Option<Amount> {
        let units = self.units.as_ref()?;
        if let Some(cost) = &self.cost {
            return Some(Amount::new(units.number * cost.number, &cost.commodity));
        }
        if let Some(price) = &self.price {
            return Some(Amount::new(units.number * price.number, &price.commodity));
        }
        Some(units.clone())
    }
}

/// One double-entry transaction, built once and never patched afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub narration: String,
    pub tags: BTreeSet<String>,
    /// Stable content hash so re-importing the same statement is a no-op for
    /// downstream merges.
    pub import_id: String,
    pub postings: Vec<Posting>,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        narration: String,
        tags: BTreeSet<String>,
        postings: Vec<Posting>,
        id_prefix: &str,
    ) -> Self {
        let import_id = build_import_id(id_prefix, date, &narration, &postings);
        Transaction {
            date,
            narration,
            tags,
            import_id,
            postings,
        }
    }
}

/// Quantize a monetary amount to the market's minor-unit precision.
pub fn quantize_money(value: Decimal, money_dp: u32) -> Decimal {
    value.round_dp_with_strategy(money_dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Quantize an instrument quantity. Fractional units carry up to 4 places.
pub fn quantize_quantity(value: Decimal, quantity_dp: u32) -> Decimal {
    value.round_dp_with_strategy(quantity_dp, RoundingStrategy::MidpointAwayFromZero)
}

fn build_import_id(prefix: &str, date: NaiveDate, narration: &str, postings: &[Posting]) -> String {
    let mut key = format!("{}|{}|{}", prefix, date.format("%Y-%m-%d"), narration);
    for p in postings {
        key.push('|');
        key.push_str(&p.account);
        if let Some(units) = &p.units {
            key.push_str(&format!("|{} {}", units.number, units.commodity));
        }
    }
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let hash = hex::encode(hasher.finalize());
    format!("{}-{}", prefix, &hash[..24])
}
