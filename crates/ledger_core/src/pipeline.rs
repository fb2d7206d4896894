use crate::allocate::allocate;
use crate::build::{build_cash, build_trade};
use crate::classify::TxnKind;
use crate::consolidate::Consolidator;
use crate::model::{Charge, Row, Transaction};
use crate::profile::BrokerProfile;
use rust_decimal::Decimal;

/// Per-file counters for everything that was dropped, guessed at, or worth
/// a second look. Surfaced to the caller, never silently absorbed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    /// Rows missing required fields, excluded before classification.
    pub rows_skipped: usize,
    /// Zero-quantity order groups discarded after consolidation.
    pub groups_discarded: usize,
    /// Rows routed to a needs-review transaction.
    pub unknown_kinds: usize,
    /// Transactions dropped because their legs did not sum to zero.
    pub balance_errors: usize,
    /// Charge allocations skipped (zero contract value and the like).
    pub allocation_warnings: usize,
}

impl Diagnostics {
    pub fn has_anomalies(&self) -> bool {
        self.rows_skipped > 0
            || self.groups_discarded > 0
            || self.unknown_kinds > 0
            || self.balance_errors > 0
            || self.allocation_warnings > 0
    }

    pub fn merge(&mut self, other: &Diagnostics) {
        self.rows_skipped += other.rows_skipped;
        self.groups_discarded += other.groups_discarded;
        self.unknown_kinds += other.unknown_kinds;
        self.balance_errors += other.balance_errors;
        self.allocation_warnings += other.allocation_warnings;
    }
}

/// Ordered transactions extracted from one statement, plus the diagnostics
/// accumulated along the way.
#[derive(Debug, Default)]
pub struct ImportResult {
    pub transactions: Vec<Transaction>,
    pub diagnostics: Diagnostics,
}

impl ImportResult {
    /// Post-processing seam for external enrichment (payee prediction and
    /// similar hooks live outside this crate).
    pub fn map_transactions<F>(mut self, f: F) -> Self
    where
        F: FnMut(Transaction) -> Transaction,
    {
        self.transactions = self.transactions.into_iter().map(f).collect();
        self
    }

    pub fn merge(&mut self, other: ImportResult) {
        self.transactions.extend(other.transactions);
        self.diagnostics.merge(&other.diagnostics);
    }
}

enum Item {
    Cash(TxnKind, Row),
    /// Index into the consolidator's group list; recorded once, at the
    /// position of the group's first fill, so output keeps input order.
    Group(usize),
}

/// Run the full classify/consolidate/allocate/build pipeline over the rows
/// of one statement.
///
/// `contract_charges` are aggregate charges stated once for the whole
/// statement (contract-note style); they are allocated across order groups
/// by value share. Per-row commissions are folded into their own group and
/// booked as a "Commission" charge.
pub fn import_rows(
    rows: Vec<Row>,
    profile: &BrokerProfile,
    contract_charges: &[Charge],
) -> ImportResult {
    let mut diagnostics = Diagnostics::default();
    let mut consolidator = Consolidator::new();
    let mut items: Vec<Item> = Vec::new();
    let mut group_count = 0usize;

    for row in rows {
        let kind = profile.kinds.classify(&row.kind);
        if kind.is_trade() {
            let (quantity, price) = match (row.quantity, row.price) {
                (Some(q), Some(p)) if !q.is_zero() => (q, p),
                _ => {
                    tracing::debug!(date = %row.date, kind = %row.kind, "skipping trade row without quantity/price");
                    diagnostics.rows_skipped += 1;
                    continue;
                }
            };
            let value = trade_value(&row, kind, quantity, price, profile);
            let idx = consolidator.push(&row, kind, value);
            // An index at the end of the list means a new group was opened;
            // it takes its place at this row's position in the output.
            if idx == group_count {
                items.push(Item::Group(idx));
                group_count += 1;
            }
        } else {
            if kind == TxnKind::Unknown {
                tracing::warn!(label = %row.kind, date = %row.date, "unknown transaction kind, routing to review");
                diagnostics.unknown_kinds += 1;
            }
            items.push(Item::Cash(kind, row));
        }
    }

    let (groups, remap) = consolidator.finish();
    diagnostics.groups_discarded += remap.iter().filter(|m| m.is_none()).count();

    // Contract-level charges spread across groups by value share.
    let group_values: Vec<Decimal> = groups.iter().map(|g| g.total_value).collect();
    let (mut allocations, warnings) = allocate(contract_charges, &group_values, profile.money_dp);
    diagnostics.allocation_warnings += warnings;

    // Per-group charges: the summed fill commissions, plus any fixed
    // per-sell levy the broker charges outside the contract totals.
    for (group, charges) in groups.iter().zip(allocations.iter_mut()) {
        if !group.commission.is_zero() {
            charges.insert(0, Charge::new("Commission", group.commission));
        }
        if group.direction == TxnKind::Sell {
            if let Some(levy) = &profile.per_sell_charge {
                charges.push(levy.clone());
            }
        }
    }

    let mut transactions = Vec::with_capacity(items.len());
    for item in items {
        let built = match item {
            Item::Cash(kind, row) => build_cash(kind, &row, profile),
            Item::Group(idx) => match remap[idx] {
                Some(g) => build_trade(&groups[g], &allocations[g], profile),
                None => continue,
            },
        };
        match built {
            Ok(txn) => transactions.push(txn),
            Err(issue) => {
                tracing::warn!(%issue, "dropping unbalanced transaction");
                diagnostics.balance_errors += 1;
            }
        }
    }

    ImportResult {
        transactions,
        diagnostics,
    }
}

/// Derive the trade value of one fill, honoring the source's convention on
/// whether the stated gross amount already folds fees in.
fn trade_value(
    row: &Row,
    kind: TxnKind,
    quantity: Decimal,
    price: Decimal,
    profile: &BrokerProfile,
) -> Decimal {
    match row.gross_amount {
        Some(gross) => {
            let gross = gross.abs();
            if profile.fees_included_in_gross {
                match kind {
                    TxnKind::Buy => gross - row.commission,
                    TxnKind::Sell => gross + row.commission,
                    _ => gross,
                }
            } else {
                gross
            }
        }
        None => (quantity * price).abs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::KindMap;
    use crate::profile::AccountTemplates;
    use chrono::NaiveDate;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn profile() -> BrokerProfile {
        BrokerProfile {
            name: "testbroker",
            currency: "INR".to_string(),
            money_dp: 2,
            quantity_dp: 4,
            fees_included_in_gross: false,
            per_sell_charge: None,
            kinds: KindMap::new()
                .with("B", TxnKind::Buy)
                .with("S", TxnKind::Sell)
                .with("DIV", TxnKind::Dividend)
                .with("INT", TxnKind::Interest)
                .with("FEE", TxnKind::Fee),
            accounts: AccountTemplates {
                root: "Assets:IN:Broker".to_string(),
                cash: "Assets:IN:Broker:Cash".to_string(),
                dividends: "Income:IN:Broker:{}:Dividend".to_string(),
                gains: "Income:IN:Broker:{}:PnL".to_string(),
                fees: "Expenses:IN:Fees".to_string(),
                interest: "Income:IN:Broker:Interest".to_string(),
                withholding: "Expenses:IN:Taxes:Withholding:{}".to_string(),
                external: "Assets:IN:Bank".to_string(),
                review: "Expenses:FixMe".to_string(),
            },
        }
    }

    fn trade(order_id: &str, kind: &str, symbol: &str, qty: &str, price: &str) -> Row {
        let mut row = Row::cash(
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            kind,
            d(qty) * d(price),
            "INR",
            "fill",
        );
        row.symbol = Some(symbol.to_string());
        row.quantity = Some(d(qty));
        row.price = Some(d(price));
        row.order_id = Some(order_id.to_string());
        row
    }

    #[test]
    fn fills_consolidate_into_one_transaction() {
        let rows = vec![
            trade("O1", "B", "INFY", "40", "10.00"),
            trade("O1", "B", "INFY", "60", "10.00"),
        ];
        let result = import_rows(rows, &profile(), &[]);
        assert_eq!(result.transactions.len(), 1);
        assert_eq!(result.transactions[0].narration, "Buy 100 INFY @ 10.00");
    }

    #[test]
    fn contract_charges_spread_across_orders() {
        // 30.00 over orders worth 700 and 300 -> 21.00 / 9.00.
        let rows = vec![
            trade("O1", "B", "INFY", "70", "10.00"),
            trade("O2", "B", "TCS", "30", "10.00"),
        ];
        let charges = vec![Charge::new("Brokerage", d("30.00"))];
        let result = import_rows(rows, &profile(), &charges);
        assert_eq!(result.transactions.len(), 2);

        let fee = |t: &Transaction| {
            t.postings
                .iter()
                .find(|p| p.account == "Expenses:IN:Fees:Brokerage")
                .and_then(|p| p.units.as_ref())
                .map(|u| u.number)
                .unwrap()
        };
        assert_eq!(fee(&result.transactions[0]), d("21.00"));
        assert_eq!(fee(&result.transactions[1]), d("9.00"));
    }

    #[test]
    fn trade_rows_missing_quantity_are_skipped_not_fatal() {
        let mut bad = trade("O1", "B", "INFY", "10", "10.00");
        bad.quantity = None;
        let good = trade("O2", "B", "TCS", "5", "100.00");
        let result = import_rows(vec![bad, good], &profile(), &[]);

        assert_eq!(result.diagnostics.rows_skipped, 1);
        assert_eq!(result.transactions.len(), 1);
    }

    #[test]
    fn unknown_kinds_surface_as_review_transactions() {
        let row = Row::cash(
            NaiveDate::from_ymd_opt(2025, 7, 2).unwrap(),
            "BONUS",
            d("10.00"),
            "INR",
            "bonus issue",
        );
        let result = import_rows(vec![row], &profile(), &[]);
        assert_eq!(result.diagnostics.unknown_kinds, 1);
        assert_eq!(result.transactions.len(), 1);
        assert!(result.transactions[0].tags.contains("needs-review"));
    }

    #[test]
    fn cash_and_trade_rows_keep_input_order() {
        let fee_row = Row::cash(
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            "FEE",
            d("15.00"),
            "INR",
            "account fee",
        );
        let rows = vec![
            trade("O1", "B", "INFY", "10", "10.00"),
            fee_row,
            trade("O2", "S", "TCS", "5", "100.00"),
        ];
        let result = import_rows(rows, &profile(), &[]);
        assert_eq!(result.transactions.len(), 3);
        assert!(result.transactions[0].narration.starts_with("Buy"));
        assert!(result.transactions[1].narration.starts_with("(FEE)"));
        assert!(result.transactions[2].narration.starts_with("Sell"));
    }

    #[test]
    fn per_sell_levy_is_appended_to_sell_orders_only() {
        let mut p = profile();
        p.per_sell_charge = Some(Charge::new("Demat", d("13.50")));
        let rows = vec![
            trade("O1", "B", "INFY", "10", "10.00"),
            trade("O2", "S", "INFY", "10", "12.00"),
        ];
        let result = import_rows(rows, &p, &[]);

        let demat = |t: &Transaction| {
            t.postings
                .iter()
                .any(|pst| pst.account == "Expenses:IN:Fees:Demat")
        };
        assert!(!demat(&result.transactions[0]));
        assert!(demat(&result.transactions[1]));
    }

    #[test]
    fn rerunning_the_pipeline_is_idempotent() {
        let rows = || {
            vec![
                trade("O1", "B", "INFY", "40", "10.00"),
                trade("O1", "B", "INFY", "60", "10.00"),
                trade("O2", "S", "TCS", "5", "100.00"),
            ]
        };
        let charges = vec![Charge::new("Brokerage", d("12.00"))];
        let a = import_rows(rows(), &profile(), &charges);
        let b = import_rows(rows(), &profile(), &charges);
        assert_eq!(a.transactions, b.transactions);
        assert_eq!(a.diagnostics, b.diagnostics);
    }

    #[test]
    fn every_emitted_transaction_balances() {
        let rows = vec![
            trade("O1", "B", "INFY", "40", "10.07"),
            trade("O1", "B", "INFY", "60", "10.11"),
            trade("O2", "S", "TCS", "5", "103.33"),
        ];
        let charges = vec![
            Charge::new("Brokerage", d("23.55")),
            Charge::new("STT", d("1.07")),
        ];
        let result = import_rows(rows, &profile(), &charges);
        assert_eq!(result.diagnostics.balance_errors, 0);
        assert_eq!(result.transactions.len(), 2);
    }
}
