use crate::classify::TxnKind;
use crate::model::Row;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Rows consolidated under one logical trade order.
///
/// Brokers split large orders into multiple fills on the wire; grouping them
/// back yields one clean ledger transaction per order.
#[derive(Debug, Clone)]
pub struct OrderGroup {
    pub order_id: Option<String>,
    pub direction: TxnKind,
    pub symbol: String,
    pub date: NaiveDate,
    pub currency: String,
    pub trade_ids: Vec<String>,
    pub total_quantity: Decimal,
    pub total_value: Decimal,
    /// Sum of per-row commissions across the fills.
    pub commission: Decimal,
    pub fills: usize,
}

impl OrderGroup {
    pub fn average_price(&self) -> Decimal {
        if self.total_quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.total_value / self.total_quantity
        }
    }
}

/// Grouping key. Splitting by symbol on top of (order id, direction) guards
/// against malformed files that reuse an order id across instruments; that
/// favors correctness over aggressive consolidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Order(String, TxnKind, String),
    /// Rows without an order id never merge with anything.
    Singleton(usize),
}

/// Accumulates trade rows into order groups, preserving first-seen order.
#[derive(Debug, Default)]
pub struct Consolidator {
    groups: Vec<OrderGroup>,
    index: HashMap<GroupKey, usize>,
    next_singleton: usize,
}

impl Consolidator {
    pub fn new() -> Self {
        Consolidator::default()
    }

    /// Add one fill. `value` is the trade value the caller derived for the
    /// row (gross or quantity*price, per the source's convention).
    ///
    /// Returns the index of the group the row landed in; a new index means a
    /// new group was opened at the end of the list.
    pub fn push(&mut self, row: &Row, direction: TxnKind, value: Decimal) -> usize {
        let symbol = row.symbol.clone().unwrap_or_default();
        let key = match &row.order_id {
            Some(id) => GroupKey::Order(id.clone(), direction, symbol.clone()),
            None => {
                self.next_singleton += 1;
                GroupKey::Singleton(self.next_singleton)
            }
        };

        if let Some(&idx) = self.index.get(&key) {
            let group = &mut self.groups[idx];
            group.total_quantity += row.quantity.unwrap_or(Decimal::ZERO).abs();
            group.total_value += value;
            group.commission += row.commission;
            group.fills += 1;
            if let Some(tid) = &row.trade_id {
                group.trade_ids.push(tid.clone());
            }
            return idx;
        }

        let idx = self.groups.len();
        self.groups.push(OrderGroup {
            order_id: row.order_id.clone(),
            direction,
            symbol,
            date: row.date,
            currency: row.currency.clone(),
            trade_ids: row.trade_id.iter().cloned().collect(),
            total_quantity: row.quantity.unwrap_or(Decimal::ZERO).abs(),
            total_value: value,
            commission: row.commission,
            fills: 1,
        });
        self.index.insert(key, idx);
        idx
    }

    /// Finish grouping. Zero-quantity groups are discarded; the remap gives
    /// each original group index its surviving position, or `None` for a
    /// discard, so callers holding indexes from `push` can follow along.
    pub fn finish(self) -> (Vec<OrderGroup>, Vec<Option<usize>>) {
        let mut groups = Vec::with_capacity(self.groups.len());
        let mut remap = Vec::with_capacity(self.groups.len());
        for group in self.groups {
            if group.total_quantity.is_zero() {
                tracing::warn!(
                    order_id = group.order_id.as_deref().unwrap_or("-"),
                    symbol = %group.symbol,
                    "dropped zero-quantity order group"
                );
                remap.push(None);
            } else {
                remap.push(Some(groups.len()));
                groups.push(group);
            }
        }
        (groups, remap)
    }
}
