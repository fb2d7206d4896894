use crate::model::{quantize_money, Charge};
use rust_decimal::Decimal;

/// Aggregate statement lines that describe totals rather than fees; these
/// never participate in allocation.
const NON_CHARGE_AGGREGATES: &[&str] = &[
    "pay in / pay out obligation",
    "pay-in/pay-out obligation",
    "net amount receivable",
    "net settlement amount",
];

pub fn is_aggregate_total(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    NON_CHARGE_AGGREGATES.iter().any(|a| lower.contains(a))
}

/// Allocate contract-level charges across order groups by value share.
///
/// Each group receives `charge * (group_value / total_value)` quantized to
/// the market's minor unit; the last group takes the rounding remainder so
/// the allocation is exactly conservative. A zero total value yields empty
/// allocations (and one recorded warning) instead of a division by zero.
///
/// Returns one charge list per group, in group order, plus the warning count.
pub fn allocate(charges: &[Charge], group_values: &[Decimal], money_dp: u32) -> (Vec<Vec<Charge>>, usize) {
    let mut allocations: Vec<Vec<Charge>> = vec![Vec::new(); group_values.len()];
    if group_values.is_empty() {
        return (allocations, 0);
    }

    let eligible: Vec<&Charge> = charges
        .iter()
        .filter(|c| !c.amount.is_zero() && !is_aggregate_total(&c.name))
        .collect();
    if eligible.is_empty() {
        return (allocations, 0);
    }

    let total: Decimal = group_values.iter().copied().sum();
    if total.is_zero() {
        tracing::warn!("total contract value is zero; charges left unallocated");
        return (allocations, 1);
    }

    let last = group_values.len() - 1;
    for charge in eligible {
        let mut allocated_so_far = Decimal::ZERO;
        for (i, value) in group_values.iter().enumerate() {
            let share = if i == last {
                charge.amount - allocated_so_far
            } else {
                let exact = charge.amount * (*value / total);
                quantize_money(exact, money_dp)
            };
            allocated_so_far += share;
            allocations[i].push(Charge::new(&charge.name, share));
        }
    }

    (allocations, 0)
}
