use crate::classify::TxnKind;
use crate::consolidate::OrderGroup;
use crate::model::{quantize_money, quantize_quantity, Amount, Charge, Posting, Row, Transaction};
use crate::profile::BrokerProfile;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// A built transaction failed the zero-sum check. This indicates a defect in
/// classification or amount derivation, so the one transaction is dropped
/// and reported; the rest of the file continues.
#[derive(Debug)]
pub struct BalanceIssue {
    pub date: chrono::NaiveDate,
    pub symbol: String,
    pub residuals: Vec<Amount>,
}

impl std::fmt::Display for BalanceIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unbalanced transaction on {} ({}):", self.date, self.symbol)?;
        for r in &self.residuals {
            write!(f, " {} {}", r.number, r.commodity)?;
        }
        Ok(())
    }
}

/// Verify that non-elided postings sum to zero per currency, within one
/// minor unit. Exactly one elided leg is the sole legal imbalance; the
/// downstream ledger engine computes it.
pub fn check_balanced(
    postings: &[Posting],
    date: chrono::NaiveDate,
    symbol: &str,
    money_dp: u32,
) -> Result<(), BalanceIssue> {
    let elided = postings.iter().filter(|p| p.units.is_none()).count();
    if elided > 1 {
        return Err(BalanceIssue {
            date,
            symbol: symbol.to_string(),
            residuals: Vec::new(),
        });
    }
    if elided == 1 {
        // The engine computes the open leg; nothing to verify here.
        return Ok(());
    }

    let mut sums: BTreeMap<String, Decimal> = BTreeMap::new();
    for posting in postings {
        if let Some(weight) = posting.weight() {
            *sums.entry(weight.commodity).or_insert(Decimal::ZERO) += weight.number;
        }
    }

    let tolerance = Decimal::new(1, money_dp);
    let residuals: Vec<Amount> = sums
        .into_iter()
        .filter(|(_, sum)| sum.abs() > tolerance)
        .map(|(commodity, sum)| Amount { number: sum, commodity })
        .collect();

    if residuals.is_empty() {
        Ok(())
    } else {
        Err(BalanceIssue {
            date,
            symbol: symbol.to_string(),
            residuals,
        })
    }
}

/// Build one balanced transaction for a consolidated buy or sell order.
///
/// Buys open a position at the average trade price as cost basis; sells
/// close at the trade price with an elided gains leg so the ledger engine
/// books the realized gain or loss. Every named charge gets its own fee
/// posting for auditability.
pub fn build_trade(
    group: &OrderGroup,
    charges: &[Charge],
    profile: &BrokerProfile,
) -> Result<Transaction, BalanceIssue> {
    let dp = profile.money_dp;
    let quantity = quantize_quantity(group.total_quantity, profile.quantity_dp);
    let value = quantize_money(group.total_value, dp);
    // The per-unit basis stays at full precision: quantizing it to the money
    // scale would make `quantity * cost` drift from the cash leg on orders
    // whose fills traded at different prices, failing the balance check.
    let unit_price = if quantity.is_zero() {
        Decimal::ZERO
    } else {
        value / quantity
    };
    // Quantized form for the narration only; pin the scale so "10" prints
    // as "10.00".
    let mut display_price = quantize_money(unit_price, dp);
    display_price.rescale(dp);
    let currency = &group.currency;

    let mut fee_postings = Vec::new();
    let mut fee_total = Decimal::ZERO;
    for charge in charges {
        let amount = quantize_money(charge.amount, dp);
        if amount.is_zero() {
            continue;
        }
        fee_total += amount;
        fee_postings.push(Posting::simple(
            profile.accounts.fee_account(&charge.name),
            amount,
            currency,
        ));
    }

    let instrument = profile.accounts.instrument(&group.symbol);
    let mut postings = Vec::with_capacity(fee_postings.len() + 3);

    match group.direction {
        TxnKind::Buy => {
            let cash_out = value + fee_total;
            postings.push(Posting::simple(profile.accounts.cash.clone(), -cash_out, currency));
            postings.extend(fee_postings);
            postings.push(Posting {
                account: instrument,
                units: Some(Amount::new(quantity, &group.symbol)),
                cost: Some(Amount::new(unit_price, currency)),
                price: None,
            });
        }
        TxnKind::Sell => {
            let cash_in = value - fee_total;
            postings.push(Posting::simple(profile.accounts.cash.clone(), cash_in, currency));
            postings.extend(fee_postings);
            postings.push(Posting {
                account: instrument,
                units: Some(Amount::new(-quantity, &group.symbol)),
                cost: None,
                price: Some(Amount::new(unit_price, currency)),
            });
            postings.push(Posting::elided(profile.accounts.gains_for(&group.symbol)));
        }
        other => {
            // Consolidation only ever feeds buys and sells here.
            debug_assert!(false, "non-trade kind {:?} in build_trade", other);
        }
    }

    check_balanced(&postings, group.date, &group.symbol, dp)?;

    let narration = format!(
        "{} {} {} @ {}",
        group.direction.label(),
        quantity,
        group.symbol,
        display_price
    );
    let mut tags = BTreeSet::new();
    tags.insert("trade".to_string());
    Ok(Transaction::new(group.date, narration, tags, postings, &profile.id_prefix()))
}

/// Build one transaction for a cash-only row: dividends, interest, taxes,
/// fees, wires, and the needs-review fallback.
pub fn build_cash(
    kind: TxnKind,
    row: &Row,
    profile: &BrokerProfile,
) -> Result<Transaction, BalanceIssue> {
    let dp = profile.money_dp;
    let currency = &row.currency;
    let symbol = row.symbol.clone().unwrap_or_default();
    let gross = row.gross_amount.map(|g| quantize_money(g, dp));
    let tax = quantize_money(row.tax_withheld, dp);
    let commission = quantize_money(row.commission, dp);

    let mut tags = BTreeSet::new();
    let mut postings = Vec::new();

    match kind {
        TxnKind::Dividend => {
            let gross = gross.unwrap_or(Decimal::ZERO).abs();
            let net = gross - tax - commission;
            postings.push(Posting::simple(
                profile.accounts.dividends_for(&symbol),
                -gross,
                currency,
            ));
            if !tax.is_zero() {
                postings.push(Posting::simple(
                    profile.accounts.withholding_for(&symbol),
                    tax,
                    currency,
                ));
            }
            if !commission.is_zero() {
                postings.push(Posting::simple(
                    profile.accounts.fee_account("Commission"),
                    commission,
                    currency,
                ));
            }
            postings.push(Posting::simple(profile.accounts.cash.clone(), net, currency));
        }
        TxnKind::Interest => {
            let gross = gross.unwrap_or(Decimal::ZERO).abs();
            let net = gross - tax - commission;
            postings.push(Posting::simple(profile.accounts.interest.clone(), -gross, currency));
            if !tax.is_zero() {
                postings.push(Posting::simple(
                    profile.accounts.withholding_for(&symbol),
                    tax,
                    currency,
                ));
            }
            if !commission.is_zero() {
                postings.push(Posting::simple(
                    profile.accounts.fee_account("Commission"),
                    commission,
                    currency,
                ));
            }
            postings.push(Posting::simple(profile.accounts.cash.clone(), net, currency));
        }
        TxnKind::Tax => {
            let amount = gross.unwrap_or(Decimal::ZERO).abs();
            postings.push(Posting::simple(profile.accounts.cash.clone(), -amount, currency));
            postings.push(Posting::simple(
                profile.accounts.withholding_for(&symbol),
                amount,
                currency,
            ));
        }
        TxnKind::Fee => {
            let amount = gross.unwrap_or(Decimal::ZERO).abs();
            postings.push(Posting::simple(profile.accounts.cash.clone(), -amount, currency));
            postings.push(Posting::simple(profile.accounts.fees.clone(), amount, currency));
        }
        TxnKind::Wire => {
            // The signed amount carries the direction: positive flows into
            // the cash account, negative flows out.
            let amount = gross.unwrap_or(Decimal::ZERO);
            postings.push(Posting::simple(profile.accounts.cash.clone(), amount, currency));
            postings.push(Posting::simple(profile.accounts.external.clone(), -amount, currency));
        }
        TxnKind::Unknown => {
            tags.insert("needs-review".to_string());
            match gross {
                Some(amount) => {
                    postings.push(Posting::simple(profile.accounts.cash.clone(), -amount, currency));
                    postings.push(Posting::elided(profile.accounts.review.clone()));
                }
                None => {
                    // No amount to book, but the row must still surface for
                    // human follow-up.
                    postings.push(Posting::simple(
                        profile.accounts.review.clone(),
                        Decimal::ZERO,
                        currency,
                    ));
                    postings.push(Posting::elided(profile.accounts.cash.clone()));
                }
            }
        }
        TxnKind::Buy | TxnKind::Sell => {
            debug_assert!(false, "trade kinds are built from order groups");
        }
    }

    check_balanced(&postings, row.date, &symbol, dp)?;

    let narration = format!("({}) {}", row.kind.trim(), row.narration.trim());
    Ok(Transaction::new(row.date, narration, tags, postings, &profile.id_prefix()))
}
