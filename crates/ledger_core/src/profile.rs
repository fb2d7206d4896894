use crate::classify::KindMap;
use crate::model::Charge;
use rust_decimal::Decimal;

/// Account name templates for one broker. Templates containing `{}` expand
/// with the instrument symbol; templates without one are used verbatim.
/// These are opaque configuration strings, the core never interprets them
/// beyond placeholder expansion.
#[derive(Debug, Clone)]
pub struct AccountTemplates {
    /// Root under which per-instrument position accounts live.
    pub root: String,
    pub cash: String,
    pub dividends: String,
    pub gains: String,
    pub fees: String,
    pub interest: String,
    pub withholding: String,
    pub external: String,
    /// Destination for unclassified input; keeps the ledger balanced while
    /// flagging the entry for human follow-up.
    pub review: String,
}

impl AccountTemplates {
    pub fn instrument(&self, symbol: &str) -> String {
        format!("{}:{}", self.root, symbol)
    }

    pub fn dividends_for(&self, symbol: &str) -> String {
        fill(&self.dividends, symbol)
    }

    pub fn gains_for(&self, symbol: &str) -> String {
        fill(&self.gains, symbol)
    }

    pub fn withholding_for(&self, symbol: &str) -> String {
        fill(&self.withholding, symbol)
    }

    /// Sub-account for one named charge, e.g. "Expenses:Fees:Brokerage".
    pub fn fee_account(&self, charge_name: &str) -> String {
        let component = sanitize_component(charge_name);
        if component.is_empty() {
            self.fees.clone()
        } else {
            format!("{}:{}", self.fees, component)
        }
    }
}

fn fill(template: &str, symbol: &str) -> String {
    if template.contains("{}") && !symbol.is_empty() {
        template.replace("{}", symbol)
    } else {
        template.replace(":{}", "").replace("{}", "")
    }
}

/// Turn an arbitrary charge label into a valid account component:
/// alphanumerics kept, word separators collapsed to single dashes.
fn sanitize_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Everything that varies per broker: the account layout, the currency and
/// its precision, the raw-label vocabulary, and the sign/fee conventions the
/// source uses. Each importer is this record plus a thin file parser.
#[derive(Debug, Clone)]
pub struct BrokerProfile {
    pub name: &'static str,
    pub currency: String,
    /// Minor-unit precision for monetary amounts in this market.
    pub money_dp: u32,
    pub quantity_dp: u32,
    /// Whether the source's gross amount already folds fees in. Sources
    /// disagree on this, so it is an explicit flag rather than a guess.
    pub fees_included_in_gross: bool,
    /// Fixed charge appended to every sell order (e.g. a depository's demat
    /// debit), when the broker levies one outside the contract charges.
    pub per_sell_charge: Option<Charge>,
    pub kinds: KindMap,
    pub accounts: AccountTemplates,
}

impl BrokerProfile {
    /// Uppercase short prefix used in import ids.
    pub fn id_prefix(&self) -> String {
        self.name.to_uppercase()
    }

    pub fn minor_unit(&self) -> Decimal {
        Decimal::new(1, self.money_dp)
    }
}
