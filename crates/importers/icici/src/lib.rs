use bank_csv::{BankCsvImporter, BankLayout, IdentifyRule};
use ledger_core::{
    AccountTemplates, BrokerProfile, ImportError, ImportResult, KindMap, StatementImporter,
    TxnKind,
};
use std::io::Read;
use std::path::Path;

pub const PARSER_NAME: &str = "icici";

/// Importer for ICICI Bank savings statements: one of the Indian bank CSV
/// layouts. A bank account has no instruments; every line is a signed cash
/// movement against an external counterparty.
pub struct IciciImporter {
    inner: BankCsvImporter,
}

impl IciciImporter {
    pub fn new(account_number: &str) -> Self {
        Self::with_profile(account_number, default_profile())
    }

    pub fn with_profile(account_number: &str, profile: BrokerProfile) -> Self {
        IciciImporter {
            inner: BankCsvImporter::new(layout(), profile, account_number),
        }
    }

    pub fn profile(&self) -> &BrokerProfile {
        self.inner.profile()
    }

    /// Whether the statement preamble names the configured account number.
    pub fn matches_account(&self, preamble: &str) -> bool {
        self.inner.matches_account(preamble)
    }

    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<ImportResult, ImportError> {
        self.inner.parse_file(path)
    }

    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<ImportResult, ImportError> {
        self.inner.parse_reader(reader)
    }
}

impl StatementImporter for IciciImporter {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn identify(&self, path: &Path) -> bool {
        self.inner.identify(path)
    }

    fn extract(&self, path: &Path) -> Result<ImportResult, ImportError> {
        self.inner.extract(path)
    }
}

/// Twelve preamble lines; the 12-digit account number sits in them and
/// drives identification.
fn layout() -> BankLayout {
    BankLayout {
        name: PARSER_NAME,
        preamble_lines: 12,
        date_column: "Value Date",
        date_format: "%d/%m/%Y",
        narration_column: "Transaction Remarks",
        debit_column: "Withdrawal Amount(INR)",
        credit_column: "Deposit Amount(INR)",
        identify: IdentifyRule::AccountScan {
            pattern: r"(\d{12})\s*\(.*\)\s*-",
            window: 12,
        },
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
            .with("deposit", TxnKind::Wire)
            .with("withdrawal", TxnKind::Wire),
        accounts: AccountTemplates {
            root: "Assets:IN:ICICIBank".to_string(),
            cash: "Assets:IN:ICICIBank:Savings".to_string(),
            dividends: "Income:IN:ICICIBank:{}:Dividend".to_string(),
            gains: "Income:IN:ICICIBank:{}:PnL".to_string(),
            fees: "Expenses:Financial:Fees:ICICIBank".to_string(),
            interest: "Income:IN:Interest:ICICIBank".to_string(),
            withholding: "Expenses:IN:WithholdingTax".to_string(),
            external: "Expenses:Uncategorized".to_string(),
            review: "Expenses:FixMe".to_string(),
        },
    }
}
