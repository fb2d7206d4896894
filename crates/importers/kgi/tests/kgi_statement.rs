use kgi::KgiImporter;
use rust_decimal::Decimal;

const STATEMENT: &str = "\
Symbol,TransactionDate,TransactionType,Quantity,Price,Value,Commission,Tax,Amount,Description\n\
PTT,10/03/2025,BUY,\"1,000\",35.50,\"35,500.00\",56.80,,\"-35,556.80\",PTT PCL\n\
PTT,21/03/2025,SELL,500,37.00,\"18,500.00\",29.60,,\"18,470.40\",PTT PCL\n\
AOT,28/03/2025,Dividend,,,100.00,,10.00,90.00,AOT interim dividend\n\
,31/03/2025,Interest,,,12.40,,1.86,10.54,Cash balance interest\n\
";

fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn units(txn: &ledger_core::Transaction, account: &str) -> Decimal {
    txn.postings
        .iter()
        .find(|p| p.account == account)
        .and_then(|p| p.units.as_ref())
        .map(|u| u.number)
        .unwrap_or_else(|| panic!("no posting with units for {}", account))
}

#[test]
fn comma_grouped_numbers_parse_exactly() {
    let importer = KgiImporter::new();
    let result = importer.parse_reader(STATEMENT.as_bytes()).unwrap();

    assert_eq!(result.transactions.len(), 4);
    assert_eq!(result.diagnostics.rows_skipped, 0);
    assert_eq!(result.diagnostics.balance_errors, 0);

    let buy = &result.transactions[0];
    // 35,500.00 value + 56.80 commission
    assert_eq!(units(buy, "Assets:TH:Investment:KGI:Cash"), d("-35556.80"));
    let inst = buy
        .postings
        .iter()
        .find(|p| p.account == "Assets:TH:Investment:KGI:PTT")
        .unwrap();
    assert_eq!(inst.units.as_ref().unwrap().number, d("1000"));
    assert_eq!(inst.cost.as_ref().unwrap().number, d("35.50"));
}

#[test]
fn sell_nets_commission_out_of_proceeds() {
    let importer = KgiImporter::new();
    let result = importer.parse_reader(STATEMENT.as_bytes()).unwrap();
    let sell = &result.transactions[1];

    assert_eq!(units(sell, "Assets:TH:Investment:KGI:Cash"), d("18470.40"));
    assert_eq!(
        units(sell, "Expenses:Financial:Fees:KGI:Commission"),
        d("29.60")
    );
    assert!(sell
        .postings
        .iter()
        .any(|p| p.account == "Income:TH:Investment:PTT:PnL" && p.units.is_none()));
}

#[test]
fn dividend_withholding_is_split_out() {
    let importer = KgiImporter::new();
    let result = importer.parse_reader(STATEMENT.as_bytes()).unwrap();
    let dividend = &result.transactions[2];

    assert_eq!(
        units(dividend, "Income:TH:Investment:AOT:Dividend"),
        d("-100.00")
    );
    assert_eq!(
        units(dividend, "Expenses:TH:WithholdingTax:AOT"),
        d("10.00")
    );
    assert_eq!(units(dividend, "Assets:TH:Investment:KGI:Cash"), d("90.00"));
}

#[test]
fn interest_withholding_uses_the_bare_template() {
    let importer = KgiImporter::new();
    let result = importer.parse_reader(STATEMENT.as_bytes()).unwrap();
    let interest = &result.transactions[3];

    assert_eq!(units(interest, "Income:TH:Interest:KGI"), d("-12.40"));
    // No symbol on the row, so the placeholder collapses.
    assert_eq!(units(interest, "Expenses:TH:WithholdingTax"), d("1.86"));
    assert_eq!(
        units(interest, "Assets:TH:Investment:KGI:Cash"),
        d("10.54")
    );
}
