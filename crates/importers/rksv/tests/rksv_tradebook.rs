use ledger_core::StatementImporter;
use rksv::RksvImporter;
use rust_decimal::Decimal;
use std::path::Path;

const HEADER: &str = "trade_date,tradingsymbol,trade_type,quantity,price,amount,fees,order_id\n";

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
fn fills_of_one_order_become_one_buy() {
    let importer = RksvImporter::new();
    let statement = format!(
        "{}\
         2025-04-07,TCS,buy,40,10.00,400.00,3.00,O1\n\
         2025-04-07,TCS,buy,60,10.00,600.00,4.50,O1\n",
        HEADER
    );
    let result = importer.parse_reader(statement.as_bytes()).unwrap();

    assert_eq!(result.transactions.len(), 1);
    assert_eq!(result.diagnostics.balance_errors, 0);

    let buy = &result.transactions[0];
    // Fees sit on top of the trade amount, so cash moves by both.
    assert_eq!(units(buy, "Assets:IN:RKSV:Cash"), d("-1007.50"));
    assert_eq!(
        units(buy, "Expenses:Financial:Fees:RKSV:Commission"),
        d("7.50")
    );
    let inst = buy
        .postings
        .iter()
        .find(|p| p.account == "Assets:IN:RKSV:TCS")
        .unwrap();
    assert_eq!(inst.units.as_ref().unwrap().number, d("100"));
    assert_eq!(inst.cost.as_ref().unwrap().number, d("10"));
}

#[test]
fn sell_nets_fees_and_leaves_pnl_open() {
    let importer = RksvImporter::new();
    let statement = format!("{}2025-04-09,INFY,sell,5,100.00,500.00,2.00,O2\n", HEADER);
    let result = importer.parse_reader(statement.as_bytes()).unwrap();

    assert_eq!(result.transactions.len(), 1);
    let sell = &result.transactions[0];
    assert_eq!(units(sell, "Assets:IN:RKSV:Cash"), d("498.00"));
    assert_eq!(units(sell, "Assets:IN:RKSV:INFY"), d("-5"));
    assert!(sell
        .postings
        .iter()
        .any(|p| p.account == "Income:IN:RKSV:INFY:PnL" && p.units.is_none()));
}

#[test]
fn separate_orders_stay_separate() {
    let importer = RksvImporter::new();
    let statement = format!(
        "{}\
         2025-04-07,TCS,buy,40,10.00,400.00,3.00,O1\n\
         2025-04-07,TCS,buy,10,10.20,102.00,1.00,O3\n",
        HEADER
    );
    let result = importer.parse_reader(statement.as_bytes()).unwrap();
    assert_eq!(result.transactions.len(), 2);
}

#[test]
fn identify_wants_the_dated_filename() {
    let importer = RksvImporter::new();
    assert!(importer.identify(Path::new("rksv20250407.csv")));
    assert!(importer.identify(Path::new("statements/rksv20250407.csv")));
    assert!(!importer.identify(Path::new("rksv2025.csv")));
    assert!(!importer.identify(Path::new("kgi20250407.csv")));
    assert!(!importer.identify(Path::new("rksv20250407.xml")));
}

#[test]
fn wrong_header_is_a_format_error() {
    let importer = RksvImporter::new();
    let err = importer
        .parse_reader("Symbol,Date,Type\n".as_bytes())
        .unwrap_err();
    assert!(matches!(err, ledger_core::ImportError::Format { .. }));
}
