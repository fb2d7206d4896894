use ledger_core::{StatementImporter, Transaction};
use rust_decimal::Decimal;
use zerodha::ZerodhaImporter;

fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn units(txn: &Transaction, account: &str) -> Decimal {
    txn.postings
        .iter()
        .find(|p| p.account == account)
        .and_then(|p| p.units.as_ref())
        .map(|u| u.number)
        .unwrap_or_else(|| panic!("no posting with units for {}", account))
}

fn note(contracts: &str) -> String {
    format!(
        "<contract_note>\
           <issuer><name>Zerodha Broking Limited</name></issuer>\
           <contracts>{}</contracts>\
         </contract_note>",
        contracts
    )
}

fn trade(instrument: &str, id: &str, order: &str, side: &str, qty: &str, price: &str, value: &str) -> String {
    format!(
        "<trade instrument_id=\"{}\">\
           <id>{}</id><order_id>{}</order_id><type>{}</type>\
           <quantity>{}</quantity><average_price>{}</average_price><value>{}</value>\
         </trade>",
        instrument, id, order, side, qty, price, value
    )
}

fn grandtotal(name: &str, value: &str) -> String {
    format!(
        "<grandtotal><name>{}</name><type>charge</type><value>{}</value></grandtotal>",
        name, value
    )
}

fn contract(id: &str, date: &str, trades: &str, totals: &str) -> String {
    format!(
        "<contract><id>{}</id><timestamp>{}</timestamp>\
           <trades>{}</trades>\
           <totals><grandtotals>{}</grandtotals></totals>\
         </contract>",
        id, date, trades, totals
    )
}

#[test]
fn split_fills_consolidate_into_one_buy() {
    let xml = note(&contract(
        "CNT-1",
        "2025-07-01",
        &format!(
            "{}{}",
            trade("NSE:INFY - EQ / INE009A01021", "T1", "O1", "B", "40", "10.00", "400.00"),
            trade("NSE:INFY - EQ / INE009A01021", "T2", "O1", "B", "60", "10.00", "600.00"),
        ),
        &grandtotal("Brokerage", "12.00"),
    ));

    let importer = ZerodhaImporter::new();
    let result = importer.parse_reader(xml.as_bytes()).unwrap();

    assert_eq!(result.transactions.len(), 1);
    assert_eq!(result.diagnostics.balance_errors, 0);

    let buy = &result.transactions[0];
    assert_eq!(buy.narration, "Buy 100 INFY @ 10.00");
    assert_eq!(units(buy, "Assets:IN:Zerodha:Cash"), d("-1012.00"));
    assert_eq!(
        units(buy, "Expenses:Financial:Fees:Zerodha:Brokerage"),
        d("12.00")
    );

    let inst = buy
        .postings
        .iter()
        .find(|p| p.account == "Assets:IN:Zerodha:INFY")
        .unwrap();
    assert_eq!(inst.units.as_ref().unwrap().number, d("100"));
    assert_eq!(inst.units.as_ref().unwrap().commodity, "INFY");
    assert_eq!(inst.cost.as_ref().unwrap().number, d("10.00"));
}

#[test]
fn contract_charges_split_by_order_value() {
    // 30.00 brokerage over orders worth 700 and 300; the obligation and the
    // zero-value line never show up as fees.
    let xml = note(&contract(
        "CNT-2",
        "2025-07-02",
        &format!(
            "{}{}",
            trade("NSE:INFY - EQ / INE009A01021", "T1", "O1", "B", "70", "10.00", "700.00"),
            trade("NSE:TCS - EQ / INE467B01029", "T2", "O2", "B", "30", "10.00", "300.00"),
        ),
        &format!(
            "{}{}{}",
            grandtotal("Brokerage", "30.00"),
            grandtotal("PAY IN / PAY OUT OBLIGATION", "1000.00"),
            grandtotal("SEBI Turnover Fees", "0.00"),
        ),
    ));

    let importer = ZerodhaImporter::new();
    let result = importer.parse_reader(xml.as_bytes()).unwrap();
    assert_eq!(result.transactions.len(), 2);

    let brokerage = |t: &Transaction| units(t, "Expenses:Financial:Fees:Zerodha:Brokerage");
    assert_eq!(brokerage(&result.transactions[0]), d("21.00"));
    assert_eq!(brokerage(&result.transactions[1]), d("9.00"));

    for txn in &result.transactions {
        assert!(!txn
            .postings
            .iter()
            .any(|p| p.account.contains("PAY-IN") || p.account.contains("SEBI")));
    }
}

#[test]
fn sells_carry_the_demat_charge_and_an_elided_gains_leg() {
    let xml = note(&contract(
        "CNT-3",
        "2025-07-03",
        &format!(
            "{}{}",
            trade("NSE:INFY - EQ / INE009A01021", "T1", "O1", "B", "10", "10.00", "100.00"),
            trade("NSE:INFY - EQ / INE009A01021", "T2", "O2", "S", "10", "12.00", "120.00"),
        ),
        "",
    ));

    let importer = ZerodhaImporter::new();
    let result = importer.parse_reader(xml.as_bytes()).unwrap();
    assert_eq!(result.transactions.len(), 2);

    let buy = &result.transactions[0];
    assert!(!buy
        .postings
        .iter()
        .any(|p| p.account == "Expenses:Financial:Fees:Zerodha:Demat"));

    let sell = &result.transactions[1];
    assert_eq!(
        units(sell, "Expenses:Financial:Fees:Zerodha:Demat"),
        d("13.50")
    );
    assert_eq!(units(sell, "Assets:IN:Zerodha:Cash"), d("106.50"));

    let inst = sell
        .postings
        .iter()
        .find(|p| p.account == "Assets:IN:Zerodha:INFY")
        .unwrap();
    assert_eq!(inst.units.as_ref().unwrap().number, d("-10"));
    assert_eq!(inst.price.as_ref().unwrap().number, d("12.00"));
    assert!(sell
        .postings
        .iter()
        .any(|p| p.account == "Income:IN:Zerodha:INFY:PnL" && p.units.is_none()));
}

#[test]
fn charges_never_bleed_across_contracts() {
    let xml = note(&format!(
        "{}{}",
        contract(
            "CNT-4",
            "2025-07-04",
            &trade("NSE:INFY - EQ / INE009A01021", "T1", "O1", "B", "10", "10.00", "100.00"),
            &grandtotal("Brokerage", "5.00"),
        ),
        contract(
            "CNT-5",
            "2025-07-05",
            &trade("NSE:TCS - EQ / INE467B01029", "T2", "O2", "B", "10", "20.00", "200.00"),
            &grandtotal("Brokerage", "7.00"),
        ),
    ));

    let importer = ZerodhaImporter::new();
    let result = importer.parse_reader(xml.as_bytes()).unwrap();
    assert_eq!(result.transactions.len(), 2);

    let brokerage = |t: &Transaction| units(t, "Expenses:Financial:Fees:Zerodha:Brokerage");
    assert_eq!(brokerage(&result.transactions[0]), d("5.00"));
    assert_eq!(brokerage(&result.transactions[1]), d("7.00"));
}

#[test]
fn non_contract_note_xml_is_refused() {
    let importer = ZerodhaImporter::new();
    let err = importer
        .parse_reader("<statement><row/></statement>".as_bytes())
        .unwrap_err();
    assert!(err.to_string().contains("contract_note"));
}

#[test]
fn identify_requires_the_zerodha_issuer() {
    let importer = ZerodhaImporter::new();
    let dir = std::env::temp_dir();

    let good = dir.join("zerodha_identify_good.xml");
    std::fs::write(&good, note("")).unwrap();
    assert!(importer.identify(&good));

    let other_issuer = note("").replace("Zerodha Broking Limited", "Some Other Broker");
    let bad = dir.join("zerodha_identify_bad.xml");
    std::fs::write(&bad, other_issuer).unwrap();
    assert!(!importer.identify(&bad));

    let wrong_ext = dir.join("zerodha_identify.csv");
    std::fs::write(&wrong_ext, note("")).unwrap();
    assert!(!importer.identify(&wrong_ext));

    let _ = std::fs::remove_file(good);
    let _ = std::fs::remove_file(bad);
    let _ = std::fs::remove_file(wrong_ext);
}

#[test]
fn reimporting_the_same_note_yields_the_same_ids() {
    let xml = note(&contract(
        "CNT-6",
        "2025-07-06",
        &trade("NSE:INFY - EQ / INE009A01021", "T1", "O1", "B", "10", "10.00", "100.00"),
        &grandtotal("Brokerage", "5.00"),
    ));

    let importer = ZerodhaImporter::new();
    let a = importer.parse_reader(xml.as_bytes()).unwrap();
    let b = importer.parse_reader(xml.as_bytes()).unwrap();

    assert_eq!(a.transactions[0].import_id, b.transactions[0].import_id);
    assert!(a.transactions[0].import_id.starts_with("ZERODHA-"));
}
