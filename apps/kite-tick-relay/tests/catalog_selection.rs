//! Catalog Loading and Selection Integration Tests
//!
//! Runs real CSV files through the loader and the top-N selector.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;

use tempfile::NamedTempFile;

use kite_tick_relay::{
    InstrumentFilter, RelayContext, UNKNOWN_SYMBOL, load_filtered, select_top_n,
};

const HEADER: &str = "instrument_token,exchange_token,tradingsymbol,name,last_price,expiry,strike,tick_size,lot_size,instrument_type,segment,exchange";

fn write_catalog(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file.flush().unwrap();
    file
}

fn nse_eq(token: u32, symbol: &str) -> String {
    format!("{token},{token},{symbol},{symbol} LTD,0,,0,0.05,1,EQ,NSE,NSE")
}

fn select(rows: &[String], limit: usize) -> Vec<u32> {
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    let file = write_catalog(&refs);
    let load = load_filtered(file.path(), InstrumentFilter::default()).unwrap();
    select_top_n(load.records, limit).subscription.tokens().to_vec()
}

#[test]
fn selects_in_symbol_order() {
    let rows = [nse_eq(101, "ZETA"), nse_eq(102, "ALPHA")];
    assert_eq!(select(&rows, 200), vec![102, 101]);
}

#[test]
fn limit_keeps_first_symbols() {
    let rows = [nse_eq(101, "ZETA"), nse_eq(102, "ALPHA")];
    assert_eq!(select(&rows, 1), vec![102]);
}

#[test]
fn other_markets_and_types_are_excluded() {
    let rows = [
        nse_eq(101, "ZETA"),
        "103,3,AAA,AAA LTD,0,,0,0.05,1,EQ,BSE,BSE".to_string(),
        "104,4,AAB24JANFUT,AAB,0,2024-01-25,0,0.05,50,FUT,NFO-FUT,NFO".to_string(),
    ];
    assert_eq!(select(&rows, 200), vec![101]);
}

#[test]
fn empty_match_gives_empty_subscription() {
    let rows = ["103,3,AAA,AAA LTD,0,,0,0.05,1,EQ,BSE,BSE".to_string()];
    assert!(select(&rows, 200).is_empty());
}

#[test]
fn malformed_rows_do_not_abort_selection() {
    let rows = [
        "xyz,1,BROKEN,BROKEN,0,,0,0.05,1,EQ,NSE,NSE".to_string(),
        nse_eq(101, "ZETA"),
        nse_eq(102, "ALPHA"),
    ];
    assert_eq!(select(&rows, 200), vec![102, 101]);
}

#[test]
fn selection_is_deterministic() {
    let rows: Vec<String> = ["mango", "Apple", "apple", "BANANA", "_UNDER", "3M"]
        .iter()
        .enumerate()
        .map(|(i, s)| nse_eq(u32::try_from(i).unwrap() + 1, s))
        .collect();

    let first = select(&rows, 4);
    let second = select(&rows, 4);

    assert_eq!(first, second);
    // _UNDER, 3M, apple, Apple
    assert_eq!(first, vec![5, 6, 3, 2]);
}

#[test]
fn context_names_selected_tokens_only() {
    let file = write_catalog(&[&nse_eq(101, "ZETA"), &nse_eq(102, "ALPHA")]);
    let load = load_filtered(file.path(), InstrumentFilter::default()).unwrap();
    let context = RelayContext::new(select_top_n(load.records, 1));

    assert_eq!(context.symbols().resolve(102), "ALPHA");
    assert_eq!(context.symbols().resolve(101), UNKNOWN_SYMBOL);
}
