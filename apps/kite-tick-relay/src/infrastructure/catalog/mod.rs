//! Instrument Catalog Loader
//!
//! Reads the Kite instrument dump (CSV with a header row) and yields the
//! rows that match an [`InstrumentFilter`], in file order.
//!
//! # Columns
//!
//! Only `exchange`, `instrument_type`, `instrument_token` and
//! `tradingsymbol` are read; any other columns are ignored.
//!
//! # Malformed Rows
//!
//! Rows that cannot be parsed, or that match the filter but carry a
//! non-integer token, are yielded as [`CatalogError::Malformed`].
//! [`load_filtered`] logs and skips them; rows rejected by the filter are
//! never parsed further, so a bad token on a non-matching row is ignored.
//! A header missing one of the required columns fails the whole load.
//!
//! An I/O error while reading is [`CatalogError::Unavailable`] and ends
//! the iteration.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::instrument::{InstrumentFilter, InstrumentRecord, InstrumentToken};
use crate::infrastructure::metrics;

const REQUIRED_COLUMNS: [&str; 4] = [
    "exchange",
    "instrument_type",
    "instrument_token",
    "tradingsymbol",
];

/// Catalog loading errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The file cannot be opened or read.
    #[error("instrument catalog {path} unavailable: {source}")]
    Unavailable {
        /// Catalog path.
        path: PathBuf,
        /// Underlying reader error.
        #[source]
        source: csv::Error,
    },

    /// A row (or the header) cannot be parsed into the expected fields.
    #[error("malformed catalog line {line}: {reason}")]
    Malformed {
        /// 1-based line number in the file.
        line: u64,
        /// What was wrong with it.
        reason: String,
    },
}

/// Raw row with only the columns the relay uses.
#[derive(Debug, Deserialize)]
struct CatalogRow {
    exchange: String,
    instrument_type: String,
    instrument_token: String,
    tradingsymbol: String,
}

/// Lazy iterator over the filtered catalog.
pub struct CatalogRecords<R = File> {
    path: PathBuf,
    headers: csv::StringRecord,
    rows: csv::StringRecordsIntoIter<R>,
    filter: InstrumentFilter,
    done: bool,
}

impl<R: Read> Iterator for CatalogRecords<R> {
    type Item = Result<InstrumentRecord, CatalogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let record = match self.rows.next()? {
                Ok(record) => record,
                Err(e) if e.is_io_error() => {
                    self.done = true;
                    return Some(Err(CatalogError::Unavailable {
                        path: self.path.clone(),
                        source: e,
                    }));
                }
                Err(e) => {
                    let line = e.position().map_or(0, csv::Position::line);
                    return Some(Err(CatalogError::Malformed {
                        line,
                        reason: e.to_string(),
                    }));
                }
            };
            let line = record.position().map_or(0, csv::Position::line);

            let row: CatalogRow = match record.deserialize(Some(&self.headers)) {
                Ok(row) => row,
                Err(e) => {
                    return Some(Err(CatalogError::Malformed {
                        line,
                        reason: e.to_string(),
                    }));
                }
            };

            if !self.filter.matches(&row.exchange, &row.instrument_type) {
                continue;
            }

            return Some(parse_row(row, line));
        }
    }
}

fn parse_row(row: CatalogRow, line: u64) -> Result<InstrumentRecord, CatalogError> {
    let token: InstrumentToken =
        row.instrument_token
            .parse()
            .map_err(|e| CatalogError::Malformed {
                line,
                reason: format!("instrument_token {:?}: {e}", row.instrument_token),
            })?;

    if row.tradingsymbol.is_empty() {
        return Err(CatalogError::Malformed {
            line,
            reason: "empty tradingsymbol".to_string(),
        });
    }

    Ok(InstrumentRecord {
        token,
        symbol: row.tradingsymbol,
        market: row.exchange,
        instrument_type: row.instrument_type,
    })
}

/// Open the catalog and return a lazy iterator over matching rows.
///
/// # Errors
///
/// Returns `CatalogError::Unavailable` if the file cannot be opened or its
/// header cannot be read, and `CatalogError::Malformed` if the header lacks
/// a required column.
pub fn open(path: &Path, filter: InstrumentFilter) -> Result<CatalogRecords, CatalogError> {
    let file = File::open(path).map_err(|e| CatalogError::Unavailable {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    read_catalog(file, path, filter)
}

fn read_catalog<R: Read>(
    source: R,
    path: &Path,
    filter: InstrumentFilter,
) -> Result<CatalogRecords<R>, CatalogError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|source| CatalogError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|column| !headers.iter().any(|h| h == **column))
    {
        return Err(CatalogError::Malformed {
            line: 1,
            reason: format!("missing column {missing}"),
        });
    }

    Ok(CatalogRecords {
        path: path.to_path_buf(),
        headers,
        rows: reader.into_records(),
        filter,
        done: false,
    })
}

/// Result of a full catalog load.
#[derive(Debug, Clone, Default)]
pub struct CatalogLoad {
    /// Matching records in file order.
    pub records: Vec<InstrumentRecord>,
    /// Number of malformed rows that were skipped.
    pub skipped: usize,
}

/// Load every matching row, skipping malformed ones with a warning.
///
/// # Errors
///
/// Returns the same errors as [`open`], plus `CatalogError::Unavailable`
/// when reading fails part way through. Malformed rows never abort the load.
pub fn load_filtered(path: &Path, filter: InstrumentFilter) -> Result<CatalogLoad, CatalogError> {
    let load = collect_records(open(path, filter)?)?;

    tracing::info!(
        path = %path.display(),
        matched = load.records.len(),
        skipped = load.skipped,
        "Instrument catalog loaded"
    );
    Ok(load)
}

fn collect_records<R: Read>(records: CatalogRecords<R>) -> Result<CatalogLoad, CatalogError> {
    let mut load = CatalogLoad::default();

    for item in records {
        match item {
            Ok(record) => load.records.push(record),
            Err(e @ CatalogError::Malformed { .. }) => {
                tracing::warn!(error = %e, "Skipping catalog row");
                load.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if load.skipped > 0 {
        metrics::record_catalog_rows_skipped(load.skipped);
    }
    Ok(load)
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, Write};

    use tempfile::NamedTempFile;

    use super::*;

    const HEADER: &str = "instrument_token,exchange_token,tradingsymbol,name,last_price,expiry,strike,tick_size,lot_size,instrument_type,segment,exchange";

    fn catalog(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn yields_matching_rows_in_file_order() {
        let file = catalog(&[
            "101,1,ZETA,ZETA LTD,0,,0,0.05,1,EQ,NSE,NSE",
            "102,2,ALPHA,ALPHA LTD,0,,0,0.05,1,EQ,NSE,NSE",
            "103,3,BETA,BETA LTD,0,,0,0.05,1,EQ,BSE,BSE",
            "104,4,NIFTY24JANFUT,NIFTY,0,2024-01-25,0,0.05,50,FUT,NFO-FUT,NFO",
        ]);

        let records: Vec<_> = open(file.path(), InstrumentFilter::default())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            records,
            vec![
                InstrumentRecord::new(101, "ZETA", "NSE", "EQ"),
                InstrumentRecord::new(102, "ALPHA", "NSE", "EQ"),
            ]
        );
    }

    #[test]
    fn malformed_token_is_skipped() {
        let file = catalog(&[
            "abc,1,BROKEN,BROKEN,0,,0,0.05,1,EQ,NSE,NSE",
            "102,2,ALPHA,ALPHA LTD,0,,0,0.05,1,EQ,NSE,NSE",
        ]);

        let load = load_filtered(file.path(), InstrumentFilter::default()).unwrap();

        assert_eq!(load.skipped, 1);
        assert_eq!(load.records.len(), 1);
        assert_eq!(load.records[0].token, 102);
    }

    #[test]
    fn malformed_token_reports_line() {
        let file = catalog(&["-5,1,NEG,NEG,0,,0,0.05,1,EQ,NSE,NSE"]);

        let err = open(file.path(), InstrumentFilter::default())
            .unwrap()
            .next()
            .unwrap()
            .unwrap_err();

        assert!(matches!(err, CatalogError::Malformed { line: 2, .. }));
    }

    #[test]
    fn non_matching_rows_are_not_validated() {
        let file = catalog(&["oops,1,BETA,BETA,0,,0,0.05,1,EQ,BSE,BSE"]);

        let load = load_filtered(file.path(), InstrumentFilter::default()).unwrap();

        assert_eq!(load.skipped, 0);
        assert!(load.records.is_empty());
    }

    #[test]
    fn short_row_is_skipped() {
        let file = catalog(&[
            "101,1,ZETA",
            "102,2,ALPHA,ALPHA LTD,0,,0,0.05,1,EQ,NSE,NSE",
        ]);

        let load = load_filtered(file.path(), InstrumentFilter::default()).unwrap();

        assert_eq!(load.skipped, 1);
        assert_eq!(load.records.len(), 1);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = open(
            Path::new("/nonexistent/instruments.csv"),
            InstrumentFilter::default(),
        )
        .err()
        .unwrap();

        assert!(matches!(err, CatalogError::Unavailable { .. }));
    }

    #[test]
    fn missing_column_fails_load() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "instrument_token,tradingsymbol,exchange").unwrap();
        writeln!(file, "101,ZETA,NSE").unwrap();
        file.flush().unwrap();

        let err = open(file.path(), InstrumentFilter::default()).err().unwrap();

        assert!(matches!(err, CatalogError::Malformed { line: 1, .. }));
        assert!(err.to_string().contains("instrument_type"));
    }

    #[test]
    fn custom_filter() {
        let file = catalog(&[
            "101,1,ZETA,ZETA LTD,0,,0,0.05,1,EQ,NSE,NSE",
            "103,3,BETA,BETA LTD,0,,0,0.05,1,EQ,BSE,BSE",
        ]);

        let load = load_filtered(file.path(), InstrumentFilter::new("BSE", "EQ")).unwrap();

        assert_eq!(load.records.len(), 1);
        assert_eq!(load.records[0].symbol, "BETA");
    }

    /// Serves its data once, then fails every read.
    struct FailingReader(Cursor<Vec<u8>>);

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.read(buf)? {
                0 => Err(io::Error::other("device error")),
                n => Ok(n),
            }
        }
    }

    fn failing_catalog() -> FailingReader {
        FailingReader(Cursor::new(
            format!("{HEADER}\n101,1,ZETA,ZETA LTD,0,,0,0.05,1,EQ,NSE,NSE\n").into_bytes(),
        ))
    }

    #[test]
    fn read_error_mid_file_ends_iteration() {
        let mut records = read_catalog(
            failing_catalog(),
            Path::new("instruments.csv"),
            InstrumentFilter::default(),
        )
        .unwrap();

        assert_eq!(records.next().unwrap().unwrap().token, 101);
        assert!(matches!(
            records.next(),
            Some(Err(CatalogError::Unavailable { .. }))
        ));
        assert!(records.next().is_none());
    }

    #[test]
    fn read_error_mid_file_fails_load() {
        let records = read_catalog(
            failing_catalog(),
            Path::new("instruments.csv"),
            InstrumentFilter::default(),
        )
        .unwrap();

        let err = collect_records(records).unwrap_err();

        match err {
            CatalogError::Unavailable { path, .. } => {
                assert_eq!(path, Path::new("instruments.csv"));
            }
            other => panic!("expected unavailable, got {other:?}"),
        }
    }
}
