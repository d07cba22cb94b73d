use csv::{ReaderBuilder, StringRecord, Trim, Writer};
use flame;
use log::{debug, info};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("cannot read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing column '{0}'")]
    MissingColumn(String),
    #[error("line {line}: column '{column}' has invalid value '{value}'")]
    InvalidValue {
        line: u64,
        column: &'static str,
        value: String,
    },
}

/// The benchmarked tree operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Search,
}

impl Operation {
    pub fn title(self) -> &'static str {
        match self {
            Operation::Insert => "AVL Tree Insert Operation",
            Operation::Search => "AVL Tree Search Operation",
        }
    }
}

/// Which of the recorded comparison counts: min, avg or max.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Best,
    Average,
    Worst,
}

impl Case {
    pub const ALL: [Case; 3] = [Case::Best, Case::Average, Case::Worst];

    pub fn label(self) -> &'static str {
        match self {
            Case::Best => "Best Case",
            Case::Average => "Average Case",
            Case::Worst => "Worst Case",
        }
    }
}

/// One line of the results file: comparison counts measured at dataset size `n`.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    pub n: i64,
    pub insert_min_comps: f64,
    pub insert_avg_comps: f64,
    pub insert_max_comps: f64,
    pub search_min_comps: f64,
    pub search_avg_comps: f64,
    pub search_max_comps: f64,
}

impl MeasurementRow {
    pub fn comps(&self, op: Operation, case: Case) -> f64 {
        match (op, case) {
            (Operation::Insert, Case::Best) => self.insert_min_comps,
            (Operation::Insert, Case::Average) => self.insert_avg_comps,
            (Operation::Insert, Case::Worst) => self.insert_max_comps,
            (Operation::Search, Case::Best) => self.search_min_comps,
            (Operation::Search, Case::Average) => self.search_avg_comps,
            (Operation::Search, Case::Worst) => self.search_max_comps,
        }
    }
}

pub fn series(rows: &[MeasurementRow], op: Operation, case: Case) -> Vec<f64> {
    rows.iter().map(|row| row.comps(op, case)).collect()
}

const COLUMNS: [&str; 7] = [
    "n",
    "InsertMinComps",
    "InsertAvgComps",
    "InsertMaxComps",
    "SearchMinComps",
    "SearchAvgComps",
    "SearchMaxComps",
];

// Rows are returned in file order, callers rely on that for the x axis.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<MeasurementRow>, ParseError> {
    let _span = flame::start_guard("load");
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(file);

    let headers = rdr.headers()?.clone();
    let mut index = [0usize; 7];
    for (slot, name) in index.iter_mut().zip(COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ParseError::MissingColumn(name.to_string()))?;
    }
    debug!("column positions in {}: {:?}", path.display(), index);

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());
        let n = field(&record, index[0], COLUMNS[0], line)?;
        let n = n.parse::<i64>().map_err(|_| ParseError::InvalidValue {
            line,
            column: COLUMNS[0],
            value: n.to_string(),
        })?;

        let mut comps = [0f64; 6];
        for (i, value) in comps.iter_mut().enumerate() {
            *value = count(&record, index[i + 1], COLUMNS[i + 1], line)?;
        }

        rows.push(MeasurementRow {
            n,
            insert_min_comps: comps[0],
            insert_avg_comps: comps[1],
            insert_max_comps: comps[2],
            search_min_comps: comps[3],
            search_avg_comps: comps[4],
            search_max_comps: comps[5],
        });
    }

    info!("loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Writes `rows` with the header `load` expects.
pub fn write_rows<P: AsRef<Path>>(path: P, rows: &[MeasurementRow]) -> Result<(), ParseError> {
    let mut wtr = Writer::from_path(path.as_ref())?;
    wtr.write_record(COLUMNS)?;
    for row in rows {
        wtr.write_record([
            row.n.to_string(),
            row.insert_min_comps.to_string(),
            row.insert_avg_comps.to_string(),
            row.insert_max_comps.to_string(),
            row.search_min_comps.to_string(),
            row.search_avg_comps.to_string(),
            row.search_max_comps.to_string(),
        ])?;
    }
    wtr.flush()?;
    info!("wrote {} rows to {}", rows.len(), path.as_ref().display());
    Ok(())
}

fn field<'r>(
    record: &'r StringRecord,
    idx: usize,
    column: &'static str,
    line: u64,
) -> Result<&'r str, ParseError> {
    record.get(idx).ok_or(ParseError::InvalidValue {
        line,
        column,
        value: String::new(),
    })
}

fn count(
    record: &StringRecord,
    idx: usize,
    column: &'static str,
    line: u64,
) -> Result<f64, ParseError> {
    let raw = field(record, idx, column, line)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(ParseError::InvalidValue {
            line,
            column,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
fn write_input(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.csv");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn loads_rows_in_file_order() {
    let (_dir, path) = write_input(
        "n,InsertMinComps,InsertAvgComps,InsertMaxComps,SearchMinComps,SearchAvgComps,SearchMaxComps\n\
         5,1,2.2,3,1,2.6,4\n\
         50,1,5.48,8,1,5.9,7\n\
         500,1,8.874,12,2,8.4,11\n",
    );
    let rows = load(&path).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[0],
        MeasurementRow {
            n: 5,
            insert_min_comps: 1.0,
            insert_avg_comps: 2.2,
            insert_max_comps: 3.0,
            search_min_comps: 1.0,
            search_avg_comps: 2.6,
            search_max_comps: 4.0,
        }
    );
    assert_eq!(rows[2].n, 500);
    assert_eq!(rows[2].insert_avg_comps, 8.874);
    assert_eq!(
        series(&rows, Operation::Search, Case::Worst),
        vec![4.0, 7.0, 11.0]
    );
}

#[test]
fn columns_are_found_by_name() {
    let (_dir, path) = write_input(
        "SearchMaxComps, n ,InsertAvgComps,InsertMinComps,Extra,InsertMaxComps,SearchMinComps,SearchAvgComps\n\
         9, 10 ,4,1,x,7,2,5\n",
    );
    let rows = load(&path).unwrap();
    assert_eq!(rows[0].n, 10);
    assert_eq!(rows[0].insert_min_comps, 1.0);
    assert_eq!(rows[0].insert_avg_comps, 4.0);
    assert_eq!(rows[0].search_max_comps, 9.0);
}

#[test]
fn header_only_is_empty() {
    let (_dir, path) = write_input(
        "n,InsertMinComps,InsertAvgComps,InsertMaxComps,SearchMinComps,SearchAvgComps,SearchMaxComps\n",
    );
    assert!(load(&path).unwrap().is_empty());
}

#[test]
fn missing_column_is_rejected() {
    let (_dir, path) = write_input(
        "n,InsertMinComps,InsertAvgComps,InsertMaxComps,SearchMinComps,SearchAvgComps\n\
         5,1,2,3,1,2\n",
    );
    match load(&path) {
        Err(ParseError::MissingColumn(name)) => assert_eq!(name, "SearchMaxComps"),
        other => panic!("expected missing column, got {:?}", other),
    }
}

#[test]
fn non_numeric_value_is_rejected() {
    let (_dir, path) = write_input(
        "n,InsertMinComps,InsertAvgComps,InsertMaxComps,SearchMinComps,SearchAvgComps,SearchMaxComps\n\
         5,1,2,3,1,2,3\n\
         50,1,abc,3,1,2,3\n",
    );
    match load(&path) {
        Err(ParseError::InvalidValue { line, column, value }) => {
            assert_eq!(line, 3);
            assert_eq!(column, "InsertAvgComps");
            assert_eq!(value, "abc");
        }
        other => panic!("expected invalid value, got {:?}", other),
    }
}

#[test]
fn fractional_size_is_rejected() {
    let (_dir, path) = write_input(
        "n,InsertMinComps,InsertAvgComps,InsertMaxComps,SearchMinComps,SearchAvgComps,SearchMaxComps\n\
         5.5,1,2,3,1,2,3\n",
    );
    assert!(matches!(
        load(&path),
        Err(ParseError::InvalidValue { column: "n", .. })
    ));
}

#[test]
fn nan_count_is_rejected() {
    let (_dir, path) = write_input(
        "n,InsertMinComps,InsertAvgComps,InsertMaxComps,SearchMinComps,SearchAvgComps,SearchMaxComps\n\
         5,1,NaN,3,1,2,3\n",
    );
    assert!(matches!(load(&path), Err(ParseError::InvalidValue { .. })));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load(dir.path().join("nope.csv")),
        Err(ParseError::Io(_))
    ));
}

#[test]
fn negative_count_is_rejected() {
    let (_dir, path) = write_input(
        "n,InsertMinComps,InsertAvgComps,InsertMaxComps,SearchMinComps,SearchAvgComps,SearchMaxComps\n\
         5,-7,2,3,1,2,3\n",
    );
    match load(&path) {
        Err(ParseError::InvalidValue { column, value, .. }) => {
            assert_eq!(column, "InsertMinComps");
            assert_eq!(value, "-7");
        }
        other => panic!("expected invalid value, got {:?}", other),
    }
}

#[test]
fn written_rows_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.csv");
    let rows = vec![
        MeasurementRow {
            n: 5,
            insert_min_comps: 0.0,
            insert_avg_comps: 1.4,
            insert_max_comps: 3.0,
            search_min_comps: 1.0,
            search_avg_comps: 2.75,
            search_max_comps: 4.0,
        },
        MeasurementRow {
            n: 50,
            insert_min_comps: 0.0,
            insert_avg_comps: 4.38,
            insert_max_comps: 7.0,
            search_min_comps: 1.0,
            search_avg_comps: 5.9,
            search_max_comps: 7.0,
        },
    ];
    write_rows(&path, &rows).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with(
        "n,InsertMinComps,InsertAvgComps,InsertMaxComps,SearchMinComps,SearchAvgComps,SearchMaxComps\n5,0,1.4,3,"
    ));
    assert_eq!(load(&path).unwrap(), rows);
}
