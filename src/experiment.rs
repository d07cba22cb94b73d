use csv::{ReaderBuilder, Trim};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::avl::AvlTree;
use crate::parse::{write_rows, MeasurementRow, ParseError};

pub const DATASET_SIZES: [usize; 5] = [5, 50, 500, 5000, 50000];

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("knowledge base {0} has no entries")]
    EmptyDataset(PathBuf),
    #[error("query file {0} has no terms")]
    NoQueries(PathBuf),
    #[error("nothing was measured")]
    NoMeasurements,
}

/// A knowledge base statement, ordered by its term only.
#[derive(Debug, Clone)]
pub struct Entry {
    pub term: String,
    pub statement: String,
    pub confidence: f64,
}

impl Entry {
    pub fn new(term: &str, statement: &str, confidence: f64) -> Self {
        Entry {
            term: term.to_string(),
            statement: statement.to_string(),
            confidence,
        }
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.term == other.term
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.term.cmp(&other.term)
    }
}

impl Borrow<str> for Entry {
    fn borrow(&self) -> &str {
        &self.term
    }
}

#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub data: PathBuf,
    pub queries: PathBuf,
    pub output: PathBuf,
    pub sizes: Vec<usize>,
    pub seed: Option<u64>,
}

/// Reads `term<TAB>statement<TAB>confidence` lines, skipping lines with fewer fields.
pub fn load_entries<P: AsRef<Path>>(path: P) -> Result<Vec<Entry>, ParseError> {
    let _span = flame::start_guard("load_entries");
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_path(path.as_ref())?;

    let mut entries = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.len() < 3 {
            continue;
        }
        let line = record.position().map_or(0, |p| p.line());
        let confidence = record[2]
            .parse::<f64>()
            .map_err(|_| ParseError::InvalidValue {
                line,
                column: "confidence",
                value: record[2].to_string(),
            })?;
        entries.push(Entry::new(&record[0], &record[1], confidence));
    }
    info!("loaded {} entries from {}", entries.len(), path.as_ref().display());
    Ok(entries)
}

pub fn load_queries<P: AsRef<Path>>(path: P) -> Result<Vec<String>, ParseError> {
    let input = fs::read_to_string(path)?;
    Ok(input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn random_subset<R: Rng + ?Sized>(entries: &[Entry], n: usize, rng: &mut R) -> Vec<Entry> {
    entries.choose_multiple(rng, n).cloned().collect()
}

fn min_avg_max(values: &[usize]) -> Option<(f64, f64, f64)> {
    let min = *values.iter().min()?;
    let max = *values.iter().max()?;
    let avg = values.iter().sum::<usize>() as f64 / values.len() as f64;
    Some((min as f64, avg, max as f64))
}

/// Inserts `entries` one by one, then searches every query, recording the
/// comparisons of each single operation.
pub fn measure(
    n: usize,
    entries: Vec<Entry>,
    queries: &[String],
) -> Result<MeasurementRow, ExperimentError> {
    let mut tree = AvlTree::new();

    let mut insert_comparisons = Vec::with_capacity(entries.len());
    for entry in entries {
        tree.reset_counters();
        tree.insert(entry);
        insert_comparisons.push(tree.insert_comparisons());
    }

    let mut search_comparisons = Vec::with_capacity(queries.len());
    for query in queries {
        tree.reset_counters();
        tree.search(query.as_str());
        search_comparisons.push(tree.search_comparisons());
    }

    let (insert_min, insert_avg, insert_max) =
        min_avg_max(&insert_comparisons).ok_or(ExperimentError::NoMeasurements)?;
    let (search_min, search_avg, search_max) =
        min_avg_max(&search_comparisons).ok_or(ExperimentError::NoMeasurements)?;

    Ok(MeasurementRow {
        n: n as i64,
        insert_min_comps: insert_min,
        insert_avg_comps: insert_avg,
        insert_max_comps: insert_max,
        search_min_comps: search_min,
        search_avg_comps: search_avg,
        search_max_comps: search_max,
    })
}

/// Measures every configured size in ascending order and writes the results CSV.
pub fn run(config: &ExperimentConfig) -> Result<Vec<MeasurementRow>, ExperimentError> {
    let _span = flame::start_guard("experiment");
    let entries = load_entries(&config.data)?;
    if entries.is_empty() {
        return Err(ExperimentError::EmptyDataset(config.data.clone()));
    }
    let queries = load_queries(&config.queries)?;
    if queries.is_empty() {
        return Err(ExperimentError::NoQueries(config.queries.clone()));
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut sizes = config.sizes.clone();
    sizes.sort_unstable();
    sizes.dedup();

    let mut rows = Vec::with_capacity(sizes.len());
    for n in sizes {
        if n > entries.len() {
            warn!(
                "only {} entries available, size {} uses all of them",
                entries.len(),
                n
            );
        }
        let subset = random_subset(&entries, n, &mut rng);
        let row = measure(n, subset, &queries)?;
        debug!("{:?}", row);
        rows.push(row);
    }

    write_rows(&config.output, &rows)?;
    Ok(rows)
}

#[cfg(test)]
fn terms(list: &[&str]) -> Vec<Entry> {
    list.iter().map(|t| Entry::new(t, "is a thing", 1.0)).collect()
}

#[test]
fn measure_counts_single_operations() {
    let queries = vec!["b".to_string(), "a".to_string(), "zzz".to_string()];
    let row = measure(3, terms(&["b", "a", "c"]), &queries).unwrap();
    assert_eq!(row.n, 3);
    assert_eq!(row.insert_min_comps, 0.0);
    assert!((row.insert_avg_comps - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(row.insert_max_comps, 1.0);
    assert_eq!(row.search_min_comps, 1.0);
    assert!((row.search_avg_comps - 5.0 / 3.0).abs() < 1e-9);
    assert_eq!(row.search_max_comps, 2.0);
}

#[test]
fn measure_without_queries_fails() {
    assert!(matches!(
        measure(1, terms(&["a"]), &[]),
        Err(ExperimentError::NoMeasurements)
    ));
}

#[test]
fn subset_is_capped_and_distinct() {
    let entries = terms(&["a", "b", "c", "d"]);
    let mut rng = StdRng::seed_from_u64(1);
    let mut subset = random_subset(&entries, 3, &mut rng);
    assert_eq!(subset.len(), 3);
    subset.sort();
    subset.dedup();
    assert_eq!(subset.len(), 3);
    assert_eq!(random_subset(&entries, 10, &mut rng).len(), 4);
}

#[test]
fn entries_skip_short_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kb.txt");
    fs::write(
        &path,
        "cat\tCats are \"mammals\".\t0.95\nbroken line\ndog\tDogs bark.\t1.0\n",
    )
    .unwrap();
    let entries = load_entries(&path).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].statement, "Cats are \"mammals\".");
    assert_eq!(entries[1].confidence, 1.0);
}

#[test]
fn bad_confidence_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kb.txt");
    fs::write(&path, "cat\tCats purr.\thigh\n").unwrap();
    assert!(matches!(
        load_entries(&path),
        Err(ParseError::InvalidValue { column: "confidence", .. })
    ));
}

#[test]
fn run_writes_loadable_results() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("kb.txt");
    let queries = dir.path().join("queries.txt");
    let output = dir.path().join("results.csv");
    let kb: String = (0..200)
        .map(|i| format!("term{:03}\tstatement {}\t0.5\n", i, i))
        .collect();
    fs::write(&data, kb).unwrap();
    fs::write(&queries, "term007\nterm150\nmissing\n\n").unwrap();

    let config = ExperimentConfig {
        data,
        queries,
        output: output.clone(),
        sizes: vec![100, 5, 50, 5],
        seed: Some(42),
    };
    let rows = run(&config).unwrap();
    assert_eq!(rows.iter().map(|r| r.n).collect::<Vec<_>>(), vec![5, 50, 100]);
    for row in &rows {
        assert!(row.insert_min_comps <= row.insert_avg_comps);
        assert!(row.insert_avg_comps <= row.insert_max_comps);
        assert!(row.search_min_comps >= 1.0);
        assert!(row.search_avg_comps <= row.search_max_comps);
    }
    assert_eq!(crate::parse::load(&output).unwrap(), rows);
}

#[test]
fn empty_query_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("kb.txt");
    let queries = dir.path().join("queries.txt");
    fs::write(&data, "cat\tCats purr.\t0.9\n").unwrap();
    fs::write(&queries, "\n").unwrap();
    let config = ExperimentConfig {
        data,
        queries,
        output: dir.path().join("results.csv"),
        sizes: vec![1],
        seed: Some(1),
    };
    assert!(matches!(run(&config), Err(ExperimentError::NoQueries(_))));
}
