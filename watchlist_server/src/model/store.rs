//! Quote rows with a "current" marker.
//!
//! The store keeps every `QuoteRecord` ever committed for a watched symbol (bounded by a
//! per-symbol history limit). Reads return an `Arc` of the committed row set, so they
//! never wait on a fetch and never observe a half-applied cycle: `commit` builds the
//! next row set off to the side and swaps it in under a short write lock.
//!
//! Two implementations:
//! - `MemoryStore` — in-process only.
//! - `JsonFileStore` — a `MemoryStore` whose row set is persisted to a JSON file before
//!   each swap. If persisting fails the swap does not happen.

use crate::model::persist::{read_json, write_json_atomic};
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use watchlist_common::{QuoteRecord, Result, Symbol, WatchlistError};

/// Non-current rows kept per symbol when no limit is configured.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Symbols that currently have a current row.
pub type WatchlistSnapshot = BTreeSet<Symbol>;

/// One logical unit of store mutation produced by the reconciler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreWrites {
    /// New current rows; each retires the previous current row of its symbol.
    pub insert: Vec<QuoteRecord>,
    /// Symbols whose current row is flagged non-current and kept as history.
    pub retire: Vec<Symbol>,
    /// Symbols whose rows are all deleted.
    pub remove: Vec<Symbol>,
}

impl StoreWrites {
    /// Whether committing would change nothing.
    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.retire.is_empty() && self.remove.is_empty()
    }
}

/// Single-writer quote storage with snapshot reads.
pub trait QuoteStore: Send + Sync {
    /// Every stored row, oldest first.
    fn rows(&self) -> Arc<Vec<QuoteRecord>>;

    /// Apply `writes` as one unit. Returns the number of rows deleted.
    fn commit(&self, writes: &StoreWrites) -> Result<usize>;

    /// Current rows only, one per watched symbol, ordered by symbol.
    fn current(&self) -> Vec<QuoteRecord> {
        let mut rows: Vec<QuoteRecord> = self
            .rows()
            .iter()
            .filter(|r| r.is_current)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        rows
    }

    /// The set of watched symbols.
    fn snapshot(&self) -> WatchlistSnapshot {
        self.rows()
            .iter()
            .filter(|r| r.is_current)
            .map(|r| r.symbol.clone())
            .collect()
    }

    /// All rows of `symbol`, newest first.
    fn history(&self, symbol: &Symbol) -> Vec<QuoteRecord> {
        self.rows()
            .iter()
            .rev()
            .filter(|r| &r.symbol == symbol)
            .cloned()
            .collect()
    }
}

/// Compute the row set that results from applying `writes` to `rows`.
///
/// Returns the new rows and the number of rows deleted by `writes.remove`.
pub fn apply_writes(
    rows: &[QuoteRecord],
    writes: &StoreWrites,
    history_limit: usize,
) -> (Vec<QuoteRecord>, usize) {
    let mut next: Vec<QuoteRecord> = Vec::with_capacity(rows.len() + writes.insert.len());
    let mut removed = 0;
    for row in rows {
        if writes.remove.contains(&row.symbol) {
            removed += 1;
        } else {
            next.push(row.clone());
        }
    }

    let superseded: BTreeSet<&Symbol> = writes
        .retire
        .iter()
        .chain(writes.insert.iter().map(|r| &r.symbol))
        .collect();
    for row in next.iter_mut() {
        if row.is_current && superseded.contains(&row.symbol) {
            row.is_current = false;
        }
    }

    let mut inserted: BTreeSet<&Symbol> = BTreeSet::new();
    for row in &writes.insert {
        if writes.remove.contains(&row.symbol) || !inserted.insert(&row.symbol) {
            continue;
        }
        let mut row = row.clone();
        row.is_current = true;
        next.push(row);
    }

    trim_history(&mut next, history_limit);
    (next, removed)
}

/// Keep at most `limit` non-current rows per symbol, dropping the oldest.
fn trim_history(rows: &mut Vec<QuoteRecord>, limit: usize) {
    let mut seen: HashMap<Symbol, usize> = HashMap::new();
    let mut keep = vec![true; rows.len()];
    for (idx, row) in rows.iter().enumerate().rev() {
        if row.is_current {
            continue;
        }
        let count = seen.entry(row.symbol.clone()).or_insert(0);
        *count += 1;
        if *count > limit {
            keep[idx] = false;
        }
    }
    let mut flags = keep.into_iter();
    rows.retain(|_| flags.next().unwrap_or(true));
}

/// Demote all but the newest current row of each symbol.
///
/// Returns how many rows were demoted.
fn repair_current(rows: &mut [QuoteRecord]) -> usize {
    let mut newest: HashMap<Symbol, usize> = HashMap::new();
    for (idx, row) in rows.iter().enumerate() {
        if !row.is_current {
            continue;
        }
        match newest.get(&row.symbol) {
            Some(&prev) if rows[prev].as_of > row.as_of => {}
            _ => {
                newest.insert(row.symbol.clone(), idx);
            }
        }
    }
    let mut demoted = 0;
    for (idx, row) in rows.iter_mut().enumerate() {
        if row.is_current && newest.get(&row.symbol) != Some(&idx) {
            row.is_current = false;
            demoted += 1;
        }
    }
    demoted
}

/// In-process store.
pub struct MemoryStore {
    rows: RwLock<Arc<Vec<QuoteRecord>>>,
    // Serializes writers; readers only ever take `rows`.
    commit_lock: Mutex<()>,
    history_limit: usize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new(history_limit: usize) -> Self {
        Self::with_rows(Vec::new(), history_limit)
    }

    /// Create a store holding `rows`. Duplicate current rows are demoted.
    ///
    /// A `history_limit` of 0 is raised to 1 so a retired row is never dropped in the
    /// commit that retires it.
    pub fn with_rows(mut rows: Vec<QuoteRecord>, history_limit: usize) -> Self {
        let demoted = repair_current(&mut rows);
        if demoted > 0 {
            warn!("Demoted {} duplicate current rows", demoted);
        }
        Self {
            rows: RwLock::new(Arc::new(rows)),
            commit_lock: Mutex::new(()),
            history_limit: history_limit.max(1),
        }
    }

    /// Commit `writes`, calling `persist` with the new row set before it becomes visible.
    fn commit_with<F>(&self, writes: &StoreWrites, persist: F) -> Result<usize>
    where
        F: FnOnce(&[QuoteRecord]) -> Result<()>,
    {
        let _writer = self.commit_lock.lock();
        let (next, removed) = apply_writes(&self.rows(), writes, self.history_limit);
        persist(&next)?;
        debug!(
            "Committed {} inserts, {} retires, {} removals ({} rows total)",
            writes.insert.len(),
            writes.retire.len(),
            removed,
            next.len()
        );
        *self.rows.write() = Arc::new(next);
        Ok(removed)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl QuoteStore for MemoryStore {
    fn rows(&self) -> Arc<Vec<QuoteRecord>> {
        Arc::clone(&self.rows.read())
    }

    fn commit(&self, writes: &StoreWrites) -> Result<usize> {
        self.commit_with(writes, |_| Ok(()))
    }
}

/// On-disk layout of the store file.
#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    rows: Vec<QuoteRecord>,
}

const STORE_FILE_VERSION: u32 = 1;

/// Store persisted as a single JSON document.
pub struct JsonFileStore {
    inner: MemoryStore,
    path: PathBuf,
}

impl JsonFileStore {
    /// Open the store at `path`; a missing file is an empty store.
    pub fn open(path: impl AsRef<Path>, history_limit: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let rows = match read_json::<StoreFile>(&path)? {
            Some(file) if file.version == STORE_FILE_VERSION => file.rows,
            Some(file) => {
                return Err(WatchlistError::Store(format!(
                    "unsupported store version {} in {}",
                    file.version,
                    path.display()
                )));
            }
            None => Vec::new(),
        };
        debug!("Loaded {} quote rows from {}", rows.len(), path.display());
        Ok(Self {
            inner: MemoryStore::with_rows(rows, history_limit),
            path,
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QuoteStore for JsonFileStore {
    fn rows(&self) -> Arc<Vec<QuoteRecord>> {
        self.inner.rows()
    }

    fn commit(&self, writes: &StoreWrites) -> Result<usize> {
        let path = &self.path;
        self.inner.commit_with(writes, |rows| {
            let file = StoreFile {
                version: STORE_FILE_VERSION,
                rows: rows.to_vec(),
            };
            write_json_atomic(path, &file)
                .map_err(|e| WatchlistError::Store(format!("{}: {}", path.display(), e)))
        })
    }
}
