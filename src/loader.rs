use crate::error::{Result, SalesPivotError};
use crate::parser::parse_file;
use crate::schema::{BusinessMode, SalesRecord};
use log::{info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag for an in-flight batch load. Cloning hands out
/// another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Merged result of one batch load.
#[derive(Debug)]
pub struct LoadOutcome {
    pub records: Vec<SalesRecord>,
    /// One labelled message per file that could not be read. Never aborts
    /// the batch.
    pub file_errors: Vec<String>,
    pub elapsed: Duration,
}

/// Loads every spreadsheet sibling to `path` (or inside it, when `path` is a
/// directory), parsing files in parallel across the rayon pool. The branch
/// name of each file's records is its file stem. A missing or unreadable
/// directory is the only hard failure; per-file problems are collected in
/// [`LoadOutcome::file_errors`].
pub fn load_folder(
    path: &Path,
    mode_hint: Option<BusinessMode>,
    cancel: &CancelToken,
) -> Result<LoadOutcome> {
    let started = Instant::now();

    let folder = resolve_folder(path)?;
    let files = discover_spreadsheets(&folder)?;
    info!(
        "loading {} spreadsheet file(s) from {}",
        files.len(),
        folder.display()
    );

    let (records, file_errors) = parse_all(&files, cancel, |file| parse_file(file, mode_hint))?;

    for error in &file_errors {
        warn!("file skipped: {error}");
    }

    let elapsed = started.elapsed();
    info!(
        "loaded {} records from {} file(s) in {:.1}s ({} failed)",
        records.len(),
        files.len(),
        elapsed.as_secs_f64(),
        file_errors.len()
    );

    Ok(LoadOutcome {
        records,
        file_errors,
        elapsed,
    })
}

/// Data-parallel fan-out over the file list. Each task parses one file with
/// no shared mutable state; the collect is the single merge point, so task
/// completion order never affects the outcome. Once the token is cancelled
/// nothing is merged and the batch reports [`SalesPivotError::Cancelled`].
fn parse_all<F>(
    files: &[PathBuf],
    cancel: &CancelToken,
    parse: F,
) -> Result<(Vec<SalesRecord>, Vec<String>)>
where
    F: Fn(&Path) -> Result<Vec<SalesRecord>> + Sync,
{
    let results: Vec<std::result::Result<Vec<SalesRecord>, String>> = files
        .par_iter()
        .map(|file| {
            if cancel.is_cancelled() {
                return Ok(Vec::new());
            }
            parse(file).map_err(|err| {
                let label = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.display().to_string());
                format!("{label}: {err}")
            })
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(SalesPivotError::Cancelled);
    }

    let mut records = Vec::new();
    let mut file_errors = Vec::new();
    for result in results {
        match result {
            Ok(mut parsed) => records.append(&mut parsed),
            Err(message) => file_errors.push(message),
        }
    }

    Ok((records, file_errors))
}

fn resolve_folder(path: &Path) -> Result<PathBuf> {
    if path.is_dir() {
        return Ok(path.to_path_buf());
    }
    match path.parent() {
        Some(parent) if parent.is_dir() => Ok(parent.to_path_buf()),
        _ => Err(SalesPivotError::FolderNotFound(path.to_path_buf())),
    }
}

/// Candidate files share the `.xls*` extension family (xls, xlsx, xlsm, …).
/// Sorted for deterministic error reporting; record merge order is free.
fn discover_spreadsheets(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_spreadsheet = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase().starts_with("xls"))
            .unwrap_or(false);
        if is_spreadsheet {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
