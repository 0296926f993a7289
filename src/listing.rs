//! Filtering, natural multi-key sorting, and table rendering for lock
//! lists returned by `/get-locks`.
//!
//! Pure functions over in-memory [`LockRecord`]s; no I/O.

use std::cmp::Ordering;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::repo::{relative_to, to_system_independent};

/// A lock as reported by the lock authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub filename: String,
    pub branch: String,
    #[serde(default)]
    pub date_created: Option<String>,
    pub owner: LockOwner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    pub username: String,
    pub fullname: String,
}

impl LockRecord {
    /// `Full Name (@username)`
    pub fn owner_label(&self) -> String {
        format!("{} (@{})", self.owner.fullname, self.owner.username)
    }
}

/// Sort key accepted by `--sort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Path,
    Branch,
    Author,
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "path" | "p" => Ok(SortKey::Path),
            "branch" | "b" => Ok(SortKey::Branch),
            "author" | "a" => Ok(SortKey::Author),
            other => Err(Error::InvalidSortKey(other.to_string())),
        }
    }
}

/// Parse a comma-separated `--sort` value. `path` is always appended as the
/// final tiebreak.
pub fn parse_sort_keys(spec: Option<&str>) -> Result<Vec<SortKey>> {
    let mut keys = match spec {
        Some(spec) => spec
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<SortKey>>>()?,
        None => Vec::new(),
    };
    keys.push(SortKey::Path);
    Ok(keys)
}

/// Compare two records by each key in turn; the first difference decides.
pub fn compare_records(keys: &[SortKey], a: &LockRecord, b: &LockRecord) -> Ordering {
    for key in keys {
        let ordering = match key {
            SortKey::Path => natural_cmp(&a.filename, &b.filename),
            SortKey::Branch => natural_cmp(&a.branch, &b.branch),
            SortKey::Author => a
                .owner
                .username
                .to_lowercase()
                .cmp(&b.owner.username.to_lowercase()),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Stable sort by a composite key.
pub fn sort_records(records: &mut [LockRecord], keys: &[SortKey]) {
    records.sort_by(|a, b| compare_records(keys, a, b));
}

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Text(String),
    Number(&'a str),
}

/// Split into alternating text and digit runs, always starting with text.
fn natural_chunks(value: &str) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let mut text_start = 0;
    let mut iter = value.char_indices().peekable();

    while let Some((index, c)) = iter.next() {
        if !c.is_ascii_digit() {
            continue;
        }
        let mut end = index + c.len_utf8();
        while let Some(&(next_index, next)) = iter.peek() {
            if !next.is_ascii_digit() {
                break;
            }
            end = next_index + next.len_utf8();
            iter.next();
        }
        chunks.push(Chunk::Text(value[text_start..index].to_lowercase()));
        chunks.push(Chunk::Number(&value[index..end]));
        text_start = end;
    }
    chunks.push(Chunk::Text(value[text_start..].to_lowercase()));
    chunks
}

fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Natural ordering: digit runs compare as integers, the rest
/// case-insensitively. `file2` sorts before `file10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let left = natural_chunks(a);
    let right = natural_chunks(b);

    for (x, y) in left.iter().zip(right.iter()) {
        let ordering = match (x, y) {
            (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
            (Chunk::Number(x), Chunk::Number(y)) => compare_digits(x, y),
            // Chunks alternate identically on both sides.
            (Chunk::Text(_), Chunk::Number(_)) => Ordering::Less,
            (Chunk::Number(_), Chunk::Text(_)) => Ordering::Greater,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}

/// Path filter for `softlock locks <pathspec>`.
#[derive(Debug, Clone)]
pub enum PathFilter {
    /// `.`: locks under the working directory (given relative to the root)
    UnderDirectory(String),
    /// Shell glob against the repository-relative filename
    Glob(glob::Pattern),
}

impl PathFilter {
    /// Build the filter for a pathspec. `cwd_relative` is the working
    /// directory relative to the repository root (`.` at the root).
    pub fn from_pathspec(pathspec: &str, cwd_relative: &str) -> Result<Self> {
        if pathspec == "." {
            let prefix = if cwd_relative == "." { "" } else { cwd_relative };
            return Ok(PathFilter::UnderDirectory(prefix.to_string()));
        }

        glob::Pattern::new(pathspec)
            .map(PathFilter::Glob)
            .map_err(|err| Error::InvalidArgument(format!("invalid pathspec '{pathspec}': {err}")))
    }

    pub fn matches(&self, record: &LockRecord) -> bool {
        match self {
            PathFilter::UnderDirectory(prefix) => record.filename.starts_with(prefix.as_str()),
            PathFilter::Glob(pattern) => pattern.matches(&record.filename),
        }
    }
}

pub fn filter_by_path(records: Vec<LockRecord>, filter: &PathFilter) -> Vec<LockRecord> {
    records.into_iter().filter(|r| filter.matches(r)).collect()
}

pub fn filter_by_owner(records: Vec<LockRecord>, username: &str) -> Vec<LockRecord> {
    records
        .into_iter()
        .filter(|r| r.owner.username == username)
        .collect()
}

pub fn filter_by_branch(records: Vec<LockRecord>, branch: &str) -> Vec<LockRecord> {
    records.into_iter().filter(|r| r.branch == branch).collect()
}

/// The filters selected on the command line.
#[derive(Debug, Clone, Default)]
pub struct LockFilter {
    pub path: Option<PathFilter>,
    pub owner: Option<String>,
    pub branch: Option<String>,
}

impl LockFilter {
    pub fn apply(&self, mut records: Vec<LockRecord>) -> Vec<LockRecord> {
        if let Some(path) = &self.path {
            records = filter_by_path(records, path);
        }
        if let Some(owner) = &self.owner {
            records = filter_by_owner(records, owner);
        }
        if let Some(branch) = &self.branch {
            records = filter_by_branch(records, branch);
        }
        records
    }
}

/// Rewrite repository-relative filenames relative to `cwd`.
pub fn relativize_filenames(records: &mut [LockRecord], root: &Path, cwd: &Path) {
    for record in records {
        let absolute = root.join(&record.filename);
        record.filename = to_system_independent(&relative_to(&absolute, cwd));
    }
}

const FILE_HEADER: &str = "File";
const BRANCH_HEADER: &str = "Branch";
const OWNER_HEADER: &str = "Owner";

/// Render the `File / Branch / Owner` table.
pub fn render_table(records: &[LockRecord]) -> String {
    let file_width = records
        .iter()
        .map(|r| r.filename.chars().count())
        .chain(std::iter::once(FILE_HEADER.len()))
        .max()
        .unwrap_or(FILE_HEADER.len());
    let branch_width = records
        .iter()
        .map(|r| r.branch.chars().count())
        .chain(std::iter::once(BRANCH_HEADER.len()))
        .max()
        .unwrap_or(BRANCH_HEADER.len());

    let row = |file: &str, branch: &str, owner: &str| {
        format!("{file:<file_width$}   {branch:<branch_width$}   {owner}")
    };

    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(row(FILE_HEADER, BRANCH_HEADER, OWNER_HEADER));
    for record in records {
        lines.push(row(&record.filename, &record.branch, &record.owner_label()));
    }
    lines.join("\n")
}
