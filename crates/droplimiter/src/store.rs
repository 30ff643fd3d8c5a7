//! # File Store
//!
//! The `file` inventory driver: a text table the game server reads and
//! writes, one item per line.
//!
//! ```text
//! # itemId|count|limit
//! 1234|2|3
//! 88|10|10
//! ```
//!
//! Comments and blank lines survive rewrites. Increments rewrite the whole
//! table through a sibling temporary file.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use droplimiter_core::{DeltaMap, InventoryRecord, InventoryStore, InventoryView, ItemId, LimiterError, LimiterResult};
use tracing::{debug, warn};

/// One line of the table.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Line {
    /// Comment or blank line, kept verbatim.
    Other(String),
    Record(ItemId, InventoryRecord),
}

/// Inventory stored in an `itemId|count|limit` text file.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a store over an existing table.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The table path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_lines(&self) -> LimiterResult<Vec<Line>> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            LimiterError::Storage(format!("failed to read store {}: {e}", self.path.display()))
        })?;

        let mut seen = HashSet::new();
        let mut lines = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                lines.push(Line::Other(raw.to_string()));
                continue;
            }

            let fail = |reason: String| {
                LimiterError::Storage(format!("store {} line {}: {reason}", self.path.display(), index + 1))
            };
            let (id, record) =
                parse_record(line).ok_or_else(|| fail(format!("expected [itemId|count|limit], found [{line}]")))?;
            if !seen.insert(id) {
                return Err(fail(format!("item {id} appears more than once")));
            }
            lines.push(Line::Record(id, record));
        }

        Ok(lines)
    }

    fn write_lines(&self, lines: &[Line]) -> LimiterResult<()> {
        let mut text = String::new();
        for line in lines {
            match line {
                Line::Other(raw) => text.push_str(raw),
                Line::Record(id, record) => text.push_str(&format!("{id}|{}|{}", record.count, record.limit)),
            }
            text.push('\n');
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        let fail = |e: std::io::Error| {
            LimiterError::Storage(format!("failed to write store {}: {e}", self.path.display()))
        };
        let mut file = File::create(&tmp).map_err(fail)?;
        file.write_all(text.as_bytes()).map_err(fail)?;
        file.sync_all().map_err(fail)?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(fail)
    }
}

fn parse_record(line: &str) -> Option<(ItemId, InventoryRecord)> {
    let mut fields = line.split('|').map(str::trim);
    let id = fields.next()?.parse().ok()?;
    let count = fields.next()?.parse().ok()?;
    let limit = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((id, InventoryRecord::new(count, limit)))
}

impl InventoryStore for FileStore {
    fn snapshot(&mut self, item_ids: &[ItemId]) -> LimiterResult<InventoryView> {
        let lines = self.read_lines()?;
        let records = lines.into_iter().filter_map(|line| match line {
            Line::Record(id, record) if item_ids.contains(&id) => Some((id, record)),
            _ => None,
        });
        let view = InventoryView::from_records(records);
        debug!("Read inventory for {} items from {}", item_ids.len(), self.path.display());
        Ok(view)
    }

    fn apply_increments(&mut self, deltas: &DeltaMap) -> LimiterResult<()> {
        if deltas.is_empty() {
            return Ok(());
        }

        let mut lines = self.read_lines()?;
        for (&item_id, &increment) in deltas {
            let existing = lines.iter_mut().find_map(|line| match line {
                Line::Record(id, record) if *id == item_id => Some(record),
                _ => None,
            });

            match existing {
                Some(record) => record.limit = record.limit.saturating_add(increment),
                None => {
                    warn!("Item {item_id} missing from store {}, adding it", self.path.display());
                    lines.push(Line::Record(item_id, InventoryRecord::new(0, increment)));
                }
            }
        }

        self.write_lines(&lines)?;
        debug!("Applied {} increments to {}", deltas.len(), self.path.display());
        Ok(())
    }
}
