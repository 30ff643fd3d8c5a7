//! # History Ledger
//!
//! **The durable memory of every limited drop**
//!
//! The ledger holds the timestamp of the previous run and one event per
//! successful drop of an item that has a limit. Unlimited items never touch
//! it.
//!
//! ## Rolling Windows
//!
//! Expiration is always evaluated against a *simulated* instant handed in by
//! the engine, never against the wall clock. A single run may expire the same
//! item several times at successive window boundaries.
//!
//! ## Format
//!
//! ```text
//! 1718000000          <- last run, seconds since the Unix epoch
//! 1234|1717990000     <- item id | drop timestamp
//! 1234|1717995000
//! ```
//!
//! The file is always rewritten in full through a sibling temporary file, so
//! a crash mid-write leaves the previous ledger intact.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{LimiterError, LimiterResult};
use crate::table::{DropSpec, DropTable, ItemId};

/// One successful drop of a limited item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DropEvent {
    /// The item that dropped.
    pub item_id: ItemId,
    /// Simulated instant of the drop, seconds since the Unix epoch.
    pub timestamp: i64,
}

impl DropEvent {
    /// Creates an event.
    #[inline]
    #[must_use]
    pub const fn new(item_id: ItemId, timestamp: i64) -> Self {
        Self { item_id, timestamp }
    }
}

/// Last run timestamp plus the unordered set of past drop events.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ledger {
    last_run: i64,
    events: Vec<DropEvent>,
}

impl Ledger {
    /// Creates an empty ledger stamped with `last_run`.
    #[must_use]
    pub const fn new(last_run: i64) -> Self {
        Self {
            last_run,
            events: Vec::new(),
        }
    }

    /// Creates a ledger with existing events.
    #[must_use]
    pub fn with_events(last_run: i64, events: Vec<DropEvent>) -> Self {
        Self { last_run, events }
    }

    /// Timestamp of the previous run.
    #[inline]
    #[must_use]
    pub const fn last_run(&self) -> i64 {
        self.last_run
    }

    /// Moves the last run timestamp forward. Never moves it backwards.
    pub fn advance_to(&mut self, now: i64) {
        self.last_run = self.last_run.max(now);
    }

    /// All events, in no particular order.
    #[must_use]
    pub fn events(&self) -> &[DropEvent] {
        &self.events
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if there are no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events recorded for an item.
    #[must_use]
    pub fn count_for(&self, item_id: ItemId) -> usize {
        self.events.iter().filter(|e| e.item_id == item_id).count()
    }

    /// Removes every event of `spec`'s item older than its limit window as of
    /// `as_of`, returning how many were removed.
    ///
    /// An event is expired when `as_of - timestamp > window`; an event
    /// exactly one window old still counts. Unlimited specs expire nothing.
    pub fn expire(&mut self, spec: &DropSpec, as_of: i64) -> usize {
        let Some(limit) = spec.limit else {
            return 0;
        };
        let window = i64::try_from(limit.window.to_seconds()).unwrap_or(i64::MAX);

        let before = self.events.len();
        self.events
            .retain(|e| e.item_id != spec.item_id || as_of.saturating_sub(e.timestamp) <= window);
        before - self.events.len()
    }

    /// Returns true if `spec` has a limit and at least `limit.max` events.
    ///
    /// Call [`Ledger::expire`] for the same instant first.
    #[must_use]
    pub fn is_maxed(&self, spec: &DropSpec) -> bool {
        spec.limit
            .is_some_and(|limit| self.count_for(spec.item_id) >= limit.max as usize)
    }

    /// Records a drop.
    pub fn append(&mut self, item_id: ItemId, timestamp: i64) {
        self.events.push(DropEvent::new(item_id, timestamp));
    }

    /// Number of events whose item has no drop in `table`.
    ///
    /// Orphans are kept as they are; they never expire and never count
    /// against any limit.
    #[must_use]
    pub fn orphans(&self, table: &DropTable) -> usize {
        self.events
            .iter()
            .filter(|e| table.find_by_item_id(e.item_id).is_none())
            .count()
    }

    /// Renders the ledger in its file format.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut text = format!("{}\n", self.last_run);
        for event in &self.events {
            text.push_str(&format!("{}|{}\n", event.item_id, event.timestamp));
        }
        text
    }

    /// Parses the file format. `origin` names the source in errors.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::LedgerCorrupt` naming the first bad line.
    pub fn parse(text: &str, origin: &str) -> LimiterResult<Self> {
        let corrupt = |line: usize, reason: &str| LimiterError::LedgerCorrupt {
            path: origin.to_string(),
            line,
            reason: reason.to_string(),
        };

        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty());

        let (first, header) = lines
            .next()
            .ok_or_else(|| corrupt(1, "missing last run timestamp"))?;
        let last_run: i64 = header
            .parse()
            .map_err(|_| corrupt(first, "last run timestamp must be an integer"))?;

        let mut events = Vec::new();
        for (number, line) in lines {
            let (item, timestamp) = line
                .split_once('|')
                .ok_or_else(|| corrupt(number, "expected [itemId|timestamp]"))?;
            let item_id: ItemId = item
                .trim()
                .parse()
                .map_err(|_| corrupt(number, "item id must be a whole number"))?;
            let timestamp: i64 = timestamp
                .trim()
                .parse()
                .map_err(|_| corrupt(number, "timestamp must be an integer"))?;
            events.push(DropEvent::new(item_id, timestamp));
        }

        Ok(Self { last_run, events })
    }
}

/// What [`LedgerFile::load_or_baseline`] found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerLoad {
    /// A ledger from a previous run.
    Existing(Ledger),
    /// No ledger existed. A fresh one stamped `created_at` was written and
    /// this run must not simulate.
    Baseline {
        /// Timestamp written to the new ledger.
        created_at: i64,
    },
}

/// A ledger stored as a text file.
#[derive(Clone, Debug)]
pub struct LedgerFile {
    path: PathBuf,
}

impl LedgerFile {
    /// Creates a handle. Nothing is read until [`LedgerFile::load`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The ledger path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the ledger, or `None` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::Storage` if the file cannot be read, or
    /// `LimiterError::LedgerCorrupt` if it is malformed.
    pub fn load(&self) -> LimiterResult<Option<Ledger>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LimiterError::Storage(format!(
                    "failed to read ledger {}: {e}",
                    self.path.display()
                )))
            }
        };

        let ledger = Ledger::parse(&text, &self.path.display().to_string())?;
        debug!(
            "Loaded ledger {} with {} events, last run {}",
            self.path.display(),
            ledger.len(),
            ledger.last_run()
        );
        Ok(Some(ledger))
    }

    /// Loads the ledger, or writes a fresh baseline stamped `now` if none
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`LedgerFile::load`] and [`LedgerFile::persist`].
    pub fn load_or_baseline(&self, now: i64) -> LimiterResult<LedgerLoad> {
        if let Some(ledger) = self.load()? {
            return Ok(LedgerLoad::Existing(ledger));
        }

        self.persist(&Ledger::new(now))?;
        info!("No ledger at {}, baseline written at {now}", self.path.display());
        Ok(LedgerLoad::Baseline { created_at: now })
    }

    /// Rewrites the ledger in full.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::Storage` on any I/O failure. The previous
    /// ledger is left untouched in that case.
    pub fn persist(&self, ledger: &Ledger) -> LimiterResult<()> {
        let tmp = self.temp_path();
        let fail = |what: &str, e: std::io::Error| {
            LimiterError::Storage(format!("failed to {what} ledger {}: {e}", self.path.display()))
        };

        let file = File::create(&tmp).map_err(|e| fail("create", e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(ledger.to_text().as_bytes())
            .map_err(|e| fail("write", e))?;
        let file = writer
            .into_inner()
            .map_err(|e| fail("flush", e.into_error()))?;
        file.sync_all().map_err(|e| fail("sync", e))?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|e| fail("replace", e))?;
        debug!("Persisted {} ledger events to {}", ledger.len(), self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::percent::Percent;
    use crate::table::{DropRate, Limit};
    use crate::timeframe::{TimeFrame, TimeUnit};

    fn temp_ledger_path(name: &str) -> PathBuf {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("test_ledger_{name}_{id}.state"))
    }

    fn limited(item_id: ItemId, max: u32, window: &str) -> DropSpec {
        let rate = DropRate::new(Percent::from_whole(10), TimeFrame::new(1, TimeUnit::Day).unwrap());
        DropSpec::new(item_id, "Limited", rate).with_limit(Limit {
            max,
            window: TimeFrame::parse(window).unwrap(),
        })
    }

    fn unlimited(item_id: ItemId) -> DropSpec {
        let rate = DropRate::new(Percent::from_whole(10), TimeFrame::new(1, TimeUnit::Day).unwrap());
        DropSpec::new(item_id, "Unlimited", rate)
    }

    #[test]
    fn test_expire_strictly_older_than_window() {
        let spec = limited(7, 5, "hour");
        let mut ledger = Ledger::with_events(
            0,
            vec![
                DropEvent::new(7, 1_000),
                DropEvent::new(7, 2_000),
                DropEvent::new(8, 0),
            ],
        );

        // exactly one window old is kept
        assert_eq!(ledger.expire(&spec, 4_600), 0);
        assert_eq!(ledger.expire(&spec, 4_601), 1);
        assert_eq!(ledger.count_for(7), 1);
        // other items untouched
        assert_eq!(ledger.count_for(8), 1);
    }

    #[test]
    fn test_expire_is_idempotent() {
        let spec = limited(7, 5, "min");
        let mut ledger = Ledger::with_events(0, vec![DropEvent::new(7, 0), DropEvent::new(7, 100)]);
        assert_eq!(ledger.expire(&spec, 120), 1);
        assert_eq!(ledger.expire(&spec, 120), 0);
    }

    #[test]
    fn test_unlimited_never_expires_or_maxes() {
        let spec = unlimited(7);
        let mut ledger = Ledger::with_events(0, vec![DropEvent::new(7, 0); 50]);
        assert_eq!(ledger.expire(&spec, i64::MAX), 0);
        assert!(!ledger.is_maxed(&spec));
        assert_eq!(ledger.len(), 50);
    }

    #[test]
    fn test_is_maxed() {
        let spec = limited(7, 2, "day");
        let mut ledger = Ledger::new(0);
        assert!(!ledger.is_maxed(&spec));
        ledger.append(7, 10);
        assert!(!ledger.is_maxed(&spec));
        ledger.append(7, 20);
        assert!(ledger.is_maxed(&spec));
    }

    #[test]
    fn test_advance_never_moves_backwards() {
        let mut ledger = Ledger::new(1_000);
        ledger.advance_to(500);
        assert_eq!(ledger.last_run(), 1_000);
        ledger.advance_to(2_000);
        assert_eq!(ledger.last_run(), 2_000);
    }

    #[test]
    fn test_orphans() {
        let table = DropTable::parse("drop Sword: 1 5%/day limit 1/day").unwrap();
        let ledger = Ledger::with_events(0, vec![DropEvent::new(1, 0), DropEvent::new(2, 0), DropEvent::new(3, 0)]);
        assert_eq!(ledger.orphans(&table), 2);
    }

    #[test]
    fn test_parse_text() {
        let ledger = Ledger::parse("\n1718000000\n1234|1717990000\n\n 88 | 5 \n", "mem").unwrap();
        assert_eq!(ledger.last_run(), 1_718_000_000);
        assert_eq!(
            ledger.events(),
            &[DropEvent::new(1234, 1_717_990_000), DropEvent::new(88, 5)]
        );
    }

    #[test]
    fn test_parse_corrupt_names_line() {
        let err = Ledger::parse("100\n1|2\n1-2\n", "state").unwrap_err();
        assert_eq!(
            err,
            LimiterError::LedgerCorrupt {
                path: "state".to_string(),
                line: 3,
                reason: "expected [itemId|timestamp]".to_string(),
            }
        );

        assert!(matches!(Ledger::parse("", "state"), Err(LimiterError::LedgerCorrupt { line: 1, .. })));
        assert!(matches!(Ledger::parse("abc", "state"), Err(LimiterError::LedgerCorrupt { line: 1, .. })));
        assert!(Ledger::parse("1\nx|2", "state").is_err());
        assert!(Ledger::parse("1\n2|y", "state").is_err());
    }

    #[test]
    fn test_persist_and_reload() {
        let path = temp_ledger_path("roundtrip");
        let file = LedgerFile::new(&path);

        let mut ledger = Ledger::new(1_718_000_000);
        for i in 0..25 {
            ledger.append(i % 4, 1_717_000_000 + i64::from(i));
        }
        file.persist(&ledger).unwrap();

        let reloaded = file.load().unwrap().unwrap();
        assert_eq!(reloaded.last_run(), ledger.last_run());

        let mut expected = ledger.events().to_vec();
        let mut actual = reloaded.events().to_vec();
        expected.sort_unstable();
        actual.sort_unstable();
        assert_eq!(actual, expected);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_baseline() {
        let path = temp_ledger_path("baseline");
        let file = LedgerFile::new(&path);

        assert_eq!(file.load().unwrap(), None);
        assert_eq!(
            file.load_or_baseline(5_000).unwrap(),
            LedgerLoad::Baseline { created_at: 5_000 }
        );

        // second load sees the baseline
        match file.load_or_baseline(9_000).unwrap() {
            LedgerLoad::Existing(ledger) => {
                assert_eq!(ledger.last_run(), 5_000);
                assert!(ledger.is_empty());
            }
            other => panic!("expected an existing ledger, got {other:?}"),
        }

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_persist_replaces_in_full() {
        let path = temp_ledger_path("replace");
        let file = LedgerFile::new(&path);

        file.persist(&Ledger::with_events(1, vec![DropEvent::new(1, 1); 10])).unwrap();
        file.persist(&Ledger::new(2)).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "2\n");
        assert!(!file.temp_path().exists());

        fs::remove_file(&path).ok();
    }
}
