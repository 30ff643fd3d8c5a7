//! # Drop Limiter Core
//!
//! Decides, each time it is invoked, how many more units of each managed item
//! may spawn, replaying every rate window that elapsed since the last run.
//!
//! ## Design Principles
//!
//! 1. **Zero floating point** - Rates and partial-window chances are fixed-point
//! 2. **Simulated time** - History expires as of each window boundary, not "now"
//! 3. **Injected randomness** - A seeded trial source makes every run reproducible
//! 4. **Validate up front** - A table that parses is a table the engine can run
//!
//! ## Run Shape
//!
//! The engine is single-threaded and performs no I/O. Loading the ledger and
//! the inventory snapshot, and persisting them afterwards, is the caller's job:
//! ledger first, store increments second, report last.
//!
//! ## Example
//!
//! ```rust,ignore
//! use droplimiter_core::{DropTable, LedgerFile, LedgerLoad, SeededTrials, SimulationEngine};
//!
//! let table = DropTable::load("droplimiter.drops")?;
//! let ledger_file = LedgerFile::new("droplimiter.state");
//!
//! let LedgerLoad::Existing(mut ledger) = ledger_file.load_or_baseline(now)? else {
//!     return Ok(()); // first run, baseline written
//! };
//!
//! let mut inventory = store.snapshot(&table.item_ids().collect::<Vec<_>>())?;
//! let summary = SimulationEngine::new(SeededTrials::from_entropy())
//!     .run(&table, &mut ledger, &mut inventory, now);
//!
//! ledger_file.persist(&ledger)?;
//! store.apply_increments(&summary.deltas)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod engine;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod percent;
pub mod report;
pub mod table;
pub mod timeframe;
pub mod trials;

pub use engine::{trial_schedule, RunSummary, SimulationEngine, SpecOutcome, TrialSchedule};
pub use error::{LimiterError, LimiterResult};
pub use inventory::{DeltaMap, InventoryRecord, InventoryStore, InventoryView, MemoryStore};
pub use ledger::{DropEvent, Ledger, LedgerFile, LedgerLoad};
pub use percent::Percent;
pub use report::{CsvReport, NullReport, Report};
pub use table::{DropRate, DropSpec, DropTable, ItemId, Limit, Pool};
pub use timeframe::{TimeFrame, TimeUnit};
pub use trials::{FixedTrials, SeededTrials, TrialSource};
