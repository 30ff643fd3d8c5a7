//! # One Run
//!
//! Loads the inputs named by the configuration, simulates, and persists the
//! results in a fixed order:
//!
//! 1. The ledger is rewritten
//! 2. Increments go to the inventory store
//! 3. The report is flushed
//!
//! A failure after step 1 can lose this run's increments but can never apply
//! them twice.

use droplimiter_core::{
    CsvReport, DropTable, InventoryStore, ItemId, Ledger, LedgerFile, LedgerLoad, NullReport, Report,
    RunSummary, SeededTrials, SimulationEngine,
};
use tracing::{info, warn};

use crate::config::{Config, Driver, PatchMode};
use crate::error::AppResult;
use crate::store::FileStore;

/// Per-invocation settings that do not live in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Overrides the configured seed.
    pub seed: Option<u64>,
    /// Simulate without writing anything.
    pub dry_run: bool,
    /// The current time, seconds since the Unix epoch.
    pub now: i64,
}

impl RunOptions {
    /// A normal run at `now`.
    #[must_use]
    pub const fn at(now: i64) -> Self {
        Self {
            seed: None,
            dry_run: false,
            now,
        }
    }
}

/// Additional spawns granted to one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spawn {
    /// The item.
    pub item_id: ItemId,
    /// Its drop description.
    pub description: String,
    /// How many more may spawn.
    pub count: u32,
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// First run: the ledger was created and nothing was simulated.
    Baseline {
        /// Timestamp the new ledger starts from.
        created_at: i64,
    },
    /// The simulation ran.
    Completed {
        /// Engine statistics.
        summary: RunSummary,
        /// Spawns per item, in item order.
        spawns: Vec<Spawn>,
        /// True if nothing was persisted.
        dry_run: bool,
    },
}

/// Opens the configured inventory store.
fn open_store(config: &Config) -> Box<dyn InventoryStore> {
    match config.store.driver {
        Driver::File => Box::new(FileStore::new(config.store_path())),
    }
}

/// Loads the ledger, writing a baseline on the very first run unless this is
/// a dry run. `None` means there is nothing to simulate yet.
fn load_ledger(file: &LedgerFile, options: &RunOptions) -> AppResult<Option<Ledger>> {
    if options.dry_run {
        let ledger = file.load()?;
        if ledger.is_none() {
            info!("No ledger at {}, a real run would write the baseline", file.path().display());
        }
        return Ok(ledger);
    }

    match file.load_or_baseline(options.now)? {
        LedgerLoad::Existing(ledger) => Ok(Some(ledger)),
        LedgerLoad::Baseline { .. } => Ok(None),
    }
}

/// Performs one full run.
///
/// # Errors
///
/// Returns an error if the drop table, ledger, store or report cannot be
/// read or written. Nothing is persisted if loading fails.
pub fn run_once(config: &Config, options: &RunOptions) -> AppResult<RunOutcome> {
    if config.store.patch != PatchMode::Disabled {
        info!(
            "Store patch mode [{}] has nothing to install for the {:?} driver",
            config.store.patch, config.store.driver
        );
    }

    let table = DropTable::load(config.drops_path())?;
    info!(
        "Loaded {} drops and {} pools from {}",
        table.len(),
        table.pools().count(),
        config.drops_path().display()
    );
    if table.is_empty() {
        warn!("Drop table is empty, nothing will ever drop");
    }

    let ledger_file = LedgerFile::new(config.state_path());
    let Some(mut ledger) = load_ledger(&ledger_file, options)? else {
        info!("Baseline established at {}, drops start with the next run", options.now);
        return Ok(RunOutcome::Baseline {
            created_at: options.now,
        });
    };

    let mut store = open_store(config);
    let item_ids: Vec<ItemId> = table.item_ids().collect();
    let mut inventory = store.snapshot(&item_ids)?;

    let trials = match options.seed.or(config.seed) {
        Some(seed) => {
            info!("Using fixed trial seed {seed}");
            SeededTrials::from_seed_u64(seed)
        }
        None => SeededTrials::from_entropy(),
    };

    let report: Box<dyn Report> = match config.report_path() {
        Some(path) if !options.dry_run => Box::new(CsvReport::new(path)),
        _ => Box::new(NullReport),
    };

    let mut engine = SimulationEngine::new(trials).with_report(report);
    let summary = engine.run(&table, &mut ledger, &mut inventory, options.now);

    if options.dry_run {
        info!("Dry run, {} drops not persisted", summary.total_drops());
    } else {
        ledger_file.persist(&ledger)?;
        store.apply_increments(&summary.deltas)?;
        engine.report_mut().finish()?;
        info!("Persisted {} drops", summary.total_drops());
    }

    let spawns = summary
        .deltas
        .iter()
        .map(|(&item_id, &count)| Spawn {
            item_id,
            description: table
                .find_by_item_id(item_id)
                .map(|spec| spec.description.clone())
                .unwrap_or_default(),
            count,
        })
        .collect();

    Ok(RunOutcome::Completed {
        summary,
        spawns,
        dry_run: options.dry_run,
    })
}
