//! # Simulation Engine
//!
//! **Replays every window since the last run, one trial at a time**
//!
//! The process wakes up sporadically, maybe once a minute, maybe once a
//! week. Every spec's elapsed time is cut into its own rate windows: one
//! full-probability trial per fully elapsed window, then one proportional
//! trial for the remainder.
//!
//! Each trial runs at a *simulated* instant (`last_run + i × window`, capped
//! at `now`), so history expiry and pool capacity are evaluated as they would
//! have been had the process run at every window boundary.
//!
//! ## Per Trial
//!
//! 1. Expire history older than the limit window, as of the simulated instant
//! 2. Limit reached: skip this trial
//! 3. Any pool full: abandon every remaining trial of this spec
//! 4. Roll. On success raise the inventory limit, record history for limited
//!    items, count the delta and report the drop
//!
//! The engine performs no I/O and reads no clock: `now`, the ledger, the
//! inventory view and the trial source all come from the caller.

use std::fmt;
use std::iter;

use tracing::{debug, info, warn};

use crate::inventory::{DeltaMap, InventoryView};
use crate::ledger::Ledger;
use crate::percent::Percent;
use crate::report::{NullReport, Report};
use crate::table::{DropRate, DropSpec, DropTable, ItemId};
use crate::trials::TrialSource;

/// The ordered trials for one spec: `full_trials` at the full rate, then one
/// partial trial.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrialSchedule {
    full_trials: u64,
    full: Percent,
    partial: Percent,
}

impl TrialSchedule {
    /// Number of full-window trials.
    #[inline]
    #[must_use]
    pub const fn full_trials(&self) -> u64 {
        self.full_trials
    }

    /// Probability of the trailing partial trial.
    #[inline]
    #[must_use]
    pub const fn partial(&self) -> Percent {
        self.partial
    }

    /// Total number of trials. Always at least one.
    #[inline]
    #[must_use]
    pub const fn trial_count(&self) -> u64 {
        self.full_trials.saturating_add(1)
    }

    /// Every trial probability, in order.
    pub fn probabilities(&self) -> impl Iterator<Item = Percent> {
        let full = usize::try_from(self.full_trials).unwrap_or(usize::MAX);
        iter::repeat(self.full)
            .take(full)
            .chain(iter::once(self.partial))
    }
}

/// Splits `elapsed` seconds into trials for `rate`.
///
/// When more than one window has elapsed, each whole window becomes a trial
/// at the full rate. The remainder always becomes one trailing trial at
/// `rate × remainder / window`, which is 0% when nothing remains.
#[must_use]
pub fn trial_schedule(elapsed: u64, rate: &DropRate) -> TrialSchedule {
    let window = rate.window.to_seconds();

    let (full_trials, remainder) = if elapsed > window {
        (elapsed / window, elapsed % window)
    } else {
        (0, elapsed)
    };

    TrialSchedule {
        full_trials,
        full: rate.percent,
        partial: rate.percent.scale(remainder, window),
    }
}

/// What happened to a spec over one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpecOutcome {
    /// The item.
    pub item_id: ItemId,
    /// Trials in the schedule.
    pub scheduled: u64,
    /// Trials that actually rolled the dice.
    pub rolled: u64,
    /// Successful trials.
    pub drops: u32,
    /// History events expired across all trials.
    pub expired: usize,
    /// Trials skipped because the limit was reached.
    pub limit_reached: u64,
    /// The pool that was full, if one cut the spec short.
    pub pool_full: Option<String>,
}

/// Result of one engine pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Seconds simulated.
    pub elapsed: u64,
    /// Increments per item, only items with at least one drop.
    pub deltas: DeltaMap,
    /// Per-spec statistics, in table order.
    pub outcomes: Vec<SpecOutcome>,
}

impl RunSummary {
    /// Total drops across every item.
    #[must_use]
    pub fn total_drops(&self) -> u64 {
        self.deltas.values().map(|&n| u64::from(n)).sum()
    }
}

/// Result of a single trial, for the log.
#[derive(Clone, Debug, PartialEq, Eq)]
enum TrialOutcome {
    Drop,
    NoDrop,
    LimitReached,
    PoolFull(String),
}

impl fmt::Display for TrialOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => f.write_str("drop"),
            Self::NoDrop => f.write_str("no drop"),
            Self::LimitReached => f.write_str("limit reached"),
            Self::PoolFull(name) => write!(f, "pool {name} full"),
        }
    }
}

/// Runs the drop simulation.
pub struct SimulationEngine<T: TrialSource> {
    trials: T,
    report: Box<dyn Report>,
}

impl<T: TrialSource> SimulationEngine<T> {
    /// Creates an engine that reports nowhere.
    #[must_use]
    pub fn new(trials: T) -> Self {
        Self {
            trials,
            report: Box::new(NullReport),
        }
    }

    /// Sets the report sink.
    #[must_use]
    pub fn with_report(mut self, report: Box<dyn Report>) -> Self {
        self.report = report;
        self
    }

    /// The report sink, for flushing once the run has been persisted.
    pub fn report_mut(&mut self) -> &mut dyn Report {
        self.report.as_mut()
    }

    /// Simulates everything between `ledger.last_run()` and `now`.
    ///
    /// Mutates the ledger and the inventory view in place and moves the
    /// ledger's last run forward to `now`. A `now` earlier than the last run
    /// simulates nothing and leaves the last run where it was.
    pub fn run(
        &mut self,
        table: &DropTable,
        ledger: &mut Ledger,
        inventory: &mut InventoryView,
        now: i64,
    ) -> RunSummary {
        let last_run = ledger.last_run();
        let elapsed = match u64::try_from(now.saturating_sub(last_run)) {
            Ok(elapsed) => elapsed,
            Err(_) => {
                warn!("Clock is behind the last run ({now} < {last_run}), simulating nothing");
                0
            }
        };

        info!("{}", "=".repeat(80));
        info!("= {elapsed} second(s) since the last run.");
        info!("{}", "=".repeat(80));

        let orphans = ledger.orphans(table);
        if orphans > 0 {
            warn!("{orphans} history entries belong to items with no drop, keeping them");
        }

        let mut summary = RunSummary {
            elapsed,
            ..RunSummary::default()
        };

        for spec in table.iter() {
            let outcome = self.run_spec(spec, table, ledger, inventory, last_run, now, elapsed, &mut summary.deltas);
            summary.outcomes.push(outcome);
        }

        ledger.advance_to(now);
        summary
    }

    #[allow(clippy::too_many_arguments)]
    fn run_spec(
        &mut self,
        spec: &DropSpec,
        table: &DropTable,
        ledger: &mut Ledger,
        inventory: &mut InventoryView,
        last_run: i64,
        now: i64,
        elapsed: u64,
        deltas: &mut DeltaMap,
    ) -> SpecOutcome {
        let window = spec.rate.window.to_seconds();
        let schedule = trial_schedule(elapsed, &spec.rate);

        info!("{} droprate: {} ({window} seconds)", spec.description, spec.rate);
        info!(
            "Dice throws: {elapsed} sec / {window} sec = {} full + {}% partial",
            schedule.full_trials(),
            schedule.partial()
        );

        let mut outcome = SpecOutcome {
            item_id: spec.item_id,
            scheduled: schedule.trial_count(),
            ..SpecOutcome::default()
        };

        for (index, probability) in (1u64..).zip(schedule.probabilities()) {
            let offset = i64::try_from(index.saturating_mul(window)).unwrap_or(i64::MAX);
            let sim_end = last_run.saturating_add(offset).min(now);

            let expired = ledger.expire(spec, sim_end);
            if expired > 0 {
                debug!("\t{expired} stale drops expired from history");
                outcome.expired += expired;
            }

            let result = self.trial(spec, table, ledger, inventory, probability, sim_end);
            debug!(
                "\tDice throw {probability}%, {} sec ago: {result}",
                now.saturating_sub(sim_end)
            );

            match result {
                TrialOutcome::LimitReached => outcome.limit_reached += 1,
                TrialOutcome::PoolFull(pool) => {
                    outcome.pool_full = Some(pool);
                    break;
                }
                TrialOutcome::NoDrop => outcome.rolled += 1,
                TrialOutcome::Drop => {
                    outcome.rolled += 1;
                    outcome.drops += 1;
                    *deltas.entry(spec.item_id).or_insert(0) += 1;
                }
            }
        }

        info!(
            "{}: {} drop(s) from {}/{} trials{}",
            spec.description,
            outcome.drops,
            outcome.rolled,
            outcome.scheduled,
            outcome
                .pool_full
                .as_ref()
                .map(|pool| format!(", stopped by full pool {pool}"))
                .unwrap_or_default()
        );
        info!("{}", "-".repeat(70));

        outcome
    }

    fn trial(
        &mut self,
        spec: &DropSpec,
        table: &DropTable,
        ledger: &mut Ledger,
        inventory: &mut InventoryView,
        probability: Percent,
        sim_end: i64,
    ) -> TrialOutcome {
        if ledger.is_maxed(spec) {
            return TrialOutcome::LimitReached;
        }

        if let Some(pool) = table.pools_for(spec).find(|pool| inventory.pool_full(table, pool)) {
            return TrialOutcome::PoolFull(pool.name.clone());
        }

        if !self.trials.trial(probability) {
            return TrialOutcome::NoDrop;
        }

        inventory.record_success(spec.item_id);
        if spec.limit.is_some() {
            ledger.append(spec.item_id, sim_end);
        }
        self.report.record_drop(spec, sim_end);
        TrialOutcome::Drop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryRecord;
    use crate::ledger::DropEvent;
    use crate::trials::{FixedTrials, SeededTrials};
    use std::cell::RefCell;
    use std::rc::Rc;

    const NOW: i64 = 1_718_000_000;
    const DAY: i64 = 86_400;

    fn rate(text: &str) -> DropRate {
        DropRate::parse(text).unwrap()
    }

    #[test]
    fn test_schedule_zero_elapsed() {
        let schedule = trial_schedule(0, &rate("10%/day"));
        assert_eq!(schedule.trial_count(), 1);
        assert_eq!(schedule.probabilities().collect::<Vec<_>>(), vec![Percent::ZERO]);
    }

    #[test]
    fn test_schedule_exact_multiple() {
        let schedule = trial_schedule(3 * 300, &rate("10%/5min"));
        let ten = Percent::from_whole(10);
        assert_eq!(schedule.trial_count(), 4);
        assert_eq!(
            schedule.probabilities().collect::<Vec<_>>(),
            vec![ten, ten, ten, Percent::ZERO]
        );
    }

    #[test]
    fn test_schedule_exactly_one_window() {
        // one window is not "more than" one window: a single partial trial at full rate
        let schedule = trial_schedule(86_400, &rate("10%/day"));
        assert_eq!(schedule.full_trials(), 0);
        assert_eq!(schedule.partial(), Percent::from_whole(10));
    }

    #[test]
    fn test_schedule_partial_remainder() {
        let schedule = trial_schedule(2 * 3_600 + 900, &rate("20%/hour"));
        assert_eq!(schedule.full_trials(), 2);
        assert_eq!(schedule.partial(), Percent::from_whole(5));
    }

    #[test]
    fn test_end_to_end_unlimited_always_drops() {
        let table = DropTable::parse("drop Test: 6 100%/1sec").unwrap();
        let mut ledger = Ledger::new(NOW - 1);
        let mut inventory = InventoryView::from_records([(6, InventoryRecord::new(0, 4))]);

        let summary = SimulationEngine::new(FixedTrials::always()).run(&table, &mut ledger, &mut inventory, NOW);

        assert_eq!(summary.deltas, [(6, 1)].into_iter().collect());
        assert_eq!(inventory.record(6).limit, 5);
        // unlimited items never write history
        assert!(ledger.is_empty());
        assert_eq!(ledger.last_run(), NOW);
    }

    #[test]
    fn test_end_to_end_limit_reached() {
        let table = DropTable::parse("drop Test: 7 10%/1day limit 1/1day").unwrap();
        let mut ledger = Ledger::with_events(NOW - 30, vec![DropEvent::new(7, NOW - 3_600)]);
        let mut inventory = InventoryView::new();

        let summary = SimulationEngine::new(FixedTrials::always()).run(&table, &mut ledger, &mut inventory, NOW);

        assert!(summary.deltas.is_empty());
        assert_eq!(ledger.events(), &[DropEvent::new(7, NOW - 3_600)]);
        assert_eq!(summary.outcomes[0].limit_reached, 1);
        assert_eq!(summary.outcomes[0].rolled, 0);
    }

    #[test]
    fn test_zero_elapsed_never_drops() {
        let table = DropTable::parse("drop Test: 1 100%/sec").unwrap();
        let mut ledger = Ledger::new(NOW);
        let mut inventory = InventoryView::new();

        let summary = SimulationEngine::new(FixedTrials::always()).run(&table, &mut ledger, &mut inventory, NOW);

        assert!(summary.deltas.is_empty());
        assert_eq!(summary.outcomes[0].scheduled, 1);
        assert_eq!(summary.outcomes[0].rolled, 1);
    }

    #[test]
    fn test_expiry_at_simulated_instants() {
        let table = DropTable::parse("drop Test: 1 100%/day limit 1/day").unwrap();
        let start = NOW - 3 * DAY;
        let mut ledger = Ledger::new(start);
        let mut inventory = InventoryView::new();

        let summary = SimulationEngine::new(FixedTrials::always()).run(&table, &mut ledger, &mut inventory, NOW);

        // day 1 drops, day 2 is still within the window, day 3 expires day 1 and drops again,
        // the trailing partial trial sits at `now` and finds the limit reached
        assert_eq!(summary.deltas.get(&1), Some(&2));
        assert_eq!(summary.outcomes[0].limit_reached, 2);
        assert_eq!(summary.outcomes[0].expired, 1);
        assert_eq!(ledger.events(), &[DropEvent::new(1, start + 3 * DAY)]);
    }

    #[test]
    fn test_history_uses_simulated_timestamps() {
        let table = DropTable::parse("drop Test: 1 100%/hour limit 10/week").unwrap();
        let start = NOW - 3 * 3_600 - 60;
        let mut ledger = Ledger::new(start);
        let mut inventory = InventoryView::new();

        SimulationEngine::new(FixedTrials::always()).run(&table, &mut ledger, &mut inventory, NOW);

        let stamps: Vec<i64> = ledger.events().iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![start + 3_600, start + 7_200, start + 10_800, NOW]);
    }

    #[test]
    fn test_pool_full_aborts_remaining_trials() {
        let table = DropTable::parse(
            "pool shared 1\n\
             drop A: 1 100%/sec pool shared\n\
             drop B: 2 100%/sec\n\
             drop C: 3 100%/sec pool shared",
        )
        .unwrap();
        let mut ledger = Ledger::new(NOW - 5);
        let mut inventory = InventoryView::new();

        let summary = SimulationEngine::new(FixedTrials::always()).run(&table, &mut ledger, &mut inventory, NOW);

        let a = &summary.outcomes[0];
        assert_eq!(a.drops, 1);
        assert_eq!(a.scheduled, 6);
        assert_eq!(a.rolled, 1);
        assert_eq!(a.pool_full.as_deref(), Some("shared"));

        // not in the pool, unaffected
        assert_eq!(summary.deltas.get(&2), Some(&5));

        let c = &summary.outcomes[2];
        assert_eq!(c.drops, 0);
        assert_eq!(c.rolled, 0);
        assert_eq!(c.pool_full.as_deref(), Some("shared"));
        assert!(!summary.deltas.contains_key(&3));
    }

    #[test]
    fn test_limit_is_checked_before_pool() {
        let table = DropTable::parse("pool none 0\ndrop A: 1 100%/sec limit 1/day pool none").unwrap();
        let mut ledger = Ledger::with_events(NOW - 3, vec![DropEvent::new(1, NOW - 10)]);
        let mut inventory = InventoryView::new();

        let summary = SimulationEngine::new(FixedTrials::always()).run(&table, &mut ledger, &mut inventory, NOW);

        let a = &summary.outcomes[0];
        assert_eq!(a.limit_reached, 4);
        assert_eq!(a.pool_full, None);
    }

    #[test]
    fn test_clock_behind_simulates_nothing() {
        let table = DropTable::parse("drop A: 1 100%/sec").unwrap();
        let mut ledger = Ledger::new(NOW + 100);
        let mut inventory = InventoryView::new();

        let summary = SimulationEngine::new(FixedTrials::always()).run(&table, &mut ledger, &mut inventory, NOW);

        assert_eq!(summary.elapsed, 0);
        assert!(summary.deltas.is_empty());
        assert_eq!(ledger.last_run(), NOW + 100);
    }

    #[test]
    fn test_never_source_never_drops() {
        let table = DropTable::parse("drop A: 1 100%/sec").unwrap();
        let mut ledger = Ledger::new(NOW - 50);
        let mut inventory = InventoryView::new();

        let summary = SimulationEngine::new(FixedTrials::never()).run(&table, &mut ledger, &mut inventory, NOW);

        assert!(summary.deltas.is_empty());
        assert_eq!(summary.outcomes[0].rolled, 51);
    }

    #[test]
    fn test_same_seed_same_deltas() {
        let table = DropTable::parse(
            "pool p 40\n\
             drop A: 1 30%/hour limit 5/day pool p\n\
             drop B: 2 2.5%/min pool p\n\
             drop C: 3 50%/day",
        )
        .unwrap();

        let run = |seed: u64| {
            let mut ledger = Ledger::new(NOW - 14 * DAY);
            let mut inventory = InventoryView::new();
            let summary = SimulationEngine::new(SeededTrials::from_seed_u64(seed))
                .run(&table, &mut ledger, &mut inventory, NOW);
            (summary.deltas, ledger)
        };

        let (first, first_ledger) = run(99);
        let (second, second_ledger) = run(99);
        assert_eq!(first, second);
        assert_eq!(first_ledger, second_ledger);
        assert!(!first.is_empty());
    }

    struct Recorder(Rc<RefCell<Vec<(ItemId, i64)>>>);

    impl Report for Recorder {
        fn record_drop(&mut self, spec: &DropSpec, timestamp: i64) {
            self.0.borrow_mut().push((spec.item_id, timestamp));
        }

        fn finish(&mut self) -> crate::LimiterResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_report_receives_every_drop() {
        let table = DropTable::parse("drop A: 1 100%/min").unwrap();
        let mut ledger = Ledger::new(NOW - 150);
        let mut inventory = InventoryView::new();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut engine = SimulationEngine::new(FixedTrials::always()).with_report(Box::new(Recorder(Rc::clone(&seen))));
        let summary = engine.run(&table, &mut ledger, &mut inventory, NOW);
        engine.report_mut().finish().unwrap();

        assert_eq!(summary.total_drops(), 3);
        assert_eq!(*seen.borrow(), vec![(1, NOW - 90), (1, NOW - 30), (1, NOW)]);
    }
}
