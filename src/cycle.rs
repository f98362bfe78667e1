//! One periodic check: fetch, detect, then restore or record
//!
//! ```text
//! Idle -> Fetching -> FetchFailed
//!                  -> LightsParsed -> Detecting -> Restoring    -> Done
//!                                               -> Snapshotting -> Done
//! ```
//!
//! Every store mutation between `LightsParsed` and `Done` goes through a
//! single [crate::storage::Transaction], committed only when `Done` is
//! reached.

use std::collections::HashMap;
use std::thread;

use chrono::{DateTime, Utc};
use log::{debug, log_enabled, Level};
use serde::Serialize;

use crate::bridge::{Bridge, HueBridge};
use crate::config::Config;
use crate::detector::Detector;
use crate::journal::Journal;
use crate::models::{index_order, Observation};
use crate::planner::plan;
use crate::storage::{Snapshot, Storage, Transaction};
use crate::updater::{record, track_new};
use crate::{Error, Result};

/// Where a cycle currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Fetching,
    FetchFailed,
    LightsParsed,
    Detecting,
    Restoring,
    Snapshotting,
    Done,
}

/// Summary of a restoring cycle
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreOutcome {
    /// Lights a state change was sent to
    pub written: usize,

    /// Lights already matching their snapshot
    pub unchanged: usize,

    /// Lights whose state change failed
    pub failed: usize,

    /// Lights without a snapshot to restore, now tracked
    pub untracked: usize,
}

/// Summary of a snapshotting cycle
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotOutcome {
    pub new_lights: usize,
    pub metadata_records: usize,
    pub state_records: usize,
}

/// What the cycle decided to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Restored(RestoreOutcome),
    Snapshotted(SnapshotOutcome),
}

/// Result of a completed cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub phase: Phase,

    /// Lights successfully normalized
    pub observed: usize,

    /// Lights skipped as malformed
    pub skipped: usize,

    /// Lights showing the factory default signature
    pub defaults: usize,

    pub outcome: Outcome,
}

/// Lights read from the bridge in one go
#[derive(Debug)]
pub struct Fetched {
    /// Normalized lights, in numeric bridge index order
    pub lights: Vec<Observation>,

    /// Why each skipped light could not be normalized
    pub skipped: Vec<Error>,
}

/// Read and normalize every light on the bridge
///
/// Only the bridge request itself can fail; lights that don't
/// normalize are returned in [Fetched::skipped].
pub fn fetch<B: Bridge + ?Sized>(bridge: &B) -> Result<Fetched> {
    let raw = bridge.fetch_lights()?;
    let mut fetched = Fetched {
        lights: Vec::with_capacity(raw.len()),
        skipped: Vec::new(),
    };
    for (index, light) in &raw {
        match Observation::normalize(index, light) {
            Ok(light) => fetched.lights.push(light),
            Err(e) => fetched.skipped.push(e),
        }
    }
    fetched.lights.sort_by(|a, b| index_order(a.index(), b.index()));
    Ok(fetched)
}

/// Run one cycle against the configured bridge and store
///
/// Failures setting up the store or the bridge client are journaled
/// like any failure inside the cycle.
pub fn check(
    config: &Config,
    journal: &mut Journal,
    now: DateTime<Utc>,
) -> Result<CycleReport> {
    let mut storage = journal.trace(
        "failed to open snapshot store",
        Storage::open(&config.storage_dir),
    )?;
    let bridge = journal.trace("failed to set up bridge client", HueBridge::new(config))?;
    Cycle::new(config, &bridge, journal).run(&mut storage, now)
}

/// A single run of the periodic check
pub struct Cycle<'a, B: Bridge + ?Sized> {
    config: &'a Config,
    bridge: &'a B,
    journal: &'a mut Journal,
    phase: Phase,
}

impl<'a, B: Bridge + ?Sized> Cycle<'a, B> {
    pub fn new(config: &'a Config, bridge: &'a B, journal: &'a mut Journal) -> Self {
        Cycle {
            config,
            bridge,
            journal,
            phase: Phase::Idle,
        }
    }

    /// Accessor for the current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the cycle to completion against the store
    ///
    /// A failed fetch ends the cycle before the store is touched. Any
    /// error after that discards every record staged by this cycle.
    pub fn run(&mut self, storage: &mut Storage, now: DateTime<Utc>) -> Result<CycleReport> {
        self.journal.info("check started");

        self.enter(Phase::Fetching);
        let fetched = match fetch(self.bridge) {
            Ok(fetched) => fetched,
            Err(e) => {
                self.enter(Phase::FetchFailed);
                self.journal.error(&format!("failed to fetch lights: {e}"));
                return Err(e);
            }
        };

        self.enter(Phase::LightsParsed);
        for e in &fetched.skipped {
            self.journal.warn(&format!("skipping light: {e}"));
        }
        dump("observed lights", &fetched.lights);

        let latest = storage.get_all_latest();
        let last = latest
            .values()
            .map(|s| s.state.recorded_at.max(s.metadata.recorded_at))
            .max();
        if let Some(last) = last {
            if now < last {
                self.journal.warn(&format!(
                    "clock is behind the last record ({last}), new records still take precedence"
                ));
            }
        }
        let mut tx = storage.begin();

        self.enter(Phase::Detecting);
        let detector = Detector::from_config(self.config);
        let defaults = detector.count(&fetched.lights);
        let restore = defaults >= detector.threshold();
        self.journal.info(&format!(
            "{defaults} of {} lights at factory defaults (threshold {}): {}",
            fetched.lights.len(),
            detector.threshold(),
            if restore {
                "restoration required"
            } else {
                "no action"
            }
        ));

        let outcome = if restore {
            self.enter(Phase::Restoring);
            let restored = self.restore(&mut tx, &latest, &fetched.lights, now);
            Outcome::Restored(self.journal.trace("restoration aborted", restored)?)
        } else {
            self.enter(Phase::Snapshotting);
            let recorded = self.snapshot(&mut tx, &latest, &fetched.lights, now);
            Outcome::Snapshotted(self.journal.trace("snapshot aborted", recorded)?)
        };

        let (identities, metadata, states) = tx.staged();
        self.journal.trace("failed to commit records", tx.commit())?;
        if identities + metadata + states > 0 {
            self.journal.info(&format!(
                "committed {identities} new lights, {metadata} metadata records, {states} state records"
            ));
        }

        self.enter(Phase::Done);
        Ok(CycleReport {
            phase: self.phase,
            observed: fetched.lights.len(),
            skipped: fetched.skipped.len(),
            defaults,
            outcome,
        })
    }

    fn enter(&mut self, phase: Phase) {
        debug!("cycle {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Push every light back to its last snapshot, one at a time
    fn restore(
        &mut self,
        tx: &mut Transaction,
        latest: &HashMap<String, Snapshot>,
        lights: &[Observation],
        now: DateTime<Utc>,
    ) -> Result<RestoreOutcome> {
        let mut outcome = RestoreOutcome::default();

        for light in lights {
            let snapshot = match latest.get(light.unique_id()) {
                Some(snapshot) => snapshot,
                None => {
                    track_new(tx, light, now)?;
                    self.journal.warn(&format!(
                        "light {} ({}) has no snapshot to restore, now tracking it",
                        light.index(),
                        light.unique_id()
                    ));
                    outcome.untracked += 1;
                    continue;
                }
            };

            let command = plan(&light.state, &snapshot.state.state);
            if command.is_empty() {
                debug!("light {} already matches its snapshot", light.index());
                outcome.unchanged += 1;
                continue;
            }
            dump("restore command", &command);

            let changes = command.describe(&light.state);
            match self.bridge.apply_state(light.index(), &command) {
                Ok(reply) => {
                    self.journal.info(&format!(
                        "restored light {} ({}): {changes} [status {}]",
                        light.index(),
                        light.metadata.name,
                        reply.status
                    ));
                    outcome.written += 1;
                }
                Err(e) => {
                    self.journal.error(&format!(
                        "failed to restore light {} ({}): {changes}: {e}",
                        light.index(),
                        light.metadata.name
                    ));
                    outcome.failed += 1;
                }
            }

            // the bridge handles about 10 state changes per second
            if !self.config.write_interval.is_zero() {
                thread::sleep(self.config.write_interval);
            }
        }

        Ok(outcome)
    }

    /// Record whatever changed since the last snapshot of each light
    fn snapshot(
        &mut self,
        tx: &mut Transaction,
        latest: &HashMap<String, Snapshot>,
        lights: &[Observation],
        now: DateTime<Utc>,
    ) -> Result<SnapshotOutcome> {
        let mut outcome = SnapshotOutcome::default();

        for light in lights {
            let recorded = record(tx, latest.get(light.unique_id()), light, now)?;
            if recorded.new_light {
                self.journal.info(&format!(
                    "new light {} ({}) {}",
                    light.index(),
                    light.metadata.name,
                    light.unique_id()
                ));
                outcome.new_lights += 1;
                continue;
            }
            if recorded.metadata {
                self.journal.info(&format!(
                    "light {} metadata changed: {} / {}",
                    light.index(),
                    light.metadata.name,
                    light.metadata.sw_version
                ));
                outcome.metadata_records += 1;
            }
            if recorded.state {
                debug!("light {} state changed", light.index());
                outcome.state_records += 1;
            }
        }

        Ok(outcome)
    }
}

/// Dump an intermediate structure when debug logging is on
fn dump<T: Serialize + ?Sized>(label: &str, value: &T) {
    if log_enabled!(Level::Debug) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => debug!("{label}: {json}"),
            Err(e) => debug!("{label}: unable to dump: {:?}", e),
        }
    }
}
