//! Simulations manager — indexes stored runs and works on one run at a time.
//!
//! The index is built by a single listing scan when the manager is created.
//! It changes only through [`SimulationsManager::delete_run`] and
//! [`SimulationsManager::refresh`]. A [`SimulationRunData`] handle holds a
//! snapshot of one run's records; deleting through the handle leaves the
//! manager's index untouched until the next refresh.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::backtest::SimulationResult;
use crate::progress::Progress;
use crate::report::ComparisonReport;
use crate::store::{RunArtifact, RunKey, RunStore, StoreError, RUNS_PREFIX};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("can't find project {0}")]
    ProjectNotFound(String),

    #[error("can't find run id {run_id} in project {project}")]
    RunNotFound { project: String, run_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One stored artifact of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub project: String,
    pub run_id: String,
    pub symbol: String,
    pub sequence_index: u64,
    pub storage_path: String,
}

type RunIndex = BTreeMap<String, BTreeMap<String, BTreeMap<u64, RunRecord>>>;

/// Results of one run, in sequence order.
#[derive(Debug, Clone)]
pub struct MultiResults {
    pub project: String,
    pub run_id: String,
    pub results: Vec<SimulationResult>,
}

/// Outcome of [`SimulationRunData::calc_performance`].
#[derive(Debug, Default)]
pub struct PerformanceBatch {
    pub computed: usize,
    /// Artifacts that already had a summary, or were absent.
    pub skipped: usize,
    /// Storage key and error of every record that failed.
    pub failed: Vec<(String, StoreError)>,
}

pub struct SimulationsManager<S: RunStore> {
    store: S,
    index: RunIndex,
}

impl<S: RunStore> SimulationsManager<S> {
    pub fn new(store: S) -> Result<Self, ManagerError> {
        let index = scan(&store)?;
        Ok(Self { store, index })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rebuild the index from storage.
    pub fn refresh(&mut self) -> Result<(), ManagerError> {
        self.index = scan(&self.store)?;
        Ok(())
    }

    pub fn projects(&self) -> Vec<&str> {
        self.index.keys().map(String::as_str).collect()
    }

    pub fn runs_for(&self, project: &str) -> Result<Vec<&str>, ManagerError> {
        let runs = self
            .index
            .get(project)
            .ok_or_else(|| ManagerError::ProjectNotFound(project.to_string()))?;
        Ok(runs.keys().map(String::as_str).collect())
    }

    pub fn run_data(&self, project: &str, run_id: &str) -> Result<SimulationRunData<'_>, ManagerError> {
        let records = self.records(project, run_id)?;
        Ok(SimulationRunData {
            project: project.to_string(),
            run_id: run_id.to_string(),
            records: records.clone(),
            store: &self.store,
        })
    }

    /// Delete every artifact of a run and drop it from the index right away.
    /// A project left without runs disappears too. Returns the number of
    /// artifacts removed.
    pub fn delete_run(&mut self, project: &str, run_id: &str) -> Result<usize, ManagerError> {
        let removed = self.run_data(project, run_id)?.delete()?;
        if let Some(runs) = self.index.get_mut(project) {
            runs.remove(run_id);
            if runs.is_empty() {
                self.index.remove(project);
            }
        }
        Ok(removed)
    }

    fn records(&self, project: &str, run_id: &str) -> Result<&BTreeMap<u64, RunRecord>, ManagerError> {
        self.index
            .get(project)
            .ok_or_else(|| ManagerError::ProjectNotFound(project.to_string()))?
            .get(run_id)
            .ok_or_else(|| ManagerError::RunNotFound {
                project: project.to_string(),
                run_id: run_id.to_string(),
            })
    }
}

fn scan<S: RunStore>(store: &S) -> Result<RunIndex, StoreError> {
    let mut index = RunIndex::new();
    for key in store.list(RUNS_PREFIX)? {
        let Some(parsed) = RunKey::parse(&key) else {
            warn!(%key, "ignoring storage key outside the run layout");
            continue;
        };
        let record = RunRecord {
            project: parsed.project.clone(),
            run_id: parsed.run_id.clone(),
            symbol: parsed.symbol,
            sequence_index: parsed.sequence_index,
            storage_path: key,
        };
        index
            .entry(parsed.project)
            .or_default()
            .entry(parsed.run_id)
            .or_default()
            .insert(record.sequence_index, record);
    }
    Ok(index)
}

/// Snapshot of one run's records plus access to their artifacts.
pub struct SimulationRunData<'a> {
    project: String,
    run_id: String,
    records: BTreeMap<u64, RunRecord>,
    store: &'a dyn RunStore,
}

impl<'a> SimulationRunData<'a> {
    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Records in sequence order.
    pub fn records(&self) -> impl Iterator<Item = &RunRecord> + '_ {
        self.records.values()
    }

    /// Artifact of the record with `sequence_index`; `None` if there is no
    /// such record or its artifact is gone.
    pub fn load(&self, sequence_index: u64) -> Result<Option<RunArtifact>, ManagerError> {
        match self.records.get(&sequence_index) {
            Some(r) => Ok(self.store.load(&r.storage_path)?),
            None => Ok(None),
        }
    }

    /// Every available result, in sequence order.
    pub fn results(&self) -> Result<MultiResults, ManagerError> {
        let mut results = Vec::with_capacity(self.records.len());
        for r in self.records.values() {
            if let Some(artifact) = self.store.load(&r.storage_path)? {
                results.push(artifact.result);
            }
        }
        Ok(MultiResults {
            project: self.project.clone(),
            run_id: self.run_id.clone(),
            results,
        })
    }

    /// Compute and persist a performance summary for every artifact that lacks
    /// one (or for all of them when `force` is set). A failing record is
    /// logged and reported in the batch; the others still get processed.
    pub fn calc_performance(
        &self,
        initial_cash: f64,
        commissions: f64,
        force: bool,
        progress: &dyn Progress,
    ) -> PerformanceBatch {
        let mut batch = PerformanceBatch::default();
        let total = self.records.len();
        for (i, r) in self.records.values().enumerate() {
            progress.on_item(&r.storage_path, i, total);
            match self.update_performance(r, initial_cash, commissions, force) {
                Ok(true) => batch.computed += 1,
                Ok(false) => batch.skipped += 1,
                Err(e) => {
                    error!(key = %r.storage_path, error = %e, "performance calculation failed");
                    batch.failed.push((r.storage_path.clone(), e));
                }
            }
        }
        progress.on_done(total);
        info!(
            project = %self.project,
            run_id = %self.run_id,
            computed = batch.computed,
            skipped = batch.skipped,
            failed = batch.failed.len(),
            "performance batch finished"
        );
        batch
    }

    fn update_performance(
        &self,
        record: &RunRecord,
        initial_cash: f64,
        commissions: f64,
        force: bool,
    ) -> Result<bool, StoreError> {
        let Some(mut artifact) = self.store.load(&record.storage_path)? else {
            return Ok(false);
        };
        if artifact.performance.is_some() && !force {
            return Ok(false);
        }
        artifact.performance = Some(artifact.result.performance(initial_cash, commissions));
        self.store.save(&record.storage_path, &artifact)?;
        Ok(true)
    }

    /// Report over every artifact that carries a performance summary.
    pub fn comparison_report(&self) -> Result<ComparisonReport, ManagerError> {
        let mut artifacts = Vec::with_capacity(self.records.len());
        for r in self.records.values() {
            if let Some(a) = self.store.load(&r.storage_path)? {
                artifacts.push(a);
            }
        }
        Ok(ComparisonReport::from_artifacts(&artifacts))
    }

    /// Delete every artifact of this run and return how many records were
    /// removed. The owning manager's index is not updated; use
    /// [`SimulationsManager::delete_run`] or call
    /// [`SimulationsManager::refresh`] afterwards.
    pub fn delete(self) -> Result<usize, ManagerError> {
        for r in self.records.values() {
            self.store.delete(&r.storage_path)?;
        }
        info!(project = %self.project, run_id = %self.run_id, records = self.records.len(), "run deleted");
        Ok(self.records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::recording::RecordingProgress;
    use crate::progress::SilentProgress;
    use crate::store::test_support::result;
    use crate::store::{store_results, MemoryStore};

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let results = vec![
            result("p/a", &[0.0, 5.0, 10.0]),
            result("p/b", &[0.0, -5.0, -2.0]),
            result("p/c", &[0.0, 1.0, 1.5]),
        ];
        store_results(&store, "p", "r1", &results).unwrap();
        store_results(&store, "p", "r2", &results[..1]).unwrap();
        store_results(&store, "q", "r1", &results[..1]).unwrap();
        store
    }

    #[test]
    fn index_groups_by_project_and_run() {
        let store = seeded();
        store.insert_raw("runs/junk", "{}");
        let m = SimulationsManager::new(&store).unwrap();
        assert_eq!(m.projects(), vec!["p", "q"]);
        assert_eq!(m.runs_for("p").unwrap(), vec!["r1", "r2"]);

        let run = m.run_data("p", "r1").unwrap();
        let seqs: Vec<u64> = run.records().map(|r| r.sequence_index).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(run.load(1).unwrap().unwrap().task, "p/b");
        assert!(run.load(7).unwrap().is_none());
    }

    #[test]
    fn lookups_fail_with_not_found() {
        let store = seeded();
        let m = SimulationsManager::new(&store).unwrap();
        assert!(matches!(m.runs_for("zzz"), Err(ManagerError::ProjectNotFound(_))));
        assert!(matches!(m.run_data("p", "nope"), Err(ManagerError::RunNotFound { .. })));
        assert!(matches!(m.run_data("zzz", "r1"), Err(ManagerError::ProjectNotFound(_))));
    }

    #[test]
    fn results_are_in_sequence_order() {
        let store = seeded();
        let m = SimulationsManager::new(&store).unwrap();
        let all = m.run_data("p", "r1").unwrap().results().unwrap();
        let names: Vec<&str> = all.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["p/a", "p/b", "p/c"]);
    }

    #[test]
    fn performance_is_computed_once_unless_forced() {
        let store = seeded();
        let m = SimulationsManager::new(&store).unwrap();
        let run = m.run_data("p", "r1").unwrap();
        let progress = RecordingProgress::default();

        let first = run.calc_performance(100.0, 0.0, false, &progress);
        assert_eq!((first.computed, first.skipped, first.failed.len()), (3, 0, 0));
        assert_eq!(progress.labels.borrow().len(), 3);
        assert!(run.load(0).unwrap().unwrap().performance.is_some());

        let second = run.calc_performance(100.0, 0.0, false, &SilentProgress);
        assert_eq!((second.computed, second.skipped), (0, 3));

        let forced = run.calc_performance(100.0, 0.0, true, &SilentProgress);
        assert_eq!(forced.computed, 3);
    }

    #[test]
    fn corrupt_artifact_does_not_abort_the_batch() {
        let store = seeded();
        store.insert_raw("runs/p/r1/1.X", "{broken");
        let m = SimulationsManager::new(&store).unwrap();
        let batch = m.run_data("p", "r1").unwrap().calc_performance(100.0, 0.0, false, &SilentProgress);
        assert_eq!(batch.computed, 2);
        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.failed[0].0, "runs/p/r1/1.X");
    }

    #[test]
    fn report_skips_runs_without_performance() {
        let store = seeded();
        let m = SimulationsManager::new(&store).unwrap();
        let run = m.run_data("p", "r1").unwrap();
        assert!(run.comparison_report().unwrap().is_empty());

        run.calc_performance(100.0, 0.0, false, &SilentProgress);
        let report = run.comparison_report().unwrap();
        let tasks: Vec<&str> = report.rows.iter().map(|r| r.task.as_str()).collect();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[2], "p/b");
    }

    #[test]
    fn delete_run_updates_index_immediately() {
        let store = seeded();
        let mut m = SimulationsManager::new(&store).unwrap();
        assert_eq!(m.delete_run("p", "r1").unwrap(), 3);
        assert_eq!(m.runs_for("p").unwrap(), vec!["r2"]);

        assert_eq!(m.delete_run("q", "r1").unwrap(), 1);
        assert_eq!(m.projects(), vec!["p"]);
        assert_eq!(store.list("runs/q/").unwrap().len(), 0);
    }

    #[test]
    fn handle_delete_needs_refresh() {
        let store = seeded();
        let mut m = SimulationsManager::new(&store).unwrap();
        let removed = m.run_data("p", "r2").unwrap().delete().unwrap();
        assert_eq!(removed, 1);
        // Stale until refreshed.
        assert_eq!(m.runs_for("p").unwrap(), vec!["r1", "r2"]);
        m.refresh().unwrap();
        assert_eq!(m.runs_for("p").unwrap(), vec!["r1"]);
    }
}
