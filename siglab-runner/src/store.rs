//! Run storage — a key/value store of serialized run artifacts.
//!
//! Keys are slash-separated paths of the form
//! `runs/{project}/{run_id}/{sequence_index}.{symbol}`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::backtest::SimulationResult;
use crate::performance::PerformanceSummary;

/// Root prefix of every run key.
pub const RUNS_PREFIX: &str = "runs/";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {key} is not valid JSON: {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
}

/// What is persisted for one simulation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArtifact {
    /// Qualified name of the simulation unit.
    pub task: String,
    pub task_args: BTreeMap<String, Value>,
    pub result: SimulationResult,
    #[serde(default)]
    pub performance: Option<PerformanceSummary>,
}

impl RunArtifact {
    pub fn new(result: SimulationResult) -> Self {
        Self {
            task: result.name.clone(),
            task_args: result.args.clone(),
            result,
            performance: None,
        }
    }
}

/// Key/value storage for run artifacts.
pub trait RunStore {
    /// Every key starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    fn load(&self, key: &str) -> Result<Option<RunArtifact>, StoreError>;

    fn save(&self, key: &str, artifact: &RunArtifact) -> Result<(), StoreError>;

    /// Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Parsed form of a run key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunKey {
    pub project: String,
    pub run_id: String,
    pub sequence_index: u64,
    pub symbol: String,
}

impl RunKey {
    /// `None` for keys that do not follow the run layout.
    pub fn parse(key: &str) -> Option<Self> {
        let rest = key.strip_prefix(RUNS_PREFIX)?;
        let mut parts = rest.split('/');
        let (project, run_id, leaf) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || project.is_empty() || run_id.is_empty() {
            return None;
        }
        let (seq, symbol) = leaf.split_once('.')?;
        if symbol.is_empty() {
            return None;
        }
        Some(Self {
            project: project.to_string(),
            run_id: run_id.to_string(),
            sequence_index: seq.parse().ok()?,
            symbol: symbol.to_string(),
        })
    }

    /// Prefix shared by every key of one run.
    pub fn run_prefix(project: &str, run_id: &str) -> String {
        format!("{RUNS_PREFIX}{project}/{run_id}/")
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}/{}/{}.{}",
            RUNS_PREFIX, self.project, self.run_id, self.sequence_index, self.symbol
        )
    }
}

fn check_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        Err(StoreError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

// ─── File store ─────────────────────────────────────────────────────

/// Stores each artifact as pretty JSON at `{root}/{key}.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// The directory is created on first save.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        check_key(key)?;
        Ok(self.root.join(format!("{key}.json")))
    }

    fn walk(&self, dir: &Path, rel: &str, out: &mut Vec<String>) -> Result<(), StoreError> {
        let io = |source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        };
        for entry in std::fs::read_dir(dir).map_err(io)? {
            let entry = entry.map_err(io)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if path.is_dir() {
                self.walk(&path, &format!("{rel}{name}/"), out)?;
            } else if let Some(stem) = name.strip_suffix(".json") {
                out.push(format!("{rel}{stem}"));
            }
        }
        Ok(())
    }
}

impl RunStore for FileStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        self.walk(&self.root, "", &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn load(&self, key: &str) -> Result<Option<RunArtifact>, StoreError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).map_err(|source| StoreError::Io { path, source })?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| StoreError::Serde {
                key: key.to_string(),
                source,
            })
    }

    fn save(&self, key: &str, artifact: &RunArtifact) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(artifact).map_err(|source| StoreError::Serde {
            key: key.to_string(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| StoreError::Io { path, source })
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

// ─── Memory store ───────────────────────────────────────────────────

/// In-process store, mostly for tests and dry runs.
///
/// Artifacts are kept serialized so loads go through the same decoding as
/// the file store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw text under `key`, bypassing serialization.
    pub fn insert_raw(&self, key: impl Into<String>, text: impl Into<String>) {
        self.entries().insert(key.into(), text.into());
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // A poisoned map is still structurally valid.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RunStore for MemoryStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn load(&self, key: &str) -> Result<Option<RunArtifact>, StoreError> {
        check_key(key)?;
        let Some(text) = self.entries().get(key).cloned() else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| StoreError::Serde {
                key: key.to_string(),
                source,
            })
    }

    fn save(&self, key: &str, artifact: &RunArtifact) -> Result<(), StoreError> {
        check_key(key)?;
        let text = serde_json::to_string(artifact).map_err(|source| StoreError::Serde {
            key: key.to_string(),
            source,
        })?;
        self.entries().insert(key.to_string(), text);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        check_key(key)?;
        self.entries().remove(key);
        Ok(())
    }
}

impl<S: RunStore + ?Sized> RunStore for &S {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).list(prefix)
    }

    fn load(&self, key: &str) -> Result<Option<RunArtifact>, StoreError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, artifact: &RunArtifact) -> Result<(), StoreError> {
        (**self).save(key, artifact)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }
}

// ─── Writing runs ───────────────────────────────────────────────────

/// Run id derived from the setup text and the wall-clock start of the run.
pub fn make_run_id(setup_text: &str, started_at: chrono::NaiveDateTime) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(setup_text.as_bytes());
    hasher.update(started_at.and_utc().timestamp_micros().to_le_bytes().as_slice());
    hasher.finalize().to_hex()[..16].to_string()
}

/// Save each result as an artifact under the next free sequence indices of
/// `project/run_id`. Returns the keys written.
pub fn store_results<S: RunStore + ?Sized>(
    store: &S,
    project: &str,
    run_id: &str,
    results: &[SimulationResult],
) -> Result<Vec<String>, StoreError> {
    let prefix = RunKey::run_prefix(project, run_id);
    let next = store
        .list(&prefix)?
        .iter()
        .filter_map(|k| RunKey::parse(k))
        .map(|k| k.sequence_index + 1)
        .max()
        .unwrap_or(0);

    let mut keys = Vec::with_capacity(results.len());
    for (offset, result) in results.iter().enumerate() {
        let key = RunKey {
            project: project.to_string(),
            run_id: run_id.to_string(),
            sequence_index: next + offset as u64,
            symbol: symbol_label(result),
        }
        .to_string();
        check_key(&key)?;
        store.save(&key, &RunArtifact::new(result.clone()))?;
        keys.push(key);
    }
    Ok(keys)
}

/// Single symbol as-is, several joined with `+`, none as `_`.
fn symbol_label(result: &SimulationResult) -> String {
    if result.symbols.is_empty() {
        "_".to_string()
    } else {
        result.symbols.join("+")
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{result, ts};
    use super::*;

    #[test]
    fn parses_run_keys() {
        let k = RunKey::parse("runs/prj/abc/12.BTC.USD").unwrap();
        assert_eq!(k.project, "prj");
        assert_eq!(k.run_id, "abc");
        assert_eq!(k.sequence_index, 12);
        assert_eq!(k.symbol, "BTC.USD");
        assert_eq!(k.to_string(), "runs/prj/abc/12.BTC.USD");
    }

    #[test]
    fn rejects_malformed_keys() {
        for key in [
            "other/prj/abc/1.X",
            "runs/prj/abc",
            "runs/prj/abc/x.X",
            "runs/prj/abc/1",
            "runs/prj/abc/1.",
            "runs/prj/abc/d/1.X",
            "runs//abc/1.X",
        ] {
            assert!(RunKey::parse(key).is_none(), "{key}");
        }
    }

    #[test]
    fn file_store_round_trip_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("store"));
        assert!(store.list(RUNS_PREFIX).unwrap().is_empty());

        let artifact = RunArtifact::new(result("p/a", &[0.0, 1.0]));
        store.save("runs/p/r1/0.X", &artifact).unwrap();
        store.save("runs/p/r1/1.X", &artifact).unwrap();
        store.save("runs/q/r2/0.Y", &artifact).unwrap();

        assert_eq!(store.list("runs/p/").unwrap(), vec!["runs/p/r1/0.X", "runs/p/r1/1.X"]);
        assert_eq!(store.load("runs/p/r1/1.X").unwrap(), Some(artifact));
        assert!(store.load("runs/p/r1/9.X").unwrap().is_none());

        store.delete("runs/p/r1/1.X").unwrap();
        store.delete("runs/p/r1/1.X").unwrap();
        assert_eq!(store.list(RUNS_PREFIX).unwrap().len(), 2);
    }

    #[test]
    fn file_store_reports_corrupt_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("runs/p/r")).unwrap();
        std::fs::write(dir.path().join("runs/p/r/0.X.json"), "{not json").unwrap();
        assert!(matches!(store.load("runs/p/r/0.X"), Err(StoreError::Serde { .. })));
    }

    #[test]
    fn path_traversal_is_rejected() {
        let store = FileStore::new("unused");
        assert!(matches!(store.load("runs/../../etc"), Err(StoreError::InvalidKey(_))));
        assert!(matches!(MemoryStore::new().delete("/abs"), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn store_results_appends_after_existing_sequences() {
        let store = MemoryStore::new();
        let results = vec![result("p/a", &[0.0]), result("p/b", &[0.0])];
        let first = store_results(&store, "p", "r", &results).unwrap();
        assert_eq!(first, vec!["runs/p/r/0.X", "runs/p/r/1.X"]);
        let second = store_results(&store, "p", "r", &results[..1]).unwrap();
        assert_eq!(second, vec!["runs/p/r/2.X"]);

        let saved = store.load("runs/p/r/1.X").unwrap().unwrap();
        assert_eq!(saved.task, "p/b");
        assert_eq!(saved.task_args["k"], 3);
        assert!(saved.performance.is_none());
    }

    #[test]
    fn run_ids_depend_on_setup_and_start() {
        let a = make_run_id("setup", ts(0));
        assert_eq!(a.len(), 16);
        assert_eq!(a, make_run_id("setup", ts(0)));
        assert_ne!(a, make_run_id("setup", ts(1)));
        assert_ne!(a, make_run_id("other", ts(0)));
    }
}
