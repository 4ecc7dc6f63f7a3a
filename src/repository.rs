//! Key-value persistence for prediction results.
//!
//! Each storage key maps to one JSON object (`id -> record`). The file-backed
//! repository writes that object to `<data_dir>/<key>.json`; the in-memory one
//! keeps it in a map and is used by tests and throwaway runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engagement::EngagementPrediction;
use crate::learning_style::LearningStyleResult;
use crate::risk::RiskPrediction;

pub const LEARNING_STYLE_KEY: &str = "learning_style_predictions";
pub const RISK_KEY: &str = "academic_risk_predictions";
pub const ENGAGEMENT_KEY: &str = "engagement_predictions";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage task: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A record that can live in a [`Repository`].
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Empty until the record is first saved.
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

pub trait Repository<T: Entity>: Send + Sync {
    /// Insert or replace; a record without an id is given a fresh one.
    fn save(&self, item: T) -> Result<T, StorageError>;
    fn find_by_id(&self, id: &str) -> Result<Option<T>, StorageError>;
    fn find_all(&self, filter: &dyn Fn(&T) -> bool) -> Result<Vec<T>, StorageError>;
    /// Returns whether anything was removed.
    fn delete(&self, id: &str) -> Result<bool, StorageError>;
    fn clear(&self) -> Result<(), StorageError>;

    fn exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.find_by_id(id)?.is_some())
    }

    /// Save several records; implementations that can fail part-way keep none of them.
    fn save_all(&self, items: Vec<T>) -> Result<Vec<T>, StorageError> {
        items.into_iter().map(|item| self.save(item)).collect()
    }
}

fn ensure_id<T: Entity>(item: &mut T) {
    if item.id().trim().is_empty() {
        item.set_id(Uuid::new_v4().to_string());
    }
}

// Poisoned locks are recovered rather than propagated.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct InMemoryRepository<T> {
    items: Mutex<BTreeMap<String, T>>,
}

impl<T> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self { items: Mutex::new(BTreeMap::new()) }
    }
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Repository<T> for InMemoryRepository<T> {
    fn save(&self, mut item: T) -> Result<T, StorageError> {
        ensure_id(&mut item);
        lock(&self.items).insert(item.id().to_string(), item.clone());
        Ok(item)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<T>, StorageError> {
        Ok(lock(&self.items).get(id).cloned())
    }

    fn find_all(&self, filter: &dyn Fn(&T) -> bool) -> Result<Vec<T>, StorageError> {
        Ok(lock(&self.items).values().filter(|item| filter(item)).cloned().collect())
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        Ok(lock(&self.items).remove(id).is_some())
    }

    fn clear(&self) -> Result<(), StorageError> {
        lock(&self.items).clear();
        Ok(())
    }
}

/// One JSON file per storage key, rewritten on every mutation.
pub struct JsonFileRepository<T> {
    path: PathBuf,
    items: Mutex<BTreeMap<String, T>>,
}

impl<T: Entity> JsonFileRepository<T> {
    pub fn open(data_dir: &Path, key: &str) -> Result<Self, StorageError> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(format!("{key}.json"));
        let items = read_items(&path);
        tracing::debug!(path = %path.display(), records = items.len(), "opened store");
        Ok(Self { path, items: Mutex::new(items) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &BTreeMap<String, T>) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(items)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

// Undo map edits in reverse, restoring whatever each id held before.
fn restore<T>(items: &mut BTreeMap<String, T>, undo: Vec<(String, Option<T>)>) {
    for (id, previous) in undo.into_iter().rev() {
        match previous {
            Some(previous) => {
                items.insert(id, previous);
            }
            None => {
                items.remove(&id);
            }
        }
    }
}

/// Missing and unreadable files both read as an empty store.
fn read_items<T: Entity>(path: &Path) -> BTreeMap<String, T> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "store unreadable, starting empty");
            return BTreeMap::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(items) => items,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "store corrupt, starting empty");
            BTreeMap::new()
        }
    }
}

impl<T: Entity> Repository<T> for JsonFileRepository<T> {
    // A mutation whose file write fails is undone in memory.
    fn save(&self, mut item: T) -> Result<T, StorageError> {
        ensure_id(&mut item);
        let mut items = lock(&self.items);
        let id = item.id().to_string();
        let previous = items.insert(id.clone(), item.clone());
        if let Err(err) = self.persist(&items) {
            restore(&mut items, vec![(id, previous)]);
            return Err(err);
        }
        Ok(item)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<T>, StorageError> {
        Ok(lock(&self.items).get(id).cloned())
    }

    fn find_all(&self, filter: &dyn Fn(&T) -> bool) -> Result<Vec<T>, StorageError> {
        Ok(lock(&self.items).values().filter(|item| filter(item)).cloned().collect())
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let mut items = lock(&self.items);
        let Some(previous) = items.remove(id) else {
            return Ok(false);
        };
        if let Err(err) = self.persist(&items) {
            items.insert(id.to_string(), previous);
            return Err(err);
        }
        Ok(true)
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut items = lock(&self.items);
        let previous = std::mem::take(&mut *items);
        if let Err(err) = self.persist(&items) {
            *items = previous;
            return Err(err);
        }
        Ok(())
    }

    fn save_all(&self, mut batch: Vec<T>) -> Result<Vec<T>, StorageError> {
        let mut items = lock(&self.items);
        let mut undo = Vec::with_capacity(batch.len());
        for item in &mut batch {
            ensure_id(item);
            let id = item.id().to_string();
            let previous = items.insert(id.clone(), item.clone());
            undo.push((id, previous));
        }
        if let Err(err) = self.persist(&items) {
            restore(&mut items, undo);
            return Err(err);
        }
        Ok(batch)
    }
}

/// A predictor result as persisted, stamped with its owner and creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPrediction<R> {
    #[serde(default)]
    pub id: String,
    pub student_id: String,
    pub created_at: DateTime<Utc>,
    pub result: R,
}

impl<R> Entity for StoredPrediction<R>
where
    R: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

pub type LearningStyleRecord = StoredPrediction<LearningStyleResult>;
pub type RiskRecord = StoredPrediction<RiskPrediction>;
pub type EngagementRecord = StoredPrediction<EngagementPrediction>;

/// Per-predictor queries layered over any [`Repository`].
pub struct PredictionStore<R> {
    repo: Arc<dyn Repository<StoredPrediction<R>>>,
}

impl<R> Clone for PredictionStore<R> {
    fn clone(&self) -> Self {
        Self { repo: Arc::clone(&self.repo) }
    }
}

impl<R> PredictionStore<R>
where
    R: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(repo: Arc<dyn Repository<StoredPrediction<R>>>) -> Self {
        Self { repo }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRepository::new()))
    }

    pub fn json_file(data_dir: &Path, key: &str) -> Result<Self, StorageError> {
        Ok(Self::new(Arc::new(JsonFileRepository::open(data_dir, key)?)))
    }

    pub fn record(&self, student_id: &str, result: R) -> Result<StoredPrediction<R>, StorageError> {
        self.repo.save(StoredPrediction {
            id: String::new(),
            student_id: student_id.to_string(),
            created_at: Utc::now(),
            result,
        })
    }

    /// All-or-nothing insert of `(student_id, result)` pairs sharing one timestamp.
    pub fn record_all(&self, entries: Vec<(String, R)>) -> Result<Vec<StoredPrediction<R>>, StorageError> {
        let created_at = Utc::now();
        let records = entries
            .into_iter()
            .map(|(student_id, result)| StoredPrediction { id: String::new(), student_id, created_at, result })
            .collect();
        self.repo.save_all(records)
    }

    /// [`record`](Self::record) on the blocking pool, keeping file writes off the async workers.
    pub async fn spawn_record(&self, student_id: &str, result: R) -> Result<StoredPrediction<R>, StorageError> {
        let store = self.clone();
        let student_id = student_id.to_string();
        tokio::task::spawn_blocking(move || store.record(&student_id, result)).await?
    }

    pub async fn spawn_record_all(
        &self,
        entries: Vec<(String, R)>,
    ) -> Result<Vec<StoredPrediction<R>>, StorageError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.record_all(entries)).await?
    }

    pub fn get(&self, id: &str) -> Result<Option<StoredPrediction<R>>, StorageError> {
        self.repo.find_by_id(id)
    }

    pub fn all(&self) -> Result<Vec<StoredPrediction<R>>, StorageError> {
        self.repo.find_all(&|_| true)
    }

    pub fn count(&self) -> Result<usize, StorageError> {
        Ok(self.all()?.len())
    }

    pub fn find_by_student(&self, student_id: &str) -> Result<Vec<StoredPrediction<R>>, StorageError> {
        self.repo.find_all(&|record| record.student_id == student_id)
    }

    /// Newest first, at most `limit` records.
    pub fn history(&self, student_id: &str, limit: usize) -> Result<Vec<StoredPrediction<R>>, StorageError> {
        let mut records = self.find_by_student(student_id)?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    pub fn latest_for_student(&self, student_id: &str) -> Result<Option<StoredPrediction<R>>, StorageError> {
        Ok(self.history(student_id, 1)?.into_iter().next())
    }

    /// Distinct student ids with at least one stored result, sorted.
    pub fn student_ids(&self, limit: usize) -> Result<Vec<String>, StorageError> {
        let ids: BTreeSet<String> = self.all()?.into_iter().map(|record| record.student_id).collect();
        Ok(ids.into_iter().take(limit).collect())
    }

    pub fn delete(&self, id: &str) -> Result<bool, StorageError> {
        self.repo.delete(id)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.repo.clear()
    }
}

/// The three predictor stores the service writes to.
#[derive(Clone)]
pub struct Stores {
    pub learning_style: PredictionStore<LearningStyleResult>,
    pub risk: PredictionStore<RiskPrediction>,
    pub engagement: PredictionStore<EngagementPrediction>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            learning_style: PredictionStore::in_memory(),
            risk: PredictionStore::in_memory(),
            engagement: PredictionStore::in_memory(),
        }
    }

    pub fn json_files(data_dir: &Path) -> Result<Self, StorageError> {
        Ok(Self {
            learning_style: PredictionStore::json_file(data_dir, LEARNING_STYLE_KEY)?,
            risk: PredictionStore::json_file(data_dir, RISK_KEY)?,
            engagement: PredictionStore::json_file(data_dir, ENGAGEMENT_KEY)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::assess;
    use crate::risk::tests::request;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        #[serde(default)]
        id: String,
        text: String,
    }

    impl Entity for Note {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_id(&mut self, id: String) {
            self.id = id;
        }
    }

    fn note(text: &str) -> Note {
        Note { id: String::new(), text: text.to_string() }
    }

    fn exercise(repo: &dyn Repository<Note>) {
        let saved = repo.save(note("first")).unwrap();
        assert!(!saved.id.is_empty());
        assert!(repo.exists(&saved.id).unwrap());

        let kept = repo.save(Note { id: "fixed".into(), text: "second".into() }).unwrap();
        assert_eq!(kept.id, "fixed");

        let found = repo.find_all(&|n: &Note| n.text.starts_with('s')).unwrap();
        assert_eq!(found, vec![kept.clone()]);

        assert!(repo.delete("fixed").unwrap());
        assert!(!repo.delete("fixed").unwrap());
        assert!(!repo.exists("fixed").unwrap());

        repo.clear().unwrap();
        assert!(repo.find_all(&|_| true).unwrap().is_empty());
    }

    #[test]
    fn test_in_memory_repository() {
        exercise(&InMemoryRepository::new());
    }

    #[test]
    fn test_json_file_repository() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&JsonFileRepository::open(dir.path(), "notes").unwrap());
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store: PredictionStore<RiskPrediction> = PredictionStore::json_file(dir.path(), RISK_KEY).unwrap();
        let saved = store.record("STU1", assess(&request("STU1"), 0.42)).unwrap();

        let reopened: PredictionStore<RiskPrediction> = PredictionStore::json_file(dir.path(), RISK_KEY).unwrap();
        assert_eq!(reopened.get(&saved.id).unwrap(), Some(saved));
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.json"), "{not json").unwrap();
        let repo: JsonFileRepository<Note> = JsonFileRepository::open(dir.path(), "notes").unwrap();
        assert!(repo.find_all(&|_| true).unwrap().is_empty());

        repo.save(note("recovered")).unwrap();
        let reopened: JsonFileRepository<Note> = JsonFileRepository::open(dir.path(), "notes").unwrap();
        assert_eq!(reopened.find_all(&|_| true).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("store");
        let repo: JsonFileRepository<Note> = JsonFileRepository::open(&data_dir, "notes").unwrap();
        let kept = repo.save(Note { id: "kept".into(), text: "before".into() }).unwrap();
        fs::remove_dir_all(&data_dir).unwrap();

        assert!(repo.save(Note { id: "a".into(), text: "lost".into() }).is_err());
        assert_eq!(repo.find_by_id("a").unwrap(), None);

        assert!(repo.save(Note { id: "kept".into(), text: "after".into() }).is_err());
        assert_eq!(repo.find_by_id("kept").unwrap(), Some(kept.clone()));

        assert!(repo.delete("kept").is_err());
        assert!(repo.clear().is_err());
        assert!(repo.save_all(vec![note("x"), note("y")]).is_err());
        assert_eq!(repo.find_all(&|_| true).unwrap(), vec![kept]);
    }

    #[test]
    fn test_record_all_shares_one_write() {
        let dir = tempfile::tempdir().unwrap();
        let store: PredictionStore<RiskPrediction> = PredictionStore::json_file(dir.path(), RISK_KEY).unwrap();
        let records = store
            .record_all(vec![
                ("STU1".to_string(), assess(&request("STU1"), 0.2)),
                ("STU2".to_string(), assess(&request("STU2"), 0.8)),
            ])
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_ne!(records[0].id, records[1].id);

        let reopened: PredictionStore<RiskPrediction> = PredictionStore::json_file(dir.path(), RISK_KEY).unwrap();
        assert_eq!(reopened.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_spawned_record_is_visible() {
        let store: PredictionStore<RiskPrediction> = PredictionStore::in_memory();
        let saved = store.spawn_record("STU1", assess(&request("STU1"), 0.2)).await.unwrap();
        assert_eq!(store.get(&saved.id).unwrap(), Some(saved));
    }

    #[test]
    fn test_history_is_newest_first() {
        let repo: Arc<InMemoryRepository<RiskRecord>> = Arc::new(InMemoryRepository::new());
        let start = Utc::now();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            repo.save(StoredPrediction {
                id: (*id).to_string(),
                student_id: "STU1".into(),
                created_at: start + Duration::seconds(i as i64),
                result: assess(&request("STU1"), 0.2),
            })
            .unwrap();
        }
        let store = PredictionStore::new(repo);
        store.record("STU2", assess(&request("STU2"), 0.8)).unwrap();

        let history = store.history("STU1", 2).unwrap();
        let ids: Vec<_> = history.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(store.latest_for_student("STU1").unwrap().unwrap().id, "c");
        assert_eq!(store.student_ids(10).unwrap(), vec!["STU1".to_string(), "STU2".to_string()]);
        assert!(store.latest_for_student("nobody").unwrap().is_none());
    }
}
