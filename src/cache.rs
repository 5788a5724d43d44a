//! Persistent key-value cache with two namespaces (lessons, synthesized audio).
//!
//! Each namespace is stored as a single JSON object blob, the way browser local storage
//! holds it. Writes are whole-blob replacements; a failed write triggers the
//! clear-and-retry recovery path and is never surfaced to callers.

use std::{
  collections::HashMap,
  fs,
  io::Write,
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, error, instrument, warn};

use crate::error::StorageError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
  Lessons,
  Audio,
}

impl Namespace {
  /// Storage name of the namespace blob.
  pub fn storage_name(self) -> &'static str {
    match self {
      Namespace::Lessons => "vietlearn_lessons_v1",
      Namespace::Audio => "vietlearn_audio_v1",
    }
  }
}

/// A persistent string store addressed by namespace. One blob per namespace.
pub trait KvBackend: Send + Sync {
  fn read(&self, namespace: &str) -> Result<Option<String>, StorageError>;
  fn write(&self, namespace: &str, blob: &str) -> Result<(), StorageError>;
  fn remove(&self, namespace: &str) -> Result<(), StorageError>;
}

/// One `<namespace>.json` file per namespace under `dir`, replaced atomically.
pub struct FileBackend {
  dir: PathBuf,
  quota_bytes: usize,
}

impl FileBackend {
  pub fn new(dir: impl Into<PathBuf>, quota_bytes: usize) -> Self {
    Self { dir: dir.into(), quota_bytes }
  }

  fn path_for(&self, namespace: &str) -> PathBuf {
    self.dir.join(format!("{}.json", namespace))
  }
}

impl KvBackend for FileBackend {
  fn read(&self, namespace: &str) -> Result<Option<String>, StorageError> {
    let path = self.path_for(namespace);
    match fs::read_to_string(&path) {
      Ok(s) => Ok(Some(s)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  fn write(&self, namespace: &str, blob: &str) -> Result<(), StorageError> {
    if blob.len() > self.quota_bytes {
      return Err(StorageError::QuotaExceeded {
        namespace: namespace.to_string(),
        size: blob.len(),
        quota: self.quota_bytes,
      });
    }
    fs::create_dir_all(&self.dir)?;
    let mut tmp = NamedTempFile::new_in(&self.dir)?;
    tmp.write_all(blob.as_bytes())?;
    tmp.persist(self.path_for(namespace)).map_err(|e| e.error)?;
    Ok(())
  }

  fn remove(&self, namespace: &str) -> Result<(), StorageError> {
    match fs::remove_file(self.path_for(namespace)) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}

/// In-process backend with an optional byte quota per namespace.
#[derive(Default)]
pub struct MemoryBackend {
  blobs: Mutex<HashMap<String, String>>,
  quota_bytes: Option<usize>,
}

impl MemoryBackend {
  pub fn with_quota(quota_bytes: usize) -> Self {
    Self { blobs: Mutex::default(), quota_bytes: Some(quota_bytes) }
  }
}

impl KvBackend for MemoryBackend {
  fn read(&self, namespace: &str) -> Result<Option<String>, StorageError> {
    let blobs = self.blobs.lock().unwrap_or_else(|p| p.into_inner());
    Ok(blobs.get(namespace).cloned())
  }

  fn write(&self, namespace: &str, blob: &str) -> Result<(), StorageError> {
    if let Some(quota) = self.quota_bytes {
      if blob.len() > quota {
        return Err(StorageError::QuotaExceeded {
          namespace: namespace.to_string(),
          size: blob.len(),
          quota,
        });
      }
    }
    let mut blobs = self.blobs.lock().unwrap_or_else(|p| p.into_inner());
    blobs.insert(namespace.to_string(), blob.to_string());
    Ok(())
  }

  fn remove(&self, namespace: &str) -> Result<(), StorageError> {
    let mut blobs = self.blobs.lock().unwrap_or_else(|p| p.into_inner());
    blobs.remove(namespace);
    Ok(())
  }
}

/// Typed JSON get/set over a `KvBackend`, with quota-overflow recovery.
#[derive(Clone)]
pub struct CacheStore {
  backend: Arc<dyn KvBackend>,
  // Serializes read-modify-write of a namespace blob.
  write_lock: Arc<Mutex<()>>,
}

impl CacheStore {
  pub fn new(backend: Arc<dyn KvBackend>) -> Self {
    Self { backend, write_lock: Arc::new(Mutex::new(())) }
  }

  pub fn on_disk(dir: &Path, quota_bytes: usize) -> Self {
    Self::new(Arc::new(FileBackend::new(dir, quota_bytes)))
  }

  pub fn in_memory() -> Self {
    Self::new(Arc::new(MemoryBackend::default()))
  }

  fn load_map(&self, ns: Namespace) -> Result<Map<String, Value>, StorageError> {
    match self.backend.read(ns.storage_name())? {
      Some(blob) => Ok(serde_json::from_str(&blob)?),
      None => Ok(Map::new()),
    }
  }

  /// Value under `key`, or `None` on miss, unreadable store or a value of the wrong shape.
  #[instrument(level = "debug", skip(self), fields(ns = ns.storage_name()))]
  pub fn get<T: DeserializeOwned>(&self, ns: Namespace, key: &str) -> Option<T> {
    let mut map = match self.load_map(ns) {
      Ok(m) => m,
      Err(e) => {
        warn!(target: "cache", ns = ns.storage_name(), error = %e, "Failed to load from storage");
        return None;
      }
    };
    let value = map.remove(key)?;
    match serde_json::from_value(value) {
      Ok(v) => Some(v),
      Err(e) => {
        warn!(target: "cache", ns = ns.storage_name(), %key, error = %e, "Cached value has unexpected shape");
        None
      }
    }
  }

  /// Insert `value` under `key`. Never fails from the caller's point of view:
  /// on a write failure the namespace is dropped and only this entry is written back.
  #[instrument(level = "debug", skip(self, value), fields(ns = ns.storage_name()))]
  pub fn set<T: Serialize>(&self, ns: Namespace, key: &str, value: &T) {
    let value = match serde_json::to_value(value) {
      Ok(v) => v,
      Err(e) => {
        error!(target: "cache", %key, error = %e, "Value is not serializable; not cached");
        return;
      }
    };

    let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
    let first = self.load_map(ns).and_then(|mut map| {
      map.insert(key.to_string(), value.clone());
      let blob = serde_json::to_string(&map)?;
      self.backend.write(ns.storage_name(), &blob)
    });
    let Err(e) = first else {
      debug!(target: "cache", ns = ns.storage_name(), %key, "Cached");
      return;
    };

    warn!(target: "cache", ns = ns.storage_name(), error = %e, "Storage write failed; clearing namespace and retrying");
    let retry = self.backend.remove(ns.storage_name()).and_then(|_| {
      let mut fresh = Map::new();
      fresh.insert(key.to_string(), value);
      let blob = serde_json::to_string(&fresh)?;
      self.backend.write(ns.storage_name(), &blob)
    });
    if let Err(e) = retry {
      error!(target: "cache", ns = ns.storage_name(), %key, error = %e, "Storage completely full; entry not cached");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Locale;
  use crate::seeds;
  use std::sync::atomic::{AtomicUsize, Ordering};

  /// Fails the first `fail_first` writes, then delegates to memory.
  struct FlakyBackend {
    inner: MemoryBackend,
    fail_first: usize,
    writes: AtomicUsize,
    removes: AtomicUsize,
  }

  impl FlakyBackend {
    fn new(fail_first: usize) -> Self {
      Self {
        inner: MemoryBackend::default(),
        fail_first,
        writes: AtomicUsize::new(0),
        removes: AtomicUsize::new(0),
      }
    }
  }

  impl KvBackend for FlakyBackend {
    fn read(&self, namespace: &str) -> Result<Option<String>, StorageError> {
      self.inner.read(namespace)
    }
    fn write(&self, namespace: &str, blob: &str) -> Result<(), StorageError> {
      let n = self.writes.fetch_add(1, Ordering::SeqCst);
      if n < self.fail_first {
        return Err(StorageError::QuotaExceeded { namespace: namespace.into(), size: blob.len(), quota: 0 });
      }
      self.inner.write(namespace, blob)
    }
    fn remove(&self, namespace: &str) -> Result<(), StorageError> {
      self.removes.fetch_add(1, Ordering::SeqCst);
      self.inner.remove(namespace)
    }
  }

  #[test]
  fn lesson_round_trips_through_the_store() {
    let store = CacheStore::in_memory();
    let lesson = seeds::lookup(Locale::Tw, "Xin Chào (打招呼)").expect("seed");
    store.set(Namespace::Lessons, "TW-x", &lesson);
    let back: Option<crate::domain::LessonContent> = store.get(Namespace::Lessons, "TW-x");
    assert_eq!(back, Some(lesson));
  }

  #[test]
  fn namespaces_are_independent() {
    let store = CacheStore::in_memory();
    store.set(Namespace::Audio, "TW-Xin chào", &"QUJD".to_string());
    assert_eq!(store.get::<String>(Namespace::Lessons, "TW-Xin chào"), None);
    assert_eq!(store.get::<String>(Namespace::Audio, "TW-Xin chào"), Some("QUJD".into()));
  }

  #[test]
  fn corrupted_namespace_reads_as_miss() {
    let backend = Arc::new(MemoryBackend::default());
    backend.write(Namespace::Lessons.storage_name(), "{not json").unwrap();
    let store = CacheStore::new(backend);
    assert_eq!(store.get::<String>(Namespace::Lessons, "k"), None);
  }

  #[test]
  fn corrupted_namespace_is_replaced_on_write() {
    let backend = Arc::new(MemoryBackend::default());
    backend.write(Namespace::Lessons.storage_name(), "[1,2").unwrap();
    let store = CacheStore::new(backend);
    store.set(Namespace::Lessons, "k", &"v".to_string());
    assert_eq!(store.get::<String>(Namespace::Lessons, "k"), Some("v".into()));
  }

  #[test]
  fn overflow_clears_namespace_and_keeps_new_entry() {
    let flaky = Arc::new(FlakyBackend::new(1));
    flaky.inner.write(Namespace::Audio.storage_name(), r#"{"old":"a"}"#).unwrap();
    let store = CacheStore::new(flaky.clone());
    store.set(Namespace::Audio, "new", &"b".to_string());

    assert_eq!(flaky.removes.load(Ordering::SeqCst), 1);
    assert_eq!(store.get::<String>(Namespace::Audio, "new"), Some("b".into()));
    assert_eq!(store.get::<String>(Namespace::Audio, "old"), None);
  }

  #[test]
  fn double_failure_is_swallowed() {
    let flaky = Arc::new(FlakyBackend::new(usize::MAX));
    let store = CacheStore::new(flaky.clone());
    store.set(Namespace::Lessons, "k", &"v".to_string());
    assert_eq!(flaky.writes.load(Ordering::SeqCst), 2);
    assert_eq!(store.get::<String>(Namespace::Lessons, "k"), None);
  }

  #[test]
  fn quota_overflow_evicts_older_entries() {
    let store = CacheStore::new(Arc::new(MemoryBackend::with_quota(40)));
    store.set(Namespace::Audio, "a", &"x".repeat(15));
    store.set(Namespace::Audio, "b", &"y".repeat(15));
    assert_eq!(store.get::<String>(Namespace::Audio, "a"), None);
    assert_eq!(store.get::<String>(Namespace::Audio, "b"), Some("y".repeat(15)));
  }

  #[test]
  fn file_backend_persists_across_instances() {
    let tmp = tempfile::TempDir::new().expect("tmp dir");
    CacheStore::on_disk(tmp.path(), 1 << 20).set(Namespace::Lessons, "VN-k", &vec![1, 2, 3]);
    let reopened = CacheStore::on_disk(tmp.path(), 1 << 20);
    assert_eq!(reopened.get::<Vec<u32>>(Namespace::Lessons, "VN-k"), Some(vec![1, 2, 3]));
    assert!(tmp.path().join("vietlearn_lessons_v1.json").exists());
  }

  #[test]
  fn file_backend_enforces_quota() {
    let tmp = tempfile::TempDir::new().expect("tmp dir");
    let backend = FileBackend::new(tmp.path(), 4);
    assert!(matches!(backend.write("ns", "12345"), Err(StorageError::QuotaExceeded { .. })));
    assert!(backend.read("ns").unwrap().is_none());
  }
}
