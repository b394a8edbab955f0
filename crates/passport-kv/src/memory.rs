//! In-memory key-value backend.
//!
//! [`MemoryKv`] keeps hashes and sets in a single `HashMap` guarded by a
//! [`parking_lot::RwLock`]. Expired keys are hidden from reads immediately
//! and physically dropped the next time a batch touches them; there is no
//! background sweeper.
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - Not shared between processes, so it only suits single-instance
//!   deployments and tests

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use time::OffsetDateTime;
use tracing::{instrument, trace};

use crate::backend::{KeyTtl, KvBackend};
use crate::batch::{KvOp, WriteBatch};
use crate::error::{KvError, KvResult};
use crate::{HASH_KIND, NONE_KIND, SET_KIND};

#[derive(Debug, Clone)]
enum Value {
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Self::Hash(_) => HASH_KIND,
            Self::Set(_) => SET_KIND,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<OffsetDateTime>,
}

impl Entry {
    fn is_live(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-memory [`KvBackend`].
///
/// Cloning is cheap; all clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    data: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryKv {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_live<T>(
        &self,
        key: &str,
        read: impl FnOnce(Option<&Entry>) -> KvResult<T>,
    ) -> KvResult<T> {
        let now = OffsetDateTime::now_utc();
        let data = self.data.read();
        read(data.get(key).filter(|entry| entry.is_live(now)))
    }

    fn hash_of(key: &str, entry: Option<&Entry>) -> KvResult<HashMap<String, String>> {
        match entry.map(|entry| &entry.value) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(fields)) => Ok(fields.clone()),
            Some(other) => Err(KvError::wrong_type(key, HASH_KIND, other.kind())),
        }
    }

    /// Checks every op against the kinds stored (or produced earlier in the
    /// same batch) at its key.
    fn check_kinds(data: &HashMap<String, Entry>, ops: &[KvOp]) -> KvResult<()> {
        let mut kinds: HashMap<&str, &'static str> = HashMap::new();
        for op in ops {
            let key = op.key();
            let current = *kinds
                .entry(key)
                .or_insert_with(|| data.get(key).map_or(NONE_KIND, |entry| entry.value.kind()));

            if let Some(expected) = op.expected_kind()
                && current != NONE_KIND
                && current != expected
            {
                return Err(KvError::wrong_type(key, expected, current));
            }

            let next = match op {
                KvOp::HashReplace { fields, .. } if fields.is_empty() => NONE_KIND,
                KvOp::HashReplace { .. } => HASH_KIND,
                KvOp::SetAppend { .. } => SET_KIND,
                KvOp::SetRemove { .. } => current,
                KvOp::Delete { .. } => NONE_KIND,
            };
            kinds.insert(key, next);
        }
        Ok(())
    }

    fn apply(data: &mut HashMap<String, Entry>, op: KvOp) {
        match op {
            KvOp::HashReplace {
                key,
                fields,
                expires_at,
            } => {
                if fields.is_empty() {
                    data.remove(&key);
                } else {
                    let entry = Entry {
                        value: Value::Hash(fields.into_iter().collect()),
                        expires_at,
                    };
                    data.insert(key, entry);
                }
            }
            KvOp::SetAppend {
                key,
                members,
                expires_at,
            } => match data.get_mut(&key) {
                Some(Entry {
                    value: Value::Set(set),
                    expires_at: current,
                }) => {
                    set.extend(members);
                    *current = match (*current, expires_at) {
                        (Some(current), Some(requested)) => Some(current.max(requested)),
                        _ => None,
                    };
                }
                _ => {
                    let entry = Entry {
                        value: Value::Set(members.into_iter().collect()),
                        expires_at,
                    };
                    data.insert(key, entry);
                }
            },
            KvOp::SetRemove { key, members } => {
                let emptied = match data.get_mut(&key) {
                    Some(Entry {
                        value: Value::Set(set),
                        ..
                    }) => {
                        for member in &members {
                            set.remove(member);
                        }
                        set.is_empty()
                    }
                    _ => false,
                };
                if emptied {
                    data.remove(&key);
                }
            }
            KvOp::Delete { key } => {
                data.remove(&key);
            }
        }
    }
}

#[async_trait]
impl KvBackend for MemoryKv {
    async fn hash_get_all(&self, key: &str) -> KvResult<HashMap<String, String>> {
        self.read_live(key, |entry| Self::hash_of(key, entry))
    }

    async fn hash_get_all_many(&self, keys: &[String]) -> KvResult<Vec<HashMap<String, String>>> {
        let now = OffsetDateTime::now_utc();
        let data = self.data.read();
        keys.iter()
            .map(|key| Self::hash_of(key, data.get(key).filter(|entry| entry.is_live(now))))
            .collect()
    }

    async fn set_members(&self, key: &str) -> KvResult<Vec<String>> {
        self.read_live(key, |entry| match entry.map(|entry| &entry.value) {
            None => Ok(Vec::new()),
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(other) => Err(KvError::wrong_type(key, SET_KIND, other.kind())),
        })
    }

    async fn ttl(&self, key: &str) -> KvResult<KeyTtl> {
        let now = OffsetDateTime::now_utc();
        self.read_live(key, |entry| {
            Ok(match entry {
                None => KeyTtl::Missing,
                Some(Entry {
                    expires_at: None, ..
                }) => KeyTtl::Persistent,
                Some(Entry {
                    expires_at: Some(at),
                    ..
                }) => KeyTtl::ExpiresIn(Duration::try_from(*at - now).unwrap_or(Duration::ZERO)),
            })
        })
    }

    #[instrument(skip(self, batch), fields(ops = batch.len()), level = "trace")]
    async fn execute(&self, batch: WriteBatch) -> KvResult<()> {
        let now = OffsetDateTime::now_utc();
        let mut data = self.data.write();

        for op in batch.ops() {
            if data.get(op.key()).is_some_and(|entry| !entry.is_live(now)) {
                trace!(key = op.key(), "Dropping expired key");
                data.remove(op.key());
            }
        }

        Self::check_kinds(&data, batch.ops())?;

        for op in batch.into_ops() {
            Self::apply(&mut data, op);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> KvResult<bool> {
        let now = OffsetDateTime::now_utc();
        let removed = self.data.write().remove(key);
        Ok(removed.is_some_and(|entry| entry.is_live(now)))
    }

    async fn ping(&self) -> KvResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration as TimeDuration;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_hash_replace_and_read() {
        let kv = MemoryKv::new();
        let mut batch = WriteBatch::new();
        batch.hash_replace("h", fields(&[("a", "1"), ("b", "2")]), None);
        kv.execute(batch).await.unwrap();

        let hash = kv.hash_get_all("h").await.unwrap();
        assert_eq!(hash.len(), 2);
        assert_eq!(hash["a"], "1");
        assert_eq!(kv.ttl("h").await.unwrap(), KeyTtl::Persistent);

        let mut batch = WriteBatch::new();
        batch.hash_replace("h", fields(&[("c", "3")]), None);
        kv.execute(batch).await.unwrap();
        let hash = kv.hash_get_all("h").await.unwrap();
        assert_eq!(hash.len(), 1);
        assert_eq!(hash["c"], "3");
    }

    #[tokio::test]
    async fn test_missing_keys_read_as_empty() {
        let kv = MemoryKv::new();
        assert!(kv.hash_get_all("nope").await.unwrap().is_empty());
        assert!(kv.set_members("nope").await.unwrap().is_empty());
        assert_eq!(kv.ttl("nope").await.unwrap(), KeyTtl::Missing);
        assert!(!kv.delete("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_hash_is_hidden() {
        let kv = MemoryKv::new();
        let past = OffsetDateTime::now_utc() - TimeDuration::seconds(1);
        let mut batch = WriteBatch::new();
        batch.hash_replace("h", fields(&[("a", "1")]), Some(past));
        kv.execute(batch).await.unwrap();

        assert!(kv.hash_get_all("h").await.unwrap().is_empty());
        assert_eq!(kv.ttl("h").await.unwrap(), KeyTtl::Missing);
        let many = kv
            .hash_get_all_many(&["h".to_string(), "other".to_string()])
            .await
            .unwrap();
        assert_eq!(many.len(), 2);
        assert!(many.iter().all(HashMap::is_empty));
    }

    #[tokio::test]
    async fn test_set_append_keeps_longest_ttl() {
        let kv = MemoryKv::new();
        let now = OffsetDateTime::now_utc();
        let long = now + TimeDuration::hours(2);
        let short = now + TimeDuration::minutes(5);

        let mut batch = WriteBatch::new();
        batch.set_append("s", ["a"], Some(long));
        kv.execute(batch).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.set_append("s", ["b"], Some(short));
        kv.execute(batch).await.unwrap();

        match kv.ttl("s").await.unwrap() {
            KeyTtl::ExpiresIn(left) => assert!(left > Duration::from_secs(3600)),
            other => panic!("unexpected ttl {other:?}"),
        }
        let mut members = kv.set_members("s").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_set_append_persistent_set_stays_persistent() {
        let kv = MemoryKv::new();
        let mut batch = WriteBatch::new();
        batch.set_append("s", ["a"], None);
        kv.execute(batch).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.set_append(
            "s",
            ["b"],
            Some(OffsetDateTime::now_utc() + TimeDuration::minutes(1)),
        );
        kv.execute(batch).await.unwrap();

        assert_eq!(kv.ttl("s").await.unwrap(), KeyTtl::Persistent);
    }

    #[tokio::test]
    async fn test_set_remove_drops_empty_set() {
        let kv = MemoryKv::new();
        let mut batch = WriteBatch::new();
        batch.set_append("s", ["a", "b"], None);
        kv.execute(batch).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.set_remove("s", ["a", "b", "c"]);
        kv.execute(batch).await.unwrap();

        assert_eq!(kv.ttl("s").await.unwrap(), KeyTtl::Missing);
    }

    #[tokio::test]
    async fn test_wrong_type_batch_has_no_effect() {
        let kv = MemoryKv::new();
        let mut batch = WriteBatch::new();
        batch.hash_replace("h", fields(&[("a", "1")]), None);
        kv.execute(batch).await.unwrap();

        let mut batch = WriteBatch::new();
        batch
            .set_append("fresh", ["x"], None)
            .set_append("h", ["x"], None);
        let err = kv.execute(batch).await.unwrap_err();
        assert!(err.is_wrong_type());

        assert_eq!(kv.ttl("fresh").await.unwrap(), KeyTtl::Missing);
        assert!(kv.set_members("h").await.unwrap_err().is_wrong_type());
    }

    #[tokio::test]
    async fn test_delete_then_recreate_as_other_kind() {
        let kv = MemoryKv::new();
        let mut batch = WriteBatch::new();
        batch.hash_replace("k", fields(&[("a", "1")]), None);
        kv.execute(batch).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.delete("k").set_append("k", ["m"], None);
        kv.execute(batch).await.unwrap();

        assert_eq!(kv.set_members("k").await.unwrap(), vec!["m"]);
    }
}
