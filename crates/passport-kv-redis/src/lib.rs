//! Redis backend for the Passport grant store.
//!
//! [`RedisKv`] implements [`KvBackend`] on top of a `deadpool-redis`
//! connection pool. Hashes map to Redis hashes, sets to Redis sets, and
//! expiries to `PEXPIREAT` so they are evaluated against the Redis server
//! clock. Write batches run as a single Lua script.
//!
//! # Example
//!
//! ```ignore
//! use passport_kv_redis::{RedisConfig, RedisKv};
//!
//! let kv = RedisKv::connect(&RedisConfig::default()).await?;
//! let store = IndexedGrantStore::new(Arc::new(kv), &GrantStoreConfig::default())?;
//! ```

pub mod config;
mod script;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool, Runtime};
use passport_kv::{KeyTtl, KvBackend, KvError, KvResult, WriteBatch};
use redis::{AsyncCommands, RedisError};
use tracing::{debug, info, instrument};

pub use config::{ConfigError, RedisConfig};

/// Redis-backed [`KvBackend`].
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct RedisKv {
    pool: Pool,
}

impl std::fmt::Debug for RedisKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKv")
            .field("pool", &self.pool.status())
            .finish()
    }
}

impl RedisKv {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds a pool from `config` and checks that one connection works.
    ///
    /// # Errors
    ///
    /// Returns `KvError::Connection` if the configuration is invalid, the
    /// pool cannot be created, or Redis does not answer.
    pub async fn connect(config: &RedisConfig) -> KvResult<Self> {
        config
            .validate()
            .map_err(|e| KvError::connection(e.to_string()))?;
        let url = config
            .connection_url()
            .map_err(|e| KvError::connection(e.to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let mut redis_config = deadpool_redis::Config::from_url(url);
        if let Some(ref mut pool_config) = redis_config.pool {
            pool_config.max_size = config.pool_size;
            pool_config.timeouts.wait = Some(timeout);
            pool_config.timeouts.create = Some(timeout);
            pool_config.timeouts.recycle = Some(timeout);
        } else {
            let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
            pool_config.timeouts.wait = Some(timeout);
            pool_config.timeouts.create = Some(timeout);
            pool_config.timeouts.recycle = Some(timeout);
            redis_config.pool = Some(pool_config);
        }

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| KvError::connection(format!("failed to create Redis pool: {e}")))?;

        let backend = Self::new(pool);
        backend.ping().await?;
        info!(
            database = config.database,
            pool_size = config.pool_size,
            "Connected to Redis"
        );
        Ok(backend)
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn connection(&self) -> KvResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| KvError::connection(format!("failed to get Redis connection: {e}")))
    }
}

/// Maps a Redis error onto the backend taxonomy.
fn map_redis_error(err: RedisError, key: &str, expected: &'static str) -> KvError {
    if err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
    {
        return KvError::connection(err.to_string());
    }
    if err.code() == Some("WRONGTYPE") {
        // Batch script replies carry "<key> <expected> <found>".
        if let Some(detail) = err.detail() {
            let mut parts = detail.rsplitn(3, ' ');
            if let (Some(found), Some(wanted), Some(key)) = (parts.next(), parts.next(), parts.next())
                && (wanted == passport_kv::HASH_KIND || wanted == passport_kv::SET_KIND)
            {
                let wanted = if wanted == passport_kv::HASH_KIND {
                    passport_kv::HASH_KIND
                } else {
                    passport_kv::SET_KIND
                };
                return KvError::wrong_type(key, wanted, found);
            }
        }
        return KvError::wrong_type(key, expected, "unknown");
    }
    KvError::command(err.to_string())
}

#[async_trait]
impl KvBackend for RedisKv {
    #[instrument(skip(self), level = "trace")]
    async fn hash_get_all(&self, key: &str) -> KvResult<HashMap<String, String>> {
        let mut conn = self.connection().await?;
        let fields: HashMap<String, String> = conn
            .hgetall(key)
            .await
            .map_err(|e| map_redis_error(e, key, passport_kv::HASH_KIND))?;
        Ok(fields)
    }

    #[instrument(skip(self, keys), fields(count = keys.len()), level = "trace")]
    async fn hash_get_all_many(&self, keys: &[String]) -> KvResult<Vec<HashMap<String, String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.hgetall(key);
        }
        let rows: Vec<HashMap<String, String>> = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(e, &keys.join(","), passport_kv::HASH_KIND))?;
        Ok(rows)
    }

    #[instrument(skip(self), level = "trace")]
    async fn set_members(&self, key: &str) -> KvResult<Vec<String>> {
        let mut conn = self.connection().await?;
        let members: Vec<String> = conn
            .smembers(key)
            .await
            .map_err(|e| map_redis_error(e, key, passport_kv::SET_KIND))?;
        Ok(members)
    }

    async fn ttl(&self, key: &str) -> KvResult<KeyTtl> {
        let mut conn = self.connection().await?;
        let millis: i64 = conn
            .pttl(key)
            .await
            .map_err(|e| map_redis_error(e, key, passport_kv::NONE_KIND))?;
        Ok(match millis {
            -2 => KeyTtl::Missing,
            -1 => KeyTtl::Persistent,
            ms => KeyTtl::ExpiresIn(Duration::from_millis(ms.max(0).unsigned_abs())),
        })
    }

    #[instrument(skip(self, batch), fields(ops = batch.len()))]
    async fn execute(&self, batch: WriteBatch) -> KvResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        let invocation = script::invocation(&batch);
        let first_key = batch.ops()[0].key().to_string();
        let _: () = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(e, &first_key, passport_kv::NONE_KIND))?;
        debug!(ops = batch.len(), "Executed write batch");
        Ok(())
    }

    async fn delete(&self, key: &str) -> KvResult<bool> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn
            .del(key)
            .await
            .map_err(|e| map_redis_error(e, key, passport_kv::NONE_KIND))?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> KvResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(e, "", passport_kv::NONE_KIND))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
