//! Integration tests for the Redis backend.
//!
//! These tests start a real Redis via testcontainers and therefore need a
//! container runtime. Run them with `cargo test -- --ignored`.

use std::collections::HashMap;
use std::time::Duration;

use passport_kv::{KeyTtl, KvBackend, WriteBatch};
use passport_kv_redis::{RedisConfig, RedisKv};
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use time::OffsetDateTime;
use tokio::sync::OnceCell;

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            // PEXPIREAT ... GT needs Redis 7
            let container = Redis::default()
                .with_tag("7.2")
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (container, url)
        })
        .await;

    url.clone()
}

async fn backend(database: u32) -> RedisKv {
    let config = RedisConfig {
        url: get_redis_url().await,
        database,
        pool_size: 4,
        timeout_ms: 5000,
    };
    RedisKv::connect(&config).await.expect("connect to redis")
}

fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_redis_hash_round_trip() {
    let kv = backend(1).await;
    let mut batch = WriteBatch::new();
    batch.hash_replace("rt:h", fields(&[("a", "1"), ("b", "2")]), None);
    kv.execute(batch).await.unwrap();

    let hash = kv.hash_get_all("rt:h").await.unwrap();
    assert_eq!(hash.get("a").map(String::as_str), Some("1"));
    assert_eq!(kv.ttl("rt:h").await.unwrap(), KeyTtl::Persistent);

    let many = kv
        .hash_get_all_many(&["rt:h".to_string(), "rt:missing".to_string()])
        .await
        .unwrap();
    assert_eq!(many.len(), 2);
    assert_eq!(many[0].len(), 2);
    assert_eq!(many[1], HashMap::new());
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_redis_set_append_ttl_rules() {
    let kv = backend(2).await;
    let now = OffsetDateTime::now_utc();

    let mut batch = WriteBatch::new();
    batch.set_append("ttl:s", ["a"], Some(now + time::Duration::hours(2)));
    kv.execute(batch).await.unwrap();

    let mut batch = WriteBatch::new();
    batch.set_append("ttl:s", ["b"], Some(now + time::Duration::minutes(1)));
    kv.execute(batch).await.unwrap();

    match kv.ttl("ttl:s").await.unwrap() {
        KeyTtl::ExpiresIn(left) => assert!(left > Duration::from_secs(3600)),
        other => panic!("unexpected ttl {other:?}"),
    }

    let mut batch = WriteBatch::new();
    batch.set_append("ttl:s", ["c"], None);
    kv.execute(batch).await.unwrap();
    assert_eq!(kv.ttl("ttl:s").await.unwrap(), KeyTtl::Persistent);
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_redis_wrong_type_batch_is_rejected_whole() {
    let kv = backend(3).await;
    let mut batch = WriteBatch::new();
    batch.hash_replace("wt:h", fields(&[("a", "1")]), None);
    kv.execute(batch).await.unwrap();

    let mut batch = WriteBatch::new();
    batch
        .set_append("wt:fresh", ["x"], None)
        .set_append("wt:h", ["x"], None);
    let err = kv.execute(batch).await.unwrap_err();
    assert!(err.is_wrong_type());
    assert_eq!(kv.ttl("wt:fresh").await.unwrap(), KeyTtl::Missing);
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_redis_past_expiry_deletes() {
    let kv = backend(4).await;
    let mut batch = WriteBatch::new();
    batch.hash_replace(
        "past:h",
        fields(&[("a", "1")]),
        Some(OffsetDateTime::now_utc() - time::Duration::seconds(5)),
    );
    kv.execute(batch).await.unwrap();
    assert!(kv.hash_get_all("past:h").await.unwrap().is_empty());
    assert!(!kv.delete("past:h").await.unwrap());
}
