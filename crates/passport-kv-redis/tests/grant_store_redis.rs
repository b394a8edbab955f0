//! The indexed grant store running against a real Redis.
//!
//! Needs a container runtime; run with `cargo test -- --ignored`.

use std::collections::HashSet;
use std::sync::Arc;

use passport_grants::prelude::*;
use passport_kv::KvBackend;
use passport_kv_redis::{RedisConfig, RedisKv};
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use time::{Duration, OffsetDateTime};
use tokio::sync::OnceCell;

static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .with_tag("7.2")
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            (container, format!("redis://127.0.0.1:{}", host_port))
        })
        .await;

    url.clone()
}

async fn setup(prefix: &str) -> (IndexedGrantStore, RedisKv) {
    let config = RedisConfig {
        url: get_redis_url().await,
        ..Default::default()
    };
    let kv = RedisKv::connect(&config).await.expect("connect to redis");
    let store = IndexedGrantStore::new(Arc::new(kv.clone()), &GrantStoreConfig::with_prefix(prefix))
        .expect("create store");
    (store, kv)
}

fn grant(key: &str, grant_type: &str, client: &str) -> Grant {
    Grant::new(key, grant_type, client, "payload")
        .with_subject("u1")
        .with_expiration(OffsetDateTime::now_utc() + Duration::hours(1))
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_redis_grant_lifecycle() {
    let (store, _) = setup("life:").await;
    let g = grant("k1", grant_types::REFRESH_TOKEN, "c1").with_session("s1");

    store.store(&g).await.unwrap();
    assert_eq!(store.get("k1").await.unwrap(), Some(g));

    let found = store
        .get_all(&GrantFilter::for_subject("u1").with_client("c1").with_session("s1"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);

    store.remove_all_by_client("u1", "c1").await.unwrap();
    assert_eq!(store.get("k1").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_redis_expired_reference_is_pruned() {
    let (store, kv) = setup("prune:").await;
    store
        .store(&grant("live", grant_types::REFRESH_TOKEN, "c1"))
        .await
        .unwrap();
    let expired = Grant::new("old", grant_types::REFRESH_TOKEN, "c1", "")
        .with_subject("u1")
        .with_expiration(OffsetDateTime::now_utc() - Duration::minutes(1));
    store.store(&expired).await.unwrap();

    let before: HashSet<String> = kv.set_members("prune:u1").await.unwrap().into_iter().collect();
    assert!(before.contains("old"));

    let found = store.get_all_by_subject("u1").await.unwrap();
    assert_eq!(found.len(), 1);

    let after = kv.set_members("prune:u1").await.unwrap();
    assert_eq!(after, vec!["live".to_string()]);
}

#[tokio::test]
#[ignore = "requires a container runtime"]
async fn test_redis_remove_all_by_filter() {
    let (store, kv) = setup("filter:").await;
    store.store(&grant("a", "t", "c1")).await.unwrap();
    store.store(&grant("b", "u", "c1")).await.unwrap();

    store
        .remove_all(&GrantFilter::for_subject("u1").with_client("c1").with_type("t"))
        .await
        .unwrap();

    assert_eq!(store.get("a").await.unwrap(), None);
    assert_eq!(kv.set_members("filter:u1").await.unwrap(), vec!["b".to_string()]);
    assert_eq!(kv.set_members("filter:u1:c1").await.unwrap(), vec!["b".to_string()]);
    assert!(kv.set_members("filter:u1:c1:t").await.unwrap().is_empty());
}
