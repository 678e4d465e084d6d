//! Round trips against a live Redis at 127.0.0.1.
//!
//! Run with `cargo test -- --ignored` when a server is available.

mod support;

use redis::{AsyncCommands, aio::ConnectionManager};
use serial_test::serial;
use sessmigrate::{
    BatchExecutor, KeyContext, MemorySource, Migration, MigrationOptions, ProgressReporter, RedisExecutor, Ttl,
    runtime::commands::WriteBatch,
};
use support::{fixed_now, record};

async fn redis_connection() -> ConnectionManager {
    let client = redis::Client::open("redis://127.0.0.1/").expect("redis client");
    client.get_connection_manager().await.expect("connection manager")
}

async fn clear(conn: &mut ConnectionManager, keys: &[&str]) {
    let _: () = redis::cmd("DEL").arg(keys).query_async(conn).await.expect("cleanup");
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Redis at 127.0.0.1"]
async fn pipeline_sets_payload_and_ttl() {
    let mut conn = redis_connection().await;
    clear(&mut conn, &["sessmigrate:test:a", "sessmigrate:test:b"]).await;

    let mut batch = WriteBatch::new(1);
    batch.push_entry("sessmigrate:test:a".to_string(), b"alpha".to_vec(), Ttl::from_secs(120).expect("ttl"));
    batch.push_entry("sessmigrate:test:b".to_string(), b"beta".to_vec(), Ttl::from_secs(60).expect("ttl"));

    {
        let mut executor = RedisExecutor::new(&mut conn);
        executor.execute(&batch).await.expect("flush");
        executor.execute(&WriteBatch::new(2)).await.expect("empty flush");
    }

    let payload: Vec<u8> = conn.get("sessmigrate:test:a").await.expect("get");
    assert_eq!(payload, b"alpha".to_vec());
    let ttl: i64 = conn.ttl("sessmigrate:test:a").await.expect("ttl");
    assert!((110..=120).contains(&ttl));
    let ttl: i64 = conn.ttl("sessmigrate:test:b").await.expect("ttl");
    assert!((50..=60).contains(&ttl));

    clear(&mut conn, &["sessmigrate:test:a", "sessmigrate:test:b"]).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Redis at 127.0.0.1"]
async fn migration_writes_prefixed_keys_and_skips_expired() {
    let mut conn = redis_connection().await;
    let written = "sessmigrate_it:live";
    let expired = "sessmigrate_it:gone";
    clear(&mut conn, &[written, expired]).await;

    let source = MemorySource::from_records([record("live", 300), record("gone", -300)]);
    let options = MigrationOptions {
        chunk_size: 10,
        page_size: 10,
        keys: KeyContext::new(Some("sessmigrate_it".to_string())),
    };

    let summary = {
        let executor = RedisExecutor::new(&mut conn);
        let mut migration = Migration::new(source, executor, options);
        migration
            .run_at(fixed_now(), &mut ProgressReporter::silent())
            .await
            .expect("migration")
    };
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 1);

    let exists: bool = conn.exists(written).await.expect("exists");
    assert!(exists);
    let exists: bool = conn.exists(expired).await.expect("exists");
    assert!(!exists);

    clear(&mut conn, &[written, expired]).await;
}
