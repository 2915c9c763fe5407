use asynckv_core::codec::{KeyEncoding, Utf8, ValueEncoding};
use asynckv_core::{AsyncCursor, AsyncDB, Config, EngineCursor, Hooks, MemoryEngine, Result};

pub type StrDB = AsyncDB<MemoryEngine, Hooks<Utf8, Utf8>>;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn open_db(high_water_mark: usize) -> StrDB {
    let config = Config {
        high_water_mark,
        ..Config::default()
    };
    AsyncDB::new(MemoryEngine::new(), Hooks::new(Utf8, Utf8), config)
}

pub fn key(i: u32) -> String {
    format!("key{i:05}")
}

pub fn value(i: u32) -> String {
    format!("{i}").repeat(7)
}

pub async fn put(db: &StrDB, key: impl AsRef<str>, value: impl AsRef<str>) -> Result<()> {
    db.put(&key.as_ref().to_owned(), &value.as_ref().to_owned())
        .await
}

pub async fn get(db: &StrDB, key: impl AsRef<str>) -> Result<String> {
    db.get(&key.as_ref().to_owned()).await
}

/// Drain with `next()`.
pub async fn drain_next<C, K, V>(cursor: &AsyncCursor<C, Hooks<K, V>>) -> Vec<(K::Key, V::Value)>
where
    C: EngineCursor,
    K: KeyEncoding,
    V: ValueEncoding,
{
    let mut out = vec![];
    while let Some(item) = cursor.next().await {
        let pair = item.unwrap();
        out.push((pair.key, pair.value));
    }
    out
}

/// Drain with `batch_next()`, returning the records and the number of batches.
pub async fn drain_batches<C, K, V>(
    cursor: &AsyncCursor<C, Hooks<K, V>>,
) -> (Vec<(K::Key, V::Value)>, usize)
where
    C: EngineCursor,
    K: KeyEncoding,
    V: ValueEncoding,
{
    let mut out = vec![];
    let mut batches = 0;
    while let Some(item) = cursor.batch_next().await {
        let batch = item.unwrap();
        assert!(!batch.is_empty());
        assert_eq!(batch.keys.len(), batch.values.len());
        batches += 1;
        out.extend(batch.into_pairs().map(|p| (p.key, p.value)));
    }
    (out, batches)
}
