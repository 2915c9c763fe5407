use asynckv_core::codec::{Json, Tuple, Utf8};
use asynckv_core::{
    AsyncDB, BatchOp, Config, Error, Hooks, KvPair, MemoryEngine, RangeOptions, Segment,
};
use futures::StreamExt;
use rand::{
    prelude::{SliceRandom, StdRng},
    Rng, SeedableRng,
};
use serde_json::json;

mod common;

fn s(v: &str) -> String {
    v.to_owned()
}

#[tokio::test]
async fn put_get_round_trip() {
    common::init();
    let db = common::json_db();
    let mut rng = StdRng::seed_from_u64(0xdaedbeef);

    let mut written = vec![];
    for i in 0..200 {
        let value = json!({
            "id": i,
            "score": rng.gen_range(-1000..1000),
            "name": format!("user-{}", rng.gen::<u32>()),
            "tags": ["a", "b"],
        });
        db.put(&format!("user/{i:04}"), &value).await.unwrap();
        written.push(value);
    }
    for (i, value) in written.iter().enumerate() {
        assert_eq!(&db.get(&format!("user/{i:04}")).await.unwrap(), value);
    }
}

#[tokio::test]
async fn delete_then_get_is_not_found() {
    common::init();
    let db = common::json_db();

    db.put(&s("foo"), &json!("bar")).await.unwrap();
    assert_eq!(db.get(&s("foo")).await.unwrap(), json!("bar"));
    db.del(&s("foo")).await.unwrap();

    match db.get(&s("foo")).await {
        Err(e) => {
            assert!(e.is_not_found());
            assert!(matches!(e, Error::NotFound(_)));
        }
        Ok(v) => panic!("expected not found, got {v}"),
    }
}

#[tokio::test]
async fn full_range_drain_with_next() {
    common::init();
    let db = common::json_db();
    db.batch(vec![
        BatchOp::put(s("2_two"), json!("two")),
        BatchOp::put(s("3_three"), json!("three")),
        BatchOp::put(s("1_one"), json!("one")),
    ])
    .await
    .unwrap();

    let cursor = db.iterator(RangeOptions::new()).await.unwrap();
    let pair = |k: &str, v: &str| KvPair {
        key: s(k),
        value: json!(v),
    };
    assert_eq!(cursor.next().await.unwrap().unwrap(), pair("1_one", "one"));
    assert_eq!(cursor.next().await.unwrap().unwrap(), pair("2_two", "two"));
    assert_eq!(cursor.next().await.unwrap().unwrap(), pair("3_three", "three"));
    assert!(cursor.next().await.is_none());
    assert!(cursor.next().await.is_none());
}

#[tokio::test]
async fn batched_drain_matches_single_drain() {
    common::init();
    let config = Config {
        high_water_mark: 256,
        ..Config::default()
    };
    let db: common::JsonDB = AsyncDB::new(MemoryEngine::new(), Hooks::default(), config);
    let mut rng = StdRng::seed_from_u64(7);
    let mut ids = (0..400_u32).collect::<Vec<_>>();
    ids.shuffle(&mut rng);
    for chunk in ids.chunks(13) {
        let ops = chunk
            .iter()
            .map(|i| BatchOp::put(format!("{i:04}"), json!({ "i": i })))
            .collect();
        db.batch(ops).await.unwrap();
    }

    for options in [
        RangeOptions::new().gte(s("0100")).lte(s("0300")),
        RangeOptions::new().gt(s("0100")).lt(s("0300")).reverse(true),
        RangeOptions::new().limit(57),
        RangeOptions::new(),
    ] {
        let single = db
            .iterator(options.clone())
            .await
            .unwrap()
            .collect_all()
            .await
            .unwrap();

        let cursor = db.iterator(options).await.unwrap();
        let mut batched = vec![];
        while let Some(batch) = cursor.batch_next().await {
            batched.extend(batch.unwrap().into_pairs());
        }
        assert!(!single.is_empty());
        assert_eq!(single, batched);
    }
}

#[tokio::test]
async fn concurrent_next_is_rejected() {
    common::init();
    let db = common::json_db();
    db.put(&s("a"), &json!(1)).await.unwrap();
    db.put(&s("b"), &json!(2)).await.unwrap();

    let cursor = db.iterator(RangeOptions::new()).await.unwrap();
    let (first, second) = tokio::join!(cursor.next(), cursor.next());
    assert_eq!(first.unwrap().unwrap().key, "a");
    assert!(matches!(second, Some(Err(Error::ConcurrentAccess))));

    let (first, second) = tokio::join!(cursor.batch_next(), cursor.next());
    assert_eq!(first.unwrap().unwrap().keys, vec!["b"]);
    assert!(matches!(second, Some(Err(Error::ConcurrentAccess))));

    // the rejected calls left the cursor usable
    assert!(cursor.next().await.is_none());
}

#[tokio::test]
async fn done_and_closed_cursors_stay_done() {
    common::init();
    let db = common::json_db();
    db.put(&s("a"), &json!(1)).await.unwrap();

    let cursor = db.iterator(RangeOptions::new()).await.unwrap();
    assert!(cursor.next().await.unwrap().is_ok());
    assert!(cursor.next().await.is_none());
    for _ in 0..3 {
        assert!(cursor.next().await.is_none());
        assert!(cursor.batch_next().await.is_none());
    }

    let cursor = db.iterator(RangeOptions::new()).await.unwrap();
    cursor.close().await.unwrap();
    // any engine interaction would fail now
    db.engine().fail_next_advance();
    assert!(cursor.next().await.is_none());
    assert!(cursor.batch_next().await.is_none());
}

#[tokio::test]
async fn structured_keys_sort_numerically() {
    common::init();
    let db = AsyncDB::new(
        MemoryEngine::new(),
        Hooks::new(Tuple, Json::<serde_json::Value>::new()),
        Config::default(),
    );
    let key = |n: i64| vec![Segment::from("foo"), Segment::Int(n)];

    // inserted out of order
    for n in [2, -31, 1, -51] {
        db.put(&key(n), &json!(n)).await.unwrap();
    }
    db.put(&vec![Segment::from("bar"), Segment::Int(100)], &json!(100))
        .await
        .unwrap();

    let options = RangeOptions::new()
        .gte(vec![Segment::from("foo")])
        .lt(vec![Segment::from("foo\u{1}")]);
    let cursor = db.iterator(options).await.unwrap();
    let keys: Vec<_> = cursor
        .into_stream()
        .map(|item| item.unwrap().key)
        .collect()
        .await;
    assert_eq!(keys, vec![key(-51), key(-31), key(1), key(2)]);
}

#[tokio::test]
async fn lazy_open_is_shared_by_concurrent_writers() {
    common::init();
    let engine = MemoryEngine::new();
    let db: AsyncDB<_, Hooks<Utf8, Utf8>> =
        AsyncDB::new(engine.clone(), Hooks::default(), Config::default());

    let mut handles = vec![];
    for i in 0..8 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            db.put(&format!("k{i}"), &format!("v{i}")).await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
    assert_eq!(engine.open_count(), 1);

    let cursor = db.iterator(RangeOptions::new()).await.unwrap();
    let all = cursor.collect_all().await.unwrap();
    assert_eq!(all.len(), 8);
}
