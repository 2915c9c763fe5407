use asynckv_core::{BatchOp, Engine, Error, RangeOptions};
use bytes::Bytes;
use rand::{
    prelude::{SliceRandom, StdRng},
    SeedableRng,
};

mod common;

use common::{key, value};

#[tokio::test]
async fn multiple_put_del_then_get() {
    common::init();

    let db = common::open_db(1024);
    let mut rng = StdRng::seed_from_u64(0xdaedbeef);

    // 1. first write some kv in a random order
    let mut all_key = (0..1000_u32).collect::<Vec<_>>();
    all_key.shuffle(&mut rng);
    for chunk in all_key.chunks(7) {
        let ops = chunk.iter().map(|i| BatchOp::put(key(*i), value(*i))).collect();
        db.batch(ops).await.unwrap();
    }

    // 2. delete some kv
    let deleted_key: Vec<u32> = vec![1, 100, 514];
    let ops = deleted_key.iter().map(|i| BatchOp::del(key(*i))).collect();
    db.batch(ops).await.unwrap();

    // 3. check kv
    for i in 0..1024_u32 {
        let res = common::get(&db, key(i)).await;
        if i >= 1000 || deleted_key.contains(&i) {
            assert!(res.unwrap_err().is_not_found(), "i = {i}");
        } else {
            assert_eq!(res.unwrap(), value(i), "i = {i}");
        }
    }
}

#[tokio::test]
async fn next_and_batch_next_agree() {
    common::init();

    let db = common::open_db(200);
    let mut rng = StdRng::seed_from_u64(0xdaedbeef);
    let mut all_key = (0..500_u32).collect::<Vec<_>>();
    all_key.shuffle(&mut rng);
    for i in all_key {
        common::put(&db, key(i), value(i)).await.unwrap();
    }

    let range = || RangeOptions::new().gte(key(100)).lt(key(400));
    let expected: Vec<_> = (100..400_u32).map(|i| (key(i), value(i))).collect();

    let cursor = db.iterator(range()).await.unwrap();
    assert_eq!(common::drain_next(&cursor).await, expected);
    assert!(cursor.is_finished());

    let cursor = db.iterator(range()).await.unwrap();
    let (records, batches) = common::drain_batches(&cursor).await;
    assert_eq!(records, expected);
    // the high-water-mark splits the range into several batches
    assert!(batches > 1 && batches < expected.len(), "batches = {batches}");
    assert!(cursor.batch_next().await.is_none());
}

#[tokio::test]
async fn mixed_next_and_batch_next() {
    common::init();

    let db = common::open_db(100);
    for i in 0..300_u32 {
        common::put(&db, key(i), value(i)).await.unwrap();
    }

    let cursor = db
        .iterator(RangeOptions::new().reverse(true).limit(250))
        .await
        .unwrap();
    let mut seen = vec![];
    let mut turn = 0;
    loop {
        turn += 1;
        if turn % 3 == 0 {
            match cursor.next().await {
                Some(item) => seen.push(item.unwrap().key),
                None => break,
            }
        } else {
            match cursor.batch_next().await {
                Some(item) => seen.extend(item.unwrap().keys),
                None => break,
            }
        }
    }
    let expected: Vec<_> = (50..300_u32).rev().map(key).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn seek_inside_range() {
    common::init();

    let db = common::open_db(64);
    for i in 0..50_u32 {
        common::put(&db, key(i * 2), value(i)).await.unwrap();
    }

    let cursor = db
        .iterator(RangeOptions::new().gte(key(10)).lte(key(60)))
        .await
        .unwrap();
    assert_eq!(cursor.next().await.unwrap().unwrap().key, key(10));

    cursor.seek(&key(31)).unwrap();
    let (records, _) = common::drain_batches(&cursor).await;
    let keys: Vec<_> = records.into_iter().map(|(k, _)| k).collect();
    let expected: Vec<_> = (16..=30_u32).map(|i| key(i * 2)).collect();
    assert_eq!(keys, expected);

    // seeking below the lower bound clamps to it
    let cursor = db
        .iterator(RangeOptions::new().gte(key(10)).lte(key(14)))
        .await
        .unwrap();
    cursor.seek(&key(0)).unwrap();
    let keys: Vec<_> = common::drain_next(&cursor)
        .await
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    assert_eq!(keys, vec![key(10), key(12), key(14)]);
    assert!(matches!(cursor.seek(&key(0)), Err(Error::CursorFinished)));
}

#[tokio::test]
async fn early_close_releases_cursor() {
    common::init();

    let db = common::open_db(1024);
    for i in 0..10_u32 {
        common::put(&db, key(i), value(i)).await.unwrap();
    }
    let cursor = db.iterator(RangeOptions::new()).await.unwrap();
    assert!(cursor.batch_next().await.unwrap().is_ok());

    db.engine().fail_next_release();
    assert!(matches!(cursor.close().await, Err(Error::Engine(_))));
    assert!(cursor.is_finished());
    assert!(cursor.next().await.is_none());
    assert!(cursor.close().await.is_ok());
}

#[tokio::test]
async fn advance_failure_ends_iteration() {
    common::init();

    let db = common::open_db(1024);
    for i in 0..10_u32 {
        common::put(&db, key(i), value(i)).await.unwrap();
    }
    let cursor = db.iterator(RangeOptions::new()).await.unwrap();
    assert!(cursor.next().await.unwrap().is_ok());

    db.engine().fail_next_advance();
    assert!(matches!(cursor.batch_next().await, Some(Err(Error::Engine(_)))));
    assert!(cursor.batch_next().await.is_none());
    assert!(cursor.next().await.is_none());
}

#[tokio::test]
async fn batch_decode_error_is_the_last_error() {
    common::init();

    let db = common::open_db(1024);
    db.ensure().await.unwrap();
    let engine = db.engine();
    engine
        .put(Bytes::from_static(b"a"), Bytes::from_static(&[0xff, 0xfe]))
        .await
        .unwrap();

    let cursor = db.iterator(RangeOptions::new()).await.unwrap();
    engine.fail_next_release();
    match cursor.batch_next().await {
        Some(Err(Error::Batch { source, .. })) => {
            assert!(matches!(*source, Error::Encoding { .. }))
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(cursor.batch_next().await.is_none());
    assert!(cursor.batch_next().await.is_none());
    assert!(cursor.close().await.is_ok());
}
