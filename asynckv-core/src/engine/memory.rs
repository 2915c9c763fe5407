use super::{Engine, EngineCursor, RawBatchOp, RawRange, ReadAheadCache};
use crate::errors::{EngineError, EngineResult};
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info};
use std::collections::BTreeMap;
use std::ops::Bound::{self, Excluded, Included, Unbounded};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tokio::task;

type Table = BTreeMap<Bytes, Bytes>;

/// In-memory ordered engine.
///
/// Writers copy the table on write when a cursor still holds the previous
/// version, so every cursor reads the snapshot taken when it was created.
///
/// Cursors prefetch like a disk engine would: the first advance after
/// creation or a seek returns a single record and leaves the read-ahead
/// cache empty, later advances fill the cache up to the high-water-mark.
#[derive(Clone, Default)]
pub struct MemoryEngine {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    table: RwLock<Arc<Table>>,
    // approx size in bytes
    approx_size: AtomicUsize,
    is_open: AtomicBool,
    opens: AtomicUsize,
    faults: Faults,
}

#[derive(Default)]
struct Faults {
    open: AtomicBool,
    advance: AtomicBool,
    release: AtomicBool,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `open` fails.
    pub fn fail_next_open(&self) {
        self.inner.faults.open.store(true, Ordering::SeqCst);
    }

    /// The next cursor advance, on any cursor of this engine, fails.
    pub fn fail_next_advance(&self) {
        self.inner.faults.advance.store(true, Ordering::SeqCst);
    }

    /// The next cursor release, on any cursor of this engine, fails.
    pub fn fail_next_release(&self) {
        self.inner.faults.release.store(true, Ordering::SeqCst);
    }

    /// how many times `open` reached the engine
    pub fn open_count(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open.load(Ordering::SeqCst)
    }

    pub fn approx_size(&self) -> usize {
        self.inner.approx_size.load(Ordering::Relaxed)
    }

    fn check_open(&self) -> EngineResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(EngineError::new("Database is not open"))
        }
    }

    fn snapshot(&self) -> EngineResult<Arc<Table>> {
        let table = self
            .inner
            .table
            .read()
            .map_err(|e| EngineError::new(format!("table lock poisoned: {e}")))?;
        Ok(table.clone())
    }

    fn write<F>(&self, f: F) -> EngineResult<()>
    where
        F: FnOnce(&mut Table) -> isize,
    {
        let mut table = self
            .inner
            .table
            .write()
            .map_err(|e| EngineError::new(format!("table lock poisoned: {e}")))?;
        let delta = f(Arc::make_mut(&mut table));
        if delta >= 0 {
            self.inner
                .approx_size
                .fetch_add(delta as usize, Ordering::Relaxed);
        } else {
            self.inner
                .approx_size
                .fetch_sub(delta.unsigned_abs(), Ordering::Relaxed);
        }
        Ok(())
    }
}

fn put_entry(table: &mut Table, key: Bytes, value: Bytes) -> isize {
    let added = (key.len() + value.len()) as isize;
    match table.insert(key.clone(), value) {
        Some(old) => added - (key.len() + old.len()) as isize,
        None => added,
    }
}

fn del_entry(table: &mut Table, key: &Bytes) -> isize {
    match table.remove(key) {
        Some(old) => -((key.len() + old.len()) as isize),
        None => 0,
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    type Cursor = MemoryCursor;

    async fn open(&self) -> EngineResult<()> {
        task::yield_now().await;
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        if self.inner.faults.open.swap(false, Ordering::SeqCst) {
            return Err(EngineError::new("IO error: lock held by another process"));
        }
        self.inner.is_open.store(true, Ordering::SeqCst);
        info!("memory engine open, {} bytes", self.approx_size());
        Ok(())
    }

    async fn close(&self) -> EngineResult<()> {
        task::yield_now().await;
        self.inner.is_open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn put(&self, key: Bytes, value: Bytes) -> EngineResult<()> {
        task::yield_now().await;
        self.check_open()?;
        self.write(|t| put_entry(t, key, value))
    }

    async fn get(&self, key: Bytes) -> EngineResult<Bytes> {
        task::yield_now().await;
        self.check_open()?;
        match self.snapshot()?.get(&key) {
            Some(value) => Ok(value.clone()),
            None => Err(EngineError::not_found("key not found in database")),
        }
    }

    async fn del(&self, key: Bytes) -> EngineResult<()> {
        task::yield_now().await;
        self.check_open()?;
        self.write(|t| del_entry(t, &key))
    }

    async fn batch(&self, ops: Vec<RawBatchOp>) -> EngineResult<()> {
        task::yield_now().await;
        self.check_open()?;
        self.write(|t| {
            ops.into_iter()
                .map(|op| match op {
                    RawBatchOp::Put(k, v) => put_entry(t, k, v),
                    RawBatchOp::Del(k) => del_entry(t, &k),
                })
                .sum()
        })
    }

    fn cursor(&self, range: RawRange) -> EngineResult<MemoryCursor> {
        self.check_open()?;
        let next = if range.reverse {
            range.upper.clone()
        } else {
            range.lower.clone()
        };
        Ok(MemoryCursor {
            snapshot: self.snapshot()?,
            engine: self.inner.clone(),
            range,
            next,
            landed: false,
            exhausted: false,
            released: false,
            emitted: 0,
            cache: MemoryCache::default(),
        })
    }
}

#[derive(Default)]
pub struct MemoryCache {
    buf: Vec<Bytes>,
}

impl MemoryCache {
    fn fill(&mut self, records: impl DoubleEndedIterator<Item = (Bytes, Bytes)>) {
        for (key, value) in records.rev() {
            self.buf.push(value);
            self.buf.push(key);
        }
    }

    fn pop(&mut self) -> Option<(Bytes, Bytes)> {
        let key = self.buf.pop()?;
        let value = self.buf.pop()?;
        Some((key, value))
    }
}

impl ReadAheadCache for MemoryCache {
    fn len(&self) -> usize {
        self.buf.len()
    }

    fn take(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.buf)
    }
}

pub struct MemoryCursor {
    snapshot: Arc<Table>,
    engine: Arc<MemoryInner>,
    range: RawRange,
    // where the next fetch starts, in scan direction
    next: Bound<Bytes>,
    landed: bool,
    exhausted: bool,
    released: bool,
    // records handed out or cached so far, for `limit`
    emitted: usize,
    cache: MemoryCache,
}

impl MemoryCursor {
    fn scan(&self) -> Box<dyn Iterator<Item = (&Bytes, &Bytes)> + '_> {
        if self.range.reverse {
            Box::new(
                self.snapshot
                    .range::<Bytes, _>((Unbounded, self.next.clone()))
                    .rev()
                    .take_while(|(k, _)| self.range.above_lower(k)),
            )
        } else {
            Box::new(
                self.snapshot
                    .range::<Bytes, _>((self.next.clone(), Unbounded))
                    .take_while(|(k, _)| self.range.below_upper(k)),
            )
        }
    }

    /// Read the next run of records: one when `single`, otherwise as many as
    /// fit in the high-water-mark (at least one).
    fn fetch(&mut self, single: bool) -> Vec<(Bytes, Bytes)> {
        let remaining = match self.range.limit {
            Some(limit) => limit.saturating_sub(self.emitted),
            None => usize::MAX,
        };
        let mut records = vec![];
        let mut bytes = 0;
        for (k, v) in self.scan() {
            if records.len() >= remaining {
                break;
            }
            bytes += k.len() + v.len();
            records.push((k.clone(), v.clone()));
            if single || bytes >= self.range.high_water_mark {
                break;
            }
        }
        if let Some((last, _)) = records.last() {
            self.next = Excluded(last.clone());
        }
        self.emitted += records.len();
        records
    }
}

#[async_trait]
impl EngineCursor for MemoryCursor {
    async fn advance(&mut self) -> EngineResult<Option<(Bytes, Bytes)>> {
        task::yield_now().await;
        if self.released {
            return Err(EngineError::new("cannot call next() after end()"));
        }
        if self.engine.faults.advance.swap(false, Ordering::SeqCst) {
            return Err(EngineError::new("Corruption: block checksum mismatch"));
        }
        if let Some(record) = self.cache.pop() {
            return Ok(Some(record));
        }
        if self.exhausted {
            return Ok(None);
        }
        let single = !self.landed;
        self.landed = true;
        let mut records = self.fetch(single).into_iter();
        match records.next() {
            Some(first) => {
                self.cache.fill(records);
                debug!("memory cursor prefetched {} entries", self.cache.len());
                Ok(Some(first))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    async fn release(&mut self) -> EngineResult<()> {
        task::yield_now().await;
        self.released = true;
        self.cache.take();
        if self.engine.faults.release.swap(false, Ordering::SeqCst) {
            return Err(EngineError::new("IO error: cannot release iterator"));
        }
        Ok(())
    }

    fn seek(&mut self, target: Bytes) {
        let admitted = if self.range.reverse {
            self.range.below_upper(&target)
        } else {
            self.range.above_lower(&target)
        };
        self.next = match (admitted, self.range.reverse) {
            (true, _) => Included(target),
            (false, true) => self.range.upper.clone(),
            (false, false) => self.range.lower.clone(),
        };
        self.cache.take();
        self.landed = false;
        self.exhausted = false;
    }

    fn read_ahead(&mut self) -> Option<&mut dyn ReadAheadCache> {
        Some(&mut self.cache)
    }
}
