use crate::errors::EngineResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::ops::Bound;

pub mod memory;

/// A raw write applied by [`Engine::batch`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawBatchOp {
    Put(Bytes, Bytes),
    Del(Bytes),
}

/// An already-encoded range handed to [`Engine::cursor`].
#[derive(Clone, Debug)]
pub struct RawRange {
    pub lower: Bound<Bytes>,
    pub upper: Bound<Bytes>,
    pub reverse: bool,
    /// maximum number of records the cursor yields, `None` for all of them
    pub limit: Option<usize>,
    /// bytes the engine may prefetch per round trip
    pub high_water_mark: usize,
}

impl RawRange {
    pub fn full(high_water_mark: usize) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
            reverse: false,
            limit: None,
            high_water_mark,
        }
    }

    pub fn above_lower(&self, key: &[u8]) -> bool {
        match &self.lower {
            Bound::Included(b) => key >= b.as_ref(),
            Bound::Excluded(b) => key > b.as_ref(),
            Bound::Unbounded => true,
        }
    }

    pub fn below_upper(&self, key: &[u8]) -> bool {
        match &self.upper {
            Bound::Included(b) => key <= b.as_ref(),
            Bound::Excluded(b) => key < b.as_ref(),
            Bound::Unbounded => true,
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.above_lower(key) && self.below_upper(key)
    }
}

/// The ordered key-value store this crate is layered on.
///
/// Every call is a suspension point. Implementations serialize their own
/// internal access; the handle is shared by many callers and cursors.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    type Cursor: EngineCursor + 'static;

    async fn open(&self) -> EngineResult<()>;
    async fn close(&self) -> EngineResult<()>;
    async fn put(&self, key: Bytes, value: Bytes) -> EngineResult<()>;
    /// A missing key is reported as an error whose message starts with
    /// `NotFound` (see [`crate::EngineError::not_found`]).
    async fn get(&self, key: Bytes) -> EngineResult<Bytes>;
    async fn del(&self, key: Bytes) -> EngineResult<()>;
    async fn batch(&self, ops: Vec<RawBatchOp>) -> EngineResult<()>;

    fn cursor(&self, range: RawRange) -> EngineResult<Self::Cursor>;
}

/// A stateful range-scan handle owned by exactly one [`crate::AsyncCursor`].
#[async_trait]
pub trait EngineCursor: Send {
    /// `Ok(None)` signals the end of the range.
    async fn advance(&mut self) -> EngineResult<Option<(Bytes, Bytes)>>;

    /// Release the resources held by the cursor. Called at most once.
    async fn release(&mut self) -> EngineResult<()>;

    /// Reposition at the first record at-or-after `target` in scan order.
    /// Drops whatever was prefetched.
    fn seek(&mut self, target: Bytes);

    /// Access to the engine's prefetch buffer, for engines that expose one.
    fn read_ahead(&mut self) -> Option<&mut dyn ReadAheadCache> {
        None
    }
}

/// Introspection hook over an engine cursor's read-ahead buffer.
///
/// The buffer is flat and holds the upcoming records in reverse scan order,
/// each one stored as value then key. Popping from the end therefore yields
/// key, then value, of the next record in scan order.
pub trait ReadAheadCache: Send {
    /// number of buffered entries (two per record)
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the whole buffer, leaving it empty.
    fn take(&mut self) -> Vec<Bytes>;
}
