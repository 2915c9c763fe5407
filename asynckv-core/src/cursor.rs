use crate::codec::Codec;
use crate::engine::EngineCursor;
use crate::errors::{EngineError, Phase};
use crate::{Error, Result};
use bytes::Bytes;
use futures::Stream;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KvPair<K, V> {
    pub key: K,
    pub value: V,
}

/// A batch of records, `keys[i]` belongs to `values[i]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiKvPair<K, V> {
    pub keys: Vec<K>,
    pub values: Vec<V>,
}

impl<K, V> MultiKvPair<K, V> {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn into_pairs(self) -> impl Iterator<Item = KvPair<K, V>> {
        self.keys
            .into_iter()
            .zip(self.values)
            .map(|(key, value)| KvPair { key, value })
    }
}

enum State<C> {
    Active {
        cursor: C,
        /// an advance has landed since creation or the last seek
        landed: bool,
    },
    Finished {
        /// surfaced by the next pull, then dropped
        pending: Option<Error>,
    },
}

enum Fill {
    Open,
    Ended,
    Failed(Error),
}

/// Finite, single-consumer sequence over one [`EngineCursor`].
///
/// The engine cursor is released exactly once: on exhaustion, on the first
/// failure, or on [`AsyncCursor::close`]. A call made while another one is in
/// flight resolves at once with [`Error::ConcurrentAccess`].
pub struct AsyncCursor<C: EngineCursor, D: Codec> {
    state: Mutex<State<C>>,
    codec: Arc<D>,
}

impl<C: EngineCursor, D: Codec> AsyncCursor<C, D> {
    pub fn new(cursor: C, codec: Arc<D>) -> Self {
        Self {
            state: Mutex::new(State::Active {
                cursor,
                landed: false,
            }),
            codec,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State<C>>> {
        self.state.try_lock().map_err(|_| Error::ConcurrentAccess)
    }

    /// `true` once the cursor can no longer reach the engine.
    pub fn is_finished(&self) -> bool {
        self.state
            .try_lock()
            .map(|s| matches!(*s, State::Finished { .. }))
            .unwrap_or(false)
    }

    fn decode(&self, key: &Bytes, value: &Bytes) -> Result<KvPair<D::Key, D::Value>> {
        let key = self
            .codec
            .decode_key(key)
            .map_err(|e| Error::encoding(Phase::DecodeKey, e))?;
        let value = self
            .codec
            .decode_value(value)
            .map_err(|e| Error::encoding(Phase::DecodeValue, e))?;
        Ok(KvPair { key, value })
    }

    /// Move to `Finished` and release the engine cursor if it was still held.
    async fn finish(state: &mut State<C>) -> std::result::Result<(), EngineError> {
        match std::mem::replace(state, State::Finished { pending: None }) {
            State::Active { mut cursor, .. } => cursor.release().await,
            finished => {
                *state = finished;
                Ok(())
            }
        }
    }

    /// Finish because of `err`. A release failure is logged; `err` wins.
    async fn fail(state: &mut State<C>, err: Error) -> Error {
        if let Err(e) = Self::finish(state).await {
            warn!("release cursor after failure `{err}` also failed: {e}");
        }
        err
    }

    /// Finish at the end of the range. A release failure is the last item.
    async fn end<T>(state: &mut State<C>) -> Option<Result<T>> {
        match Self::finish(state).await {
            Ok(()) => None,
            Err(e) => {
                debug!("release cursor at end of range failed: {e}");
                Some(Err(e.into()))
            }
        }
    }

    /// Pull one record.
    pub async fn next(&self) -> Option<Result<KvPair<D::Key, D::Value>>> {
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(e) => return Some(Err(e)),
        };
        let advanced = match &mut *state {
            State::Active { cursor, landed } => {
                *landed = true;
                cursor.advance().await
            }
            State::Finished { pending } => return pending.take().map(Err),
        };
        match advanced {
            Ok(Some((key, value))) => match self.decode(&key, &value) {
                Ok(pair) => Some(Ok(pair)),
                Err(e) => Some(Err(Self::fail(&mut state, e).await)),
            },
            Ok(None) => Self::end(&mut state).await,
            Err(e) => Some(Err(Self::fail(&mut state, e.into()).await)),
        }
    }

    /// Pull every record the engine has already fetched, at least one.
    ///
    /// When the engine exposes its read-ahead cache the whole cache is drained
    /// in one call. The first advance after creation or a seek never fills
    /// that cache, so on that landing a second advance is made to prime it.
    /// Without the capability this returns one record per call.
    ///
    /// A failure anywhere in the batch discards the records already read.
    pub async fn batch_next(&self) -> Option<Result<MultiKvPair<D::Key, D::Value>>> {
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(e) => return Some(Err(e)),
        };
        let (raw, fill) = match &mut *state {
            State::Active { cursor, landed } => {
                let first_landing = !*landed;
                *landed = true;
                Self::fill(cursor, first_landing).await
            }
            State::Finished { pending } => return pending.take().map(Err),
        };

        match fill {
            Fill::Failed(e) => return Some(Err(Self::fail(&mut state, e).await)),
            Fill::Ended if raw.is_empty() => return Self::end(&mut state).await,
            Fill::Ended => {
                if let Err(e) = Self::finish(&mut state).await {
                    *state = State::Finished {
                        pending: Some(e.into()),
                    };
                }
            }
            Fill::Open => {}
        }

        let len = raw.len();
        let mut keys = Vec::with_capacity(len);
        let mut values = Vec::with_capacity(len);
        for (index, (key, value)) in raw.iter().enumerate() {
            match self.decode(key, value) {
                Ok(pair) => {
                    keys.push(pair.key);
                    values.push(pair.value);
                }
                Err(e) => {
                    let e = Self::fail(&mut state, Error::batch(len, index, e)).await;
                    // the decode error replaces a release error deferred above
                    if let State::Finished { pending: Some(lost) } = &mut *state {
                        warn!("batch failed with `{e}`, dropping release error: {lost}");
                    }
                    *state = State::Finished { pending: None };
                    return Some(Err(e));
                }
            }
        }
        debug!("batch_next returns {len} records");
        Some(Ok(MultiKvPair { keys, values }))
    }

    async fn fill(cursor: &mut C, first_landing: bool) -> (Vec<(Bytes, Bytes)>, Fill) {
        let mut raw = vec![];
        match cursor.advance().await {
            Ok(Some(record)) => raw.push(record),
            Ok(None) => return (raw, Fill::Ended),
            Err(e) => return (raw, Fill::Failed(e.into())),
        }
        let cached = match cursor.read_ahead() {
            Some(cache) => cache.len(),
            None => return (raw, Fill::Open),
        };
        if cached == 0 && first_landing {
            match cursor.advance().await {
                Ok(Some(record)) => raw.push(record),
                Ok(None) => return (raw, Fill::Ended),
                Err(e) => return (raw, Fill::Failed(e.into())),
            }
        }
        if let Some(cache) = cursor.read_ahead() {
            let mut buf = cache.take();
            if buf.len() % 2 != 0 {
                let e = EngineError::new("read-ahead cache holds an incomplete record");
                return (raw, Fill::Failed(e.into()));
            }
            raw.reserve(buf.len() / 2);
            while let (Some(key), Some(value)) = (buf.pop(), buf.pop()) {
                raw.push((key, value));
            }
        }
        (raw, Fill::Open)
    }

    /// Reposition at the first record at-or-after `target` in scan order.
    pub fn seek(&self, target: &D::Key) -> Result<()> {
        let raw = self
            .codec
            .encode_key(target)
            .map_err(|e| Error::encoding(Phase::EncodeKey, e))?;
        let mut state = self.lock()?;
        match &mut *state {
            State::Active { cursor, landed } => {
                cursor.seek(raw);
                *landed = false;
                Ok(())
            }
            State::Finished { .. } => Err(Error::CursorFinished),
        }
    }

    /// Release the engine cursor. Must be called when iteration is abandoned
    /// before the end of the range.
    ///
    /// On a finished cursor this only reports a release error still waiting
    /// to be surfaced, then becomes a no-op.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.lock()?;
        if let State::Finished { pending } = &mut *state {
            return pending.take().map_or(Ok(()), Err);
        }
        Self::finish(&mut state).await.map_err(Error::from)
    }

    /// Drain every remaining record, stopping at the first error.
    pub async fn collect_all(&self) -> Result<Vec<KvPair<D::Key, D::Value>>> {
        let mut out = vec![];
        while let Some(item) = self.next().await {
            out.push(item?);
        }
        Ok(out)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<KvPair<D::Key, D::Value>>> {
        futures::stream::unfold(self, |cursor| async move {
            let item = cursor.next().await?;
            Some((item, cursor))
        })
    }
}

impl<C: EngineCursor, D: Codec> Drop for AsyncCursor<C, D> {
    fn drop(&mut self) {
        if let State::Active { .. } = self.state.get_mut() {
            warn!("cursor dropped without close(), engine cursor was not released");
        }
    }
}
