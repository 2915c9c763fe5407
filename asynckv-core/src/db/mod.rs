use crate::codec::{Codec, Identity};
use crate::config::Config;
use crate::cursor::AsyncCursor;
use crate::engine::Engine;
use crate::errors::{EngineError, Phase};
use crate::{Error, Result};
use bytes::Bytes;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::OnceCell;

mod options;

pub use options::{BatchOp, RangeOptions};

/// Asynchronous facade over an [`Engine`].
///
/// Keys and values go through the [`Codec`] hooks; every call resolves to a
/// [`Result`] and engine failures never panic. Cloning is cheap and clones
/// share the same engine handle.
pub struct AsyncDB<E: Engine, D: Codec = Identity> {
    inner: Arc<DBInner<E, D>>,
}

struct DBInner<E: Engine, D: Codec> {
    engine: E,
    codec: Arc<D>,
    config: Config,
    // outcome of the one open attempt made by `ensure`
    opened: OnceCell<Result<()>>,
}

impl<E: Engine, D: Codec> Clone for AsyncDB<E, D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Engine> AsyncDB<E, Identity> {
    pub fn with_engine(engine: E) -> Self {
        Self::new(engine, Identity::default(), Config::default())
    }
}

impl<E: Engine, D: Codec> AsyncDB<E, D> {
    pub fn new(engine: E, codec: D, config: Config) -> Self {
        Self {
            inner: Arc::new(DBInner {
                engine,
                codec: Arc::new(codec),
                config,
                opened: OnceCell::new(),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn engine(&self) -> &E {
        &self.inner.engine
    }

    pub fn codec(&self) -> &D {
        &self.inner.codec
    }

    pub async fn open(&self) -> Result<()> {
        self.inner.engine.open().await?;
        info!("AsyncDB open with config: {:?}", self.inner.config);
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.inner.engine.close().await?;
        info!("AsyncDB closed");
        Ok(())
    }

    /// Open the engine on first use.
    ///
    /// Concurrent callers wait on the same attempt. A failed open is final for
    /// this handle: every caller, now and later, gets the same error.
    pub async fn ensure(&self) -> Result<()> {
        self.inner
            .opened
            .get_or_init(|| async {
                let res = self.open().await;
                if let Err(e) = &res {
                    error!("open database failed, handle is unusable: {e}");
                }
                res
            })
            .await
            .clone()
    }

    async fn ready(&self) -> Result<()> {
        if self.inner.config.lazy_open {
            self.ensure().await?;
        }
        Ok(())
    }

    fn encode_key(&self, key: &D::Key) -> Result<Bytes> {
        self.inner
            .codec
            .encode_key(key)
            .map_err(|e| Error::encoding(Phase::EncodeKey, e))
    }

    pub async fn put(&self, key: &D::Key, value: &D::Value) -> Result<()> {
        let key = self.encode_key(key)?;
        let value = self
            .inner
            .codec
            .encode_value(value)
            .map_err(|e| Error::encoding(Phase::EncodeValue, e))?;
        self.ready().await?;
        self.inner.engine.put(key, value).await?;
        Ok(())
    }

    /// A missing key resolves to [`Error::NotFound`].
    pub async fn get(&self, key: &D::Key) -> Result<D::Value> {
        let key = self.encode_key(key)?;
        self.ready().await?;
        let raw = self
            .inner
            .engine
            .get(key)
            .await
            .map_err(Self::classify)?;
        self.inner
            .codec
            .decode_value(&raw)
            .map_err(|e| Error::encoding(Phase::DecodeValue, e))
    }

    fn classify(e: EngineError) -> Error {
        if e.is_not_found() {
            Error::NotFound(e.message().to_owned())
        } else {
            Error::Engine(e)
        }
    }

    pub async fn del(&self, key: &D::Key) -> Result<()> {
        let key = self.encode_key(key)?;
        self.ready().await?;
        self.inner.engine.del(key).await?;
        Ok(())
    }

    /// Apply all `ops` atomically. Nothing reaches the engine if any op fails
    /// to encode.
    pub async fn batch(&self, ops: Vec<BatchOp<D::Key, D::Value>>) -> Result<()> {
        let len = ops.len();
        let raw = ops
            .iter()
            .enumerate()
            .map(|(index, op)| {
                op.encode(&*self.inner.codec)
                    .map_err(|e| Error::batch(len, index, e))
            })
            .collect::<Result<Vec<_>>>()?;
        self.ready().await?;
        debug!("write batch of {len} ops");
        self.inner.engine.batch(raw).await?;
        Ok(())
    }

    /// Open a cursor over `options`. The caller drains it or calls
    /// [`AsyncCursor::close`].
    pub async fn iterator(
        &self,
        options: RangeOptions<D::Key>,
    ) -> Result<AsyncCursor<E::Cursor, D>> {
        let range = options.encode(&*self.inner.codec, self.inner.config.high_water_mark())?;
        self.ready().await?;
        debug!("open cursor over {range:?}");
        let cursor = self.inner.engine.cursor(range)?;
        Ok(AsyncCursor::new(cursor, self.inner.codec.clone()))
    }
}
