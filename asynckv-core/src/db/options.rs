use crate::codec::Codec;
use crate::engine::{RawBatchOp, RawRange};
use crate::errors::Phase;
use crate::{Error, Result};
use std::ops::Bound;

/// A write applied by [`crate::AsyncDB::batch`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOp<K, V> {
    Put { key: K, value: V },
    Del { key: K },
}

impl<K, V> BatchOp<K, V> {
    pub fn put(key: K, value: V) -> Self {
        BatchOp::Put { key, value }
    }

    pub fn del(key: K) -> Self {
        BatchOp::Del { key }
    }

    pub(crate) fn encode<D>(&self, codec: &D) -> Result<RawBatchOp>
    where
        D: Codec<Key = K, Value = V>,
    {
        match self {
            BatchOp::Put { key, value } => Ok(RawBatchOp::Put(
                codec
                    .encode_key(key)
                    .map_err(|e| Error::encoding(Phase::EncodeKey, e))?,
                codec
                    .encode_value(value)
                    .map_err(|e| Error::encoding(Phase::EncodeValue, e))?,
            )),
            BatchOp::Del { key } => Ok(RawBatchOp::Del(
                codec
                    .encode_key(key)
                    .map_err(|e| Error::encoding(Phase::EncodeKey, e))?,
            )),
        }
    }
}

/// Range query handed to [`crate::AsyncDB::iterator`].
///
/// When both an inclusive and an exclusive bound are given on the same side,
/// the exclusive one is used.
#[derive(Clone, Debug)]
pub struct RangeOptions<K> {
    pub gt: Option<K>,
    pub gte: Option<K>,
    pub lt: Option<K>,
    pub lte: Option<K>,
    pub reverse: bool,
    pub limit: Option<usize>,
    /// overrides [`crate::Config::high_water_mark`]
    pub high_water_mark: Option<usize>,
}

impl<K> Default for RangeOptions<K> {
    fn default() -> Self {
        Self {
            gt: None,
            gte: None,
            lt: None,
            lte: None,
            reverse: false,
            limit: None,
            high_water_mark: None,
        }
    }
}

impl<K> RangeOptions<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gt(mut self, key: K) -> Self {
        self.gt = Some(key);
        self
    }

    pub fn gte(mut self, key: K) -> Self {
        self.gte = Some(key);
        self
    }

    pub fn lt(mut self, key: K) -> Self {
        self.lt = Some(key);
        self
    }

    pub fn lte(mut self, key: K) -> Self {
        self.lte = Some(key);
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn high_water_mark(mut self, bytes: usize) -> Self {
        self.high_water_mark = Some(bytes);
        self
    }

    pub(crate) fn encode<D>(&self, codec: &D, default_hwm: usize) -> Result<RawRange>
    where
        D: Codec<Key = K>,
    {
        let encode = |key: &K| {
            codec
                .encode_key(key)
                .map_err(|e| Error::encoding(Phase::EncodeKey, e))
        };
        let lower = match (&self.gt, &self.gte) {
            (Some(k), _) => Bound::Excluded(encode(k)?),
            (None, Some(k)) => Bound::Included(encode(k)?),
            (None, None) => Bound::Unbounded,
        };
        let upper = match (&self.lt, &self.lte) {
            (Some(k), _) => Bound::Excluded(encode(k)?),
            (None, Some(k)) => Bound::Included(encode(k)?),
            (None, None) => Bound::Unbounded,
        };
        Ok(RawRange {
            lower,
            upper,
            reverse: self.reverse,
            limit: self.limit,
            high_water_mark: self.high_water_mark.unwrap_or(default_hwm),
        })
    }
}
