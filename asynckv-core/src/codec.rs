use crate::errors::CodecError;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::marker::PhantomData;

pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Turns caller keys and values into the raw bytes handed to the engine and
/// back. Hooks may fail on malformed input but never panic.
///
/// Most codecs are a [`KeyEncoding`] and a [`ValueEncoding`] paired with
/// [`Hooks`]. [`Identity`] passes bytes through untouched.
pub trait Codec: Send + Sync + 'static {
    type Key: Send + 'static;
    type Value: Send + 'static;

    fn encode_key(&self, key: &Self::Key) -> CodecResult<Bytes>;
    fn decode_key(&self, raw: &Bytes) -> CodecResult<Self::Key>;
    fn encode_value(&self, value: &Self::Value) -> CodecResult<Bytes>;
    fn decode_value(&self, raw: &Bytes) -> CodecResult<Self::Value>;
}

pub trait KeyEncoding: Send + Sync + 'static {
    type Key: Send + 'static;

    fn encode_key(&self, key: &Self::Key) -> CodecResult<Bytes>;
    fn decode_key(&self, raw: &Bytes) -> CodecResult<Self::Key>;
}

pub trait ValueEncoding: Send + Sync + 'static {
    type Value: Send + 'static;

    fn encode_value(&self, value: &Self::Value) -> CodecResult<Bytes>;
    fn decode_value(&self, raw: &Bytes) -> CodecResult<Self::Value>;
}

/// A key encoding paired with a value encoding.
#[derive(Clone, Debug, Default)]
pub struct Hooks<KE, VE> {
    key: KE,
    value: VE,
}

impl<KE, VE> Hooks<KE, VE> {
    pub fn new(key: KE, value: VE) -> Self {
        Self { key, value }
    }
}

impl<KE: KeyEncoding, VE: ValueEncoding> Codec for Hooks<KE, VE> {
    type Key = KE::Key;
    type Value = VE::Value;

    fn encode_key(&self, key: &Self::Key) -> CodecResult<Bytes> {
        self.key.encode_key(key)
    }

    fn decode_key(&self, raw: &Bytes) -> CodecResult<Self::Key> {
        self.key.decode_key(raw)
    }

    fn encode_value(&self, value: &Self::Value) -> CodecResult<Bytes> {
        self.value.encode_value(value)
    }

    fn decode_value(&self, raw: &Bytes) -> CodecResult<Self::Value> {
        self.value.decode_value(raw)
    }
}

/// Pass-through bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Raw;

impl KeyEncoding for Raw {
    type Key = Bytes;

    fn encode_key(&self, key: &Bytes) -> CodecResult<Bytes> {
        Ok(key.clone())
    }

    fn decode_key(&self, raw: &Bytes) -> CodecResult<Bytes> {
        Ok(raw.clone())
    }
}

impl ValueEncoding for Raw {
    type Value = Bytes;

    fn encode_value(&self, value: &Bytes) -> CodecResult<Bytes> {
        Ok(value.clone())
    }

    fn decode_value(&self, raw: &Bytes) -> CodecResult<Bytes> {
        Ok(raw.clone())
    }
}

/// UTF-8 strings stored as their bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Utf8;

fn utf8(raw: &Bytes) -> CodecResult<String> {
    String::from_utf8(raw.to_vec()).map_err(|e| CodecError::new(format!("invalid utf-8: {e}")))
}

impl KeyEncoding for Utf8 {
    type Key = String;

    fn encode_key(&self, key: &String) -> CodecResult<Bytes> {
        Ok(Bytes::copy_from_slice(key.as_bytes()))
    }

    fn decode_key(&self, raw: &Bytes) -> CodecResult<String> {
        utf8(raw)
    }
}

impl ValueEncoding for Utf8 {
    type Value = String;

    fn encode_value(&self, value: &String) -> CodecResult<Bytes> {
        Ok(Bytes::copy_from_slice(value.as_bytes()))
    }

    fn decode_value(&self, raw: &Bytes) -> CodecResult<String> {
        utf8(raw)
    }
}

/// Values serialized as JSON documents.
pub struct Json<V>(PhantomData<fn() -> V>);

impl<V> Json<V> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<V> Default for Json<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for Json<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Json<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Json")
    }
}

impl<V> ValueEncoding for Json<V>
where
    V: Serialize + DeserializeOwned + Send + 'static,
{
    type Value = V;

    fn encode_value(&self, value: &V) -> CodecResult<Bytes> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| CodecError::new(format!("json: {e}")))
    }

    fn decode_value(&self, raw: &Bytes) -> CodecResult<V> {
        serde_json::from_slice(raw).map_err(|e| CodecError::new(format!("json: {e}")))
    }
}

/// One element of a structured [`Tuple`] key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Segment {
    Int(i64),
    Str(String),
}

impl From<i64> for Segment {
    fn from(v: i64) -> Self {
        Segment::Int(v)
    }
}

impl From<&str> for Segment {
    fn from(v: &str) -> Self {
        Segment::Str(v.to_owned())
    }
}

impl From<String> for Segment {
    fn from(v: String) -> Self {
        Segment::Str(v)
    }
}

/// Order-preserving encoding of structured keys.
///
/// Byte-wise comparison of two encoded keys agrees with comparing the
/// segment vectors element by element: integers numerically, strings
/// lexicographically, integers before strings, shorter prefixes first.
///
/// Layout per segment:
/// - `Int`: `0x10` then the i64 with its sign bit flipped, big-endian
/// - `Str`: `0x20` then the bytes with `0x00 -> 0x01 0x01` and
///   `0x01 -> 0x01 0x02` escaped, terminated by `0x00`
#[derive(Clone, Copy, Debug, Default)]
pub struct Tuple;

const TAG_INT: u8 = 0x10;
const TAG_STR: u8 = 0x20;
const TERMINATOR: u8 = 0x00;
const ESCAPE: u8 = 0x01;
const SIGN_BIT: u64 = 0x8000_0000_0000_0000;

impl Tuple {
    pub fn encode(segments: &[Segment]) -> Bytes {
        let mut buf = BytesMut::new();
        for segment in segments {
            match segment {
                Segment::Int(v) => {
                    buf.put_u8(TAG_INT);
                    buf.put_u64((*v as u64) ^ SIGN_BIT);
                }
                Segment::Str(s) => {
                    buf.put_u8(TAG_STR);
                    for &byte in s.as_bytes() {
                        match byte {
                            TERMINATOR => buf.put_slice(&[ESCAPE, 0x01]),
                            ESCAPE => buf.put_slice(&[ESCAPE, 0x02]),
                            _ => buf.put_u8(byte),
                        }
                    }
                    buf.put_u8(TERMINATOR);
                }
            }
        }
        buf.freeze()
    }

    pub fn decode(mut buf: &[u8]) -> CodecResult<Vec<Segment>> {
        let mut segments = vec![];
        while let Some((&tag, rest)) = buf.split_first() {
            match tag {
                TAG_INT => {
                    if rest.len() < 8 {
                        return Err(CodecError::new("truncated int segment"));
                    }
                    let raw = u64::from_be_bytes(rest[..8].try_into().unwrap());
                    segments.push(Segment::Int((raw ^ SIGN_BIT) as i64));
                    buf = &rest[8..];
                }
                TAG_STR => {
                    let (s, consumed) = Self::decode_str(rest)?;
                    segments.push(Segment::Str(s));
                    buf = &rest[consumed..];
                }
                other => {
                    return Err(CodecError::new(format!("unknown segment tag 0x{other:02x}")));
                }
            }
        }
        Ok(segments)
    }

    // returns (decoded string, consumed bytes including terminator)
    fn decode_str(src: &[u8]) -> CodecResult<(String, usize)> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < src.len() {
            match src[i] {
                TERMINATOR => {
                    let s = String::from_utf8(out)
                        .map_err(|e| CodecError::new(format!("invalid utf-8: {e}")))?;
                    return Ok((s, i + 1));
                }
                ESCAPE => {
                    match src.get(i + 1) {
                        Some(0x01) => out.push(TERMINATOR),
                        Some(0x02) => out.push(ESCAPE),
                        Some(b) => {
                            return Err(CodecError::new(format!(
                                "invalid escape sequence 0x01 0x{b:02x}"
                            )))
                        }
                        None => return Err(CodecError::new("truncated escape sequence")),
                    }
                    i += 2;
                }
                b => {
                    out.push(b);
                    i += 1;
                }
            }
        }
        Err(CodecError::new("unterminated string segment"))
    }
}

impl KeyEncoding for Tuple {
    type Key = Vec<Segment>;

    fn encode_key(&self, key: &Vec<Segment>) -> CodecResult<Bytes> {
        Ok(Self::encode(key))
    }

    fn decode_key(&self, raw: &Bytes) -> CodecResult<Vec<Segment>> {
        Self::decode(raw)
    }
}

/// Bytes in, bytes out. The default hooks.
pub type Identity = Hooks<Raw, Raw>;

/// String keys with JSON values.
pub type JsonCodec<V> = Hooks<Utf8, Json<V>>;
