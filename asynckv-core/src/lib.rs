pub mod codec;
pub mod db;
pub mod engine;
mod errors;

mod config;
mod cursor;

pub use codec::{Codec, Hooks, Identity, JsonCodec, Segment, Tuple};
pub use config::Config;
pub use cursor::{AsyncCursor, KvPair, MultiKvPair};
pub use db::{AsyncDB, BatchOp, RangeOptions};
pub use engine::memory::MemoryEngine;
pub use engine::{Engine, EngineCursor, ReadAheadCache};
pub use errors::{CodecError, EngineError, EngineResult, Error, Phase, Result};
