use asynckv_core::{AsyncDB, BatchOp, Config, Error, JsonCodec, MemoryEngine, RangeOptions, Result};
use log::{debug, info};
use serde_json::Value;
use std::io::Write;
use std::path::Path;

pub type ScanDB = AsyncDB<MemoryEngine, JsonCodec<Value>>;

/// How a scan walks the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// one `next()` per record
    Single,
    /// one `batch_next()` per read-ahead cache fill
    Batch,
}

/// Load a JSON object of `key -> value` into a fresh in-memory database.
pub async fn load(records: impl AsRef<Path>, config: Config) -> Result<ScanDB> {
    let buf = std::fs::read(records.as_ref())?;
    let doc: Value = serde_json::from_slice(&buf)
        .map_err(|e| Error::Config(format!("cannot parse records file: {e}")))?;
    let Value::Object(map) = doc else {
        return Err(Error::Config("records file must hold a JSON object".to_owned()));
    };

    let db: ScanDB = AsyncDB::new(MemoryEngine::new(), JsonCodec::default(), config);
    db.ensure().await?;
    let ops: Vec<_> = map.into_iter().map(|(k, v)| BatchOp::put(k, v)).collect();
    let len = ops.len();
    db.batch(ops).await?;
    info!("loaded {len} records from {:?}", records.as_ref());
    Ok(db)
}

/// Write every record of `options` as a `key<TAB>value` line. Returns the
/// number of records written.
pub async fn scan<W: Write>(
    db: &ScanDB,
    options: RangeOptions<String>,
    mode: Mode,
    out: &mut W,
) -> Result<usize> {
    let cursor = db.iterator(options).await?;
    let mut written = 0;
    loop {
        let pairs: Vec<(String, Value)> = match mode {
            Mode::Single => match cursor.next().await {
                Some(item) => {
                    let pair = item?;
                    vec![(pair.key, pair.value)]
                }
                None => return Ok(written),
            },
            Mode::Batch => match cursor.batch_next().await {
                Some(item) => {
                    let batch = item?;
                    debug!("batch of {} records", batch.len());
                    batch.keys.into_iter().zip(batch.values).collect()
                }
                None => return Ok(written),
            },
        };
        for (key, value) in pairs {
            if let Err(e) = writeln!(out, "{key}\t{value}") {
                // the reader went away, release the engine cursor before bailing
                cursor.close().await?;
                return Err(e.into());
            }
            written += 1;
        }
    }
}
