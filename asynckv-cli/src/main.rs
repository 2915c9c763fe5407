use asynckv_cli::{load, scan, Mode};
use asynckv_core::{Config, RangeOptions, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "asynckv range scanner")]
struct Opt {
    /// JSON object of key -> value to load
    records: PathBuf,
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    gt: Option<String>,
    #[arg(long)]
    gte: Option<String>,
    #[arg(long)]
    lt: Option<String>,
    #[arg(long)]
    lte: Option<String>,
    #[arg(short, long)]
    reverse: bool,
    #[arg(short, long)]
    limit: Option<usize>,
    /// drain with batch_next() instead of next()
    #[arg(short, long)]
    batch: bool,
}

impl Opt {
    fn range(&self) -> RangeOptions<String> {
        RangeOptions {
            gt: self.gt.clone(),
            gte: self.gte.clone(),
            lt: self.lt.clone(),
            lte: self.lte.clone(),
            reverse: self.reverse,
            limit: self.limit,
            high_water_mark: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let opt: Opt = Opt::parse();
    let config = match &opt.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    let db = load(&opt.records, config).await?;
    let mode = if opt.batch { Mode::Batch } else { Mode::Single };
    let mut stdout = std::io::stdout().lock();
    let n = scan(&db, opt.range(), mode, &mut stdout).await?;
    log::info!("scanned {n} records");
    db.close().await
}
