use asynckv_core::codec::{Json, Utf8};
use asynckv_core::{AsyncDB, Config, Hooks, MemoryEngine};

pub type JsonDB = AsyncDB<MemoryEngine, Hooks<Utf8, Json<serde_json::Value>>>;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn json_db() -> JsonDB {
    AsyncDB::new(MemoryEngine::new(), Hooks::default(), Config::default())
}
