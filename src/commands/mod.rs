pub mod inventory;
pub mod review;
pub mod run;
pub mod status;

use std::path::{Path, PathBuf};

const MANIFEST_DIR: &str = "manifests";
const REVIEW_QUEUE_FILE: &str = "review_queue.sqlite";
const INVENTORY_MANIFEST_FILE: &str = "source_inventory.json";
const RUN_MANIFEST_PREFIX: &str = "pipeline_run_";

fn manifest_dir(cache_root: &Path) -> PathBuf {
    cache_root.join(MANIFEST_DIR)
}

fn queue_db_path(cache_root: &Path, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cache_root.join(REVIEW_QUEUE_FILE))
}
