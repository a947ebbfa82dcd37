use std::path::Path;

use anyhow::Result;
use pagewise_core::source::{demo_messages, DEMO_GROUP_ID};
use pagewise_core::{Database, MessageStore};
use tracing::info;

/// Replace the demo conversation in the store at `path` with `count` messages
pub fn run(path: &Path, count: usize) -> Result<()> {
    let db = Database::new(path)?;
    let store = MessageStore::new(&db);

    let removed = store.delete_group(DEMO_GROUP_ID)?;
    let inserted = store.insert_items(&demo_messages(count))?;
    info!(path = %path.display(), removed, inserted, "Seeded message store");

    println!(
        "Seeded {} messages into {} ({} total)",
        inserted,
        path.display(),
        store.count()?
    );
    Ok(())
}
