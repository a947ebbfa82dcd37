//! Subcommand implementations

pub mod browse;
pub mod page;
pub mod seed;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use pagewise_core::{DataSource, Database, MemorySource, PagingConfig, SqliteSource};

/// Default demo size for in-memory sessions
const DEMO_COUNT: usize = 1000;

/// Open the store at `db`, or the in-memory demo conversation
pub fn open_source(db: Option<&Path>, config: &PagingConfig) -> Result<Arc<dyn DataSource>> {
    match db {
        Some(path) => {
            let database = Database::new(path)
                .with_context(|| format!("Failed to open message store {}", path.display()))?;
            let source = SqliteSource::new(database.into_shared())
                .with_default_anchor(config.default_anchor_id.clone());
            Ok(Arc::new(source))
        }
        None => {
            let source = MemorySource::new(pagewise_core::source::demo_messages(DEMO_COUNT));
            let source = match &config.default_anchor_id {
                Some(anchor) => source.with_default_anchor(anchor.clone()),
                None => source,
            };
            Ok(Arc::new(source))
        }
    }
}
