//! Pagewise Core - Bidirectional windowed pagination engine
//!
//! Keeps a bounded window of an ordered dataset materialized around a
//! moving viewport:
//! - Keyset cursor pages over a pluggable data source (memory or SQLite)
//! - Page retention with eviction opposite to growth
//! - Scroll-offset correction so merges never move visible rows
//! - Anchor centering over estimated row heights
//! - Search preview that drops superseded results

pub mod anchor;
pub mod centering;
pub mod config;
pub mod constants;
pub mod cursor;
pub mod error;
pub mod preview;
pub mod run;
pub mod session;
pub mod source;
pub mod storage;
pub mod types;
pub mod viewport;
pub mod window;

// Re-exports for convenience
pub use config::PagingConfig;
pub use cursor::Cursor;
pub use error::{ConfigError, SourceError};
pub use run::{EngineEvent, EventOutcome, FrameReport, RunController};
pub use source::{DataSource, MemorySource, SqliteSource};
pub use storage::{Database, MessageStore};
pub use types::{AroundPage, Direction, Item, Page, RunId};
pub use viewport::{Align, Viewport, VirtualList};
pub use window::{WindowManager, WindowState};
