//! Engine constants and configuration defaults
//!
//! Centralized location for magic numbers and default values

/// Paging and retention defaults
pub mod paging {
    /// Items requested per cursor page
    pub const PAGE_SIZE: usize = 20;

    /// Radius of the initial around-anchor window (items on each side)
    pub const AROUND_COUNT: usize = 20;

    /// Target number of materialized items before pages are evicted
    pub const MAX_ITEMS: usize = 240;

    /// Extra pages retained on top of `MAX_ITEMS / PAGE_SIZE`
    pub const SLACK_PAGES: usize = 2;

    /// Anchor used when a run does not name one, or names one that does not exist
    pub const DEFAULT_ANCHOR_ID: &str = "m-0500";
}

/// Preview (candidate list) defaults
pub mod preview {
    /// Maximum number of candidates kept for a search term
    pub const CANDIDATE_LIMIT: usize = 120;

    /// Prefix of preview collection keys
    pub const COLLECTION_PREFIX: &str = "search-preview";
}

/// Viewport defaults
pub mod viewport {
    /// Row height assumed until a row has been measured, in pixels
    pub const ESTIMATED_ROW_HEIGHT: f32 = 66.0;

    /// Rows from the top edge that trigger a newer-page fetch
    pub const TOP_TRIGGER_ROWS: usize = 1;

    /// Rows from the bottom edge that trigger an older-page fetch
    pub const BOTTOM_TRIGGER_ROWS: usize = 1;

    /// Frames the centering loop may spend before giving up on exact alignment
    pub const CENTERING_ATTEMPTS: u32 = 6;

    /// Content counts as filling the viewport only beyond this slack, in pixels
    pub const FILL_SLACK_PX: f32 = 2.0;
}

/// Storage configuration
pub mod storage {
    /// Config directory name (under the home directory)
    pub const CONFIG_DIR_NAME: &str = ".pagewise";

    /// Config file name inside the config directory
    pub const CONFIG_FILE_NAME: &str = "config.toml";

    /// Log directory name inside the config directory
    pub const LOGS_DIR_NAME: &str = "logs";

    /// Log file name inside the log directory
    pub const LOG_FILE_NAME: &str = "pagewise.log";

    /// Separator between the sort key and id inside a cursor token
    pub const CURSOR_SEPARATOR: &str = "::";
}
