//! Paging configuration
//!
//! Loaded from `~/.pagewise/config.toml` when present. Every field has a
//! default, so a partial file only overrides what it names.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{paging, preview, storage, viewport};
use crate::error::ConfigError;
use crate::viewport::Align;

/// Base directory for config and logs (`~/.pagewise`)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(storage::CONFIG_DIR_NAME)
}

/// Log file directory (`~/.pagewise/logs`)
pub fn logs_dir() -> PathBuf {
    config_dir().join(storage::LOGS_DIR_NAME)
}

/// Tunables for the window, scroll anchor, centering loop and preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    /// Items per cursor page
    pub page_size: usize,
    /// Around-anchor radius for the initial page of anchored runs
    pub around_count: usize,
    /// Preview candidate cap
    pub candidate_limit: usize,
    /// Target materialized-item cap
    pub max_items: usize,
    /// Explicit page cap; derived from `max_items` when unset
    pub max_pages: Option<usize>,
    /// Height assumed for rows that have not been measured yet
    pub estimated_row_height: f32,
    /// Rows from the top that trigger a newer fetch
    pub top_trigger_rows: usize,
    /// Rows from the bottom that trigger an older fetch
    pub bottom_trigger_rows: usize,
    /// Fallback anchor for runs without a (known) anchor
    pub default_anchor_id: Option<String>,
    /// Frame budget of the centering loop
    pub centering_attempts: u32,
    /// Where the anchor row should land in the viewport
    pub anchor_align: Align,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: paging::PAGE_SIZE,
            around_count: paging::AROUND_COUNT,
            candidate_limit: preview::CANDIDATE_LIMIT,
            max_items: paging::MAX_ITEMS,
            max_pages: None,
            estimated_row_height: viewport::ESTIMATED_ROW_HEIGHT,
            top_trigger_rows: viewport::TOP_TRIGGER_ROWS,
            bottom_trigger_rows: viewport::BOTTOM_TRIGGER_ROWS,
            default_anchor_id: Some(paging::DEFAULT_ANCHOR_ID.to_string()),
            centering_attempts: viewport::CENTERING_ATTEMPTS,
            anchor_align: Align::Start,
        }
    }
}

impl PagingConfig {
    /// Retained page cap: `ceil(max_items / page_size) + slack` unless set explicitly
    ///
    /// Never below what an around page needs, so `max_pages * page_size`
    /// holds a full initial page of an anchored run.
    pub fn max_pages(&self) -> usize {
        let page_size = self.page_size.max(1);
        let configured = self
            .max_pages
            .unwrap_or_else(|| self.max_items.div_ceil(page_size) + paging::SLACK_PAGES);
        let around = (2 * self.around_count + 1).div_ceil(page_size);
        configured.max(around).max(1)
    }

    /// Clamp degenerate values so the engine never divides by or loops on zero
    pub fn validate(mut self) -> Self {
        self.page_size = self.page_size.max(1);
        self.candidate_limit = self.candidate_limit.max(1);
        self.centering_attempts = self.centering_attempts.max(1);
        self.max_pages = self.max_pages.map(|pages| pages.max(1));
        if !self.estimated_row_height.is_finite() || self.estimated_row_height <= 0.0 {
            self.estimated_row_height = viewport::ESTIMATED_ROW_HEIGHT;
        }
        if let Some(anchor) = &self.default_anchor_id {
            if anchor.trim().is_empty() {
                self.default_anchor_id = None;
            }
        }
        self
    }

    /// Default config file location (`~/.pagewise/config.toml`)
    pub fn default_path() -> PathBuf {
        config_dir().join(storage::CONFIG_FILE_NAME)
    }

    /// Load from a TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), "Loaded paging config");
        Ok(config)
    }

    /// Parse from TOML text and validate
    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        let config: Self = toml::from_str(raw)?;
        Ok(config.validate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_max_pages() {
        let config = PagingConfig::default();
        // ceil(240 / 20) + 2
        assert_eq!(config.max_pages(), 14);
    }

    #[test]
    fn test_max_pages_rounds_up() {
        let config = PagingConfig {
            max_items: 50,
            page_size: 20,
            ..Default::default()
        };
        assert_eq!(config.max_pages(), 5);
    }

    #[test]
    fn test_max_pages_fits_around_page() {
        let config = PagingConfig {
            max_pages: Some(1),
            page_size: 20,
            around_count: 20,
            ..Default::default()
        };
        // 41 around items need three pages of 20
        assert_eq!(config.max_pages(), 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PagingConfig::from_toml("page_size = 5\nanchor_align = \"center\"\n")
            .expect("valid toml");
        assert_eq!(config.page_size, 5);
        assert_eq!(config.anchor_align, Align::Center);
        assert_eq!(config.around_count, paging::AROUND_COUNT);
        assert_eq!(config.default_anchor_id.as_deref(), Some("m-0500"));
    }

    #[test]
    fn test_validate_clamps_zeroes() {
        let config = PagingConfig {
            page_size: 0,
            centering_attempts: 0,
            max_pages: Some(0),
            estimated_row_height: -1.0,
            default_anchor_id: Some("  ".to_string()),
            ..Default::default()
        }
        .validate();

        assert_eq!(config.page_size, 1);
        assert_eq!(config.centering_attempts, 1);
        assert_eq!(config.max_pages, Some(1));
        assert_eq!(config.estimated_row_height, viewport::ESTIMATED_ROW_HEIGHT);
        assert!(config.default_anchor_id.is_none());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let config = PagingConfig::load(&temp.path().join("nope.toml")).expect("defaults");
        assert_eq!(config, PagingConfig::default());
    }

    #[test]
    fn test_load_malformed_file_errors() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "page_size = \"twenty\"").expect("write");
        assert!(matches!(
            PagingConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
