use std::path::Path;

use anyhow::Result;
use pagewise_core::{Cursor, Direction, Page, PagingConfig};

use super::open_source;

/// Fetch one page from the store at `path`
pub async fn fetch(
    path: &Path,
    cursor: Option<&str>,
    direction: Direction,
    limit: usize,
    config: &PagingConfig,
) -> Result<Page> {
    let source = open_source(Some(path), config)?;
    let cursor = cursor.map(Cursor::from_token);
    Ok(source.fetch_page(cursor.as_ref(), direction, limit).await?)
}

/// Print one page as pretty JSON
pub async fn run(
    path: &Path,
    cursor: Option<&str>,
    direction: Direction,
    limit: usize,
    config: &PagingConfig,
) -> Result<()> {
    let page = fetch(path, cursor, direction, limit, config).await?;
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_pages_through_seeded_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("messages.db");
        crate::commands::seed::run(&path, 100).unwrap();
        let config = PagingConfig::default();

        let head = fetch(&path, None, Direction::Older, 10, &config).await.unwrap();
        assert_eq!(head.items[0].id, "m-0100");
        assert!(head.prev_cursor.is_none());

        let next = head.next_cursor.clone().unwrap();
        let older = fetch(&path, Some(next.as_str()), Direction::Older, 10, &config)
            .await
            .unwrap();
        assert_eq!(older.items[0].id, "m-0090");

        let garbage = fetch(&path, Some("no-separator"), Direction::Older, 10, &config)
            .await
            .unwrap();
        assert!(garbage.items.is_empty());
    }
}
