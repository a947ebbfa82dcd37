//! Headless browsing session
//!
//! Drives the run controller against a [`VirtualList`] the way a UI would:
//! signal the frame, render, forward measurements, handle completions.
//! Row heights come from the message text so wrapping rows disturb the
//! estimates like they would on screen.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Result};
use pagewise_core::{PagingConfig, RunController, Viewport, VirtualList};
use tracing::info;

use super::open_source;

/// Characters per rendered line
const LINE_WIDTH: usize = 48;
const LINE_HEIGHT: f32 = 22.0;
/// Padding above and below each row
const ROW_PADDING: f32 = 22.0;

pub struct BrowseOptions {
    pub term: Option<String>,
    pub anchor: Option<String>,
    pub scrolls: usize,
    pub viewport_height: f32,
}

/// Rendered height of a message row
fn row_height(text: &str) -> f32 {
    let lines = text.chars().count().div_ceil(LINE_WIDTH).max(1);
    lines as f32 * LINE_HEIGHT + ROW_PADDING
}

/// Signal the frame, then lay out and forward new measurements
///
/// The frame goes first so owed corrections land before rows are drawn.
fn frame(controller: &mut RunController, list: &mut VirtualList) {
    list.sync_items(controller.items());
    controller.on_frame(list);

    let texts: HashMap<&str, &str> = controller
        .items()
        .iter()
        .map(|item| (item.id.as_str(), item.text.as_str()))
        .collect();
    let measured = list.render(|id| texts.get(id).map_or(0.0, |text| row_height(text)));
    drop(texts);

    for (id, height) in measured {
        controller.measure_row(&id, height);
    }
}

/// Handle completions until no page fetch is outstanding
async fn settle(controller: &mut RunController) -> Result<()> {
    loop {
        let window = controller.window();
        if !window.is_loading_initial() && !window.is_loading_older() && !window.is_loading_newer() {
            return Ok(());
        }
        if controller.handle_next().await.is_none() {
            bail!("Engine event channel closed");
        }
    }
}

fn summary(label: &str, controller: &RunController, list: &VirtualList) {
    let items = controller.items();
    let visible = list.visible_range();
    let first_visible = items.get(visible.start).map_or("-", |i| i.id.as_str());
    println!(
        "{:<10} items={:<4} pages={:<3} range={}..{} top={} offset={:.0} older={} newer={}",
        label,
        items.len(),
        controller.window().page_count(),
        items.first().map_or("-", |i| i.id.as_str()),
        items.last().map_or("-", |i| i.id.as_str()),
        first_visible,
        list.scroll_offset(),
        controller.has_older(),
        controller.has_newer(),
    );
}

pub async fn run(db: Option<&Path>, options: BrowseOptions, config: PagingConfig) -> Result<()> {
    let source = open_source(db, &config)?;
    let mut controller = RunController::new(source, config);
    let mut list = VirtualList::new(
        controller.config().estimated_row_height,
        options.viewport_height,
    );

    match options.term.as_deref() {
        Some(term) => {
            controller.set_search_input(term);
            controller.run_search(term, options.anchor.as_deref());
        }
        None => {
            controller.load_latest();
        }
    }
    settle(&mut controller).await?;
    if let Some(err) = controller.error() {
        bail!("Initial page failed: {err}");
    }

    let budget = controller.config().centering_attempts as usize + 2;
    for _ in 0..budget {
        frame(&mut controller, &mut list);
        if controller.is_centered() {
            break;
        }
    }
    // Preview results arrive independently of the window
    controller.pump();

    if let Some(focused) = controller.focused_id() {
        println!("Focused on {focused}");
    }
    if let Some(matches) = controller.total_matches() {
        println!("Matches: {matches}");
    }
    summary("start", &controller, &list);

    for step in 1..=options.scrolls {
        list.set_scroll_offset(f32::MAX);
        frame(&mut controller, &mut list);
        settle(&mut controller).await?;
        frame(&mut controller, &mut list);
        summary(&format!("older#{step}"), &controller, &list);
    }

    for step in 1..=options.scrolls {
        list.set_scroll_offset(0.0);
        frame(&mut controller, &mut list);
        settle(&mut controller).await?;
        frame(&mut controller, &mut list);
        summary(&format!("newer#{step}"), &controller, &list);
    }

    if let Some(err) = controller.error() {
        bail!("Paging failed: {err}");
    }
    info!(run = %controller.run_id(), items = controller.items().len(), "Browse session finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_height_wraps_long_text() {
        assert_eq!(row_height(""), LINE_HEIGHT + ROW_PADDING);
        assert_eq!(row_height(&"x".repeat(LINE_WIDTH)), LINE_HEIGHT + ROW_PADDING);
        assert_eq!(
            row_height(&"x".repeat(LINE_WIDTH + 1)),
            2.0 * LINE_HEIGHT + ROW_PADDING
        );
    }

    #[tokio::test]
    async fn test_browse_demo_session() {
        let options = BrowseOptions {
            term: Some("needle".into()),
            anchor: Some("m-0500".into()),
            scrolls: 3,
            viewport_height: 600.0,
        };
        run(None, options, PagingConfig::default()).await.unwrap();
    }
}
