//! Preview index
//!
//! Bounded candidate list for the text currently typed into the search box.
//! Independent of the window: no pagination, no scroll coordination. Each
//! change of the normalized query bumps a generation; results carrying an
//! older generation are dropped.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::constants::preview::COLLECTION_PREFIX;
use crate::error::SourceError;
use crate::types::{compare_items, Item};

/// Candidate fetch to issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
    pub generation: u64,
    pub query: String,
    pub limit: usize,
}

/// Finished candidate fetch
#[derive(Debug, Clone)]
pub struct PreviewCompletion {
    pub generation: u64,
    pub result: Result<Vec<Item>, SourceError>,
}

/// Trimmed, lowercased query text; matching is case-insensitive anyway
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Stable key for a query: `search-preview-<slug>` or `search-preview-all`
pub fn collection_key(query: &str) -> String {
    let mut slug = String::with_capacity(query.len());
    for ch in query.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        format!("{COLLECTION_PREFIX}-all")
    } else {
        format!("{COLLECTION_PREFIX}-{slug}")
    }
}

/// Candidate list for the current search text
#[derive(Debug)]
pub struct PreviewIndex {
    limit: usize,
    query: String,
    generation: u64,
    candidates: Vec<Item>,
    loading: bool,
    error: Option<SourceError>,
    token: CancellationToken,
}

impl PreviewIndex {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            query: String::new(),
            generation: 0,
            candidates: Vec::new(),
            loading: false,
            error: None,
            token: CancellationToken::new(),
        }
    }

    /// Feed the raw search text
    ///
    /// Returns a request (and a token cancelled by the next change) when the
    /// normalized query differs from the current one, or on first use.
    pub fn update(&mut self, raw: &str) -> Option<(PreviewRequest, CancellationToken)> {
        let query = normalize(raw);
        if self.generation > 0 && query == self.query {
            return None;
        }

        self.token.cancel();
        self.token = CancellationToken::new();
        self.generation += 1;
        self.query = query;
        self.loading = true;
        self.error = None;

        debug!(generation = self.generation, query = %self.query, "Preview query changed");
        Some((
            PreviewRequest {
                generation: self.generation,
                query: self.query.clone(),
                limit: self.limit,
            },
            self.token.clone(),
        ))
    }

    /// Take a finished fetch; returns false if it was superseded
    pub fn apply(&mut self, completion: PreviewCompletion) -> bool {
        if completion.generation != self.generation {
            debug!(
                generation = completion.generation,
                current = self.generation,
                "Discarding stale preview"
            );
            return false;
        }

        self.loading = false;
        match completion.result {
            Ok(items) => {
                let mut seen = HashSet::new();
                let mut candidates: Vec<Item> = items
                    .into_iter()
                    .filter(|item| seen.insert(item.id.clone()))
                    .collect();
                candidates.sort_by(compare_items);
                candidates.truncate(self.limit);
                self.candidates = candidates;
            }
            Err(err) => {
                self.candidates.clear();
                self.error = Some(err);
            }
        }
        true
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn collection_key(&self) -> String {
        collection_key(&self.query)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn candidates(&self) -> &[Item] {
        &self.candidates
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&SourceError> {
        self.error.as_ref()
    }
}
