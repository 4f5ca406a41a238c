//! Turns a library selection into a renderable [`ContentPayload`].

use crate::repository::ContentRepository;
use signage_core::{
    ContentKind, ContentPayload, DisplayDefaults, ItemContent, LibraryItem,
    FALLBACK_BACKGROUND_COLOR, FALLBACK_FONT_COLOR,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct ContentResolver {
    repository: Arc<dyn ContentRepository>,
}

impl ContentResolver {
    pub fn new(repository: Arc<dyn ContentRepository>) -> Self {
        Self { repository }
    }

    /// Resolve an item (and optional page) into a payload.
    ///
    /// Returns `None` when the item does not exist. A missing page is not a
    /// miss: it resolves to an empty body.
    pub fn resolve(&self, item_id: i64, page: Option<i64>) -> Option<ContentPayload> {
        let item = match self.repository.library_item(item_id) {
            Ok(Some(item)) => item,
            Ok(None) => {
                tracing::warn!(item_id, "No library item found");
                return None;
            }
            Err(e) => {
                tracing::warn!(item_id, "Library lookup failed: {}", e);
                return None;
            }
        };

        let defaults = self.repository.display_defaults().unwrap_or_else(|e| {
            tracing::warn!("Display defaults unavailable, using fallbacks: {}", e);
            DisplayDefaults::default()
        });

        Some(build_payload(&item, page, &defaults))
    }

    /// The configured blank-page item, if any.
    pub fn blank_page_item(&self) -> Option<i64> {
        match self.repository.display_defaults() {
            Ok(defaults) => defaults.blank_page_item_id,
            Err(e) => {
                tracing::warn!("Display defaults unavailable: {}", e);
                None
            }
        }
    }
}

fn build_payload(
    item: &LibraryItem,
    page: Option<i64>,
    defaults: &DisplayDefaults,
) -> ContentPayload {
    let content = match (&item.content, item.kind) {
        (ItemContent::Pages(pages), ContentKind::Text) => match page {
            Some(wanted) => match pages.iter().find(|p| p.page == wanted) {
                Some(p) => p.content.clone(),
                None => {
                    tracing::warn!(
                        item_id = item.guid,
                        page = wanted,
                        "Page not found, showing empty body"
                    );
                    String::new()
                }
            },
            None => pages.first().map(|p| p.content.clone()).unwrap_or_default(),
        },
        (ItemContent::Body(body), _) => body.clone(),
        // Paged content on a non-text item has no single body to show.
        (ItemContent::Pages(pages), _) => pages
            .first()
            .map(|p| p.content.clone())
            .unwrap_or_default(),
    };

    ContentPayload {
        kind: item.kind,
        content,
        background_color: pick_color(
            item.background_color.as_deref(),
            defaults.background_color.as_deref(),
            FALLBACK_BACKGROUND_COLOR,
        ),
        font_color: pick_color(
            item.font_color.as_deref(),
            defaults.font_color.as_deref(),
            FALLBACK_FONT_COLOR,
        ),
    }
}

fn pick_color(own: Option<&str>, default: Option<&str>, fallback: &str) -> String {
    own.filter(|c| !c.is_empty())
        .or(default.filter(|c| !c.is_empty()))
        .unwrap_or(fallback)
        .to_string()
}
