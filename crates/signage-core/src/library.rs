//! Library items and display defaults, as stored by the content repository.

use crate::de;
use serde::{Deserialize, Serialize};

/// Background color used when neither the item nor the settings supply one.
pub const FALLBACK_BACKGROUND_COLOR: &str = "#000000";
/// Font color used when neither the item nor the settings supply one.
pub const FALLBACK_FONT_COLOR: &str = "#FFFFFF";

/// What a display renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Url,
}

/// A library item as seen by the hub (read-only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryItem {
    #[serde(alias = "id", deserialize_with = "de::int")]
    pub guid: i64,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub content: ItemContent,
    #[serde(
        default,
        deserialize_with = "de::non_empty",
        skip_serializing_if = "Option::is_none"
    )]
    pub background_color: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::non_empty",
        skip_serializing_if = "Option::is_none"
    )]
    pub font_color: Option<String>,
}

impl LibraryItem {
    /// A single-body item (image, url, or legacy text).
    pub fn new(guid: i64, kind: ContentKind, body: impl Into<String>) -> Self {
        Self {
            guid,
            kind,
            content: ItemContent::Body(body.into()),
            background_color: None,
            font_color: None,
        }
    }

    /// A paged text item. Pages are numbered from 1 in the given order.
    pub fn paged<I, S>(guid: i64, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages = pages
            .into_iter()
            .zip(1..)
            .map(|(content, page)| Page {
                page,
                content: content.into(),
            })
            .collect();
        Self {
            guid,
            kind: ContentKind::Text,
            content: ItemContent::Pages(pages),
            background_color: None,
            font_color: None,
        }
    }

    pub fn with_colors(mut self, background: Option<&str>, font: Option<&str>) -> Self {
        self.background_color = background.map(str::to_string);
        self.font_color = font.map(str::to_string);
        self
    }
}

/// Item body: either an ordered list of pages (text) or a single string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemContent {
    Pages(Vec<Page>),
    Body(String),
}

/// One page of a text item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(deserialize_with = "de::int")]
    pub page: i64,
    #[serde(default)]
    pub content: String,
}

/// Global display settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayDefaults {
    #[serde(
        rename = "defaultBackgroundColor",
        default,
        deserialize_with = "de::non_empty"
    )]
    pub background_color: Option<String>,
    #[serde(rename = "defaultFontColor", default, deserialize_with = "de::non_empty")]
    pub font_color: Option<String>,
    /// Item shown when a location is cleared.
    #[serde(rename = "defaultBlankPage", default, deserialize_with = "de::opt_int")]
    pub blank_page_item_id: Option<i64>,
}
