//! Wire types for the signage synchronization protocol.
//!
//! This crate holds the shapes shared by the hub and its clients: the inbound
//! message envelope, the outbound payloads, and the library items the hub
//! resolves content from.

pub mod de;
mod library;
mod location;
mod message;

pub use library::{
    ContentKind, DisplayDefaults, ItemContent, LibraryItem, Page, FALLBACK_BACKGROUND_COLOR,
    FALLBACK_FONT_COLOR,
};
pub use location::{LocationId, LocationParseError};
pub use message::{
    Blank, ClientMessage, ContentPayload, HardwareAction, ProtocolError, SyncEcho, UnknownAction,
};
