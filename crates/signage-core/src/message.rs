//! Protocol messages.
//!
//! Inbound frames are JSON objects discriminated by `type`. Outbound frames
//! are either a [`ContentPayload`] for displays, a [`Blank`] clear signal, or
//! a [`SyncEcho`] for controllers.

use crate::de;
use crate::library::ContentKind;
use crate::LocationId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Messages sent from clients to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Show a library item (optionally a specific page) at a location.
    Change {
        #[serde(deserialize_with = "de::int")]
        guid: i64,
        #[serde(default, deserialize_with = "de::opt_int")]
        page: Option<i64>,
        #[serde(rename = "locationId", default, deserialize_with = "de::opt_int")]
        location_id: Option<LocationId>,
    },
    /// Clear a location's display.
    Clear {
        #[serde(rename = "locationId", default, deserialize_with = "de::opt_int")]
        location_id: Option<LocationId>,
    },
    /// Hardware side channel (power, volume).
    Action {
        #[serde(rename = "actionType")]
        action_type: String,
    },
    /// A controller selected a playlist.
    SelectPlaylist {
        #[serde(deserialize_with = "de::int")]
        guid: i64,
        #[serde(rename = "locationId", default, deserialize_with = "de::opt_int")]
        location_id: Option<LocationId>,
    },
    /// A controller selected a library item (UI sync only).
    SelectLibraryItem {
        #[serde(deserialize_with = "de::int")]
        guid: i64,
        #[serde(default, deserialize_with = "de::opt_int")]
        page: Option<i64>,
        #[serde(rename = "locationId", default, deserialize_with = "de::opt_int")]
        location_id: Option<LocationId>,
    },
}

const KNOWN_TYPES: [&str; 5] = [
    "Change",
    "Clear",
    "Action",
    "SelectPlaylist",
    "SelectLibraryItem",
];

impl ClientMessage {
    /// Parse an inbound text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let Some(object) = value.as_object() else {
            return Err(ProtocolError::NotAnObject);
        };
        let kind = object
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(ProtocolError::MissingType)?;
        if !KNOWN_TYPES.contains(&kind) {
            return Err(ProtocolError::UnknownType(kind.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// The message's `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Change { .. } => "Change",
            Self::Clear { .. } => "Clear",
            Self::Action { .. } => "Action",
            Self::SelectPlaylist { .. } => "SelectPlaylist",
            Self::SelectLibraryItem { .. } => "SelectLibraryItem",
        }
    }
}

/// A frame the hub could not turn into a [`ClientMessage`].
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no \"type\" field")]
    MissingType,
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

/// The resolved renderable unit broadcast to displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPayload {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub content: String,
    pub background_color: String,
    pub font_color: String,
}

/// The "show nothing" signal. Serializes as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blank {}

/// Selection echoes exchanged between controllers at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEcho {
    SelectPlaylist {
        guid: i64,
        #[serde(rename = "locationId")]
        location_id: LocationId,
    },
    SelectLibraryItem {
        guid: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page: Option<i64>,
        #[serde(rename = "locationId")]
        location_id: LocationId,
    },
}

/// Hardware control requests carried by `Action` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HardwareAction {
    PowerOn,
    PowerOff,
    VolumeUp,
    VolumeDown,
}

impl HardwareAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PowerOn => "powerOn",
            Self::PowerOff => "powerOff",
            Self::VolumeUp => "volumeUp",
            Self::VolumeDown => "volumeDown",
        }
    }
}

impl fmt::Display for HardwareAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HardwareAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "powerOn" => Ok(Self::PowerOn),
            "powerOff" => Ok(Self::PowerOff),
            "volumeUp" => Ok(Self::VolumeUp),
            "volumeDown" => Ok(Self::VolumeDown),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action type: {0}")]
pub struct UnknownAction(pub String);
