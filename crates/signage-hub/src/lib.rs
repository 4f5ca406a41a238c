//! Location-scoped synchronization hub for signage displays.
//!
//! Controllers push content and selection events; displays render whatever
//! is active at their location. The hub classifies connections by location
//! and role, resolves selections into renderable payloads, keeps per-location
//! state, and fans updates out to the right subset of connections.
//!
//! ```text
//!  accept loop ──► ConnectionRegistry ◄──────────────┐
//!       │                                            │
//!       ▼                                            │
//!  Hub::handle_frame ──► LocationStateStore          │
//!       │         └────► ContentResolver ──► ContentRepository
//!       ▼                                            │
//!  Broadcaster ──────────────────────────────────────┘
//! ```

pub mod action;
pub mod broadcast;
pub mod config;
pub mod registry;
pub mod repository;
pub mod resolver;
pub mod router;
pub mod server;
pub mod state;

pub use action::{CommandActionSink, HardwareActionSink, LogActionSink};
pub use broadcast::Broadcaster;
pub use config::{ActionsConfig, ConfigError, HubConfig};
pub use registry::{
    ConnectionId, ConnectionRegistry, Frame, LocationAssignment, RegistryStats, Role,
};
pub use repository::{ContentRepository, MemoryRepository, RepositoryError};
pub use resolver::ContentResolver;
pub use router::Hub;
pub use state::{LocationState, LocationStateStore};
