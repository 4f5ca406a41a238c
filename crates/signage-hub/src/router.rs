//! Message dispatch.
//!
//! Each inbound frame is parsed once into a [`ClientMessage`] and handled on
//! its own. Location-scoped handlers hold that location's state guard from
//! the first read to the last broadcast, which serializes everything that
//! touches one location.

use crate::action::HardwareActionSink;
use crate::broadcast::Broadcaster;
use crate::registry::{ConnectionId, ConnectionRegistry, Frame, LocationAssignment, Role};
use crate::repository::ContentRepository;
use crate::resolver::ContentResolver;
use crate::state::{LocationState, LocationStateStore};
use serde::Serialize;
use signage_core::{Blank, ClientMessage, HardwareAction, LocationId, SyncEcho};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Which kind of selection a controller made.
#[derive(Debug, Clone, Copy)]
enum Selection {
    Playlist,
    LibraryItem { page: Option<i64> },
}

pub struct Hub {
    registry: Arc<ConnectionRegistry>,
    locations: LocationStateStore,
    resolver: ContentResolver,
    broadcaster: Broadcaster,
    actions: Arc<dyn HardwareActionSink>,
    replay_on_connect: bool,
}

impl Hub {
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        actions: Arc<dyn HardwareActionSink>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            broadcaster: Broadcaster::new(registry.clone()),
            registry,
            locations: LocationStateStore::new(),
            resolver: ContentResolver::new(repository),
            actions,
            replay_on_connect: true,
        }
    }

    pub fn replay_on_connect(mut self, enabled: bool) -> Self {
        self.replay_on_connect = enabled;
        self
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn locations(&self) -> &LocationStateStore {
        &self.locations
    }

    /// Register a new connection.
    ///
    /// With a connect-time location and content already showing there, the
    /// new connection receives that content before any later broadcast.
    pub async fn connect(
        &self,
        tx: mpsc::Sender<Frame>,
        location: Option<LocationId>,
    ) -> ConnectionId {
        let Some(location) = location.filter(|_| self.replay_on_connect) else {
            return self.registry.register(tx, location);
        };

        let state = self.locations.lock(location).await;
        let id = self.registry.register(tx, Some(location));
        if let Some(content) = &state.last_content {
            self.broadcaster.send_to_connection(id, content);
            tracing::debug!(conn = %id, %location, "Replayed current content to new connection");
        }
        id
    }

    /// Drop a connection. Must run before the socket is considered gone.
    /// Dropping an already removed connection is a no-op.
    pub fn disconnect(&self, id: ConnectionId) {
        if !self.registry.deregister(id) {
            return;
        }
        let stats = self.registry.stats();
        tracing::debug!(
            conn = %id,
            connections = stats.total,
            controllers = stats.controllers,
            unassigned = stats.unassigned,
            "Connection closed"
        );
    }

    /// Handle one raw text frame. Bad frames are logged and dropped.
    pub async fn handle_frame(&self, conn: ConnectionId, text: &str) {
        match ClientMessage::parse(text) {
            Ok(message) => self.handle_message(conn, message).await,
            Err(e) => tracing::warn!(%conn, "Dropping frame: {}", e),
        }
    }

    pub async fn handle_message(&self, conn: ConnectionId, message: ClientMessage) {
        tracing::debug!(%conn, kind = message.kind(), "Received message");
        match message {
            ClientMessage::Change {
                guid,
                page,
                location_id,
            } => self.change(conn, guid, page, location_id).await,
            ClientMessage::Clear { location_id } => self.clear(conn, location_id).await,
            ClientMessage::Action { action_type } => self.action(&action_type),
            ClientMessage::SelectPlaylist { guid, location_id } => {
                self.select(conn, guid, location_id, Selection::Playlist)
                    .await
            }
            ClientMessage::SelectLibraryItem {
                guid,
                page,
                location_id,
            } => {
                self.select(conn, guid, location_id, Selection::LibraryItem { page })
                    .await
            }
        }
    }

    async fn change(
        &self,
        conn: ConnectionId,
        guid: i64,
        page: Option<i64>,
        location: Option<LocationId>,
    ) {
        let Some(location) = location else {
            tracing::warn!(%conn, guid, "Change without locationId dropped");
            return;
        };
        let assignment = self.registry.set_location(conn, location);

        let mut state = self.locations.lock(location).await;
        let Some(payload) = self.resolver.resolve(guid, page) else {
            return;
        };
        state.set_library_selection(guid, page);
        state.set_content(Some(payload.clone()));

        let sent = self.send_to_location_and_sender(conn, location, assignment, &payload);
        tracing::info!(%location, guid, page = ?page, sent, "Broadcast content");
    }

    async fn clear(&self, conn: ConnectionId, location: Option<LocationId>) {
        let Some(location) = location else {
            tracing::warn!(%conn, "Clear without locationId dropped");
            return;
        };
        let assignment = self.registry.set_location(conn, location);

        let mut state = self.locations.lock(location).await;
        state.clear_library_selection();

        let blank_page = self.resolver.blank_page_item().and_then(|item_id| {
            let payload = self.resolver.resolve(item_id, None);
            if payload.is_none() {
                tracing::warn!(%location, item_id, "Blank page item no longer resolves");
            }
            payload
        });

        match blank_page {
            Some(payload) => {
                let sent = self.send_to_location_and_sender(conn, location, assignment, &payload);
                state.set_content(Some(payload));
                tracing::info!(%location, sent, "Cleared to blank page");
            }
            None => {
                let sent = self.send_to_location_and_sender(conn, location, assignment, &Blank {});
                state.set_content(None);
                tracing::info!(%location, sent, "Cleared");
            }
        }
    }

    /// Broadcast to everyone at `location`. A sender pinned elsewhere is not
    /// among them, so it gets its own copy.
    fn send_to_location_and_sender<P>(
        &self,
        conn: ConnectionId,
        location: LocationId,
        assignment: LocationAssignment,
        payload: &P,
    ) -> usize
    where
        P: Serialize + ?Sized,
    {
        let mut sent = self
            .broadcaster
            .send_to_location(location, payload, None, None);
        if let LocationAssignment::Kept(pinned) = assignment
            && self.broadcaster.send_to_connection(conn, payload)
        {
            tracing::debug!(%conn, %pinned, %location, "Sent preview to pinned sender");
            sent += 1;
        }
        sent
    }

    async fn select(
        &self,
        conn: ConnectionId,
        guid: i64,
        location: Option<LocationId>,
        selection: Selection,
    ) {
        let location = match location {
            Some(location) => {
                self.registry.set_location(conn, location);
                location
            }
            None => match self.registry.location(conn) {
                Some(location) => location,
                None => {
                    tracing::warn!(%conn, guid, ?selection, "Selection without location dropped");
                    return;
                }
            },
        };

        let mut state = self.locations.lock(location).await;

        if !self.registry.promote_to_controller(conn) {
            self.replay(conn, location, &state, guid);
        }

        let echo = match selection {
            Selection::Playlist => {
                state.set_playlist_selection(guid);
                SyncEcho::SelectPlaylist {
                    guid,
                    location_id: location,
                }
            }
            Selection::LibraryItem { page } => {
                state.set_library_selection(guid, page);
                SyncEcho::SelectLibraryItem {
                    guid,
                    page,
                    location_id: location,
                }
            }
        };

        let sent = self.broadcaster.send_to_location(
            location,
            &echo,
            Some(Role::Controller),
            Some(conn),
        );
        tracing::debug!(%location, guid, ?selection, sent, "Synced selection to controllers");
    }

    /// Bring a newly promoted controller up to date with its location.
    fn replay(&self, conn: ConnectionId, location: LocationId, state: &LocationState, guid: i64) {
        if let Some(playlist) = state.current_playlist {
            self.broadcaster.send_to_connection(
                conn,
                &SyncEcho::SelectPlaylist {
                    guid: playlist,
                    location_id: location,
                },
            );
        }
        if let Some(item) = state.current_library_item
            && item != guid
        {
            self.broadcaster.send_to_connection(
                conn,
                &SyncEcho::SelectLibraryItem {
                    guid: item,
                    page: state.current_page,
                    location_id: location,
                },
            );
        }
        tracing::debug!(%conn, %location, "Replayed location state to new controller");
    }

    fn action(&self, action_type: &str) {
        match action_type.parse::<HardwareAction>() {
            Ok(action) => self.actions.dispatch(action),
            Err(e) => tracing::warn!("Ignoring action: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use serde_json::{json, Value};
    use signage_core::{ContentKind, DisplayDefaults, LibraryItem};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<HardwareAction>>);

    impl HardwareActionSink for RecordingSink {
        fn dispatch(&self, action: HardwareAction) {
            self.0.lock().unwrap().push(action);
        }
    }

    struct Client {
        id: ConnectionId,
        rx: mpsc::Receiver<Frame>,
    }

    impl Client {
        fn frames(&mut self) -> Vec<Value> {
            let mut out = Vec::new();
            while let Ok(frame) = self.rx.try_recv() {
                out.push(serde_json::from_str(&frame).unwrap());
            }
            out
        }
    }

    fn fixture() -> (Hub, Arc<MemoryRepository>, Arc<RecordingSink>) {
        let repo = Arc::new(MemoryRepository::new());
        repo.insert(LibraryItem::paged(5, ["one", "two", "three"]));
        repo.insert(
            LibraryItem::new(6, ContentKind::Image, "aW1n").with_colors(Some("#222222"), None),
        );
        repo.insert(LibraryItem::new(100, ContentKind::Text, "blank"));
        let sink = Arc::new(RecordingSink::default());
        let hub = Hub::new(repo.clone(), sink.clone());
        (hub, repo, sink)
    }

    async fn join(hub: &Hub, location: Option<i64>) -> Client {
        let (tx, rx) = mpsc::channel(32);
        let id = hub.connect(tx, location.map(LocationId::new)).await;
        Client { id, rx }
    }

    async fn send(hub: &Hub, client: &Client, frame: Value) {
        hub.handle_frame(client.id, &frame.to_string()).await;
    }

    #[tokio::test]
    async fn change_reaches_everyone_at_location_including_sender() {
        let (hub, _, _) = fixture();
        let mut controller = join(&hub, None).await;
        let mut display = join(&hub, Some(1)).await;
        let mut other = join(&hub, Some(2)).await;

        send(&hub, &controller, json!({"type":"Change","guid":5,"page":2,"locationId":1})).await;

        let expected = json!({
            "type": "text",
            "content": "two",
            "background_color": "#000000",
            "font_color": "#FFFFFF"
        });
        assert_eq!(controller.frames(), vec![expected.clone()]);
        assert_eq!(display.frames(), vec![expected]);
        assert!(other.frames().is_empty());
        assert_eq!(hub.registry().location(controller.id), Some(LocationId::new(1)));
    }

    #[tokio::test]
    async fn change_without_location_or_item_is_dropped() {
        let (hub, _, _) = fixture();
        let mut display = join(&hub, Some(1)).await;

        send(&hub, &display, json!({"type":"Change","guid":5})).await;
        send(&hub, &display, json!({"type":"Change","guid":404,"locationId":1})).await;

        assert!(display.frames().is_empty());
        assert_eq!(hub.locations().get(LocationId::new(1)).await, LocationState::default());
    }

    #[tokio::test]
    async fn clear_without_location_is_dropped() {
        let (hub, _, _) = fixture();
        let mut display = join(&hub, Some(1)).await;
        let mut controller = join(&hub, None).await;

        send(&hub, &controller, json!({"type":"Clear"})).await;
        send(&hub, &controller, json!({"type":"Clear","locationId":null})).await;
        send(&hub, &controller, json!({"type":"Clear","locationId":""})).await;

        assert!(display.frames().is_empty());
        assert!(controller.frames().is_empty());
        assert!(hub.locations().is_empty());
        assert_eq!(hub.registry().location(controller.id), None);
    }

    #[tokio::test]
    async fn page_miss_broadcasts_empty_body() {
        let (hub, _, _) = fixture();
        let mut display = join(&hub, Some(1)).await;

        send(&hub, &display, json!({"type":"Change","guid":5,"page":999,"locationId":1})).await;

        let frames = display.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "text");
        assert_eq!(frames[0]["content"], "");
    }

    #[tokio::test]
    async fn repeated_change_is_idempotent() {
        let (hub, _, _) = fixture();
        let mut display = join(&hub, Some(1)).await;
        let change = json!({"type":"Change","guid":6,"locationId":1});

        send(&hub, &display, change.clone()).await;
        let first = hub.locations().get(LocationId::new(1)).await;
        send(&hub, &display, change).await;
        let second = hub.locations().get(LocationId::new(1)).await;

        let frames = display.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], frames[1]);
        assert_eq!(frames[0]["background_color"], "#222222");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn clear_without_blank_page_sends_empty_envelope() {
        let (hub, _, _) = fixture();
        let mut display = join(&hub, Some(1)).await;
        send(&hub, &display, json!({"type":"Change","guid":6,"locationId":1})).await;
        display.frames();

        send(&hub, &display, json!({"type":"Clear","locationId":1})).await;

        assert_eq!(display.frames(), vec![json!({})]);
        let state = hub.locations().get(LocationId::new(1)).await;
        assert!(state.last_content.is_none());
        assert_eq!(state.current_library_item, None);
    }

    #[tokio::test]
    async fn clear_with_blank_page_shows_it() {
        let (hub, repo, _) = fixture();
        repo.set_defaults(DisplayDefaults {
            blank_page_item_id: Some(100),
            ..Default::default()
        });
        let mut display = join(&hub, Some(1)).await;

        send(&hub, &display, json!({"type":"Clear","locationId":1})).await;

        let frames = display.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["content"], "blank");
        let state = hub.locations().get(LocationId::new(1)).await;
        assert_eq!(state.last_content.map(|c| c.content).as_deref(), Some("blank"));
    }

    #[tokio::test]
    async fn clear_with_deleted_blank_page_falls_back() {
        let (hub, repo, _) = fixture();
        repo.set_defaults(DisplayDefaults {
            blank_page_item_id: Some(100),
            ..Default::default()
        });
        repo.remove(100);
        let mut display = join(&hub, Some(1)).await;

        send(&hub, &display, json!({"type":"Clear","locationId":1})).await;

        assert_eq!(display.frames(), vec![json!({})]);
        assert!(hub.locations().get(LocationId::new(1)).await.last_content.is_none());
    }

    #[tokio::test]
    async fn selections_reach_other_controllers_only() {
        let (hub, _, _) = fixture();
        let mut display = join(&hub, Some(1)).await;
        let mut first = join(&hub, None).await;
        let mut second = join(&hub, None).await;
        let mut elsewhere = join(&hub, None).await;

        send(&hub, &first, json!({"type":"SelectPlaylist","guid":3,"locationId":1})).await;
        send(&hub, &second, json!({"type":"SelectPlaylist","guid":3,"locationId":1})).await;
        send(&hub, &elsewhere, json!({"type":"SelectPlaylist","guid":9,"locationId":2})).await;
        first.frames();
        second.frames();

        send(&hub, &first, json!({"type":"SelectLibraryItem","guid":5,"page":2})).await;

        assert!(first.frames().is_empty());
        assert_eq!(
            second.frames(),
            vec![json!({"type":"SelectLibraryItem","guid":5,"page":2,"locationId":1})]
        );
        assert!(display.frames().is_empty());
        assert!(elsewhere.frames().is_empty());
        assert_eq!(hub.registry().role(display.id), Some(Role::Display));
    }

    #[tokio::test]
    async fn new_controller_gets_replay_first() {
        let (hub, _, _) = fixture();
        let mut veteran = join(&hub, None).await;
        send(&hub, &veteran, json!({"type":"SelectPlaylist","guid":7,"locationId":1})).await;
        send(
            &hub,
            &veteran,
            json!({"type":"SelectLibraryItem","guid":42,"page":3,"locationId":1}),
        )
        .await;
        assert!(veteran.frames().is_empty());

        let mut newcomer = join(&hub, None).await;
        send(&hub, &newcomer, json!({"type":"SelectLibraryItem","guid":99,"locationId":1})).await;

        assert_eq!(
            newcomer.frames(),
            vec![
                json!({"type":"SelectPlaylist","guid":7,"locationId":1}),
                json!({"type":"SelectLibraryItem","guid":42,"page":3,"locationId":1}),
            ]
        );
        assert_eq!(
            veteran.frames(),
            vec![json!({"type":"SelectLibraryItem","guid":99,"locationId":1})]
        );

        // Only the first promotion replays.
        send(&hub, &newcomer, json!({"type":"SelectPlaylist","guid":8,"locationId":1})).await;
        assert!(newcomer.frames().is_empty());
    }

    #[tokio::test]
    async fn replay_skips_library_item_being_selected() {
        let (hub, _, _) = fixture();
        let veteran = join(&hub, None).await;
        send(&hub, &veteran, json!({"type":"SelectPlaylist","guid":7,"locationId":1})).await;
        send(&hub, &veteran, json!({"type":"SelectLibraryItem","guid":42,"locationId":1})).await;

        let mut newcomer = join(&hub, None).await;
        send(&hub, &newcomer, json!({"type":"SelectLibraryItem","guid":42,"locationId":1})).await;

        assert_eq!(
            newcomer.frames(),
            vec![json!({"type":"SelectPlaylist","guid":7,"locationId":1})]
        );
    }

    #[tokio::test]
    async fn selection_without_any_location_is_dropped() {
        let (hub, _, _) = fixture();
        let client = join(&hub, None).await;

        send(&hub, &client, json!({"type":"SelectPlaylist","guid":1})).await;

        assert_eq!(hub.registry().role(client.id), Some(Role::Display));
        assert!(hub.locations().is_empty());
    }

    #[tokio::test]
    async fn pinned_sender_still_sees_its_change() {
        let (hub, _, _) = fixture();
        let mut pinned = join(&hub, Some(1)).await;
        let mut neighbour = join(&hub, Some(1)).await;
        let mut display = join(&hub, Some(2)).await;

        send(&hub, &pinned, json!({"type":"Change","guid":6,"locationId":2})).await;

        assert_eq!(hub.registry().location(pinned.id), Some(LocationId::new(1)));
        let frames = pinned.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["content"], "aW1n");
        assert_eq!(display.frames(), frames);
        assert!(neighbour.frames().is_empty());
        assert!(hub.locations().get(LocationId::new(2)).await.last_content.is_some());

        send(&hub, &pinned, json!({"type":"Clear","locationId":2})).await;
        assert_eq!(pinned.frames(), vec![json!({})]);
        assert_eq!(display.frames(), vec![json!({})]);
        assert!(neighbour.frames().is_empty());
    }

    #[tokio::test]
    async fn late_display_gets_current_content() {
        let (hub, _, _) = fixture();
        let controller = join(&hub, None).await;
        send(&hub, &controller, json!({"type":"Change","guid":5,"locationId":1})).await;

        let mut late = join(&hub, Some(1)).await;
        let frames = late.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["content"], "one");

        let hub = hub.replay_on_connect(false);
        let mut quiet = join(&hub, Some(1)).await;
        assert!(quiet.frames().is_empty());
    }

    #[tokio::test]
    async fn actions_go_to_sink_and_never_broadcast() {
        let (hub, _, sink) = fixture();
        let mut display = join(&hub, Some(1)).await;

        send(&hub, &display, json!({"type":"Action","actionType":"powerOn"})).await;
        send(&hub, &display, json!({"type":"Action","actionType":"launchMissiles"})).await;

        assert_eq!(*sink.0.lock().unwrap(), vec![HardwareAction::PowerOn]);
        assert!(display.frames().is_empty());
    }

    #[tokio::test]
    async fn malformed_frames_are_dropped() {
        let (hub, _, _) = fixture();
        let mut display = join(&hub, Some(1)).await;

        hub.handle_frame(display.id, "{not json").await;
        hub.handle_frame(display.id, r#"{"type":"Explode"}"#).await;

        assert!(display.frames().is_empty());
        assert!(hub.registry().contains(display.id));
    }

    #[tokio::test]
    async fn broken_socket_does_not_block_others() {
        let (hub, _, _) = fixture();
        let mut a = join(&hub, Some(1)).await;
        let b = join(&hub, Some(1)).await;
        let mut c = join(&hub, Some(1)).await;
        let b_id = b.id;
        drop(b);

        send(&hub, &a, json!({"type":"Change","guid":6,"locationId":1})).await;

        assert_eq!(a.frames().len(), 1);
        assert_eq!(c.frames().len(), 1);
        assert!(!hub.registry().contains(b_id));
    }
}
