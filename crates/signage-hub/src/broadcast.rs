//! Best-effort fan-out over the connection registry.
//!
//! A payload is serialized once and pushed onto each target's outbound
//! queue without waiting. A closed or full queue counts as a failed write:
//! that connection is deregistered and delivery to the rest continues.

use crate::registry::{ConnectionId, ConnectionRegistry, Frame, Role, Target};
use serde::Serialize;
use signage_core::LocationId;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;

#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `payload` to every target. Returns how many accepted it.
    pub fn send_to<P, I>(&self, targets: I, payload: &P) -> usize
    where
        P: Serialize + ?Sized,
        I: IntoIterator<Item = Target>,
    {
        let Some(frame) = encode(payload) else {
            return 0;
        };
        targets
            .into_iter()
            .filter(|target| self.deliver(target, &frame))
            .count()
    }

    /// Deliver to connections at `location`, optionally only one role and
    /// optionally skipping one connection.
    pub fn send_to_location<P>(
        &self,
        location: LocationId,
        payload: &P,
        role: Option<Role>,
        excluding: Option<ConnectionId>,
    ) -> usize
    where
        P: Serialize + ?Sized,
    {
        let targets = self
            .registry
            .connections_at(location, role)
            .into_iter()
            .filter(|t| Some(t.id) != excluding);
        let sent = self.send_to(targets, payload);
        tracing::debug!(%location, role = ?role, sent, "Broadcast");
        sent
    }

    /// Deliver to a single connection.
    pub fn send_to_connection<P>(&self, id: ConnectionId, payload: &P) -> bool
    where
        P: Serialize + ?Sized,
    {
        match self.registry.target(id) {
            Some(target) => self.send_to([target], payload) == 1,
            None => false,
        }
    }

    fn deliver(&self, target: &Target, frame: &Frame) -> bool {
        match target.tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(conn = %target.id, "Outbound queue full, dropping connection");
                self.registry.deregister(target.id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(conn = %target.id, "Connection closed during broadcast");
                self.registry.deregister(target.id);
                false
            }
        }
    }
}

fn encode<P: Serialize + ?Sized>(payload: &P) -> Option<Frame> {
    match serde_json::to_string(payload) {
        Ok(json) => Some(Frame::from(json)),
        Err(e) => {
            tracing::error!("Failed to serialize outbound payload: {}", e);
            None
        }
    }
}
