//! Event fan-out to named groups of connected WebSocket clients.
//!
//! Every connection is placed in a group named after its own id as soon as
//! it is added. Join and leave notifications go to the registered
//! [`MembershipObserver`] only when membership actually changes, and always
//! after the internal lock has been released.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use beehive_core::ServerEvent;
use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use super::membership::MembershipObserver;

#[derive(Default)]
struct Groups {
    /// Connected clients indexed by connection ID.
    connections: HashMap<String, Arc<ClientConnection>>,
    /// Group name -> member connection IDs, in join order.
    members: HashMap<String, Vec<String>>,
    /// Connection ID -> groups it belongs to, in join order.
    memberships: HashMap<String, Vec<String>>,
}

/// Manages connections, broadcast groups and event fan-out.
pub struct BroadcastManager {
    inner: RwLock<Groups>,
    observer: parking_lot::RwLock<Option<Weak<dyn MembershipObserver>>>,
}

impl BroadcastManager {
    /// Create a new broadcast manager with no observer.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Groups::default()),
            observer: parking_lot::RwLock::new(None),
        }
    }

    /// Register the receiver of membership notifications.
    ///
    /// Only a weak reference is kept; notifications stop once the observer
    /// is dropped.
    pub fn set_observer(&self, observer: &Arc<dyn MembershipObserver>) {
        *self.observer.write() = Some(Arc::downgrade(observer));
    }

    fn observer(&self) -> Option<Arc<dyn MembershipObserver>> {
        self.observer.read().as_ref().and_then(Weak::upgrade)
    }

    /// Add a connection and join it to its own group.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let id = connection.id.to_string();
        {
            let mut inner = self.inner.write().await;
            if inner.connections.insert(id.clone(), connection).is_some() {
                warn!(conn_id = %id, "connection id reused, replacing previous connection");
            }
        }
        let _ = self.join(&id, &id).await;
    }

    /// Remove a connection, leaving every group it belonged to.
    ///
    /// Returns the groups it left, in join order. Each departure is reported
    /// to the observer after the connection is gone, so follow-up broadcasts
    /// reach only the remaining members.
    pub async fn remove(&self, connection_id: &str) -> Vec<String> {
        let left = {
            let mut inner = self.inner.write().await;
            let _ = inner.connections.remove(connection_id);
            let groups = inner.memberships.remove(connection_id).unwrap_or_default();
            for group in &groups {
                inner.drop_member(group, connection_id);
            }
            groups
        };

        if let Some(observer) = self.observer() {
            for group in &left {
                observer.member_left(group, connection_id).await;
            }
        }
        debug!(conn_id = connection_id, groups = left.len(), "connection removed");
        left
    }

    /// Add a connection to a group.
    ///
    /// Returns `true` when this is a new membership. Joining a group twice
    /// is a no-op, and unknown connections are ignored.
    pub async fn join(&self, group: &str, connection_id: &str) -> bool {
        let added = {
            let mut guard = self.inner.write().await;
            let inner = &mut *guard;
            if !inner.connections.contains_key(connection_id) {
                warn!(conn_id = connection_id, group, "join for unknown connection ignored");
                return false;
            }
            let members = inner.members.entry(group.to_owned()).or_default();
            if members.iter().any(|m| m == connection_id) {
                false
            } else {
                members.push(connection_id.to_owned());
                inner
                    .memberships
                    .entry(connection_id.to_owned())
                    .or_default()
                    .push(group.to_owned());
                true
            }
        };

        if added {
            debug!(conn_id = connection_id, group, "joined group");
            if let Some(observer) = self.observer() {
                observer.member_joined(group, connection_id).await;
            }
        }
        added
    }

    /// Send an event to every member of a group.
    ///
    /// The event is serialized once and shared. Returns the number of
    /// members it was queued for; full or closed queues count as drops.
    pub async fn broadcast_to_group(&self, group: &str, event: &ServerEvent) -> usize {
        let json = match event.to_json() {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event = event.name(), error = %e, "failed to serialize event");
                return 0;
            }
        };
        let inner = self.inner.read().await;
        let Some(members) = inner.members.get(group) else {
            debug!(event = event.name(), group, "broadcast to empty group");
            return 0;
        };

        let mut delivered = 0;
        for member in members {
            let Some(conn) = inner.connections.get(member) else {
                continue;
            };
            if conn.send(Arc::clone(&json)) {
                delivered += 1;
            } else {
                counter!(crate::metrics::WS_BROADCAST_DROPS_TOTAL).increment(1);
                warn!(conn_id = %conn.id, group, "failed to send event to client");
            }
        }
        debug!(
            event = event.name(),
            group,
            recipients = members.len(),
            delivered,
            "broadcast event to group"
        );
        delivered
    }

    /// Send an event to one connection.
    pub async fn send_to(&self, connection_id: &str, event: &ServerEvent) -> bool {
        let inner = self.inner.read().await;
        match inner.connections.get(connection_id) {
            Some(conn) => conn.send_event(event),
            None => {
                debug!(conn_id = connection_id, event = event.name(), "send to unknown connection");
                false
            }
        }
    }

    /// Current members of a group, in join order.
    #[cfg(test)]
    pub(crate) async fn group_members(&self, group: &str) -> Vec<String> {
        self.inner
            .read()
            .await
            .members
            .get(group)
            .cloned()
            .unwrap_or_default()
    }

    /// Groups a connection belongs to, in join order.
    #[cfg(test)]
    pub(crate) async fn groups_of(&self, connection_id: &str) -> Vec<String> {
        self.inner
            .read()
            .await
            .memberships
            .get(connection_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }
}

impl Groups {
    fn drop_member(&mut self, group: &str, connection_id: &str) {
        if let Some(members) = self.members.get_mut(group) {
            members.retain(|m| m != connection_id);
            if members.is_empty() {
                let _ = self.members.remove(group);
            }
        }
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(&'static str, String, String)>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<(&'static str, String, String)> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    #[async_trait]
    impl MembershipObserver for Recorder {
        async fn member_joined(&self, group_id: &str, member_id: &str) {
            self.events
                .lock()
                .push(("joined", group_id.to_owned(), member_id.to_owned()));
        }

        async fn member_left(&self, group_id: &str, member_id: &str) {
            self.events
                .lock()
                .push(("left", group_id.to_owned(), member_id.to_owned()));
        }
    }

    fn make_connection_with_rx(id: &str) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        (Arc::new(ClientConnection::new(id.into(), tx)), rx)
    }

    fn created(room: &str) -> ServerEvent {
        ServerEvent::GameCreated {
            room_id: room.into(),
        }
    }

    fn with_recorder() -> (BroadcastManager, Arc<Recorder>, Arc<dyn MembershipObserver>) {
        let bm = BroadcastManager::new();
        let recorder = Arc::new(Recorder::default());
        let observer: Arc<dyn MembershipObserver> = recorder.clone();
        bm.set_observer(&observer);
        (bm, recorder, observer)
    }

    #[tokio::test]
    async fn add_joins_self_group() {
        let (bm, recorder, _obs) = with_recorder();
        let (conn, _rx) = make_connection_with_rx("c1");
        bm.add(conn).await;
        assert_eq!(bm.connection_count().await, 1);
        assert_eq!(bm.group_members("c1").await, vec!["c1"]);
        assert_eq!(recorder.take(), vec![("joined", "c1".into(), "c1".into())]);
    }

    #[tokio::test]
    async fn repeated_join_notifies_once() {
        let (bm, recorder, _obs) = with_recorder();
        let (conn, _rx) = make_connection_with_rx("c1");
        bm.add(conn).await;
        let _ = recorder.take();

        assert!(!bm.join("c1", "c1").await);
        assert!(recorder.take().is_empty());
    }

    #[tokio::test]
    async fn join_other_group_notifies() {
        let (bm, recorder, _obs) = with_recorder();
        let (c1, _rx1) = make_connection_with_rx("c1");
        let (c2, _rx2) = make_connection_with_rx("c2");
        bm.add(c1).await;
        bm.add(c2).await;
        let _ = recorder.take();

        assert!(bm.join("c1", "c2").await);
        assert_eq!(recorder.take(), vec![("joined", "c1".into(), "c2".into())]);
        assert_eq!(bm.group_members("c1").await, vec!["c1", "c2"]);
        assert_eq!(bm.groups_of("c2").await, vec!["c2", "c1"]);
    }

    #[tokio::test]
    async fn join_unknown_connection_ignored() {
        let (bm, recorder, _obs) = with_recorder();
        assert!(!bm.join("room", "ghost").await);
        assert!(recorder.take().is_empty());
        assert!(bm.group_members("room").await.is_empty());
    }

    #[tokio::test]
    async fn remove_leaves_every_group_in_order() {
        let (bm, recorder, _obs) = with_recorder();
        let (c1, _rx1) = make_connection_with_rx("c1");
        let (c2, _rx2) = make_connection_with_rx("c2");
        bm.add(c1).await;
        bm.add(c2).await;
        let _ = bm.join("c1", "c2").await;
        let _ = recorder.take();

        let left = bm.remove("c2").await;
        assert_eq!(left, vec!["c2", "c1"]);
        assert_eq!(
            recorder.take(),
            vec![
                ("left", "c2".into(), "c2".into()),
                ("left", "c1".into(), "c2".into()),
            ]
        );
        assert_eq!(bm.connection_count().await, 1);
        assert_eq!(bm.group_members("c1").await, vec!["c1"]);
        assert!(bm.group_members("c2").await.is_empty());
    }

    #[tokio::test]
    async fn remove_nonexistent_connection() {
        let (bm, recorder, _obs) = with_recorder();
        assert!(bm.remove("no_such").await.is_empty());
        assert!(recorder.take().is_empty());
    }

    #[tokio::test]
    async fn broadcast_reaches_only_group_members() {
        let bm = BroadcastManager::new();
        let (c1, mut rx1) = make_connection_with_rx("c1");
        let (c2, mut rx2) = make_connection_with_rx("c2");
        let (c3, mut rx3) = make_connection_with_rx("c3");
        bm.add(c1).await;
        bm.add(c2).await;
        bm.add(c3).await;
        let _ = bm.join("c1", "c3").await;

        let delivered = bm.broadcast_to_group("c1", &created("c1")).await;
        assert_eq!(delivered, 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_shares_one_serialization() {
        let bm = BroadcastManager::new();
        let (c1, mut rx1) = make_connection_with_rx("c1");
        let (c2, mut rx2) = make_connection_with_rx("c2");
        bm.add(c1).await;
        bm.add(c2).await;
        let _ = bm.join("c1", "c2").await;

        let _ = bm.broadcast_to_group("c1", &created("c1")).await;
        let a = rx1.try_recv().unwrap();
        let b = rx2.try_recv().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn broadcast_to_missing_group_is_noop() {
        let bm = BroadcastManager::new();
        assert_eq!(bm.broadcast_to_group("nobody", &created("x")).await, 0);
    }

    #[tokio::test]
    async fn broadcast_skips_full_queue() {
        let bm = BroadcastManager::new();
        let (tx, _rx) = mpsc::channel(1);
        let conn = Arc::new(ClientConnection::new("slow".into(), tx));
        bm.add(conn.clone()).await;

        assert_eq!(bm.broadcast_to_group("slow", &created("a")).await, 1);
        assert_eq!(bm.broadcast_to_group("slow", &created("b")).await, 0);
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn send_to_single_connection() {
        let bm = BroadcastManager::new();
        let (c1, mut rx1) = make_connection_with_rx("c1");
        bm.add(c1).await;
        assert!(bm.send_to("c1", &created("c1")).await);
        assert!(!bm.send_to("c2", &created("c1")).await);
        let msg = rx1.try_recv().unwrap();
        assert!(msg.contains("gameCreated"));
    }

    #[tokio::test]
    async fn dropped_observer_is_skipped() {
        let bm = BroadcastManager::new();
        {
            let observer: Arc<dyn MembershipObserver> = Arc::new(Recorder::default());
            bm.set_observer(&observer);
        }
        assert!(bm.observer().is_none());

        let (c1, _rx) = make_connection_with_rx("c1");
        bm.add(c1).await;
        assert_eq!(bm.group_members("c1").await, vec!["c1"]);
        assert_eq!(bm.remove("c1").await, vec!["c1"]);
    }
}
