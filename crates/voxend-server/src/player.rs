//! Per-player records and connection handles.
//!
//! A `ServerPlayer` is shared between the registry indices, the
//! connection's receive task, and whoever else looks it up; `Arc`
//! carries the ownership count and `Drop` is the destructor, which
//! therefore runs exactly once when the last holder lets go.
//!
//! Fields are partitioned into groups by their sole logical writer,
//! each behind its own reader/writer lock, so unrelated concerns
//! (messaging a player vs. a movement update) never contend:
//!
//! - connection handle: written by the task tearing the connection
//!   down, read by any task that needs to message the player.
//! - name + authenticated: written by the connection's receive task;
//!   guarded together so a half-updated pair is never observed.
//! - position + rotation: written by the movement update path, read by
//!   persistence and replication.

use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use voxend_proto::types::{V3F32, V3F64};

/// Sending side of a connection: frames are queued on an unbounded
/// channel drained by the connection's writer task.
#[derive(Clone)]
pub struct ConnectionHandle {
    addr: SocketAddr,
    outgoing: mpsc::UnboundedSender<Bytes>,
    close: Arc<watch::Sender<bool>>,
}

impl ConnectionHandle {
    pub fn new(
        addr: SocketAddr,
        outgoing: mpsc::UnboundedSender<Bytes>,
        close: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self {
            addr,
            outgoing,
            close,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queue one command frame (id byte + payload). A send to a
    /// connection that is already tearing down is silently dropped.
    pub fn send_command(&self, id: u8, payload: Bytes) {
        let mut frame = BytesMut::with_capacity(1 + payload.len());
        frame.put_u8(id);
        frame.put_slice(&payload);
        let _ = self.outgoing.send(frame.freeze());
    }

    /// Ask the connection to terminate. Only signals; the receive task
    /// observes the signal and completes deregistration. Safe to call
    /// any number of times from any task.
    pub fn request_close(&self) {
        let _ = self.close.send(true);
    }

    #[cfg(test)]
    pub(crate) fn test_handle() -> (
        Self,
        mpsc::UnboundedReceiver<Bytes>,
        watch::Receiver<bool>,
    ) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = watch::channel(false);
        let handle = Self::new(
            "127.0.0.1:0".parse().unwrap(),
            frame_tx,
            Arc::new(close_tx),
        );
        (handle, frame_rx, close_rx)
    }
}

/// Name and authentication flag, updated together.
#[derive(Debug, Clone)]
pub struct PlayerIdent {
    pub name: String,
    pub authenticated: bool,
}

/// World pose.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerPose {
    pub pos: V3F64,
    pub rot: V3F32,
}

/// One connected-or-recently-connected player.
pub struct ServerPlayer {
    /// Non-zero, unique, immutable once assigned.
    pub id: u64,
    pub(crate) conn: RwLock<Option<ConnectionHandle>>,
    pub(crate) ident: RwLock<PlayerIdent>,
    pub(crate) pose: RwLock<PlayerPose>,
}

impl ServerPlayer {
    /// Fresh unauthenticated record. The temporary name is derived
    /// from the connection's remote address until auth replaces it.
    pub fn new(id: u64, conn: ConnectionHandle, temp_name: String) -> Self {
        debug_assert_ne!(id, 0);
        Self {
            id,
            conn: RwLock::new(Some(conn)),
            ident: RwLock::new(PlayerIdent {
                name: temp_name,
                authenticated: false,
            }),
            pose: RwLock::new(PlayerPose::default()),
        }
    }

    pub fn name(&self) -> String {
        self.ident.read().unwrap().name.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.ident.read().unwrap().authenticated
    }

    pub fn pose(&self) -> PlayerPose {
        *self.pose.read().unwrap()
    }

    pub fn set_pose(&self, pose: PlayerPose) {
        *self.pose.write().unwrap() = pose;
    }

    /// Clone of the live connection handle, if the connection has not
    /// been torn down yet.
    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.conn.read().unwrap().clone()
    }

    /// Forget the connection handle; called by the task tearing the
    /// connection down, exactly once per connection.
    pub fn clear_connection(&self) {
        *self.conn.write().unwrap() = None;
    }

    /// Queue a command frame for this player, if still connected.
    pub fn send_command(&self, id: u8, payload: Bytes) {
        if let Some(conn) = self.connection() {
            conn.send_command(id, payload);
        }
    }

    /// Request disconnection. Idempotent: it only signals the
    /// connection to terminate, and signalling an already-closing or
    /// already-gone connection is a no-op.
    pub fn disconnect(&self) {
        if let Some(conn) = self.connection() {
            conn.request_close();
        }
    }
}

impl Drop for ServerPlayer {
    fn drop(&mut self) {
        // Last reference released; locks and the name buffer go with us.
        debug!("player record {} dropped", self.id);
    }
}
