//! Connection accept loop, per-connection receive tasks, and the
//! state-gated command dispatch.
//!
//! Thread roles: the accept loop registers new records, each
//! connection's receive task owns that connection's reads and all
//! writes to the record's (name, authenticated) pair, and the tick
//! task reads poses for persistence and broadcast. All three may run
//! concurrently against a shared record; the per-field locks in
//! `player` make that safe.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use voxend_proto::codec::encode_to_bytes;
use voxend_proto::command::{ClientBound, ConnectionState, ServerBound};
use voxend_proto::error::WireError;
use voxend_proto::messages::{
    entity_type, ToClientEntityAdd, ToClientMovement, ToClientTimeOfDay, ToClientWorldInfo,
};
use voxend_proto::types::{V3F32, V3F64};
use voxend_proto::wire;

use crate::clock::WorldClock;
use crate::config::ServerConfig;
use crate::persistence::PlayerStore;
use crate::player::{ConnectionHandle, PlayerPose, ServerPlayer};
use crate::registry::PlayerRegistry;

/// Cadence of the TIME_OF_DAY broadcast and pose persistence.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Longest accepted player name, in bytes.
pub const MAX_NAME_LEN: usize = 32;

/// Player names key the name index and the on-disk pose file, so only
/// a conservative character set is accepted.
pub fn valid_player_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

pub struct Server {
    pub registry: PlayerRegistry,
    config: ServerConfig,
    store: PlayerStore,
    clock: WorldClock,
    recv_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let store = PlayerStore::new(config.world.directory.as_ref());
        Arc::new(Self {
            registry: PlayerRegistry::new(),
            store,
            clock: WorldClock::new(),
            config,
            recv_tasks: Mutex::new(Vec::new()),
        })
    }

    /// Accept loop. Runs until the shutdown signal flips, then tears
    /// every connection down in an orderly fashion before returning.
    pub async fn run(self: Arc<Self>, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        let mut tick = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, addr)) => self.on_new_connection(stream, addr),
                    Err(e) => warn!("accept error: {e}"),
                },
                _ = tick.tick() => self.tick(),
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        self.shutdown().await;
    }

    /// Register a record for a fresh inbound connection and start its
    /// writer and receive tasks.
    fn on_new_connection(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let _ = stream.set_nodelay(true);
        let (reader, writer) = stream.into_split();

        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = watch::channel(false);
        let handle = ConnectionHandle::new(addr, frame_tx, Arc::new(close_tx));
        tokio::spawn(write_loop(writer, frame_rx));

        // Duplicate random ids are very unlikely, but it doesn't hurt
        // to check; the registry also refuses id 0.
        let mut id = PlayerRegistry::generate_id();
        let player = loop {
            let candidate = Arc::new(ServerPlayer::new(id, handle.clone(), addr.to_string()));
            if self.registry.add(&candidate) {
                break candidate;
            }
            id = PlayerRegistry::generate_id();
        };
        info!("connected {}", player.name());

        let server = self.clone();
        let task = tokio::spawn(async move {
            server.recv_loop(player, reader, close_rx).await;
        });
        self.recv_tasks.lock().unwrap().push(task);
    }

    /// Per-connection dispatch loop: read a command id, validate it
    /// against the table, compute the good flag, invoke the handler.
    /// Handlers drain their payload unconditionally and apply effects
    /// only when good; a handler error is a stream framing error and
    /// terminates the connection.
    async fn recv_loop(
        self: Arc<Self>,
        player: Arc<ServerPlayer>,
        mut reader: OwnedReadHalf,
        mut close: watch::Receiver<bool>,
    ) {
        // Registration is done, so the connection enters the loop
        // awaiting authentication.
        let mut state = ConnectionState::Authenticating;
        loop {
            let id = tokio::select! {
                read = wire::read_value::<_, u8>(&mut reader) => match read {
                    Ok(id) => id,
                    // Peer closed or hard i/o failure.
                    Err(_) => break,
                },
                _ = close.changed() => break,
            };

            let Some(command) = ServerBound::from_id(id) else {
                warn!("protocol error from {}: unknown command id {id}", player.name());
                break;
            };
            let good = command.allowed().permits(state);
            debug!(
                "command {} from {} (good: {good})",
                command.name(),
                player.name()
            );

            let result = match command {
                ServerBound::Disconnect => self.handle_disconnect(&player, good),
                ServerBound::Auth => {
                    self.handle_auth(&player, &mut reader, &mut state, good).await
                }
                ServerBound::Move => self.handle_move(&player, &mut reader, good).await,
            };
            if let Err(e) = result {
                warn!(
                    "stream error from {} in {}: {e}",
                    player.name(),
                    command.name()
                );
                break;
            }
        }
        self.on_connection_closed(&player);
    }

    /// No payload. If good, initiate disconnection; the loop keeps
    /// running until the close signal is observed.
    fn handle_disconnect(&self, player: &Arc<ServerPlayer>, good: bool) -> Result<(), WireError> {
        if good {
            player.disconnect();
        }
        Ok(())
    }

    /// Name payload, drained unconditionally; the claim is attempted
    /// only when good.
    async fn handle_auth(
        &self,
        player: &Arc<ServerPlayer>,
        reader: &mut OwnedReadHalf,
        state: &mut ConnectionState,
        good: bool,
    ) -> Result<(), WireError> {
        let name = wire::read_string(reader).await?;
        if !good {
            return Ok(());
        }
        if self.authenticate(player, &name) {
            *state = ConnectionState::Active;
        }
        Ok(())
    }

    /// Pose payload, drained unconditionally, applied only when good.
    async fn handle_move(
        &self,
        player: &Arc<ServerPlayer>,
        reader: &mut OwnedReadHalf,
        good: bool,
    ) -> Result<(), WireError> {
        let pos: V3F64 = wire::read_value(reader).await?;
        let rot: V3F32 = wire::read_value(reader).await?;
        if good {
            player.set_pose(PlayerPose { pos, rot });
        }
        Ok(())
    }

    /// Attempt to claim `name` for the player. Sends exactly one
    /// success or failure byte either way; on success the record is
    /// marked authenticated, its pose is loaded or created, and the
    /// initial state burst goes out.
    ///
    /// This receive task is the only writer of the ident and pose
    /// groups; the write locks are held across the whole claim so
    /// concurrent readers never observe a half-updated record.
    fn authenticate(&self, player: &Arc<ServerPlayer>, name: &str) -> bool {
        let mut ident = player.ident.write().unwrap();
        let mut pose = player.pose.write().unwrap();

        let success = valid_player_name(name) && self.registry.try_claim_name(name, player);
        info!(
            "authentication {}: {} -> {}",
            if success { "success" } else { "failure" },
            ident.name,
            name
        );
        player.send_command(ClientBound::Auth.id(), encode_to_bytes(&success));

        if success {
            ident.name = name.to_owned();
            ident.authenticated = true;
            self.spawn_player(player, &mut pose, name);
        }
        success
    }

    /// Load the persisted pose (or create the spawn default) and emit
    /// the initial state to the client. The pose write lock is already
    /// held by the caller.
    fn spawn_player(&self, player: &Arc<ServerPlayer>, pose: &mut PlayerPose, name: &str) {
        match self.store.load_player(name) {
            Some((pos, rot)) => {
                pose.pos = pos;
                pose.rot = rot;
            }
            None => {
                pose.pos = V3F64::new(0.0, self.config.world.spawn_height + 0.5, 0.0);
                pose.rot = V3F32::default();
                self.store.create_player(name, pose.pos, pose.rot);
            }
        }

        player.send_command(
            ClientBound::WorldInfo.id(),
            encode_to_bytes(&ToClientWorldInfo {
                seed: self.config.world.seed,
                load_distance: self.config.world.load_distance,
            }),
        );
        player.send_command(
            ClientBound::TimeOfDay.id(),
            encode_to_bytes(&ToClientTimeOfDay {
                time_of_day: self.clock.time_of_day(),
            }),
        );
        player.send_command(
            ClientBound::Movement.id(),
            encode_to_bytes(&ToClientMovement {
                flight: false,
                collision: true,
                speed: self.config.movement.speed,
                gravity: self.config.movement.gravity,
                jump: self.config.movement.jump,
            }),
        );
        player.send_command(
            ClientBound::EntityAdd.id(),
            encode_to_bytes(&ToClientEntityAdd {
                entity_type: entity_type::LOCAL_PLAYER,
                id: player.id,
                pos: pose.pos,
                rot: pose.rot,
            }),
        );
    }

    /// The connection is gone: forget its handle, detach the record
    /// from both indices (unless shutdown is suppressing removals) and
    /// release the connection's reference.
    fn on_connection_closed(&self, player: &Arc<ServerPlayer>) {
        player.clear_connection();

        if self.registry.remove_by_id(player.id) {
            info!("disconnected {}", player.name());
        }
        if player.is_authenticated() {
            self.registry.remove_by_name(&player.name());
        }
        // The receive task's own reference drops with its scope.
    }

    /// Periodic work on the tick task: broadcast the time of day and
    /// persist authenticated players' poses.
    fn tick(&self) {
        let frame = encode_to_bytes(&ToClientTimeOfDay {
            time_of_day: self.clock.time_of_day(),
        });
        self.registry.for_each_named(|player| {
            player.send_command(ClientBound::TimeOfDay.id(), frame.clone());
            let pose = player.pose();
            self.store.update_player(&player.name(), pose.pos, pose.rot);
        });
        self.recv_tasks
            .lock()
            .unwrap()
            .retain(|task| !task.is_finished());
    }

    /// Orderly shutdown: suppress per-connection removals, signal
    /// every connection, then join every receive task before releasing
    /// the registry's references, so destruction cannot race a
    /// connection still touching its record.
    pub async fn shutdown(&self) {
        self.registry.begin_shutdown();
        let players = self.registry.drain();
        info!("shutting down, disconnecting {} players", players.len());

        for player in &players {
            if player.is_authenticated() {
                let pose = player.pose();
                self.store.update_player(&player.name(), pose.pos, pose.rot);
            }
            player.send_command(ClientBound::Disconnect.id(), Bytes::new());
            player.disconnect();
        }

        let tasks: Vec<_> = std::mem::take(&mut *self.recv_tasks.lock().unwrap());
        for task in tasks {
            let _ = task.await;
        }
        drop(players);
    }
}

/// Writer task: drains queued frames onto the socket. Ends when every
/// handle is gone or the peer stops accepting writes.
async fn write_loop(mut writer: OwnedWriteHalf, mut frames: mpsc::UnboundedReceiver<Bytes>) {
    while let Some(frame) = frames.recv().await {
        if writer.write_all(&frame).await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
}
