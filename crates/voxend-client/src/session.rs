//! Client-side command dispatch.
//!
//! The loop mirrors the server's: read one command id, validate it
//! against the client-bound table, compute the good flag from the
//! session state, and invoke the handler. Handlers always drain the
//! exact bytes of their message (even when the command is not legal in
//! the current state) so the stream stays framed; they apply effects
//! only when good.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use voxend_proto::command::{ClientBound, ConnectionState, ServerBound};
use voxend_proto::error::WireError;
use voxend_proto::messages::{
    ToClientEntityAdd, ToClientMovement, ToClientWorldInfo,
};
use voxend_proto::types::{V3F32, V3F64, V3S32};
use voxend_proto::wire;
use voxend_world::block::BlockStatus;
use voxend_world::map::Map;
use voxend_world::serializer::deserialize_block;

/// Outcome of dispatching one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// The server ended the session; the stream is done.
    Disconnect,
}

/// World parameters received from the server.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldParams {
    pub world_info: Option<ToClientWorldInfo>,
    pub time_of_day: Option<u64>,
    pub movement: Option<ToClientMovement>,
    pub local_entity: Option<ToClientEntityAdd>,
}

pub struct ClientSession {
    state: ConnectionState,
    map: Arc<Map>,
    params: WorldParams,
}

impl ClientSession {
    pub fn new(map: Arc<Map>) -> Self {
        Self {
            state: ConnectionState::Created,
            map,
            params: WorldParams::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn params(&self) -> &WorldParams {
        &self.params
    }

    #[cfg(test)]
    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    /// Send an AUTH request and start awaiting the verdict.
    pub async fn send_auth<W>(&mut self, w: &mut W, name: &str) -> Result<(), WireError>
    where
        W: AsyncWrite + Unpin,
    {
        wire::write_value(w, &ServerBound::Auth.id()).await?;
        wire::write_string(w, name).await?;
        self.state = ConnectionState::Authenticating;
        Ok(())
    }

    /// Send a pose update.
    pub async fn send_move<W>(&self, w: &mut W, pos: V3F64, rot: V3F32) -> Result<(), WireError>
    where
        W: AsyncWrite + Unpin,
    {
        wire::write_value(w, &ServerBound::Move.id()).await?;
        wire::write_value(w, &pos).await?;
        wire::write_value(w, &rot).await?;
        Ok(())
    }

    /// Ask the server to drop the session.
    pub async fn send_disconnect<W>(&self, w: &mut W) -> Result<(), WireError>
    where
        W: AsyncWrite + Unpin,
    {
        wire::write_value(w, &ServerBound::Disconnect.id()).await
    }

    /// Dispatch commands until the server disconnects the session or
    /// the stream fails.
    pub async fn run<R>(&mut self, r: &mut R) -> Result<(), WireError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            if self.dispatch_one(r).await? == Control::Disconnect {
                return Ok(());
            }
        }
    }

    /// Read and dispatch a single command frame.
    pub async fn dispatch_one<R>(&mut self, r: &mut R) -> Result<Control, WireError>
    where
        R: AsyncRead + Unpin,
    {
        let id: u8 = wire::read_value(r).await?;
        let Some(command) = ClientBound::from_id(id) else {
            warn!("protocol error: unknown command id {id}");
            return Err(WireError::UnknownCommand(id));
        };
        let good = command.allowed().permits(self.state);

        match command {
            ClientBound::Disconnect => {
                if good {
                    return Ok(Control::Disconnect);
                }
            }
            ClientBound::Auth => self.handle_auth(r, good).await?,
            ClientBound::Block => self.handle_block(r, good).await?,
            ClientBound::WorldInfo => {
                let msg: ToClientWorldInfo = wire::read_value(r).await?;
                if good {
                    self.params.world_info = Some(msg);
                }
            }
            ClientBound::TimeOfDay => {
                let time: u64 = wire::read_value(r).await?;
                if good {
                    self.params.time_of_day = Some(time);
                }
            }
            ClientBound::Movement => {
                let msg: ToClientMovement = wire::read_value(r).await?;
                if good {
                    self.params.movement = Some(msg);
                }
            }
            ClientBound::EntityAdd => {
                let msg: ToClientEntityAdd = wire::read_value(r).await?;
                if good {
                    self.params.local_entity = Some(msg);
                }
            }
        }
        Ok(Control::Continue)
    }

    /// The authentication verdict byte is consumed unconditionally;
    /// the state transition happens only when good.
    async fn handle_auth<R>(&mut self, r: &mut R, good: bool) -> Result<(), WireError>
    where
        R: AsyncRead + Unpin,
    {
        let success: bool = wire::read_value(r).await?;
        if !good {
            return Ok(());
        }
        if success {
            info!("authenticated successfully");
            self.state = ConnectionState::Active;
        } else {
            info!("authentication failed, please try again");
            self.state = ConnectionState::Created;
        }
        Ok(())
    }

    /// Coordinate, length and payload are always drained so the stream
    /// stays framed for the next command. When good, the payload is
    /// merged into the addressed block and downstream consumers are
    /// notified; otherwise a detached scratch block is decoded and
    /// discarded. A payload that cannot be decoded is a stream error
    /// either way.
    async fn handle_block<R>(&mut self, r: &mut R, good: bool) -> Result<(), WireError>
    where
        R: AsyncRead + Unpin,
    {
        let pos: V3S32 = wire::read_value(r).await?;
        let length: u16 = wire::read_value(r).await?;
        let data = wire::read_payload(r, length as usize).await?;

        if good {
            let block = self.map.get_or_create_block(pos);
            let mut block = block.lock().unwrap();
            if block.status != BlockStatus::Created {
                block.clear_meta();
            }
            deserialize_block(&mut block, &data)
                .map_err(|e| WireError::InvalidData(e.to_string()))?;
            drop(block);
            self.map.notify_changed(pos);
        } else {
            let mut scratch = Map::allocate_detached_block(pos);
            deserialize_block(&mut scratch, &data)
                .map_err(|e| WireError::InvalidData(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxend_proto::codec::{encode_to_bytes, WireEncode};
    use voxend_world::block::MapBlock;
    use voxend_world::serializer::{serialize_block, SERIALIZED_BLOCK_SIZE};

    fn frame(id: ClientBound, body: &[u8]) -> Vec<u8> {
        let mut out = vec![id.id()];
        out.extend_from_slice(body);
        out
    }

    fn block_frame(pos: V3S32, payload: &[u8]) -> Vec<u8> {
        let mut body = bytes::BytesMut::new();
        pos.wire_encode(&mut body);
        (payload.len() as u16).wire_encode(&mut body);
        body.extend_from_slice(payload);
        frame(ClientBound::Block, &body)
    }

    fn sample_payload() -> Vec<u8> {
        let mut source = MapBlock::new(V3S32::default());
        source.set_node(1, 2, 3, 42);
        source.set_node(0, 0, 0, 7);
        serialize_block(&source)
    }

    #[tokio::test]
    async fn auth_success_activates_session() {
        let mut session = ClientSession::new(Arc::new(Map::new()));
        session.set_state(ConnectionState::Authenticating);
        let data = frame(ClientBound::Auth, &encode_to_bytes(&true));
        let mut r = data.as_slice();
        assert_eq!(session.dispatch_one(&mut r).await.unwrap(), Control::Continue);
        assert_eq!(session.state(), ConnectionState::Active);
    }

    #[tokio::test]
    async fn auth_failure_returns_to_created() {
        let mut session = ClientSession::new(Arc::new(Map::new()));
        session.set_state(ConnectionState::Authenticating);
        let data = frame(ClientBound::Auth, &encode_to_bytes(&false));
        let mut r = data.as_slice();
        session.dispatch_one(&mut r).await.unwrap();
        assert_eq!(session.state(), ConnectionState::Created);
    }

    #[tokio::test]
    async fn unexpected_auth_is_drained_but_ignored() {
        let mut session = ClientSession::new(Arc::new(Map::new()));
        // Still Created: AUTH is not legal, but its byte is consumed.
        let data = frame(ClientBound::Auth, &encode_to_bytes(&true));
        let mut r = data.as_slice();
        assert_eq!(session.dispatch_one(&mut r).await.unwrap(), Control::Continue);
        assert!(r.is_empty(), "payload fully consumed");
        assert_eq!(session.state(), ConnectionState::Created);
    }

    #[tokio::test]
    async fn zero_command_id_is_fatal() {
        let mut session = ClientSession::new(Arc::new(Map::new()));
        let data = [0u8];
        let mut r = data.as_slice();
        assert!(matches!(
            session.dispatch_one(&mut r).await,
            Err(WireError::UnknownCommand(0))
        ));
    }

    #[tokio::test]
    async fn block_applied_when_good() {
        let map = Arc::new(Map::new());
        let mut session = ClientSession::new(map.clone());
        session.set_state(ConnectionState::Active);
        let mut changes = map.subscribe_changes();

        let pos = V3S32::new(1, -2, 3);
        let data = block_frame(pos, &sample_payload());
        let mut r = data.as_slice();
        session.dispatch_one(&mut r).await.unwrap();
        assert!(r.is_empty());

        let block = map.lookup_block(pos).expect("block was merged");
        let block = block.lock().unwrap();
        assert_eq!(block.status, BlockStatus::Ready);
        assert_eq!(block.get_node(1, 2, 3), 42);
        assert_eq!(changes.try_recv().unwrap(), pos);
    }

    #[tokio::test]
    async fn block_drain_is_independent_of_good() {
        let pos = V3S32::new(0, 0, 0);
        let data = block_frame(pos, &sample_payload());

        // good = true
        let map_good = Arc::new(Map::new());
        let mut session = ClientSession::new(map_good.clone());
        session.set_state(ConnectionState::Active);
        let mut r = data.as_slice();
        session.dispatch_one(&mut r).await.unwrap();
        let consumed_good = data.len() - r.len();

        // good = false: same bytes, same consumption, no side effect.
        let map_bad = Arc::new(Map::new());
        let mut session = ClientSession::new(map_bad.clone());
        session.set_state(ConnectionState::Authenticating);
        let mut r = data.as_slice();
        session.dispatch_one(&mut r).await.unwrap();
        let consumed_bad = data.len() - r.len();

        assert_eq!(consumed_good, consumed_bad);
        assert_eq!(map_good.len(), 1);
        assert!(map_bad.is_empty(), "scratch block was discarded");
    }

    #[tokio::test]
    async fn stale_metadata_cleared_on_remerge() {
        let map = Arc::new(Map::new());
        let mut session = ClientSession::new(map.clone());
        session.set_state(ConnectionState::Active);

        let pos = V3S32::new(4, 5, 6);
        let data = block_frame(pos, &sample_payload());
        let mut r = data.as_slice();
        session.dispatch_one(&mut r).await.unwrap();

        // Attach metadata, then merge again: the block pre-exists in a
        // non-fresh state, so the stale metadata must go.
        map.lookup_block(pos)
            .unwrap()
            .lock()
            .unwrap()
            .set_node_meta(17, vec![1, 2, 3]);
        let mut r = data.as_slice();
        session.dispatch_one(&mut r).await.unwrap();
        assert!(!map.lookup_block(pos).unwrap().lock().unwrap().has_meta());
    }

    #[tokio::test]
    async fn truncated_block_payload_is_a_framing_error() {
        // Declared length 16000, but the stream ends short.
        let map = Arc::new(Map::new());
        let mut session = ClientSession::new(map.clone());
        session.set_state(ConnectionState::Active);

        let mut body = bytes::BytesMut::new();
        V3S32::new(0, 0, 0).wire_encode(&mut body);
        16000u16.wire_encode(&mut body);
        body.extend_from_slice(&[0u8; 1000]);
        let data = frame(ClientBound::Block, &body);

        let mut r = data.as_slice();
        assert!(matches!(
            session.dispatch_one(&mut r).await,
            Err(WireError::Io(_))
        ));
        assert!(map.is_empty(), "no block mutation on a framing error");
    }

    #[tokio::test]
    async fn undersized_block_payload_is_invalid_data() {
        let map = Arc::new(Map::new());
        let mut session = ClientSession::new(map.clone());
        session.set_state(ConnectionState::Active);

        let data = block_frame(V3S32::new(0, 0, 0), &[0u8; 100]);
        let mut r = data.as_slice();
        assert!(matches!(
            session.dispatch_one(&mut r).await,
            Err(WireError::InvalidData(_))
        ));
        // The undecodable payload is fatal in the not-good case too.
        let mut session = ClientSession::new(Arc::new(Map::new()));
        session.set_state(ConnectionState::Authenticating);
        let mut r = data.as_slice();
        assert!(session.dispatch_one(&mut r).await.is_err());
    }

    #[tokio::test]
    async fn initial_state_burst_is_stored() {
        let mut session = ClientSession::new(Arc::new(Map::new()));
        session.set_state(ConnectionState::Active);

        let mut data = frame(
            ClientBound::WorldInfo,
            &encode_to_bytes(&ToClientWorldInfo {
                seed: 99,
                load_distance: 3,
            }),
        );
        data.extend(frame(ClientBound::TimeOfDay, &encode_to_bytes(&625u64)));
        data.extend(frame(
            ClientBound::Movement,
            &encode_to_bytes(&ToClientMovement {
                flight: false,
                collision: true,
                speed: 4.317,
                gravity: 32.0,
                jump: 6.5,
            }),
        ));

        let mut r = data.as_slice();
        for _ in 0..3 {
            session.dispatch_one(&mut r).await.unwrap();
        }
        let params = session.params();
        assert_eq!(params.world_info.unwrap().seed, 99);
        assert_eq!(params.time_of_day, Some(625));
        assert_eq!(params.movement.unwrap().speed, 4.317);
    }

    #[tokio::test]
    async fn run_ends_on_disconnect() {
        let mut session = ClientSession::new(Arc::new(Map::new()));
        session.set_state(ConnectionState::Active);
        let mut data = frame(ClientBound::TimeOfDay, &encode_to_bytes(&1u64));
        data.extend(frame(ClientBound::Disconnect, &[]));
        let mut r = data.as_slice();
        session.run(&mut r).await.unwrap();
        assert_eq!(session.params().time_of_day, Some(1));
    }

    #[tokio::test]
    async fn payload_length_matches_serializer() {
        // The 16-bit length header must be able to carry a full block.
        assert!(SERIALIZED_BLOCK_SIZE <= u16::MAX as usize);
        assert_eq!(sample_payload().len(), SERIALIZED_BLOCK_SIZE);
    }
}
