//! Node grid serialization for the BLOCK envelope payload.
//!
//! The payload is the raw node grid, 4 bytes per node in network byte
//! order, index order matching `MapBlock::node_index`. The length is
//! fixed; a payload of any other size is rejected.

use bytes::{Buf, BufMut, BytesMut};

use crate::block::{BlockStatus, MapBlock, NODES_PER_BLOCK};
use crate::WorldError;

/// Exact byte length of a serialized block payload.
pub const SERIALIZED_BLOCK_SIZE: usize = NODES_PER_BLOCK * 4;

/// Serialize a block's node grid.
pub fn serialize_block(block: &MapBlock) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(SERIALIZED_BLOCK_SIZE);
    for &node in block.nodes.iter() {
        buf.put_u32(node);
    }
    buf.to_vec()
}

/// Deserialize a payload into `block`, marking it `Ready`.
///
/// On a length mismatch the block is left untouched.
pub fn deserialize_block(block: &mut MapBlock, data: &[u8]) -> Result<(), WorldError> {
    if data.len() != SERIALIZED_BLOCK_SIZE {
        return Err(WorldError::LengthMismatch {
            expected: SERIALIZED_BLOCK_SIZE,
            got: data.len(),
        });
    }
    let mut cursor = data;
    for node in block.nodes.iter_mut() {
        *node = cursor.get_u32();
    }
    block.status = BlockStatus::Ready;
    Ok(())
}
