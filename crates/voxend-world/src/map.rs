//! The in-memory block store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc;
use voxend_proto::types::V3S32;

use crate::block::MapBlock;

/// Concurrency-safe association of block positions to shared blocks,
/// with a change feed for downstream consumers (meshing, replication).
pub struct Map {
    blocks: RwLock<BTreeMap<V3S32, Arc<Mutex<MapBlock>>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<V3S32>>>,
}

impl Map {
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(BTreeMap::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Fetch the block at `pos`, allocating a fresh one if absent.
    pub fn get_or_create_block(&self, pos: V3S32) -> Arc<Mutex<MapBlock>> {
        if let Some(block) = self.lookup_block(pos) {
            return block;
        }
        let mut blocks = self.blocks.write().unwrap();
        blocks
            .entry(pos)
            .or_insert_with(|| Arc::new(Mutex::new(MapBlock::new(pos))))
            .clone()
    }

    pub fn lookup_block(&self, pos: V3S32) -> Option<Arc<Mutex<MapBlock>>> {
        self.blocks.read().unwrap().get(&pos).cloned()
    }

    /// Allocate a scratch block that is not registered in any index.
    /// It is freed when dropped.
    pub fn allocate_detached_block(pos: V3S32) -> MapBlock {
        MapBlock::new(pos)
    }

    /// Subscribe to block-changed notifications.
    pub fn subscribe_changes(&self) -> mpsc::UnboundedReceiver<V3S32> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Notify downstream consumers that the block at `pos` changed.
    /// Subscribers that have gone away are pruned.
    pub fn notify_changed(&self, pos: V3S32) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(pos).is_ok());
    }

    pub fn len(&self) -> usize {
        self.blocks.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().unwrap().is_empty()
    }
}

impl Default for Map {
    fn default() -> Self {
        Self::new()
    }
}
