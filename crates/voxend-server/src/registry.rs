//! The player registry: two concurrency-safe indices over shared
//! player records.
//!
//! A player is addressable by id for its whole registered lifetime and
//! by name only once authenticated, so the indices are kept separate;
//! lookups never have to special-case unauthenticated players. Each
//! index holds one counted reference per present record.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::player::ServerPlayer;

pub struct PlayerRegistry {
    by_id: RwLock<BTreeMap<u64, Arc<ServerPlayer>>>,
    by_name: RwLock<BTreeMap<String, Arc<ServerPlayer>>>,
    shutting_down: AtomicBool,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            by_id: RwLock::new(BTreeMap::new()),
            by_name: RwLock::new(BTreeMap::new()),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Random ids keep the ordered index balanced. Zero is not a valid
    /// id and is never produced.
    pub fn generate_id() -> u64 {
        loop {
            let id: u64 = rand::random();
            if id != 0 {
                return id;
            }
        }
    }

    /// Insert a record keyed by its id. Fails on a duplicate id; the
    /// caller retries with a fresh one.
    pub fn add(&self, player: &Arc<ServerPlayer>) -> bool {
        if player.id == 0 {
            return false;
        }
        let mut by_id = self.by_id.write().unwrap();
        match by_id.entry(player.id) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(player.clone());
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Id 0 always misses.
    pub fn lookup_by_id(&self, id: u64) -> Option<Arc<ServerPlayer>> {
        if id == 0 {
            return None;
        }
        self.by_id.read().unwrap().get(&id).cloned()
    }

    /// The empty name always misses.
    pub fn lookup_by_name(&self, name: &str) -> Option<Arc<ServerPlayer>> {
        if name.is_empty() {
            return None;
        }
        self.by_name.read().unwrap().get(name).cloned()
    }

    /// Atomically claim `name` for `player`. This is the linearization
    /// point for authentication: of two concurrent claims to the same
    /// name, exactly one succeeds.
    pub fn try_claim_name(&self, name: &str, player: &Arc<ServerPlayer>) -> bool {
        if name.is_empty() {
            return false;
        }
        let mut by_name = self.by_name.write().unwrap();
        match by_name.entry(name.to_owned()) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(player.clone());
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Detach from the id index and release its reference. Returns
    /// whether a removal actually happened, so callers know whether to
    /// announce it. Suppressed during full shutdown: the drain is the
    /// only teardown path at that point.
    pub fn remove_by_id(&self, id: u64) -> bool {
        if self.shutting_down.load(Ordering::Acquire) {
            return false;
        }
        self.by_id.write().unwrap().remove(&id).is_some()
    }

    /// Name-index counterpart of `remove_by_id`, suppressed the same
    /// way.
    pub fn remove_by_name(&self, name: &str) -> bool {
        if self.shutting_down.load(Ordering::Acquire) {
            return false;
        }
        self.by_name.write().unwrap().remove(name).is_some()
    }

    /// Apply a read-only visitor to every authenticated record, in
    /// name order, under the index lock. Visitors must not touch the
    /// indices.
    pub fn for_each_named<F: FnMut(&Arc<ServerPlayer>)>(&self, mut visitor: F) {
        for player in self.by_name.read().unwrap().values() {
            visitor(player);
        }
    }

    pub fn player_count(&self) -> usize {
        self.by_id.read().unwrap().len()
    }

    pub fn named_count(&self) -> usize {
        self.by_name.read().unwrap().len()
    }

    /// Flip into shutdown mode: individual removals become no-ops.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }

    /// Clear both indices. The name index is simply forgotten; the id
    /// index's records are handed back so the owner can disconnect
    /// them and join their receive tasks before releasing the final
    /// references.
    pub fn drain(&self) -> Vec<Arc<ServerPlayer>> {
        self.by_name.write().unwrap().clear();
        let mut by_id = self.by_id.write().unwrap();
        std::mem::take(&mut *by_id).into_values().collect()
    }
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
