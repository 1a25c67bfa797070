//! Player pose persistence.
//!
//! One JSON file per player under `<world_dir>/players/`. Player names
//! are validated before they reach the name index, so they are safe to
//! use as file names.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use voxend_proto::types::{V3F32, V3F64};

/// Serializable player record for JSON persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PlayerData {
    position: [f64; 3],
    rotation: [f32; 3],
}

pub struct PlayerStore {
    players_dir: PathBuf,
}

impl PlayerStore {
    pub fn new(world_dir: &Path) -> Self {
        Self {
            players_dir: world_dir.join("players"),
        }
    }

    fn player_path(&self, name: &str) -> PathBuf {
        self.players_dir.join(format!("{name}.json"))
    }

    /// Load a player's persisted pose. Missing or corrupt data reads
    /// as absent; corruption is logged.
    pub fn load_player(&self, name: &str) -> Option<(V3F64, V3F32)> {
        let contents = std::fs::read_to_string(self.player_path(name)).ok()?;
        match serde_json::from_str::<PlayerData>(&contents) {
            Ok(data) => Some((
                V3F64::new(data.position[0], data.position[1], data.position[2]),
                V3F32::new(data.rotation[0], data.rotation[1], data.rotation[2]),
            )),
            Err(e) => {
                warn!("corrupt player data for {name}: {e}");
                None
            }
        }
    }

    /// Persist a freshly spawned player.
    pub fn create_player(&self, name: &str, pos: V3F64, rot: V3F32) {
        self.write_player(name, pos, rot);
    }

    /// Persist an existing player's current pose.
    pub fn update_player(&self, name: &str, pos: V3F64, rot: V3F32) {
        self.write_player(name, pos, rot);
    }

    fn write_player(&self, name: &str, pos: V3F64, rot: V3F32) {
        let data = PlayerData {
            position: [pos.x, pos.y, pos.z],
            rotation: [rot.x, rot.y, rot.z],
        };
        let result = std::fs::create_dir_all(&self.players_dir).and_then(|()| {
            let json = serde_json::to_string_pretty(&data).expect("player data serializes");
            std::fs::write(self.player_path(name), json)
        });
        if let Err(e) = result {
            warn!("failed to persist player {name}: {e}");
        }
    }
}
