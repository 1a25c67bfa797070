use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub world: WorldSection,
    #[serde(default)]
    pub movement: MovementSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_address() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    4000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WorldSection {
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_load_distance")]
    pub load_distance: u32,
    /// Spawn surface height; new players spawn half a node above it.
    #[serde(default = "default_spawn_height")]
    pub spawn_height: f64,
    #[serde(default = "default_world_directory")]
    pub directory: String,
}

fn default_load_distance() -> u32 {
    3
}

fn default_spawn_height() -> f64 {
    32.0
}

fn default_world_directory() -> String {
    "world".into()
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            seed: 0,
            load_distance: default_load_distance(),
            spawn_height: default_spawn_height(),
            directory: default_world_directory(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MovementSection {
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    #[serde(default = "default_jump")]
    pub jump: f32,
}

fn default_speed() -> f32 {
    4.317
}

fn default_gravity() -> f32 {
    32.0
}

fn default_jump() -> f32 {
    6.5
}

impl Default for MovementSection {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            gravity: default_gravity(),
            jump: default_jump(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file. A missing file yields the
    /// defaults; a malformed file is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config() {
        let toml_str = r#"
            [server]
            address = "127.0.0.1"
            port = 4001

            [world]
            seed = 12345
            load_distance = 5
            spawn_height = 48.0

            [movement]
            speed = 5.0

            [logging]
            level = "debug"
        "#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.address, "127.0.0.1");
        assert_eq!(config.server.port, 4001);
        assert_eq!(config.world.seed, 12345);
        assert_eq!(config.world.load_distance, 5);
        assert_eq!(config.world.spawn_height, 48.0);
        assert_eq!(config.movement.speed, 5.0);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config: ServerConfig = toml::from_str("[server]\nport = 5000\n").unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.address, "0.0.0.0");
        assert_eq!(config.world.load_distance, 3);
        assert_eq!(config.movement.gravity, 32.0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ServerConfig::load("/nonexistent/voxend.toml").unwrap();
        assert_eq!(config.server.port, 4000);
    }
}
