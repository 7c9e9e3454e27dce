//! The `[server]` config section.

use ccnet_core::{ComputerFamily, ComputerId};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default port of the channel.
pub const DEFAULT_PORT: u16 = 25600;

/// A computer to create at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputerSeed {
    /// Instance id.
    pub id: ComputerId,
    /// Hardware tier.
    #[serde(default)]
    pub family: ComputerFamily,
    /// Optional label.
    #[serde(default)]
    pub label: Option<String>,
    /// Whether the computer starts powered on.
    #[serde(default)]
    pub on: bool,
}

/// Server runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the endpoint binds to.
    pub bind: SocketAddr,
    /// Main-context ticks per second.
    pub tick_rate: u32,
    /// Chunk radius each peer tracks around its location.
    pub view_distance: u32,
    /// Computers present at startup.
    pub computers: Vec<ComputerSeed>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            tick_rate: 20,
            view_distance: 8,
            computers: Vec::new(),
        }
    }
}

impl ServerSettings {
    /// Time between main-context ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_section_keeps_defaults() {
        let settings: ServerSettings = toml::from_str(
            r#"
            tick_rate = 10

            [[computers]]
            id = 3
            family = "Advanced"
            on = true
            "#,
        )
        .unwrap();

        assert_eq!(settings.bind, ServerSettings::default().bind);
        assert_eq!(settings.tick_interval(), Duration::from_millis(100));
        assert_eq!(
            settings.computers,
            vec![ComputerSeed {
                id: 3,
                family: ComputerFamily::Advanced,
                label: None,
                on: true,
            }]
        );
    }

    #[test]
    fn zero_tick_rate_is_clamped() {
        let settings = ServerSettings {
            tick_rate: 0,
            ..ServerSettings::default()
        };
        assert_eq!(settings.tick_interval(), Duration::from_secs(1));
    }
}
