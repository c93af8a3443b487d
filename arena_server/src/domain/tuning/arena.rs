use serde::Deserialize;

/// Teleporter zone placement and timing.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TeleporterTuning {
    pub position: [f32; 3],
    pub radius: f32,
    pub destination: [f32; 3],
    /// Seconds players must stay inside before everyone is moved.
    pub teleport_time: f64,
}

impl Default for TeleporterTuning {
    fn default() -> Self {
        Self {
            position: [-20.0, 0.0, 0.0],
            radius: 3.0,
            destination: [0.0, 0.0, 120.0],
            teleport_time: 5.0,
        }
    }
}

/// Static arena layout handed to the default terrain.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ArenaTuning {
    pub ground_height: f32,
    pub half_extent_x: f32,
    pub half_extent_z: f32,
    /// Seed for the world RNG (golem placement, ice spike targets).
    pub seed: u64,
}

impl Default for ArenaTuning {
    fn default() -> Self {
        Self {
            ground_height: 0.0,
            half_extent_x: 200.0,
            half_extent_z: 200.0,
            seed: 42,
        }
    }
}
