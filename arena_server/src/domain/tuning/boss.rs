use serde::Deserialize;

/// Gameplay tuning for the arena boss and its three abilities.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BossTuning {
    pub max_health: f32,
    pub radius: f32,
    pub spawn_point: [f32; 3],
    /// Radius scanned for players when picking targets.
    pub scan_radius: f32,

    pub fireball_interval: f64,
    pub fireball_count: u32,
    /// Total horizontal cone angle in degrees.
    pub fireball_cone_angle: f32,
    pub fireball_speed: f32,
    pub fireball_scale: f32,

    pub ice_spike_interval: f64,
    /// Upper bound on players targeted by one ice spike cast.
    pub ice_spike_max_targets: u32,

    pub cone_spike_interval: f64,
    pub cone_spike_rows: u32,
    pub cone_spike_row_spacing: f32,
    /// Half of the cone opening angle in degrees.
    pub cone_spike_half_angle: f32,
    /// Distance between neighbouring spikes in a row.
    pub cone_spike_spacing: f32,
}

impl Default for BossTuning {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            radius: 1.5,
            spawn_point: [0.0, 0.0, 30.0],
            scan_radius: 40.0,

            fireball_interval: 3.0,
            fireball_count: 5,
            fireball_cone_angle: 45.0,
            fireball_speed: 12.0,
            fireball_scale: 2.0,

            ice_spike_interval: 6.0,
            ice_spike_max_targets: 3,

            cone_spike_interval: 9.0,
            cone_spike_rows: 3,
            cone_spike_row_spacing: 3.0,
            cone_spike_half_angle: 30.0,
            cone_spike_spacing: 1.5,
        }
    }
}
