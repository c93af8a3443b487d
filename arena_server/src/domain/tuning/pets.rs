use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct GolemTuning {
    pub max_health: f32,
    pub radius: f32,
    pub speed: f32,
    pub aggro_range: f32,
    pub attack_range: f32,
    pub attack_damage: f32,
    /// Seconds between attacks.
    pub attack_rate: f64,
    /// Golems stop moving once their goal is closer than this.
    pub arrive_distance: f32,
    /// Base orbit radius around the owner while roaming.
    pub roam_radius: f32,
    /// Amplitude of the orbit radius oscillation.
    pub roam_radius_variance: f32,
}

impl Default for GolemTuning {
    fn default() -> Self {
        Self {
            max_health: 40.0,
            radius: 0.8,
            speed: 6.0,
            aggro_range: 15.0,
            attack_range: 3.0,
            attack_damage: 5.0,
            attack_rate: 1.5,
            arrive_distance: 0.5,
            roam_radius: 5.0,
            roam_radius_variance: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DragonTuning {
    /// Hover height above the owner.
    pub flight_height: f32,
    /// Horizontal radius of the hover circle.
    pub orbit_distance: f32,
    pub position_smoothing: f32,
    pub aggro_range: f32,
    pub attack_damage: f32,
    pub attack_interval: f64,
    pub dive_speed: f32,
    pub return_speed: f32,
    /// Distance at which a dive connects.
    pub impact_radius: f32,
    /// Distance to the hover point at which returning switches to following.
    pub return_threshold: f32,
    /// Height an ownerless dragon climbs to before idling.
    pub ownerless_ceiling: f32,
}

impl Default for DragonTuning {
    fn default() -> Self {
        Self {
            flight_height: 5.0,
            orbit_distance: 2.0,
            position_smoothing: 10.0,
            aggro_range: 20.0,
            attack_damage: 15.0,
            attack_interval: 4.0,
            dive_speed: 15.0,
            return_speed: 10.0,
            impact_radius: 1.5,
            return_threshold: 2.0,
            ownerless_ceiling: 10.0,
        }
    }
}
