use std::fmt;

// Structural defects detected while building a world. These abort startup
// instead of surfacing mid-simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldError {
    InvalidTuning(&'static str),
    InvalidTickRate,
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldError::InvalidTuning(reason) => write!(f, "invalid tuning: {reason}"),
            WorldError::InvalidTickRate => write!(f, "tick rate must be positive"),
        }
    }
}

impl std::error::Error for WorldError {}

// Reasons a cast request is dropped. Rejections are expected rate limiting,
// not failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CastRejection {
    OnCooldown { remaining: f64 },
    InsufficientMana { required: f32, available: f32 },
    CasterDead,
    CasterMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespawnRejection {
    NotDead,
    UnknownPlayer,
}
