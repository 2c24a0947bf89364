use serde::{Serialize, Deserialize};

use crate::error::{SpinError, SpinErrorKind};
use crate::reward_matcher::RewardGrant;
use crate::reward_pool::RewardEntry;
use crate::rotation::SectionArc;

/// Where a wheel session currently is in its load / spin / settle cycle
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpinPhase {
    Uninitialized,
    Loading,
    Ready,
    Spinning,
    Settling,
    Exhausted,
    Failed,
}

/// Chance bookkeeping. Consumption only ever goes up.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SpinChances {
    pub total: u32,
    pub consumed: u32,
}

impl SpinChances {
    pub fn new(total: u32) -> Self {
        Self { total, consumed: 0 }
    }

    pub fn remaining(&self) -> u32 {
        self.total.saturating_sub(self.consumed)
    }

    pub fn consume(&mut self) {
        if self.consumed < self.total {
            self.consumed += 1;
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

/// One section as a renderer needs it
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WheelSection {
    pub index: usize,
    pub label: String,
    pub image: Option<String>,
    pub arc: SectionArc,
    pub reward: RewardEntry,
}

/// Read-only view of a session, enough to draw the wheel and its controls
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WheelSnapshot {
    pub phase: SpinPhase,
    pub chances: SpinChances,
    pub chances_remaining: u32,
    pub input_armed: bool,
    pub rule_id: Option<String>,
    pub sections: Vec<WheelSection>,
    pub last_grant: Option<RewardGrant>,
    pub target_section: Option<usize>,
    pub target_rotation: Option<f64>,
}

/// Everything published on a session's notification channels
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Ready { pool: Vec<RewardEntry> },
    Error { kind: SpinErrorKind, message: String },
    Success { grant: RewardGrant },
    KnownResultReward { reward: RewardEntry },
}

impl From<SpinError> for Notification {
    fn from(err: SpinError) -> Self {
        Notification::Error { kind: err.kind, message: err.message }
    }
}

// === API Types ===

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct NewWheelSessionRequest {
    #[serde(default)]
    pub player_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WheelSessionResponse {
    pub session_id: String,
    pub snapshot: WheelSnapshot,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WheelSpinResponse {
    pub snapshot: WheelSnapshot,
    /// Absolute rotation the renderer should animate to, if the wheel moves
    pub rotate_to: Option<f64>,
    pub notifications: Vec<Notification>,
}

pub const MIN_SPINS: f64 = 5.0;     // Full rotations added per spin
