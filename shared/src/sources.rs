//! Seams to the outside world: the rules service, the play action and the
//! thing that actually turns the wheel.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;

use crate::error::ServiceError;
use crate::reward_matcher::PlayResponse;
use crate::rules::Rule;

pub trait RuleSource {
    fn fetch_rules(&self, action: &str) -> impl Future<Output = Result<Vec<Rule>, ServiceError>> + Send;
}

/// Executes the play action for a player. Implementations must fail without
/// contacting the service when `player_id` is empty. `Ok(None)` means the
/// service answered without a result.
pub trait PlaySource {
    fn execute_rule(
        &self,
        action: &str,
        player_id: &str,
        params: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<Option<PlayResponse>, ServiceError>> + Send;
}

pub trait WheelDriver {
    fn rotate_to(&mut self, angle_degrees: f64);
}

/// A wheel that only remembers where it was told to go.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordingWheel {
    pub rotations: Vec<f64>,
}

impl RecordingWheel {
    pub fn last(&self) -> Option<f64> {
        self.rotations.last().copied()
    }
}

impl WheelDriver for RecordingWheel {
    fn rotate_to(&mut self, angle_degrees: f64) {
        self.rotations.push(angle_degrees);
    }
}

/// Arguments for one play action, produced when a spin starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayRequest {
    pub action: String,
    pub player_id: String,
    pub params: BTreeMap<String, String>,
}
