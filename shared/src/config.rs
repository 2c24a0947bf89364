use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::rotation::MIN_BASE_REVOLUTION_DEGREES;

pub const DEFAULT_TARGET_ACTION: &str = "spin";
pub const DEFAULT_TARGET_TAG: &str = "spinwheel";
pub const DEFAULT_CUSTOM_PARAM_NAME: &str = "url";
pub const DEFAULT_TOTAL_SPIN_CHANCE: u32 = 1;
pub const DEFAULT_BASE_REVOLUTION_DEGREES: f64 = 360.0 * crate::shared_wheel_game::MIN_SPINS;

/// Point quantities at which a point reward switches to the next image tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_point_levels"))]
pub struct PointRewardLevels {
    #[serde(default = "default_level2")]
    pub level2: u64,
    #[serde(default = "default_level3")]
    pub level3: u64,
    #[serde(default = "default_level4")]
    pub level4: u64,
}

fn default_level2() -> u64 {
    10
}

fn default_level3() -> u64 {
    30
}

fn default_level4() -> u64 {
    50
}

impl Default for PointRewardLevels {
    fn default() -> Self {
        Self {
            level2: default_level2(),
            level3: default_level3(),
            level4: default_level4(),
        }
    }
}

impl PointRewardLevels {
    /// Visual tier 1..=4 for a point quantity.
    pub fn tier_for(&self, quantity: f64) -> u8 {
        if quantity < self.level2 as f64 {
            1
        } else if quantity < self.level3 as f64 {
            2
        } else if quantity < self.level4 as f64 {
            3
        } else {
            4
        }
    }
}

fn validate_point_levels(levels: &PointRewardLevels) -> Result<(), ValidationError> {
    if levels.level2 < levels.level3 && levels.level3 < levels.level4 {
        Ok(())
    } else {
        Err(ValidationError::new("point_levels_not_ascending"))
    }
}

/// Everything a wheel session needs to know before it loads.
///
/// Credentials and the player id are optional here on purpose: their absence
/// is reported by the session when it tries to load or spin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_wheel_config"))]
pub struct WheelConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub player_id: Option<String>,
    #[serde(default = "default_target_action")]
    #[validate(length(min = 1))]
    pub target_action: String,
    #[serde(default = "default_target_tag")]
    #[validate(length(min = 1))]
    pub target_tag: String,
    #[serde(default = "default_custom_param_name")]
    #[validate(length(min = 1))]
    pub custom_param_name: String,
    #[serde(default)]
    pub custom_param_values: Vec<String>,
    #[serde(default = "default_total_spin_chance")]
    pub total_spin_chance: u32,
    #[serde(default)]
    #[validate]
    pub point_reward_levels: PointRewardLevels,
    #[serde(default = "default_base_revolution_degrees")]
    pub base_revolution_degrees: f64,
    #[serde(default = "default_show_debug_log")]
    pub show_debug_log: bool,
}

fn default_target_action() -> String {
    DEFAULT_TARGET_ACTION.to_string()
}

fn default_target_tag() -> String {
    DEFAULT_TARGET_TAG.to_string()
}

fn default_custom_param_name() -> String {
    DEFAULT_CUSTOM_PARAM_NAME.to_string()
}

fn default_total_spin_chance() -> u32 {
    DEFAULT_TOTAL_SPIN_CHANCE
}

fn default_base_revolution_degrees() -> f64 {
    DEFAULT_BASE_REVOLUTION_DEGREES
}

fn default_show_debug_log() -> bool {
    true
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            player_id: None,
            target_action: default_target_action(),
            target_tag: default_target_tag(),
            custom_param_name: default_custom_param_name(),
            custom_param_values: Vec::new(),
            total_spin_chance: default_total_spin_chance(),
            point_reward_levels: PointRewardLevels::default(),
            base_revolution_degrees: default_base_revolution_degrees(),
            show_debug_log: default_show_debug_log(),
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

impl WheelConfig {
    pub fn has_credentials(&self) -> bool {
        !is_blank(&self.api_key) && !is_blank(&self.api_secret)
    }

    /// Runs the field checks, flattening any failures into one message.
    pub fn validated(self) -> Result<Self, String> {
        self.validate().map_err(|e| e.to_string())?;
        Ok(self)
    }

    /// The player id, if one is configured and not blank.
    pub fn player(&self) -> Option<&str> {
        self.player_id.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

fn validate_wheel_config(config: &WheelConfig) -> Result<(), ValidationError> {
    if !(config.base_revolution_degrees > MIN_BASE_REVOLUTION_DEGREES) {
        return Err(ValidationError::new("base_revolution_too_small"));
    }
    if config.custom_param_values.iter().any(|v| v.trim().is_empty()) {
        return Err(ValidationError::new("blank_custom_param_value"));
    }
    Ok(())
}
