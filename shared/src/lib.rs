pub mod config;
pub mod error;
pub mod events;
pub mod reward_matcher;
pub mod reward_pool;
pub mod rotation;
pub mod rules;
pub mod session;
pub mod shared_wheel_game;
pub mod sources;

pub use config::{PointRewardLevels, WheelConfig};
pub use error::{ServiceError, SpinError, SpinErrorKind};
pub use reward_matcher::{match_section, PlayResponse, RewardGrant};
pub use reward_pool::{build_pool, shuffle, RewardData, RewardEntry, RewardKind, RewardValue};
pub use rotation::{angle_for_section, target_rotation, SectionGeometry, MAX_SECTIONS};
pub use rules::{select_rule, EligibleRule, JigsawCategory, JigsawEntry, Rule};
pub use session::{SpinOutcome, SpinSession};
pub use sources::{PlayRequest, PlaySource, RecordingWheel, RuleSource, WheelDriver};
