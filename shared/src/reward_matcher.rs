use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::reward_pool::{RewardData, RewardEntry, RewardKind, RewardValue};

/// A reward actually awarded by the rewards service for one play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardGrant {
    #[serde(rename = "reward_type")]
    pub kind: RewardKind,
    #[serde(default)]
    pub value: Option<RewardValue>,
    #[serde(default, rename = "reward_data")]
    pub data: RewardData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

impl RewardGrant {
    pub fn new(kind: RewardKind, value: impl Into<RewardValue>) -> Self {
        Self {
            kind,
            value: Some(value.into()),
            data: RewardData::default(),
            event_type: None,
        }
    }

    pub fn with_data(mut self, data: RewardData) -> Self {
        self.data = data;
        self
    }
}

/// Result of executing the play action. Only reward events are kept: the
/// service mixes in level ups and other events that carry no `reward_type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayResponse {
    #[serde(default, deserialize_with = "reward_events")]
    pub events: Vec<RewardGrant>,
}

fn reward_events<'de, D>(deserializer: D) -> Result<Vec<RewardGrant>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter(|event| event.get("reward_type").is_some_and(|kind| !kind.is_null()))
        .filter_map(|event| match serde_json::from_value::<RewardGrant>(event) {
            Ok(grant) => Some(grant),
            Err(e) => {
                log::warn!("Skipping unreadable reward event: {}", e);
                None
            }
        })
        .collect())
}

fn same_text(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

fn same_value(a: &Option<RewardValue>, b: &Option<RewardValue>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

/// Whether a pool entry represents the grant.
///
/// Goods carrying a group are matched by group id: the concrete goods id of a
/// group reward is generated at grant time and never appears in the pool.
pub fn grant_matches(grant: &RewardGrant, entry: &RewardEntry) -> bool {
    match grant.kind {
        RewardKind::Point => entry.kind == RewardKind::Point && same_value(&entry.quantity, &grant.value),
        RewardKind::Goods if grant.data.group.is_some() => {
            entry.kind == RewardKind::Goods && same_text(&entry.data.group, &grant.data.group)
        }
        RewardKind::Goods => entry.kind == RewardKind::Goods && same_text(&entry.data.goods_id, &grant.data.goods_id),
        RewardKind::Badge => entry.kind == RewardKind::Badge && same_text(&entry.data.badge_id, &grant.data.badge_id),
        RewardKind::Other(_) => same_value(&entry.quantity, &grant.value),
    }
}

/// Section index of the first pool entry matching the grant.
pub fn match_section(grant: &RewardGrant, pool: &[RewardEntry]) -> Option<usize> {
    pool.iter().position(|entry| grant_matches(grant, entry))
}
