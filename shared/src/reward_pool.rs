use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

use crate::config::PointRewardLevels;
use crate::rules::{JigsawCategory, Rule};

pub const GROUP_CONTAINER_KEY: &str = "group_container";

/// What a wheel section (or a grant) pays out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RewardKind {
    Point,
    Goods,
    Badge,
    Other(String),
}

impl From<String> for RewardKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "point" => Self::Point,
            "goods" => Self::Goods,
            "badge" => Self::Badge,
            _ => Self::Other(raw),
        }
    }
}

impl From<RewardKind> for String {
    fn from(kind: RewardKind) -> Self {
        match kind {
            RewardKind::Point => "point".to_string(),
            RewardKind::Goods => "goods".to_string(),
            RewardKind::Badge => "badge".to_string(),
            RewardKind::Other(raw) => raw,
        }
    }
}

impl fmt::Display for RewardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from(self.clone()))
    }
}

/// A quantity or value as sent by the rewards service, which mixes JSON
/// numbers and numeric strings freely. Two values are equal when both are
/// numbers with the same magnitude, or otherwise when their text matches.
#[derive(Debug, Clone)]
pub struct RewardValue(String);

impl RewardValue {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_number(&self) -> Option<f64> {
        self.0.parse::<f64>().ok().filter(|n| n.is_finite())
    }
}

impl PartialEq for RewardValue {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => self.0 == other.0,
        }
    }
}

impl fmt::Display for RewardValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RewardValue {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<u64> for RewardValue {
    fn from(raw: u64) -> Self {
        Self(raw.to_string())
    }
}

impl Serialize for RewardValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RewardValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(serde_json::Number),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => RewardValue::new(n.to_string()),
            Raw::Text(s) => RewardValue::new(s),
        })
    }
}

/// Reads an optional identifier that may arrive as a string or a number.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Kind specific payload shared by pool entries and grants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardData {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub goods_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub badge_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One section of the wheel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardEntry {
    #[serde(rename = "reward_name")]
    pub kind: RewardKind,
    #[serde(default, alias = "value")]
    pub quantity: Option<RewardValue>,
    #[serde(default)]
    pub data: RewardData,
}

impl RewardEntry {
    pub fn new(kind: RewardKind, quantity: impl Into<RewardValue>) -> Self {
        Self {
            kind,
            quantity: Some(quantity.into()),
            data: RewardData::default(),
        }
    }

    pub fn with_data(mut self, data: RewardData) -> Self {
        self.data = data;
        self
    }

    /// Image the renderer should draw for this section. Point rewards pick a
    /// tier image from their quantity, everything else uses its own image.
    pub fn image_ref(&self, levels: &PointRewardLevels) -> Option<String> {
        match self.kind {
            RewardKind::Point => {
                let quantity = self.quantity.as_ref().and_then(RewardValue::as_number).unwrap_or(0.0);
                Some(format!("point-level{}", levels.tier_for(quantity)))
            }
            _ => self.data.image.clone(),
        }
    }

    /// Short text for the section, e.g. "50 point" or the goods name.
    pub fn label(&self) -> String {
        match (&self.data.name, &self.quantity) {
            (Some(name), _) => name.clone(),
            (None, Some(quantity)) => format!("{} {}", quantity, self.kind),
            (None, None) => self.kind.to_string(),
        }
    }
}

/// Rewards of the first GROUP entry in the rule, in the order the rule lists them.
/// Anything unusable yields an empty pool.
pub fn build_pool(rule: &Rule) -> Vec<RewardEntry> {
    let Some(group) = rule.jigsaw_set.iter().find(|entry| entry.category == JigsawCategory::Group) else {
        log::warn!("Rule '{}' has no GROUP entry", rule.rule_id);
        return Vec::new();
    };

    match group.config.get(GROUP_CONTAINER_KEY) {
        Some(container @ Value::Array(_)) => {
            match serde_json::from_value::<Vec<RewardEntry>>(container.clone()) {
                Ok(pool) => pool,
                Err(e) => {
                    log::warn!("Rule '{}' has an unreadable group container: {}", rule.rule_id, e);
                    Vec::new()
                }
            }
        }
        _ => {
            log::warn!("Rule '{}' GROUP entry has no {} list", rule.rule_id, GROUP_CONTAINER_KEY);
            Vec::new()
        }
    }
}

/// Unbiased in-place Fisher-Yates, walking from the last element down.
pub fn shuffle<R: Rng + ?Sized>(pool: &mut [RewardEntry], rng: &mut R) {
    pool.shuffle(rng);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::rules::tests::{custom_param, rule};
    use crate::rules::JigsawEntry;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    pub(crate) fn group_entry(container: Value) -> JigsawEntry {
        serde_json::from_value(json!({
            "category": "GROUP",
            "name": "randomReward",
            "config": { "group_container": container }
        }))
        .unwrap()
    }

    pub(crate) fn sample_container() -> Value {
        json!([
            { "reward_name": "point", "quantity": 10 },
            { "reward_name": "goods", "quantity": "1", "data": { "goods_id": "g-1", "image": "mug.png", "name": "Mug" } },
            { "reward_name": "point", "quantity": "50" },
            { "reward_name": "badge", "quantity": 1, "data": { "badge_id": 77, "image": "gold.png" } }
        ])
    }

    #[test]
    fn test_build_pool_uses_first_group_verbatim() {
        let r = rule(
            "r1",
            &["spinwheel"],
            vec![
                custom_param("home"),
                group_entry(sample_container()),
                group_entry(json!([{ "reward_name": "point", "quantity": 999 }])),
            ],
        );
        let pool = build_pool(&r);
        assert_eq!(pool.len(), 4);
        assert_eq!(pool[0].kind, RewardKind::Point);
        assert_eq!(pool[0].quantity, Some(RewardValue::from(10)));
        assert_eq!(pool[1].data.goods_id.as_deref(), Some("g-1"));
        assert_eq!(pool[3].data.badge_id.as_deref(), Some("77"));
    }

    #[test]
    fn test_build_pool_without_group_is_empty() {
        assert!(build_pool(&rule("r1", &["spinwheel"], vec![custom_param("home")])).is_empty());
        assert!(build_pool(&rule("r2", &["spinwheel"], vec![group_entry(json!("not a list"))])).is_empty());
        assert!(build_pool(&rule("r3", &["spinwheel"], vec![group_entry(json!([{ "quantity": 1 }]))])).is_empty());
    }

    #[test]
    fn test_reward_value_compares_numbers_loosely() {
        assert_eq!(RewardValue::from("10"), RewardValue::from(10));
        assert_eq!(RewardValue::from("10.0"), RewardValue::from(10));
        assert_eq!(RewardValue::from(" abc "), RewardValue::from("abc"));
        assert_ne!(RewardValue::from("10"), RewardValue::from("100"));
        assert_ne!(RewardValue::from("abc"), RewardValue::from("ABC"));
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let r = rule("r1", &["spinwheel"], vec![group_entry(sample_container())]);
        let original = build_pool(&r);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let mut pool = original.clone();
            shuffle(&mut pool, &mut rng);
            assert_eq!(pool.len(), original.len());
            for entry in &original {
                let expected = original.iter().filter(|e| *e == entry).count();
                let actual = pool.iter().filter(|e| *e == entry).count();
                assert_eq!(expected, actual);
            }
        }
    }

    #[test]
    fn test_shuffle_reaches_every_position() {
        let original: Vec<RewardEntry> = (0..4u64).map(|q| RewardEntry::new(RewardKind::Point, q)).collect();
        let mut rng = StdRng::seed_from_u64(5);
        let mut first_counts = [0usize; 4];
        for _ in 0..4000 {
            let mut pool = original.clone();
            shuffle(&mut pool, &mut rng);
            let first = pool[0].quantity.as_ref().and_then(RewardValue::as_number).unwrap() as usize;
            first_counts[first] += 1;
        }
        // each entry should lead roughly a quarter of the time
        for count in first_counts {
            assert!((800..1200).contains(&count), "skewed shuffle: {:?}", first_counts);
        }
    }

    #[test]
    fn test_image_ref_uses_point_tiers() {
        let levels = PointRewardLevels::default();
        assert_eq!(RewardEntry::new(RewardKind::Point, 5).image_ref(&levels).as_deref(), Some("point-level1"));
        assert_eq!(RewardEntry::new(RewardKind::Point, 30).image_ref(&levels).as_deref(), Some("point-level3"));

        let goods = RewardEntry::new(RewardKind::Goods, 1).with_data(RewardData {
            image: Some("mug.png".to_string()),
            ..RewardData::default()
        });
        assert_eq!(goods.image_ref(&levels).as_deref(), Some("mug.png"));
        assert_eq!(RewardEntry::new(RewardKind::Badge, 1).image_ref(&levels), None);
    }

    #[test]
    fn test_label_prefers_name() {
        let pool = build_pool(&rule("r1", &[], vec![group_entry(sample_container())]));
        assert_eq!(pool[0].label(), "10 point");
        assert_eq!(pool[1].label(), "Mug");
    }
}
