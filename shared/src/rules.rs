use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const CUSTOM_PARAMETER_CONDITION: &str = "customParameter";
pub const PARAM_EQUALS_OPERATION: &str = "=";

/// Category of a jigsaw entry inside a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JigsawCategory {
    Condition,
    Group,
    Other(String),
}

impl From<String> for JigsawCategory {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "CONDITION" => Self::Condition,
            "GROUP" => Self::Group,
            _ => Self::Other(raw),
        }
    }
}

impl From<JigsawCategory> for String {
    fn from(category: JigsawCategory) -> Self {
        match category {
            JigsawCategory::Condition => "CONDITION".to_string(),
            JigsawCategory::Group => "GROUP".to_string(),
            JigsawCategory::Other(raw) => raw,
        }
    }
}

/// A named configuration unit of a rule: either a condition or a reward group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JigsawEntry {
    pub category: JigsawCategory,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl JigsawEntry {
    /// Reads a config value as text. Numbers are rendered the way the rules
    /// service would print them.
    pub fn config_text(&self, key: &str) -> Option<String> {
        match self.config.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// If this entry is a `customParameter` equality condition on `param_name`,
    /// returns the value it compares against.
    pub fn custom_param_value(&self, param_name: &str) -> Option<String> {
        if self.category != JigsawCategory::Condition || self.name != CUSTOM_PARAMETER_CONDITION {
            return None;
        }
        if self.config_text("param_name").as_deref() != Some(param_name) {
            return None;
        }
        if self.config_text("param_operation").as_deref() != Some(PARAM_EQUALS_OPERATION) {
            return None;
        }
        self.config_text("param_value")
    }
}

/// A rule as delivered by the rules service. Never modified after fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, alias = "_id")]
    pub rule_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub jigsaw_set: Vec<JigsawEntry>,
}

impl Rule {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// The rules service sends tags either as a list or as one comma separated string.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTags {
        List(Vec<String>),
        Joined(String),
    }

    let raw = Option::<RawTags>::deserialize(deserializer)?;
    let tags = match raw {
        Some(RawTags::List(list)) => list,
        Some(RawTags::Joined(joined)) => joined.split(',').map(str::to_string).collect(),
        None => Vec::new(),
    };
    Ok(tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

/// A rule together with the allow-listed custom parameter value that made it playable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibleRule {
    pub rule: Rule,
    pub matched_param_value: String,
}

/// Every rule carrying `target_tag` and a `customParameter` condition whose
/// value is allow-listed, in input order. For each rule the first qualifying
/// condition wins.
pub fn eligible_rules(
    rules: &[Rule],
    target_tag: &str,
    param_name: &str,
    allowed_values: &[String],
) -> Vec<EligibleRule> {
    rules
        .iter()
        .filter(|rule| rule.has_tag(target_tag))
        .filter_map(|rule| {
            rule.jigsaw_set
                .iter()
                .filter_map(|entry| entry.custom_param_value(param_name))
                .find(|value| allowed_values.iter().any(|allowed| allowed == value))
                .map(|matched_param_value| EligibleRule {
                    rule: rule.clone(),
                    matched_param_value,
                })
        })
        .collect()
}

/// Picks one eligible rule uniformly at random, or `None` when nothing qualifies.
pub fn select_rule<R: Rng + ?Sized>(
    rules: &[Rule],
    target_tag: &str,
    param_name: &str,
    allowed_values: &[String],
    rng: &mut R,
) -> Option<EligibleRule> {
    let mut candidates = eligible_rules(rules, target_tag, param_name, allowed_values);
    log::debug!(
        "{} of {} rules eligible for tag '{}' and param '{}'",
        candidates.len(),
        rules.len(),
        target_tag,
        param_name
    );
    if candidates.is_empty() {
        return None;
    }
    let index = rng.gen_range(0..candidates.len());
    Some(candidates.swap_remove(index))
}
