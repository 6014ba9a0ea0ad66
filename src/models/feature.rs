use serde::{Deserialize, Serialize};

/// Tier reserved for bookkeeping features written by the importer.
pub const META_TIER: &str = "meta";

/// Name of the sibling ordering feature in [`META_TIER`].
pub const INDEX_FEATURE: &str = "index";

/// Identifies a feature on a unit. Sorting is by tier, then name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureKey {
    pub tier: String,
    pub name: String,
}

impl FeatureKey {
    pub fn new(tier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tier: tier.into(),
            name: name.into(),
        }
    }

    /// The `meta:index` sibling ordering key.
    pub fn index() -> Self {
        Self::new(META_TIER, INDEX_FEATURE)
    }

    /// Parse the `tier:name` form used in configuration. Tiers may contain
    /// `:`, names may not.
    pub fn parse(s: &str) -> Option<Self> {
        let (tier, name) = s.rsplit_once(':')?;
        if tier.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(tier, name))
    }
}

impl std::fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tier, self.name)
    }
}

/// The kind of value a feature holds, as stored in the `value_kind` column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Int,
    Str,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Str => "str",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "int" => Some(Self::Int),
            "str" => Some(Self::Str),
            _ => None,
        }
    }
}

/// A typed feature value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FeatureValue {
    Int(i64),
    Str(String),
}

impl FeatureValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Str(_) => ValueKind::Str,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Str(_) => None,
        }
    }
}

/// Textual form, used when a value is written into markup.
impl std::fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Str(v) => f.write_str(v),
        }
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// A feature attached to a stored unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feature {
    pub unit_id: String,
    #[serde(flatten)]
    pub key: FeatureKey,
    pub value: FeatureValue,
}
