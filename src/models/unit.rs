use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored node of the interlinear hierarchy.
///
/// Units are created by importers and persist across conversions. The
/// `unit_type` is normally a [`Level`](super::Level) tag, but the store does
/// not restrict it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub unit_type: String,
    pub parent_id: Option<String>,
    /// Value of the unit's `meta:index` feature, when it has one.
    pub index: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A unit with its nested children, used for tree rendering.
///
/// The `unit` fields are flattened into the JSON output, with an additional
/// `children` array containing nested `UnitTreeNode` objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitTreeNode {
    #[serde(flatten)]
    pub unit: Unit,
    pub children: Vec<UnitTreeNode>,
}
