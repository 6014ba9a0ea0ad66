//! Chain queries over the unit store.
//!
//! A [`LayerChain`] is turned into one SQL statement that selects a row per
//! path through the active levels. The root level is an inner selection; every
//! level below it is left-joined through the ancestry relation, so a unit
//! without children at the next level still produces a row and levels removed
//! from the chain do not break the join.
//!
//! Rows come back in document order. Each unit gets a path built from the
//! ordering feature of every unit above it in the store (removed levels
//! included), and rows sort by the paths of their levels outermost first.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use rusqlite::{params_from_iter, Connection};

use super::Database;
use crate::chain::LayerChain;
use crate::error::FormatError;
use crate::models::{FeatureKey, FeatureValue, Level, ValueKind};

/// All features of one unit.
pub type UnitFeatures = BTreeMap<FeatureKey, FeatureValue>;

/// Read interface the exporters query through.
pub trait QuerySource {
    /// One row per path through the active levels of `chain`, in document order.
    fn results(&self, chain: &LayerChain) -> Result<ResultTable>;

    /// Sorted `(tier, name)` keys present on units stored as `unit_type`
    /// whose tier starts with `tier_prefix`.
    fn feature_keys(&self, unit_type: &str, tier_prefix: &str) -> Result<Vec<FeatureKey>>;
}

/// The unit ids of one result row, by level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    ids: BTreeMap<Level, String>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, level: Level, id: impl Into<String>) -> Self {
        self.ids.insert(level, id.into());
        self
    }

    pub fn get(&self, level: Level) -> Option<&str> {
        self.ids.get(&level).map(String::as_str)
    }

    /// The unit id at `level`, or the level's own name when the row has
    /// no unit there.
    pub fn id_for(&self, level: Level) -> &str {
        self.get(level).unwrap_or(level.as_str())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.values().map(String::as_str)
    }
}

/// Ordered result rows plus the features of every unit they reference.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    rows: Vec<ResultRow>,
    features: HashMap<String, UnitFeatures>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_row(&mut self, row: ResultRow) {
        self.rows.push(row);
    }

    pub fn insert_feature(&mut self, unit_id: &str, key: FeatureKey, value: FeatureValue) {
        self.features
            .entry(unit_id.to_string())
            .or_default()
            .insert(key, value);
    }

    /// Move every value of the `from` feature to `to`.
    pub fn rename_feature(&mut self, from: &FeatureKey, to: &FeatureKey) {
        for features in self.features.values_mut() {
            if let Some(value) = features.remove(from) {
                features.insert(to.clone(), value);
            }
        }
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn features(&self, unit_id: &str) -> Option<&UnitFeatures> {
        self.features.get(unit_id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl QuerySource for Database {
    fn results(&self, chain: &LayerChain) -> Result<ResultTable> {
        let conn = self.conn.lock().expect("database lock poisoned");
        run_chain_query(&conn, chain)
    }

    fn feature_keys(&self, unit_type: &str, tier_prefix: &str) -> Result<Vec<FeatureKey>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT DISTINCT f.tier, f.name
             FROM features f JOIN units u ON u.id = f.unit_id
             WHERE u.unit_type = ?1 AND substr(f.tier, 1, length(?2)) = ?2
             ORDER BY f.tier, f.name",
        )?;

        let keys = stmt
            .query_map((unit_type, tier_prefix), |row| {
                Ok(FeatureKey::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(keys)
    }
}

fn run_chain_query(conn: &Connection, chain: &LayerChain) -> Result<ResultTable> {
    let mut table = ResultTable::new();
    let levels = chain.active_levels();
    if levels.is_empty() {
        return Ok(table);
    }

    let (sql, params) = build_chain_query(chain, &levels)?;
    tracing::debug!("Running chain query over {:?}", levels);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            let mut result = ResultRow::new();
            for (i, level) in levels.iter().enumerate() {
                if let Some(id) = row.get::<_, Option<String>>(i)? {
                    result.ids.insert(*level, id);
                }
            }
            Ok(result)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut feature_stmt = conn.prepare(
        "SELECT tier, name, value_kind, int_value, str_value FROM features WHERE unit_id = ?",
    )?;
    for row in &rows {
        for id in row.ids() {
            if table.features.contains_key(id) {
                continue;
            }
            let features = feature_stmt
                .query_map([id], |r| {
                    Ok((
                        FeatureKey::new(r.get::<_, String>(0)?, r.get::<_, String>(1)?),
                        value_from_columns(&r.get::<_, String>(2)?, r.get(3)?, r.get(4)?),
                    ))
                })?
                .collect::<Result<UnitFeatures, _>>()?;
            table.features.insert(id.to_string(), features);
        }
    }

    tracing::debug!("Chain query returned {} rows", rows.len());
    table.rows = rows;
    Ok(table)
}

fn build_chain_query(chain: &LayerChain, levels: &[Level]) -> Result<(String, Vec<String>)> {
    let mut params = Vec::new();

    let specs: Vec<_> = chain.declared_specs().collect();
    let order_values = vec!["(?, ?, ?)"; specs.len()].join(", ");
    for spec in &specs {
        params.push(spec.unit_type.clone());
        params.push(spec.order.tier.clone());
        params.push(spec.order.name.clone());
    }

    let mut sql = format!(
        "WITH RECURSIVE
         order_keys(unit_type, tier, name) AS (VALUES {order_values}),
         ancestry(descendant, ancestor) AS (
             SELECT id, parent_id FROM units WHERE parent_id IS NOT NULL
             UNION
             SELECT a.descendant, u.parent_id FROM ancestry a
             JOIN units u ON u.id = a.ancestor
             WHERE u.parent_id IS NOT NULL
         ),
         ranked(id, rank) AS (
             SELECT u.id, COALESCE(f.int_value, 0) FROM units u
             LEFT JOIN order_keys k ON k.unit_type = u.unit_type
             LEFT JOIN features f ON f.unit_id = u.id AND f.tier = k.tier AND f.name = k.name
         ),
         doc_order(id, path) AS (
             SELECT r.id, printf('%010d', r.rank) FROM ranked r
             JOIN units u ON u.id = r.id
             WHERE u.parent_id IS NULL
             UNION ALL
             SELECT u.id, d.path || '.' || printf('%010d', r.rank) FROM doc_order d
             JOIN units u ON u.parent_id = d.id
             JOIN ranked r ON r.id = u.id
         )
         SELECT {columns}
         FROM units l0
         JOIN doc_order o0 ON o0.id = l0.id",
        columns = (0..levels.len())
            .map(|i| format!("l{i}.id"))
            .collect::<Vec<_>>()
            .join(", "),
    );

    let mut ordering = vec!["o0.path".to_string()];
    for (i, level) in levels.iter().enumerate().skip(1) {
        let spec = chain
            .spec(*level)
            .ok_or_else(|| FormatError::BrokenChain(level.to_string()))?;
        let parent = spec
            .parent
            .and_then(|p| levels.iter().position(|l| *l == p))
            .ok_or_else(|| FormatError::BrokenChain(level.to_string()))?;

        sql.push_str(&format!(
            "
         LEFT JOIN (
             SELECT u.id AS id, a.ancestor AS anc, o.path AS path FROM units u
             JOIN ancestry a ON a.descendant = u.id
             JOIN doc_order o ON o.id = u.id
             WHERE u.unit_type = ?
         ) l{i} ON l{i}.anc = l{parent}.id"
        ));
        params.push(spec.unit_type.clone());
        ordering.push(format!("l{i}.path"));
    }

    let root = chain
        .spec(levels[0])
        .ok_or_else(|| FormatError::BrokenChain(levels[0].to_string()))?;
    sql.push_str(&format!(
        "
         WHERE l0.unit_type = ?
         ORDER BY {}",
        ordering.join(", ")
    ));
    params.push(root.unit_type.clone());

    Ok((sql, params))
}

/// Decode the `value_kind` / `int_value` / `str_value` columns.
pub(crate) fn value_from_columns(
    kind: &str,
    int_value: Option<i64>,
    str_value: Option<String>,
) -> FeatureValue {
    match ValueKind::from_str(kind) {
        Some(ValueKind::Int) => FeatureValue::Int(int_value.unwrap_or_default()),
        _ => FeatureValue::Str(str_value.unwrap_or_default()),
    }
}
