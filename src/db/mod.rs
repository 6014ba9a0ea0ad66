mod query;
mod schema;

pub use query::{QuerySource, ResultRow, ResultTable, UnitFeatures};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;

use crate::models::*;

/// Upsert interface that importers write through.
///
/// Every operation is idempotent: repeating an identical call leaves the
/// store unchanged.
pub trait FeatureStore {
    /// Create the unit if needed and set its type.
    fn set_type(&mut self, unit_id: &str, unit_type: &str) -> Result<()>;

    /// Attach an existing unit to an existing parent.
    fn set_parent(&mut self, unit_id: &str, parent_id: &str) -> Result<()>;

    /// Create or replace the value of feature `tier:name` on a unit.
    fn set_feature(
        &mut self,
        unit_id: &str,
        tier: &str,
        name: &str,
        value: &FeatureValue,
    ) -> Result<()>;

    fn has_unit(&self, unit_id: &str) -> Result<bool>;
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "interlinear")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("interlinear.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    /// Run `f` against a store backed by one transaction.
    ///
    /// The transaction commits when `f` succeeds and rolls back when it
    /// returns an error, so a failed import leaves no units behind.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn FeatureStore) -> Result<T>,
    {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        let out = {
            let mut store = SqlStore { conn: &*tx };
            f(&mut store)?
        };
        tx.commit()?;
        Ok(out)
    }

    // ============================================================
    // Unit operations
    // ============================================================

    pub fn get_unit(&self, id: &str) -> Result<Option<Unit>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!("{} WHERE u.id = ?", UNIT_SELECT))?;

        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(unit_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_all_units(&self) -> Result<Vec<Unit>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!("{} ORDER BY f.int_value, u.id", UNIT_SELECT))?;

        let units = stmt
            .query_map([], unit_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(units)
    }

    /// Direct children of a unit in sibling order.
    pub fn get_children(&self, parent_id: &str) -> Result<Vec<Unit>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "{} WHERE u.parent_id = ? ORDER BY f.int_value, u.id",
            UNIT_SELECT
        ))?;

        let units = stmt
            .query_map([parent_id], unit_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(units)
    }

    pub fn count_units(&self) -> Result<usize> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM units", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn get_unit_tree(&self) -> Result<Vec<UnitTreeNode>> {
        let units = self.get_all_units()?;

        // Group units by parent_id, keeping sibling order from the query
        let mut children_map: HashMap<Option<String>, Vec<Unit>> = HashMap::new();
        for unit in units {
            children_map
                .entry(unit.parent_id.clone())
                .or_default()
                .push(unit);
        }

        fn build_subtree(
            parent_id: Option<String>,
            children_map: &HashMap<Option<String>, Vec<Unit>>,
        ) -> Vec<UnitTreeNode> {
            children_map
                .get(&parent_id)
                .map(|units| {
                    units
                        .iter()
                        .map(|u| UnitTreeNode {
                            unit: u.clone(),
                            children: build_subtree(Some(u.id.clone()), children_map),
                        })
                        .collect()
                })
                .unwrap_or_default()
        }

        Ok(build_subtree(None, &children_map))
    }

    // ============================================================
    // Feature operations
    // ============================================================

    pub fn get_features(&self, unit_id: &str) -> Result<Vec<Feature>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT unit_id, tier, name, value_kind, int_value, str_value
             FROM features WHERE unit_id = ? ORDER BY tier, name",
        )?;

        let features = stmt
            .query_map([unit_id], |row| {
                Ok(Feature {
                    unit_id: row.get(0)?,
                    key: FeatureKey::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
                    value: query::value_from_columns(
                        &row.get::<_, String>(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(features)
    }

    pub fn get_feature(&self, unit_id: &str, key: &FeatureKey) -> Result<Option<FeatureValue>> {
        Ok(self
            .get_features(unit_id)?
            .into_iter()
            .find(|f| &f.key == key)
            .map(|f| f.value))
    }
}

impl FeatureStore for Database {
    fn set_type(&mut self, unit_id: &str, unit_type: &str) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        SqlStore { conn: &conn }.set_type(unit_id, unit_type)
    }

    fn set_parent(&mut self, unit_id: &str, parent_id: &str) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        SqlStore { conn: &conn }.set_parent(unit_id, parent_id)
    }

    fn set_feature(
        &mut self,
        unit_id: &str,
        tier: &str,
        name: &str,
        value: &FeatureValue,
    ) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        SqlStore { conn: &conn }.set_feature(unit_id, tier, name, value)
    }

    fn has_unit(&self, unit_id: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        SqlStore { conn: &conn }.has_unit(unit_id)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

/// Store operations over a borrowed connection or open transaction.
struct SqlStore<'c> {
    conn: &'c Connection,
}

impl FeatureStore for SqlStore<'_> {
    fn set_type(&mut self, unit_id: &str, unit_type: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO units (id, unit_type, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET unit_type = excluded.unit_type",
            (unit_id, unit_type, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    fn set_parent(&mut self, unit_id: &str, parent_id: &str) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE units SET parent_id = ?2 WHERE id = ?1",
            (unit_id, parent_id),
        )?;
        if rows == 0 {
            anyhow::bail!("Unit not found: {}", unit_id);
        }
        Ok(())
    }

    fn set_feature(
        &mut self,
        unit_id: &str,
        tier: &str,
        name: &str,
        value: &FeatureValue,
    ) -> Result<()> {
        let (int_value, str_value) = match value {
            FeatureValue::Int(v) => (Some(*v), None),
            FeatureValue::Str(s) => (None, Some(s.as_str())),
        };

        self.conn.execute(
            "INSERT INTO features (unit_id, tier, name, value_kind, int_value, str_value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(unit_id, tier, name) DO UPDATE SET
                value_kind = excluded.value_kind,
                int_value = excluded.int_value,
                str_value = excluded.str_value",
            (
                unit_id,
                tier,
                name,
                value.kind().as_str(),
                int_value,
                str_value,
            ),
        )?;
        Ok(())
    }

    fn has_unit(&self, unit_id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM units WHERE id = ?",
            [unit_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

const UNIT_SELECT: &str = "SELECT u.id, u.unit_type, u.parent_id, f.int_value, u.created_at
     FROM units u
     LEFT JOIN features f ON f.unit_id = u.id AND f.tier = 'meta' AND f.name = 'index'";

fn unit_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Unit> {
    Ok(Unit {
        id: row.get(0)?,
        unit_type: row.get(1)?,
        parent_id: row.get(2)?,
        index: row.get(3)?,
        created_at: parse_datetime(row.get::<_, String>(4)?),
    })
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
