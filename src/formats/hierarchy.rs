//! Import of nested unit markup into the feature store.
//!
//! Elements whose tag is a [`Level`] become units. Each unit is identified by
//! its identifier attribute, or failing that by `"{parent} {index}"`, and gets
//! a `meta:index` feature counting from 1 among its siblings. Annotation items
//! directly inside a unit become string features on it. Any other element is
//! a transparent wrapper: its children are imported as if they sat directly in
//! the enclosing unit, with their own count starting again at 1.

use std::collections::HashSet;

use anyhow::Result;

use super::markup::MarkupNode;
use super::MarkupSchema;
use crate::db::FeatureStore;
use crate::error::FormatError;
use crate::models::{FeatureValue, Level, INDEX_FEATURE, META_TIER};

/// Substituted for a missing item attribute.
const MISSING: &str = "None";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub units: usize,
    pub features: usize,
}

enum NodeKind {
    Unit(Level),
    Item,
    Other,
}

pub struct HierarchicalImporter<'a, S: FeatureStore + ?Sized> {
    schema: &'a MarkupSchema,
    store: &'a mut S,
    seen: HashSet<String>,
    stats: ImportStats,
}

impl<'a, S: FeatureStore + ?Sized> HierarchicalImporter<'a, S> {
    pub fn new(schema: &'a MarkupSchema, store: &'a mut S) -> Self {
        Self {
            schema,
            store,
            seen: HashSet::new(),
            stats: ImportStats::default(),
        }
    }

    /// Import everything below `root`.
    ///
    /// A synthesized identity that matches any identity already produced by
    /// this import, or one already present in the store, is a
    /// [`FormatError::IdentityCollision`]. A repeated explicit identifier
    /// updates the earlier unit in place.
    pub fn run<N: MarkupNode>(mut self, root: &N) -> Result<ImportStats> {
        self.walk(root, None, 1)?;
        Ok(self.stats)
    }

    fn classify<N: MarkupNode>(&self, node: &N) -> NodeKind {
        match node.tag() {
            Some(tag) if tag == self.schema.item_tag => NodeKind::Item,
            Some(tag) => Level::from_tag(tag).map_or(NodeKind::Other, NodeKind::Unit),
            None => NodeKind::Other,
        }
    }

    fn walk<N: MarkupNode>(&mut self, node: &N, parent: Option<&str>, index: usize) -> Result<()> {
        match self.classify(node) {
            NodeKind::Unit(level) => self.import_unit(node, level, parent, index),
            NodeKind::Item | NodeKind::Other => {
                for (i, child) in node.children().iter().enumerate() {
                    self.walk(child, parent, i + 1)?;
                }
                Ok(())
            }
        }
    }

    fn import_unit<N: MarkupNode>(
        &mut self,
        node: &N,
        level: Level,
        parent: Option<&str>,
        index: usize,
    ) -> Result<()> {
        let (id, synthesized) = match node.attribute(self.schema.id_attribute) {
            Some(id) => (id, false),
            None => (format!("{} {}", parent.unwrap_or(""), index), true),
        };

        let first = self.seen.insert(id.clone());
        if synthesized && (!first || self.store.has_unit(&id)?) {
            return Err(FormatError::IdentityCollision(id).into());
        }
        if !first {
            tracing::warn!(id = %id, "Identifier repeated in document, updating earlier unit");
        }

        self.store.set_type(&id, level.as_str())?;
        if let Some(parent) = parent {
            self.store.set_parent(&id, parent)?;
        }
        self.store
            .set_feature(&id, META_TIER, INDEX_FEATURE, &FeatureValue::Int(index as i64))?;
        if first {
            self.stats.units += 1;
        }
        self.stats.features += 1;

        let mut child_index = 0;
        for child in node.children() {
            match self.classify(&child) {
                NodeKind::Item => self.import_item(&id, &child)?,
                NodeKind::Unit(_) | NodeKind::Other => {
                    child_index += 1;
                    self.walk(&child, Some(&id), child_index)?;
                }
            }
        }

        Ok(())
    }

    fn import_item<N: MarkupNode>(&mut self, unit_id: &str, item: &N) -> Result<()> {
        let variant = item
            .attribute(self.schema.variant_attribute)
            .unwrap_or_else(|| MISSING.to_string());
        let name = item
            .attribute(self.schema.name_attribute)
            .unwrap_or_else(|| MISSING.to_string());
        let value = item.text().unwrap_or_default();

        let tier = format!("{}/{}", self.schema.tier_prefix, variant);
        self.store
            .set_feature(unit_id, &tier, &name, &FeatureValue::Str(value))?;
        self.stats.features += 1;
        Ok(())
    }
}
