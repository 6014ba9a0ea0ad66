//! Layer-chain planning for exports.
//!
//! A writer declares which hierarchy levels it exports, each with its
//! structural type, its parent level and the feature that orders siblings.
//! Before querying, the chain is reshaped by the export configuration:
//!
//! - **type and feature maps** point levels and features at differently
//!   named stored types and features;
//! - **root selection** drops every level above the requested root;
//! - **skip elision** drops the named levels.
//!
//! Root selection and skipping use the same removal step, which hands the removed level's parent to
//! the nearest still-active level below it. The active chain therefore stays
//! a single connected path however many levels are removed.

use std::collections::BTreeMap;

use crate::config::ExportConfig;
use crate::error::FormatError;
use crate::models::{FeatureKey, Level};

/// Declaration of one exported level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelSpec {
    /// Stored unit type selected at this level.
    pub unit_type: String,
    /// Active level above this one; `None` for the root.
    pub parent: Option<Level>,
    /// Feature that orders siblings at this level.
    pub order: FeatureKey,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerChain {
    order: Vec<Level>,
    declared: BTreeMap<Level, LevelSpec>,
    active: BTreeMap<Level, LevelSpec>,
    /// Stored feature read for each renamed exported feature.
    features: BTreeMap<FeatureKey, FeatureKey>,
}

impl LayerChain {
    /// An empty chain over the given fixed level order.
    pub fn new(order: &[Level]) -> Self {
        Self {
            order: order.to_vec(),
            declared: BTreeMap::new(),
            active: BTreeMap::new(),
            features: BTreeMap::new(),
        }
    }

    /// A chain where every level is active and nested in the previous one.
    pub fn nested(order: &[Level], ordering: FeatureKey) -> Self {
        let mut chain = Self::new(order);
        let mut parent = None;
        for &level in order {
            chain.declare(
                level,
                LevelSpec {
                    unit_type: level.as_str().to_string(),
                    parent,
                    order: ordering.clone(),
                },
            );
            parent = Some(level);
        }
        chain
    }

    /// Declare a level as active. Levels outside the fixed order are ignored.
    pub fn declare(&mut self, level: Level, spec: LevelSpec) {
        if !self.order.contains(&level) {
            tracing::warn!("Level '{}' is not part of the chain order", level);
            return;
        }
        self.declared.insert(level, spec.clone());
        self.active.insert(level, spec);
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn spec(&self, level: Level) -> Option<&LevelSpec> {
        self.active.get(&level)
    }

    pub fn is_active(&self, level: Level) -> bool {
        self.active.contains_key(&level)
    }

    /// Every level as originally declared, including removed ones.
    pub fn declared_specs(&self) -> impl Iterator<Item = &LevelSpec> {
        self.declared.values()
    }

    /// Active levels, outermost first.
    pub fn active_levels(&self) -> Vec<Level> {
        self.order
            .iter()
            .copied()
            .filter(|level| self.active.contains_key(level))
            .collect()
    }

    /// Read `level` from units stored as `unit_type`.
    pub fn map_type(&mut self, level: Level, unit_type: &str) {
        for specs in [&mut self.declared, &mut self.active] {
            if let Some(spec) = specs.get_mut(&level) {
                spec.unit_type = unit_type.to_string();
            }
        }
    }

    /// Read the exported feature `exported` from the stored feature `stored`.
    /// Ordering keys naming `exported` follow the rename.
    pub fn map_feature(&mut self, exported: FeatureKey, stored: FeatureKey) {
        for specs in [&mut self.declared, &mut self.active] {
            for spec in specs.values_mut().filter(|spec| spec.order == exported) {
                spec.order = stored.clone();
            }
        }
        self.features.insert(exported, stored);
    }

    /// Renamed features, exported key to stored key.
    pub fn feature_map(&self) -> &BTreeMap<FeatureKey, FeatureKey> {
        &self.features
    }

    /// Make `root` the outermost level by removing everything above it.
    pub fn select_root(&mut self, root: &str) -> Result<(), FormatError> {
        let level = Level::from_name(root)
            .filter(|level| self.order.contains(level))
            .ok_or_else(|| FormatError::UnknownRoot(root.to_string()))?;

        let above: Vec<Level> = self
            .order
            .iter()
            .copied()
            .take_while(|l| *l != level)
            .collect();
        for l in above {
            self.remove_level(l);
        }

        Ok(())
    }

    /// Remove each named level. Names that are not active are ignored.
    pub fn skip<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            let name = name.as_ref();
            match Level::from_name(name) {
                Some(level) => self.remove_level(level),
                None => tracing::warn!("Ignoring unknown level '{}' in skip list", name),
            }
        }
    }

    /// Remove `level` from the active chain, re-parenting the nearest active
    /// level below it onto the removed level's parent.
    pub fn remove_level(&mut self, level: Level) {
        let Some(removed) = self.active.remove(&level) else {
            return;
        };

        let next = self
            .order
            .iter()
            .position(|l| *l == level)
            .and_then(|pos| {
                self.order[pos + 1..]
                    .iter()
                    .copied()
                    .find(|l| self.active.contains_key(l))
            });

        if let Some(next) = next {
            if let Some(spec) = self.active.get_mut(&next) {
                spec.parent = removed.parent;
            }
        }

        tracing::debug!(
            "Removed level '{}', active chain is now {:?}",
            level,
            self.active_levels()
        );
    }

    /// Apply the type and feature maps, the root selection and then the
    /// skip list.
    pub fn configure(&mut self, config: &ExportConfig) -> Result<(), FormatError> {
        for (name, unit_type) in &config.type_map {
            match Level::from_name(name) {
                Some(level) => self.map_type(level, unit_type),
                None => tracing::warn!("Ignoring unknown level '{}' in type map", name),
            }
        }
        for (exported, stored) in &config.feat_map {
            let exported = FeatureKey::parse(exported)
                .ok_or_else(|| FormatError::InvalidFeatureKey(exported.clone()))?;
            let stored = FeatureKey::parse(stored)
                .ok_or_else(|| FormatError::InvalidFeatureKey(stored.clone()))?;
            self.map_feature(exported, stored);
        }
        if let Some(root) = &config.root {
            self.select_root(root)?;
        }
        self.skip(config.skip.as_slice());
        Ok(())
    }

    /// Check that the active levels form one path: the first has no parent
    /// and every other names the active level directly before it.
    pub fn validate(&self) -> Result<(), FormatError> {
        let mut previous = None;
        for level in self.active_levels() {
            let parent = self.active[&level].parent;
            if parent != previous {
                return Err(FormatError::BrokenChain(level.to_string()));
            }
            previous = Some(level);
        }
        Ok(())
    }
}
