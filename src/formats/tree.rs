//! Building an element tree from chain query results.

use std::collections::{BTreeMap, HashMap};

use markup5ever_rcdom::Handle;

use super::markup;
use super::MarkupSchema;
use crate::db::{ResultTable, UnitFeatures};
use crate::models::{FeatureKey, Level};

/// Turns result rows into nested unit elements.
///
/// Every unit element is created once, the first time a row mentions it, and
/// remembered together with the grouping container its children go into.
/// Rows with no unit at some level get a placeholder element keyed by the
/// level name; those stay empty and disappear in [`markup::pretty_print`].
pub struct TreeBuilder<'a> {
    schema: &'a MarkupSchema,
    levels: Vec<Level>,
    keys: BTreeMap<Level, Vec<FeatureKey>>,
    memo: HashMap<String, (Handle, Option<Handle>)>,
}

impl<'a> TreeBuilder<'a> {
    /// `levels` are the active levels outermost first; `keys` holds the
    /// sorted feature keys to emit as items for each level.
    pub fn new(
        schema: &'a MarkupSchema,
        levels: Vec<Level>,
        keys: BTreeMap<Level, Vec<FeatureKey>>,
    ) -> Self {
        Self {
            schema,
            levels,
            keys,
            memo: HashMap::new(),
        }
    }

    /// Append the tree for `table` under `root`.
    pub fn build(mut self, root: &Handle, table: &ResultTable) {
        for row in table.rows() {
            let mut parent = Some(root.clone());

            for (depth, &level) in self.levels.iter().enumerate() {
                let id = row.id_for(level);
                if let Some((_, container)) = self.memo.get(id) {
                    parent = container.clone();
                    continue;
                }

                let Some(target) = parent.take() else {
                    break;
                };
                let elem = markup::element(level.as_str(), &[]);
                markup::append(&target, elem.clone());

                let container = self.levels.get(depth + 1).map(|next| match next.group_tag() {
                    Some(tag) => {
                        let group = markup::element(tag, &[]);
                        markup::append(&elem, group.clone());
                        group
                    }
                    None => elem.clone(),
                });

                self.emit_items(&elem, level, table.features(id));
                self.memo
                    .insert(id.to_string(), (elem, container.clone()));
                parent = container;
            }
        }
    }

    fn emit_items(&self, elem: &Handle, level: Level, features: Option<&UnitFeatures>) {
        let (Some(keys), Some(features)) = (self.keys.get(&level), features) else {
            return;
        };

        for key in keys {
            let Some(value) = features.get(key) else {
                continue;
            };
            let Some(variant) = key
                .tier
                .strip_prefix(self.schema.tier_prefix)
                .and_then(|rest| rest.strip_prefix('/'))
            else {
                continue;
            };

            let item = markup::element(
                self.schema.item_tag,
                &[
                    (self.schema.variant_attribute, variant),
                    (self.schema.name_attribute, &key.name),
                ],
            );
            markup::append(&item, markup::text(&value.to_string()));
            markup::append(elem, item);
        }
    }
}
