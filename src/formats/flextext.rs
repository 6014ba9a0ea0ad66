//! SIL FieldWorks Language Explorer glossed text (FlexText).
//!
//! Import creates units of type `interlinear-text`, `paragraph`, `phrase`,
//! `word` and `morph` from the elements of the same names. Each gets a
//! `meta:index` feature counting from 1 within its parent. `<item>` elements
//! become string features in tier `FlexText/{lang}`, named by `type`, holding
//! the item text.
//!
//! Export writes the same shape back under `<document version="2">`,
//! restricted to the levels left after root selection and skipping. Each
//! level reads units of its mapped stored type, and renamed features are
//! written under their exported names.

use std::collections::BTreeMap;

use anyhow::Result;

use super::hierarchy::{HierarchicalImporter, ImportStats};
use super::markup;
use super::tree::TreeBuilder;
use super::{Format, MarkupSchema, Reader, Writer};
use crate::chain::LayerChain;
use crate::db::{FeatureStore, QuerySource};
use crate::error::FormatError;
use crate::models::{FeatureKey, Level};

pub const IDENTIFIER: &str = "flextext";

pub const SCHEMA: MarkupSchema = MarkupSchema {
    id_attribute: "guid",
    item_tag: "item",
    tier_prefix: "FlexText",
    variant_attribute: "lang",
    name_attribute: "type",
};

const DESCRIPTION: &str = "SIL Fieldworks Language Explorer XML glossed text";

pub struct FlexTextReader;

impl Format for FlexTextReader {
    fn identifier(&self) -> &'static str {
        IDENTIFIER
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }
}

impl Reader for FlexTextReader {
    fn read(&self, source: &str, store: &mut dyn FeatureStore) -> Result<ImportStats> {
        let document = markup::parse(source);
        HierarchicalImporter::new(&SCHEMA, store).run(&document)
    }
}

pub struct FlexTextWriter;

impl Format for FlexTextWriter {
    fn identifier(&self) -> &'static str {
        IDENTIFIER
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }
}

impl Writer for FlexTextWriter {
    fn layer_chain(&self) -> LayerChain {
        LayerChain::nested(&Level::ALL, FeatureKey::index())
    }

    fn write(&self, source: &dyn QuerySource, chain: &LayerChain) -> Result<String> {
        let levels = chain.active_levels();

        let mut keys = BTreeMap::new();
        for &level in &levels {
            let spec = chain
                .spec(level)
                .ok_or_else(|| FormatError::BrokenChain(level.to_string()))?;
            let mut level_keys = source.feature_keys(&spec.unit_type, SCHEMA.tier_prefix)?;
            level_keys.extend(
                chain
                    .feature_map()
                    .keys()
                    .filter(|key| key.tier.starts_with(SCHEMA.tier_prefix))
                    .cloned(),
            );
            level_keys.sort();
            level_keys.dedup();
            keys.insert(level, level_keys);
        }

        let mut table = source.results(chain)?;
        for (exported, stored) in chain.feature_map() {
            table.rename_feature(stored, exported);
        }
        tracing::debug!("Building FlexText tree from {} rows", table.len());

        let root = markup::element("document", &[("version", "2")]);
        TreeBuilder::new(&SCHEMA, levels, keys).build(&root, &table);
        markup::pretty_print(&root, 0);
        markup::to_xml(&root)
    }
}
