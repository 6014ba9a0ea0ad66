//! Interchange formats and the conversion pipelines.
//!
//! A [`Reader`] imports a document into the feature store; a [`Writer`]
//! exports from it. Both are looked up by identifier in a [`Registry`]
//! populated at startup.
//!
//! Export runs in fixed steps: look up the writer, reshape its layer chain
//! with the export configuration, validate it, render the whole document in
//! memory, and only then write it out. Any failure before the last step leaves
//! the output untouched.

pub mod flextext;
pub mod hierarchy;
pub mod markup;
pub mod registry;
pub mod tree;

pub use hierarchy::{HierarchicalImporter, ImportStats};
pub use registry::{ReaderRegistry, Registry, WriterRegistry};

use std::io::Write;

use anyhow::{Context, Result};

use crate::chain::LayerChain;
use crate::config::ExportConfig;
use crate::db::{Database, FeatureStore, QuerySource};
use crate::error::FormatError;

/// Anything registered under an identifier.
pub trait Format {
    fn identifier(&self) -> &'static str;

    fn description(&self) -> &'static str {
        ""
    }
}

pub trait Reader: Format {
    /// Import `source`, writing units and features through `store`.
    fn read(&self, source: &str, store: &mut dyn FeatureStore) -> Result<ImportStats>;
}

pub trait Writer: Format {
    /// The levels this writer exports. Writers returning an empty chain skip
    /// planning and are expected not to query.
    fn layer_chain(&self) -> LayerChain {
        LayerChain::default()
    }

    /// Reshape the chain before querying. The default applies the root and
    /// skip options.
    fn pre_query(&self, chain: &mut LayerChain, config: &ExportConfig) -> Result<(), FormatError> {
        chain.configure(config)
    }

    /// Render the complete output document.
    fn write(&self, source: &dyn QuerySource, chain: &LayerChain) -> Result<String>;
}

/// Names the markup vocabulary shared by a format's reader and writer.
#[derive(Debug, Clone)]
pub struct MarkupSchema {
    /// Attribute holding a unit's identity.
    pub id_attribute: &'static str,
    /// Tag of annotation items.
    pub item_tag: &'static str,
    /// Items live in tiers named `{tier_prefix}/{variant}`.
    pub tier_prefix: &'static str,
    pub variant_attribute: &'static str,
    pub name_attribute: &'static str,
}

/// Import `source` in the given format. Runs in one transaction: a failed
/// import stores nothing.
pub fn import(
    readers: &ReaderRegistry,
    db: &Database,
    format: &str,
    source: &str,
) -> Result<ImportStats> {
    let reader = readers.get(format)?;
    tracing::info!("Importing {} document ({} bytes)", format, source.len());

    let stats = db.transaction(|store| reader.read(source, store))?;

    tracing::info!(
        "Imported {} units with {} features",
        stats.units,
        stats.features
    );
    Ok(stats)
}

/// Export the store in the given format to `out`.
pub fn export<W: Write>(
    writers: &WriterRegistry,
    source: &dyn QuerySource,
    format: &str,
    config: &ExportConfig,
    out: &mut W,
) -> Result<()> {
    let writer = writers.get(format)?;

    let mut chain = writer.layer_chain();
    if !chain.is_empty() {
        writer.pre_query(&mut chain, config)?;
        chain.validate()?;
        tracing::debug!("Exporting levels {:?}", chain.active_levels());
    }

    let document = writer.write(source, &chain)?;
    out.write_all(document.as_bytes())
        .context("Failed to write export output")?;
    out.flush().context("Failed to flush export output")?;

    tracing::info!("Exported {} document ({} bytes)", format, document.len());
    Ok(())
}
