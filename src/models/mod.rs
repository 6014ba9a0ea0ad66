//! Domain models for the interlinear store.
//!
//! # Core Concepts
//!
//! - [`Level`]: The fixed hierarchy vocabulary, outermost first:
//!   `interlinear-text` → `paragraph` → `phrase` → `word` → `morph`.
//! - [`Unit`]: One node of the relational hierarchy. A unit has a type, at most
//!   one parent, and an ordering key (`meta:index`) among its siblings.
//! - [`Feature`]: A `(tier, name)` → typed value annotation attached to one unit.
//!   Values are either integers or strings ([`FeatureValue`]).
//!
//! Units and features persist in the store across conversions. Exported trees
//! are transient and never modelled here.

mod feature;
mod level;
mod unit;

pub use feature::*;
pub use level::*;
pub use unit::*;
