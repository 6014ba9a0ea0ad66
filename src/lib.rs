//! Conversion of interlinear glossed text between markup formats and a
//! relational feature store.
//!
//! Documents are imported into a SQLite store of [`models::Unit`]s and their
//! features, and exported again by querying the store along a
//! [`chain::LayerChain`] that may be re-rooted or have levels skipped.

pub mod chain;
pub mod config;
pub mod db;
pub mod error;
pub mod formats;
pub mod models;
pub mod render;
