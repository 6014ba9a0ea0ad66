//! Format registries.
//!
//! Readers and writers are registered explicitly at startup. An identifier can
//! be claimed once; a second registration under it is an error.

use std::collections::HashMap;

use super::flextext::{FlexTextReader, FlexTextWriter};
use super::{Format, Reader, Writer};
use crate::error::FormatError;

/// Formats of one kind, by identifier.
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    entries: HashMap<String, Box<T>>,
}

pub type WriterRegistry = Registry<dyn Writer>;
pub type ReaderRegistry = Registry<dyn Reader>;

impl<T: Format + ?Sized> Registry<T> {
    /// An empty registry. `kind` names its entries in error messages.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, entry: Box<T>) -> Result<(), FormatError> {
        let identifier = entry.identifier();
        if self.entries.contains_key(identifier) {
            return Err(FormatError::DuplicateIdentifier {
                kind: self.kind,
                identifier: identifier.to_string(),
            });
        }
        tracing::debug!("Registered {} '{}'", self.kind, identifier);
        self.entries.insert(identifier.to_string(), entry);
        Ok(())
    }

    pub fn get(&self, identifier: &str) -> Result<&T, FormatError> {
        self.entries
            .get(identifier)
            .map(|entry| entry.as_ref())
            .ok_or_else(|| FormatError::UnknownFormat {
                kind: self.kind,
                identifier: identifier.to_string(),
            })
    }

    pub fn has(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut identifiers: Vec<_> = self.entries.keys().map(String::as_str).collect();
        identifiers.sort_unstable();
        identifiers
    }
}

impl Registry<dyn Writer> {
    /// A registry holding the built-in writers.
    pub fn with_defaults() -> Result<Self, FormatError> {
        let mut registry = Self::new("writer");
        registry.register(Box::new(FlexTextWriter))?;
        Ok(registry)
    }
}

impl Registry<dyn Reader> {
    /// A registry holding the built-in readers.
    pub fn with_defaults() -> Result<Self, FormatError> {
        let mut registry = Self::new("reader");
        registry.register(Box::new(FlexTextReader))?;
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::LayerChain;
    use crate::db::QuerySource;
    use anyhow::Result;

    struct TestWriter(&'static str);

    impl Format for TestWriter {
        fn identifier(&self) -> &'static str {
            self.0
        }
    }

    impl Writer for TestWriter {
        fn write(&self, _source: &dyn QuerySource, _chain: &LayerChain) -> Result<String> {
            Ok("test output".to_string())
        }
    }

    #[test]
    fn test_registry_register_and_get() {
        let mut registry = WriterRegistry::new("writer");
        registry.register(Box::new(TestWriter("test"))).unwrap();

        assert!(registry.has("test"));
        assert_eq!(registry.get("test").unwrap().identifier(), "test");
    }

    #[test]
    fn test_registry_rejects_duplicate_identifier() {
        let mut registry = WriterRegistry::new("writer");
        registry.register(Box::new(TestWriter("test"))).unwrap();

        let err = registry.register(Box::new(TestWriter("test"))).unwrap_err();
        assert_eq!(
            err,
            FormatError::DuplicateIdentifier {
                kind: "writer",
                identifier: "test".to_string(),
            }
        );
        assert_eq!(registry.identifiers(), vec!["test"]);
    }

    #[test]
    fn test_registry_get_nonexistent() {
        let registry = WriterRegistry::new("writer");
        match registry.get("nonexistent") {
            Err(FormatError::UnknownFormat { kind, identifier }) => {
                assert_eq!(kind, "writer");
                assert_eq!(identifier, "nonexistent");
            }
            _ => panic!("Expected UnknownFormat error"),
        }
    }

    #[test]
    fn test_registry_identifiers_are_sorted() {
        let mut registry = WriterRegistry::new("writer");
        registry.register(Box::new(TestWriter("zeta"))).unwrap();
        registry.register(Box::new(TestWriter("alpha"))).unwrap();

        assert_eq!(registry.identifiers(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_registry_with_defaults() {
        let writers = WriterRegistry::with_defaults().unwrap();
        let readers = ReaderRegistry::with_defaults().unwrap();

        assert!(writers.has("flextext"));
        assert!(readers.has("flextext"));
    }

    #[test]
    fn test_default_writer_cannot_be_registered_twice() {
        let mut writers = WriterRegistry::with_defaults().unwrap();
        let err = writers.register(Box::new(TestWriter("flextext"))).unwrap_err();
        assert!(matches!(err, FormatError::DuplicateIdentifier { .. }));
    }
}
