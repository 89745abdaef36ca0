//! Descriptor catalog: loading compiled descriptor sets and indexing
//! their message types.
//!
//! A [`Descriptor`] is a named, immutable schema bundle built from a
//! serialized `FileDescriptorSet` (the output of
//! `protoc --descriptor_set_out`). Loading walks every file's top-level
//! and nested message types and builds a flat, sorted, fully-qualified
//! name index. Loading is pure: it either produces a complete catalog or
//! fails with a descriptive error, never a partial one.

use crate::error::{Error, Result};
use bytes::Bytes;
use prost_reflect::{DescriptorPool, MessageDescriptor};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, trace};

/// A loaded, immutable schema bundle
#[derive(Debug, Clone)]
pub struct Descriptor {
    name: String,
    type_names: Vec<String>,
    schema_data: Bytes,
    uploaded_at: SystemTime,
    pool: DescriptorPool,
}

impl Descriptor {
    /// Load a compiled descriptor set.
    ///
    /// `schema_data` must be a serialized `FileDescriptorSet`;
    /// `display_name` is the user-supplied identifier for this bundle.
    pub fn load(schema_data: impl Into<Bytes>, display_name: impl Into<String>) -> Result<Self> {
        let name = display_name.into();
        let schema_data = schema_data.into();

        let pool = DescriptorPool::decode(schema_data.clone())
            .map_err(|e| Error::descriptor_load(&name, e.to_string()))?;

        let mut type_names: Vec<String> = pool
            .all_messages()
            .filter(|m| !m.is_map_entry())
            .map(|m| m.full_name().to_string())
            .collect();
        type_names.sort();

        debug!(
            "loaded descriptor '{}': {} message types from {} bytes",
            name,
            type_names.len(),
            schema_data.len()
        );

        Ok(Self {
            name,
            type_names,
            schema_data,
            uploaded_at: SystemTime::now(),
            pool,
        })
    }

    /// The user-supplied display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All fully-qualified message type names, sorted
    pub fn message_type_names(&self) -> &[String] {
        &self.type_names
    }

    /// Look up a message type by fully-qualified name.
    ///
    /// An absent name is a normal outcome; callers that require presence
    /// surface [`Error::TypeNotFound`] themselves.
    pub fn lookup(&self, type_name: &str) -> Option<MessageDescriptor> {
        self.pool.get_message_by_name(type_name)
    }

    /// Like [`lookup`](Self::lookup) but failing with
    /// [`Error::TypeNotFound`]
    pub fn require(&self, type_name: &str) -> Result<MessageDescriptor> {
        self.lookup(type_name)
            .ok_or_else(|| Error::type_not_found(type_name))
    }

    /// The raw compiled descriptor-set bytes this bundle was loaded from
    pub fn schema_data(&self) -> &[u8] {
        &self.schema_data
    }

    /// When this bundle was loaded
    pub fn uploaded_at(&self) -> SystemTime {
        self.uploaded_at
    }
}

/// Name-keyed memo of loaded descriptors.
///
/// Avoids re-parsing the same compiled schema on every cell decode.
/// Entries are only ever added or wholly replaced, never mutated in
/// place. The cache is an explicit object injected where needed, not
/// ambient global state; its lifetime is the application session.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    entries: HashMap<String, Arc<Descriptor>>,
}

impl DescriptorCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached descriptor for `name`, if loaded
    pub fn get(&self, name: &str) -> Option<Arc<Descriptor>> {
        self.entries.get(name).cloned()
    }

    /// Returns the memoized descriptor for `name`, loading it if absent.
    ///
    /// A name that reappears with different schema bytes replaces the
    /// cached entry, so a re-uploaded schema takes effect immediately.
    pub fn load(&mut self, name: &str, schema_data: &[u8]) -> Result<Arc<Descriptor>> {
        if let Some(existing) = self.entries.get(name) {
            if existing.schema_data() == schema_data {
                trace!("descriptor cache hit: '{}'", name);
                return Ok(Arc::clone(existing));
            }
            debug!("descriptor '{}' changed, reloading", name);
        }

        let descriptor = Arc::new(Descriptor::load(schema_data.to_vec(), name)?);
        self.entries
            .insert(name.to_string(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Removes a descriptor from the cache
    pub fn remove(&mut self, name: &str) -> Option<Arc<Descriptor>> {
        self.entries.remove(name)
    }

    /// Number of cached descriptors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds no descriptors
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{descriptor_set_bytes, two_file_descriptor_set_bytes};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_load_indexes_sorted_full_names() {
        let descriptor = Descriptor::load(descriptor_set_bytes(), "test").unwrap();
        assert_eq!(descriptor.name(), "test");
        assert_eq!(
            descriptor.message_type_names(),
            &[
                "com.example.MsgAlpha".to_string(),
                "com.example.MsgBeta".to_string(),
                "com.example.MsgKinds".to_string(),
                "com.example.MsgText".to_string(),
                "com.example.Outer".to_string(),
                "com.example.Outer.Inner".to_string(),
            ]
        );
    }

    #[test]
    fn test_load_walks_all_files() {
        let descriptor = Descriptor::load(two_file_descriptor_set_bytes(), "multi").unwrap();
        assert!(descriptor
            .message_type_names()
            .iter()
            .any(|n| n.starts_with("com.example.")));
        assert!(descriptor
            .message_type_names()
            .iter()
            .any(|n| n.starts_with("org.other.")));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let err = Descriptor::load(vec![0xFF, 0xFF, 0xFF], "bad").unwrap_err();
        assert!(matches!(err, Error::DescriptorLoad { .. }));
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_lookup_and_require() {
        let descriptor = Descriptor::load(descriptor_set_bytes(), "test").unwrap();
        assert!(descriptor.lookup("com.example.MsgText").is_some());
        assert!(descriptor.lookup("com.example.Nope").is_none());
        assert!(matches!(
            descriptor.require("com.example.Nope"),
            Err(Error::TypeNotFound { .. })
        ));
    }

    #[test]
    fn test_cache_memoizes_by_name() {
        let mut cache = DescriptorCache::new();
        let bytes = descriptor_set_bytes();

        let first = cache.load("schemas", &bytes).unwrap();
        let second = cache.load("schemas", &bytes).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_replaces_on_changed_bytes() {
        let mut cache = DescriptorCache::new();

        let first = cache.load("schemas", &descriptor_set_bytes()).unwrap();
        let second = cache
            .load("schemas", &two_file_descriptor_set_bytes())
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_ne!(
            first.message_type_names().len(),
            second.message_type_names().len()
        );
    }

    #[test]
    fn test_cache_remove() {
        let mut cache = DescriptorCache::new();
        cache.load("schemas", &descriptor_set_bytes()).unwrap();
        assert!(cache.remove("schemas").is_some());
        assert!(cache.is_empty());
        assert!(cache.get("schemas").is_none());
    }
}
