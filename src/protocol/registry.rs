//! Type registry mapping type tags to variant decoders
//!
//! The registry is assembled once through [`RegistryBuilder`] and frozen into
//! an immutable [`TypeRegistry`]. Nothing mutates it afterwards, so it is
//! shared between connections without locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use super::{
    ArrayMessage, CallMessage, ExceptionMessage, Message, MessageReader, NullMessage,
    ObjectMessage, Payload, PrimitiveMessage, ReleaseMessage, ReturnMessage, StringMessage,
    WireResult,
};

/// Builds a message from its payload; the envelope has already been consumed
pub type DecodeFn = fn(&mut MessageReader<'_>) -> WireResult<Message>;

/// Registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Type tag {tag} registered twice ({existing} and {duplicate})")]
    DuplicateTag {
        tag: u16,
        existing: &'static str,
        duplicate: &'static str,
    },
}

/// One registered variant
#[derive(Clone, Copy)]
pub struct RegistryEntry {
    pub tag: u16,
    pub name: &'static str,
    pub decode: DecodeFn,
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("tag", &self.tag)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn decode_variant<P>(reader: &mut MessageReader<'_>) -> WireResult<Message>
where
    P: Payload + Into<Message>,
{
    P::decode_payload(reader).map(Into::into)
}

/// Collects registrations before the registry is frozen
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: HashMap<u16, RegistryEntry>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a payload type under its own tag
    pub fn register<P>(self) -> Result<Self, RegistryError>
    where
        P: Payload + Into<Message>,
    {
        self.register_entry(P::TAG, P::NAME, decode_variant::<P>)
    }

    /// Register an arbitrary decoder, e.g. to accept a legacy tag
    pub fn register_entry(
        mut self,
        tag: u16,
        name: &'static str,
        decode: DecodeFn,
    ) -> Result<Self, RegistryError> {
        if let Some(existing) = self.entries.get(&tag) {
            return Err(RegistryError::DuplicateTag {
                tag,
                existing: existing.name,
                duplicate: name,
            });
        }
        self.entries.insert(tag, RegistryEntry { tag, name, decode });
        Ok(self)
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable mapping from type tag to variant decoder
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    entries: HashMap<u16, RegistryEntry>,
}

impl TypeRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry holding every built-in variant
    pub fn standard() -> Result<Self, RegistryError> {
        Ok(Self::builder()
            .register::<NullMessage>()?
            .register::<PrimitiveMessage>()?
            .register::<StringMessage>()?
            .register::<ArrayMessage>()?
            .register::<ObjectMessage>()?
            .register::<ReleaseMessage>()?
            .register::<ExceptionMessage>()?
            .register::<CallMessage>()?
            .register::<ReturnMessage>()?
            .build())
    }

    /// Process-wide registry, built on first use
    pub fn global() -> Arc<TypeRegistry> {
        static GLOBAL: OnceLock<Arc<TypeRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| match Self::standard() {
                Ok(registry) => {
                    tracing::debug!(variants = registry.len(), "Message registry initialized");
                    Arc::new(registry)
                }
                Err(e) => panic!("built-in message registry is inconsistent: {e}"),
            })
            .clone()
    }

    pub fn get(&self, tag: u16) -> Option<&RegistryEntry> {
        self.entries.get(&tag)
    }

    pub fn contains(&self, tag: u16) -> bool {
        self.entries.contains_key(&tag)
    }

    pub fn name_of(&self, tag: u16) -> Option<&'static str> {
        self.get(tag).map(|entry| entry.name)
    }

    /// Registered entries ordered by tag
    pub fn entries(&self) -> Vec<&RegistryEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by_key(|entry| entry.tag);
        entries
    }

    pub fn tags(&self) -> Vec<u16> {
        self.entries().into_iter().map(|entry| entry.tag).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::tags;

    #[test]
    fn test_standard_registry_covers_all_tags() {
        let registry = TypeRegistry::standard().unwrap();
        assert_eq!(
            registry.tags(),
            vec![
                tags::NULL,
                tags::PRIMITIVE,
                tags::STRING,
                tags::ARRAY,
                tags::OBJECT,
                tags::RELEASE,
                tags::EXCEPTION,
                tags::CALL,
                tags::RETURN,
            ]
        );
        assert_eq!(registry.name_of(tags::NULL), Some("null"));
        assert!(!registry.contains(999));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let err = TypeRegistry::builder()
            .register::<NullMessage>()
            .unwrap()
            .register_entry(tags::NULL, "legacy-null", |_| Ok(Message::null()))
            .unwrap_err();

        match err {
            RegistryError::DuplicateTag { tag, existing, duplicate } => {
                assert_eq!(tag, tags::NULL);
                assert_eq!(existing, "null");
                assert_eq!(duplicate, "legacy-null");
            }
        }
    }

    #[test]
    fn test_global_is_shared() {
        let a = TypeRegistry::global();
        let b = TypeRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.len(), 9);
    }

    #[test]
    fn test_alias_tag_decodes_to_existing_variant() {
        use crate::protocol::{Codec, DEFAULT_MAGIC};

        let registry = TypeRegistry::builder()
            .register::<NullMessage>()
            .unwrap()
            .register_entry(0x0100, "legacy-null", |_| Ok(Message::null()))
            .unwrap()
            .build();
        let codec = Codec::with_registry(Arc::new(registry));

        let mut bytes = DEFAULT_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0100u16.to_le_bytes());
        let (message, consumed) = codec.decode_slice(&bytes).unwrap();
        assert!(message.is_null());
        assert_eq!(consumed, 4);
    }
}
