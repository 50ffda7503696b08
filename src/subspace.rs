use crate::tuple::{self, Element, TupleError};
use crate::types::Key;

/// A byte-prefix-delimited partition of the key space.
///
/// Keys packed through a subspace carry its prefix, so a range scan over one
/// subspace never observes keys that belong to a sibling. Nested subspaces are
/// built by appending a packed tuple element to the parent prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subspace {
    prefix: Key,
}

impl Subspace {
    /// Wraps a raw prefix, normally one handed out by the store's directory
    /// service.
    pub fn new(prefix: impl Into<Key>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Derives a child subspace scoped by one tuple element.
    pub fn sub(&self, element: impl Into<Element>) -> Subspace {
        let mut prefix = self.prefix.clone();
        prefix.extend_from_slice(&tuple::pack(&[element.into()]));
        Subspace { prefix }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Encodes a tuple into a key inside this subspace.
    pub fn pack(&self, elements: &[Element]) -> Key {
        let mut key = self.prefix.clone();
        key.extend_from_slice(&tuple::pack(elements));
        key
    }

    /// Decodes a key produced by [`Subspace::pack`], verifying the prefix.
    pub fn unpack(&self, key: &[u8]) -> Result<Vec<Element>, TupleError> {
        let rest = key
            .strip_prefix(self.prefix.as_slice())
            .ok_or(TupleError::PrefixMismatch)?;
        tuple::unpack(rest)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key.starts_with(&self.prefix)
    }

    /// Half-open key range covering every tuple packed under this subspace.
    ///
    /// Packed elements always start with a type code above 0x00 and below
    /// 0xFF, so `prefix+0x00 .. prefix+0xFF` brackets exactly the keys this
    /// subspace can produce.
    pub fn range(&self) -> (Key, Key) {
        let mut begin = self.prefix.clone();
        begin.push(0x00);
        let mut end = self.prefix.clone();
        end.push(0xff);
        (begin, end)
    }
}
