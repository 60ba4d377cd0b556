//! Qualifier Buffers
//!
//! A qualifier is side-channel input that some properties consume alongside
//! the request (a class-id filter for `ownedObjects`, an item id for a
//! selector's `itemName`, a UID string for the `translateUIDTo*` family).

use crate::types::{decode_slice, encode_slice, Scalar};

/// How the backend must hand the qualifier bytes to the HAL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualifierKind {
    /// Bytes are passed as-is
    Flat,
    /// Bytes are UTF-8 text, passed as a `CFStringRef`
    CfString,
}

/// Owned, size-tagged qualifier buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Qualifier {
    kind: QualifierKind,
    bytes: Vec<u8>,
}

impl Qualifier {
    /// Qualifier holding exactly one scalar
    pub fn from_scalar<T: Scalar>(value: T) -> Self {
        Self {
            kind: QualifierKind::Flat,
            bytes: value.to_bytes(),
        }
    }

    /// Qualifier holding a sequence of scalars, element order preserved
    pub fn from_slice<T: Scalar>(values: &[T]) -> Self {
        Self {
            kind: QualifierKind::Flat,
            bytes: encode_slice(values),
        }
    }

    /// Qualifier holding a string, for properties qualified by a `CFString`
    pub fn from_cf_string(text: &str) -> Self {
        Self {
            kind: QualifierKind::CfString,
            bytes: text.as_bytes().to_vec(),
        }
    }

    pub fn kind(&self) -> QualifierKind {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// First scalar in the buffer, if the buffer is flat and large enough
    pub fn read<T: Scalar>(&self) -> Option<T> {
        if self.kind != QualifierKind::Flat || self.bytes.len() < T::SIZE {
            return None;
        }
        Some(T::read_from(&self.bytes))
    }

    /// All whole scalars in the buffer
    pub fn to_vec<T: Scalar>(&self) -> Vec<T> {
        match self.kind {
            QualifierKind::Flat => decode_slice(&self.bytes),
            QualifierKind::CfString => Vec::new(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self.kind {
            QualifierKind::CfString => std::str::from_utf8(&self.bytes).ok(),
            QualifierKind::Flat => None,
        }
    }
}
