//! HAL Boundary
//!
//! `Hal` is the only place the crate touches the audio server. Everything
//! above it works on byte buffers and typed values; everything below it is a
//! backend (`SimulatedHal` in-process, `CoreAudioHal` on macOS).
//!
//! # Conventions
//!
//! - Calls return the raw `OsStatus` on failure; typing the error is the
//!   caller's job.
//! - `property_data` receives a buffer already holding the input value (for
//!   mutating and inbound reads) and returns how many bytes the HAL wrote.
//! - Listener callbacks may run on any thread.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::property::{Layout, PropertyType};
use crate::qualifier::Qualifier;
use crate::types::{c_string_from_bytes, AudioObjectId, CfObject, OsStatus, PropertyAddress, Scalar};

/// Callback invoked with the addresses that changed on an object
pub type ListenerCallback = Arc<dyn Fn(AudioObjectId, &[PropertyAddress]) + Send + Sync>;

/// Backend-issued handle for one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerToken(pub u64);

/// Input or output of a value translation
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Fixed-size scalar bytes or a NUL-terminated C string
    Flat(Vec<u8>),
    Object(CfObject),
}

impl Payload {
    pub fn scalar<T: Scalar>(value: T) -> Self {
        Payload::Flat(value.to_bytes())
    }

    pub fn text(text: &str) -> Self {
        Payload::Object(CfObject::String(text.to_string()))
    }

    pub fn c_string(text: &str) -> Self {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        Payload::Flat(bytes)
    }

    pub fn read<T: Scalar>(&self) -> Option<T> {
        match self {
            Payload::Flat(bytes) if bytes.len() >= T::SIZE => Some(T::read_from(bytes)),
            _ => None,
        }
    }

    /// Text content of a string object, or of flat bytes read as a C string
    pub fn as_text(&self) -> Option<String> {
        match self {
            Payload::Object(object) => object.as_str().map(str::to_string),
            Payload::Flat(bytes) => Some(c_string_from_bytes(bytes)),
        }
    }

    /// Whether this payload has the shape a value of type `ty` takes
    pub fn fits(&self, ty: PropertyType) -> bool {
        match (self, ty.layout()) {
            (Payload::Object(object), _) => object.fits(ty),
            (Payload::Flat(bytes), Layout::Scalar(size)) => bytes.len() == size,
            (Payload::Flat(_), Layout::Variable) => ty == PropertyType::CString,
            _ => false,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Object(object) => write!(f, "{}", object),
            Payload::Flat(bytes) => {
                let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
                write!(f, "<{}>", hex.join(" "))
            }
        }
    }
}

/// Untyped property protocol of the audio server
pub trait Hal: Send + Sync {
    fn has_property(&self, object: AudioObjectId, address: &PropertyAddress) -> bool;

    fn is_property_settable(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
    ) -> Result<bool, OsStatus>;

    fn property_data_size(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        qualifier: Option<&Qualifier>,
    ) -> Result<usize, OsStatus>;

    /// Fetch flat property data into `data`, returning the number of bytes written
    fn property_data(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        qualifier: Option<&Qualifier>,
        data: &mut [u8],
    ) -> Result<usize, OsStatus>;

    /// Fetch a CoreFoundation-typed property, copied out into owned data
    fn property_object(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        ty: PropertyType,
        qualifier: Option<&Qualifier>,
    ) -> Result<CfObject, OsStatus>;

    fn set_property_data(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        qualifier: Option<&Qualifier>,
        data: &[u8],
    ) -> Result<(), OsStatus>;

    /// Run an `AudioValueTranslation` property, producing a value of type `output`
    fn translate(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        input: &Payload,
        output: PropertyType,
    ) -> Result<Payload, OsStatus>;

    fn add_listener(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        callback: ListenerCallback,
    ) -> Result<ListenerToken, OsStatus>;

    fn remove_listener(&self, token: ListenerToken) -> Result<(), OsStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shapes() {
        assert!(Payload::scalar(3u32).fits(PropertyType::UInt32));
        assert!(!Payload::scalar(3u32).fits(PropertyType::Float64));
        assert!(Payload::text("Line In").fits(PropertyType::String));
        assert!(!Payload::text("Line In").fits(PropertyType::ObjectId));
        assert!(Payload::c_string("Line In").fits(PropertyType::CString));
    }

    #[test]
    fn test_payload_text() {
        assert_eq!(Payload::c_string("Internal").as_text().as_deref(), Some("Internal"));
        assert_eq!(Payload::text("External").as_text().as_deref(), Some("External"));
        assert_eq!(Payload::scalar(9u32).read::<u32>(), Some(9));
        assert_eq!(Payload::text("x").read::<u32>(), None);
    }
}
