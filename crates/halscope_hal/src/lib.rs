//! Halscope HAL - Typed Property Access for Core Audio
//!
//! This crate provides the property-access layer of the inspector:
//! - Property descriptors (selector, value type, read semantics) grouped into
//!   per-class property sets
//! - Typed reads, writes, translations and size queries, validated before any
//!   HAL call is made
//! - Property listeners with explicit registration handles
//!
//! # Backends
//!
//! | Backend         | Platform | Use                                |
//! |-----------------|----------|------------------------------------|
//! | `CoreAudioHal`  | macOS    | The system audio server            |
//! | `SimulatedHal`  | all      | In-memory object graph for tests   |
//!
//! # Architecture
//!
//! Everything above the `Hal` trait is backend-agnostic. Backends only move
//! bytes and statuses; typing, validation and qualifier handling happen in
//! `property`.

mod error;
mod hal;
mod qualifier;
mod types;

pub mod class;
pub mod listener;
pub mod properties;
pub mod property;
pub mod sim;

#[cfg(target_os = "macos")]
pub mod macos;

pub use error::{HalError, HalResult};
pub use hal::{Hal, ListenerCallback, ListenerToken, Payload};
pub use listener::{AddressCallback, ListenerRegistry, NotificationQueue, PropertyListener};
pub use properties::{PropertySet, PropertySetKind};
pub use property::{Access, Layout, Property, PropertyDescriptor, PropertyType, ReadSemantics};
pub use qualifier::{Qualifier, QualifierKind};
pub use types::{
    c_string_from_bytes, decode_slice, element, encode_slice, four_cc_string, fourcc, scope,
    status, AudioObjectId, BufferList, CfObject, ChannelDescription, ChannelLayout, ClassId,
    Element, OsStatus, PropertyAddress, Scalar, Scope, Selector, StreamBasicDescription,
    StreamRangedDescription, ValueRange, SYSTEM_OBJECT, UNKNOWN_OBJECT,
};

#[cfg(target_os = "macos")]
pub use macos::CoreAudioHal;

/// Create the backend for this platform
///
/// On macOS this is the system HAL unless `simulated` is set; everywhere
/// else it is the demo object graph.
pub fn create_hal(simulated: bool) -> std::sync::Arc<dyn Hal> {
    #[cfg(target_os = "macos")]
    {
        if !simulated {
            return std::sync::Arc::new(CoreAudioHal::new());
        }
    }

    #[cfg(not(target_os = "macos"))]
    {
        if !simulated {
            tracing::info!("No system HAL on this platform, using simulated devices");
        }
    }

    std::sync::Arc::new(sim::SimulatedHal::demo())
}
