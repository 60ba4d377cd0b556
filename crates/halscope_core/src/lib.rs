//! Halscope Core - Inspector Engine
//!
//! This crate provides the inspector built on `halscope_hal`:
//! - Object tree snapshots of the HAL's ownership graph
//! - Property listings with rendered values, and on-demand queries for
//!   properties that need input
//! - Editable control models (slider, level, boolean, selector, stereo pan)
//! - Persistent inspector settings
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    halscope (CLI)                        │
//! └──────────────────────────────────────────────────────────┘
//!        │ ObjectTree      │ list_properties     │ ControlModel
//!        ▼                 ▼                     ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  halscope_hal: PropertySet ──► Property ──► dyn Hal      │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod control;
mod description;
mod error;
mod listing;
mod settings;
mod tree;

pub use control::{
    BooleanControlModel, ControlModel, LevelControlModel, SelectorControlModel, SelectorItem,
    SliderControlModel, StereoPanControlModel,
};
pub use description::{parse_input, parse_qualifier, parse_word, read, PropertyValue};
pub use error::{InspectorError, InspectorResult};
pub use listing::{
    find_property, list_properties, object_class, query_with_input, PropertyRow, ERROR_VALUE,
    OBJECT_ID_ROW,
};
pub use settings::{InspectorSettings, ScopeSetting};
pub use tree::{display_name, AudioNode, ObjectTree};

// Re-export HAL types for convenience
pub use halscope_hal::{create_hal, Hal, HalError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        let _settings = InspectorSettings::default();
        let hal = create_hal(true);
        let tree = ObjectTree::load(hal.as_ref());
        assert!(tree.len() > 1);
    }
}
