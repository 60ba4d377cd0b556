//! Control Models
//!
//! Editable snapshots of the five control kinds. Each model is loaded from
//! the HAL, edited through one setter per writable value, and re-read from
//! the HAL after every write. A write that fails leaves the model as it was.
//!
//! # Level controls
//!
//! The scalar and decibel values of a level control are linked by a transfer
//! function owned by the driver. After writing one of them, both are read
//! back; neither is ever derived locally.

use halscope_hal::class::{self, is_subclass};
use halscope_hal::properties::{
    BooleanControlProperty, LevelControlProperty, SelectorControlProperty,
    SliderControlProperty, StereoPanControlProperty,
};
use halscope_hal::{AudioObjectId, Hal, PropertySet, Qualifier, ValueRange};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{InspectorError, InspectorResult};
use crate::listing::object_class;
use crate::tree::display_name;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliderControlModel {
    pub control: AudioObjectId,
    pub name: String,
    pub value: u32,
    pub range_min: u32,
    pub range_max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelControlModel {
    pub control: AudioObjectId,
    pub name: String,
    pub scalar: f32,
    pub decibels: f32,
    pub decibel_range: ValueRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanControlModel {
    pub control: AudioObjectId,
    pub name: String,
    pub value: bool,
}

/// One selectable item of a selector control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorItem {
    pub id: u32,
    pub name: String,
    pub kind: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorControlModel {
    pub control: AudioObjectId,
    pub name: String,
    pub items: Vec<SelectorItem>,
    pub current_item_ids: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereoPanControlModel {
    pub control: AudioObjectId,
    pub name: String,
    pub value: f32,
    pub left_channel: u32,
    pub right_channel: u32,
}

/// Snapshot of any editable control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlModel {
    Slider(SliderControlModel),
    Level(LevelControlModel),
    Boolean(BooleanControlModel),
    Selector(SelectorControlModel),
    StereoPan(StereoPanControlModel),
}

fn pair(values: Vec<u32>, what: &str, control: AudioObjectId) -> InspectorResult<(u32, u32)> {
    match values.as_slice() {
        [first, second, ..] => Ok((*first, *second)),
        _ => Err(InspectorError::MalformedControl(format!(
            "{} of @{} has {} entries, expected 2",
            what,
            control,
            values.len()
        ))),
    }
}

impl ControlModel {
    /// Load the model matching the class of `control`
    pub fn load(hal: &dyn Hal, control: AudioObjectId) -> InspectorResult<Self> {
        let class = object_class(hal, control);
        let name = display_name(hal, control);

        let model = if is_subclass(class, class::SLIDER_CONTROL) {
            ControlModel::Slider(SliderControlModel::load(hal, control, name)?)
        } else if is_subclass(class, class::LEVEL_CONTROL) {
            ControlModel::Level(LevelControlModel::load(hal, control, name)?)
        } else if is_subclass(class, class::BOOLEAN_CONTROL) {
            ControlModel::Boolean(BooleanControlModel::load(hal, control, name)?)
        } else if is_subclass(class, class::SELECTOR_CONTROL) {
            ControlModel::Selector(SelectorControlModel::load(hal, control, name)?)
        } else if is_subclass(class, class::STEREO_PAN_CONTROL) {
            ControlModel::StereoPan(StereoPanControlModel::load(hal, control, name)?)
        } else {
            return Err(InspectorError::NotAControl(class));
        };

        debug!("Loaded control model for @{}", control);
        Ok(model)
    }

    pub fn control(&self) -> AudioObjectId {
        match self {
            ControlModel::Slider(m) => m.control,
            ControlModel::Level(m) => m.control,
            ControlModel::Boolean(m) => m.control,
            ControlModel::Selector(m) => m.control,
            ControlModel::StereoPan(m) => m.control,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ControlModel::Slider(m) => &m.name,
            ControlModel::Level(m) => &m.name,
            ControlModel::Boolean(m) => &m.name,
            ControlModel::Selector(m) => &m.name,
            ControlModel::StereoPan(m) => &m.name,
        }
    }

    /// Replace this snapshot with a fresh one from the HAL
    pub fn reload(&mut self, hal: &dyn Hal) -> InspectorResult<()> {
        *self = Self::load(hal, self.control())?;
        Ok(())
    }
}

impl SliderControlModel {
    fn load(hal: &dyn Hal, control: AudioObjectId, name: String) -> InspectorResult<Self> {
        let value = SliderControlProperty::Value.on(hal, control).get::<u32>()?;
        let range = SliderControlProperty::Range.on(hal, control).get_array::<u32>()?;
        let (range_min, range_max) = pair(range, "Slider range", control)?;
        Ok(Self {
            control,
            name,
            value,
            range_min,
            range_max,
        })
    }

    pub fn set_value(&mut self, hal: &dyn Hal, value: u32) -> InspectorResult<()> {
        let property = SliderControlProperty::Value.on(hal, self.control);
        property.set_value(value, None)?;
        self.value = property.get()?;
        Ok(())
    }
}

impl LevelControlModel {
    fn load(hal: &dyn Hal, control: AudioObjectId, name: String) -> InspectorResult<Self> {
        Ok(Self {
            control,
            name,
            scalar: LevelControlProperty::ScalarValue.on(hal, control).get()?,
            decibels: LevelControlProperty::DecibelValue.on(hal, control).get()?,
            decibel_range: LevelControlProperty::DecibelRange.on(hal, control).get()?,
        })
    }

    fn read_back(&mut self, hal: &dyn Hal) -> InspectorResult<()> {
        let scalar = LevelControlProperty::ScalarValue.on(hal, self.control).get()?;
        let decibels = LevelControlProperty::DecibelValue.on(hal, self.control).get()?;
        self.scalar = scalar;
        self.decibels = decibels;
        Ok(())
    }

    /// Write the decibel value; the scalar is then re-read from the HAL
    pub fn set_decibels(&mut self, hal: &dyn Hal, decibels: f32) -> InspectorResult<()> {
        LevelControlProperty::DecibelValue
            .on(hal, self.control)
            .set_value(decibels, None)?;
        self.read_back(hal)
    }

    /// Write the scalar value; the decibel value is then re-read from the HAL
    pub fn set_scalar(&mut self, hal: &dyn Hal, scalar: f32) -> InspectorResult<()> {
        LevelControlProperty::ScalarValue
            .on(hal, self.control)
            .set_value(scalar, None)?;
        self.read_back(hal)
    }
}

impl BooleanControlModel {
    fn load(hal: &dyn Hal, control: AudioObjectId, name: String) -> InspectorResult<Self> {
        let value = BooleanControlProperty::Value.on(hal, control).get::<u32>()?;
        Ok(Self {
            control,
            name,
            value: value != 0,
        })
    }

    pub fn set_value(&mut self, hal: &dyn Hal, value: bool) -> InspectorResult<()> {
        let property = BooleanControlProperty::Value.on(hal, self.control);
        property.set_value(u32::from(value), None)?;
        self.value = property.get::<u32>()? != 0;
        Ok(())
    }
}

impl SelectorControlModel {
    fn load(hal: &dyn Hal, control: AudioObjectId, name: String) -> InspectorResult<Self> {
        let ids = SelectorControlProperty::AvailableItems
            .on(hal, control)
            .get_array::<u32>()?;

        let items = ids
            .into_iter()
            .map(|id| {
                let qualifier = Qualifier::from_scalar(id);
                let name = SelectorControlProperty::ItemName
                    .on(hal, control)
                    .string_value(Some(&qualifier))?;
                // Drivers without item kinds report 0
                let kind = SelectorControlProperty::ItemKind
                    .on(hal, control)
                    .value::<u32>(None, Some(&qualifier))
                    .unwrap_or(0);
                Ok(SelectorItem { id, name, kind })
            })
            .collect::<InspectorResult<Vec<_>>>()?;

        let current_item_ids = SelectorControlProperty::CurrentItem
            .on(hal, control)
            .get_array::<u32>()?;

        Ok(Self {
            control,
            name,
            items,
            current_item_ids,
        })
    }

    /// Positions in `items` of the currently selected items
    pub fn current_item_indices(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| self.current_item_ids.contains(&item.id))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn set_current_items(&mut self, hal: &dyn Hal, ids: &[u32]) -> InspectorResult<()> {
        let property = SelectorControlProperty::CurrentItem.on(hal, self.control);
        property.set_array_value(ids, None)?;
        self.current_item_ids = property.get_array()?;
        Ok(())
    }
}

impl StereoPanControlModel {
    fn load(hal: &dyn Hal, control: AudioObjectId, name: String) -> InspectorResult<Self> {
        let value = StereoPanControlProperty::Value.on(hal, control).get::<f32>()?;
        let channels = StereoPanControlProperty::PanningChannels
            .on(hal, control)
            .get_array::<u32>()?;
        let (left_channel, right_channel) = pair(channels, "Panning channels", control)?;
        Ok(Self {
            control,
            name,
            value,
            left_channel,
            right_channel,
        })
    }

    pub fn set_value(&mut self, hal: &dyn Hal, value: f32) -> InspectorResult<()> {
        let property = StereoPanControlProperty::Value.on(hal, self.control);
        property.set_value(value, None)?;
        self.value = property.get()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halscope_hal::sim::SimulatedHal;
    use halscope_hal::{fourcc, status, HalError, PropertyAddress};

    const DEVICE: AudioObjectId = 40;

    fn level_hal() -> SimulatedHal {
        let hal = SimulatedHal::new();
        hal.add_object(DEVICE, class::DEVICE, 1, "Device");
        hal.add_level_control(
            70,
            class::VOLUME_CONTROL,
            DEVICE,
            "Volume",
            0.5,
            -6.0,
            ValueRange::new(-60.0, 0.0),
        );
        hal
    }

    fn selector_hal() -> SimulatedHal {
        let hal = SimulatedHal::new();
        hal.add_object(DEVICE, class::DEVICE, 1, "Device");
        hal.add_selector_control(
            71,
            class::DATA_SOURCE_CONTROL,
            DEVICE,
            "Source",
            &[(1, "Internal"), (2, "External")],
            &[1],
        );
        hal
    }

    #[test]
    fn test_level_decibel_write_rereads_scalar() {
        let hal = level_hal();
        let mut model = match ControlModel::load(&hal, 70).unwrap() {
            ControlModel::Level(model) => model,
            other => panic!("expected level model, got {:?}", other),
        };
        assert_eq!(model.scalar, 0.5);
        assert_eq!(model.decibels, -6.0);
        assert_eq!(model.decibel_range, ValueRange::new(-60.0, 0.0));

        model.set_decibels(&hal, -3.0).unwrap();
        assert_eq!(model.decibels, -3.0);
        assert!((model.scalar - 0.70795).abs() < 1e-4);
    }

    #[test]
    fn test_level_scalar_write_rereads_decibels() {
        let hal = level_hal();
        let mut model = match ControlModel::load(&hal, 70).unwrap() {
            ControlModel::Level(model) => model,
            other => panic!("expected level model, got {:?}", other),
        };

        model.set_scalar(&hal, 0.1).unwrap();
        assert!((model.decibels - -20.0).abs() < 1e-3);
    }

    #[test]
    fn test_selector_write_then_reload() {
        let hal = selector_hal();
        let mut model = match ControlModel::load(&hal, 71).unwrap() {
            ControlModel::Selector(model) => model,
            other => panic!("expected selector model, got {:?}", other),
        };
        assert_eq!(model.items.len(), 2);
        assert_eq!(model.items[1].name, "External");
        assert_eq!(model.current_item_indices(), vec![0]);

        model.set_current_items(&hal, &[2]).unwrap();

        let mut reloaded = ControlModel::Selector(model);
        reloaded.reload(&hal).unwrap();
        match reloaded {
            ControlModel::Selector(model) => assert_eq!(model.current_item_indices(), vec![1]),
            other => panic!("expected selector model, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_write_leaves_model_untouched() {
        let hal = selector_hal();
        let mut model = match ControlModel::load(&hal, 71).unwrap() {
            ControlModel::Selector(model) => model,
            other => panic!("expected selector model, got {:?}", other),
        };
        let before = model.clone();

        let err = model.set_current_items(&hal, &[9]).unwrap_err();
        assert!(matches!(
            err,
            InspectorError::Hal(HalError::Os(s)) if s == status::ILLEGAL_OPERATION
        ));
        assert_eq!(model, before);
    }

    #[test]
    fn test_demo_controls_load_by_class() {
        let hal = SimulatedHal::demo();
        assert!(matches!(ControlModel::load(&hal, 50).unwrap(), ControlModel::Level(_)));
        assert!(matches!(ControlModel::load(&hal, 51).unwrap(), ControlModel::Boolean(_)));
        assert!(matches!(ControlModel::load(&hal, 52).unwrap(), ControlModel::Selector(_)));
        assert!(matches!(ControlModel::load(&hal, 53).unwrap(), ControlModel::StereoPan(_)));
        assert!(matches!(ControlModel::load(&hal, 54).unwrap(), ControlModel::Slider(_)));
    }

    #[test]
    fn test_non_control_is_rejected() {
        let hal = SimulatedHal::demo();
        let err = ControlModel::load(&hal, 40).unwrap_err();
        assert!(matches!(err, InspectorError::NotAControl(c) if c == class::DEVICE));
    }

    #[test]
    fn test_boolean_slider_and_pan_writes() {
        let hal = SimulatedHal::demo();

        let mut mute = match ControlModel::load(&hal, 51).unwrap() {
            ControlModel::Boolean(model) => model,
            other => panic!("expected boolean model, got {:?}", other),
        };
        assert!(!mute.value);
        mute.set_value(&hal, true).unwrap();
        assert!(mute.value);

        let mut slider = match ControlModel::load(&hal, 54).unwrap() {
            ControlModel::Slider(model) => model,
            other => panic!("expected slider model, got {:?}", other),
        };
        assert_eq!((slider.range_min, slider.range_max), (0, 10));
        slider.set_value(&hal, 7).unwrap();
        assert_eq!(slider.value, 7);

        let mut pan = match ControlModel::load(&hal, 53).unwrap() {
            ControlModel::StereoPan(model) => model,
            other => panic!("expected stereo pan model, got {:?}", other),
        };
        assert_eq!((pan.left_channel, pan.right_channel), (1, 2));
        pan.set_value(&hal, 0.25).unwrap();
        assert_eq!(pan.value, 0.25);
    }

    #[test]
    fn test_short_range_is_malformed() {
        let hal = SimulatedHal::demo();
        hal.set_array(54, PropertyAddress::any(fourcc(b"sdrr")), &[5u32], false);
        let err = ControlModel::load(&hal, 54).unwrap_err();
        assert!(matches!(err, InspectorError::MalformedControl(_)));
    }
}
