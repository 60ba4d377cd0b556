//! Property Listing
//!
//! Builds the rows an inspector shows for one object: a synthetic `objectID`
//! row, then every existing property of each property set that applies to
//! the object's class. Failing reads render as `#ERROR`.

use halscope_hal::class::{self, property_sets_for};
use halscope_hal::properties::ObjectProperty;
use halscope_hal::{
    element, fourcc, AudioObjectId, ClassId, Hal, HalError, Property, PropertyDescriptor,
    PropertySet, PropertySetKind, PropertyType, ReadSemantics, Scope, Selector,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::description::{
    self, parse_format, parse_input, parse_qualifier, parse_word, PropertyValue,
};
use crate::error::{InspectorError, InspectorResult};

/// Rendered value of a property that could not be read
pub const ERROR_VALUE: &str = "#ERROR";

/// Name of the synthetic first row
pub const OBJECT_ID_ROW: &str = "objectID";

const SELECTOR_WILDCARD: Selector = fourcc(b"****");

/// One line of a property listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRow {
    /// Set the property belongs to; `None` for the `objectID` row
    pub set: Option<PropertySetKind>,
    pub name: String,
    pub selector: Selector,
    pub ty: PropertyType,
    pub semantics: ReadSemantics,
    pub settable: bool,
    pub value: String,
    /// Raw code for four-character-code typed values that read successfully
    pub four_cc: Option<u32>,
}

impl PropertyRow {
    fn object_id(object: AudioObjectId) -> Self {
        Self {
            set: None,
            name: OBJECT_ID_ROW.to_string(),
            selector: SELECTOR_WILDCARD,
            ty: PropertyType::ObjectId,
            semantics: ReadSemantics::Read,
            settable: false,
            value: format!("@{}", object),
            four_cc: None,
        }
    }

    /// Whether the row's value is only available through `query_with_input`
    pub fn needs_input(&self) -> bool {
        self.semantics.needs_input()
    }
}

/// Class of `object`, falling back to the base object class
pub fn object_class(hal: &dyn Hal, object: AudioObjectId) -> ClassId {
    match ObjectProperty::Class.on(hal, object).get::<u32>() {
        Ok(class) => class,
        Err(e) => {
            warn!("Could not read class of @{}: {}", object, e);
            class::OBJECT
        }
    }
}

/// List every existing property of `object` in `scope`
pub fn list_properties(
    hal: &dyn Hal,
    object: AudioObjectId,
    scope: Scope,
    include_deprecated: bool,
) -> Vec<PropertyRow> {
    let class = object_class(hal, object);
    let mut rows = vec![PropertyRow::object_id(object)];

    for kind in property_sets_for(class, include_deprecated) {
        for (name, descriptor) in kind.existing(hal, object, scope, element::ANY) {
            let property = Property::new(hal, object, name, descriptor).scope(scope);
            rows.push(row_for(kind, &property));
        }
    }

    debug!("Listed {} properties of @{}", rows.len(), object);
    rows
}

fn row_for(kind: PropertySetKind, property: &Property<'_>) -> PropertyRow {
    let descriptor = property.descriptor();
    let value = description::read(property, None);

    PropertyRow {
        set: Some(kind),
        name: property.name().to_string(),
        selector: descriptor.selector,
        ty: descriptor.ty,
        semantics: descriptor.semantics,
        settable: property.is_settable(),
        four_cc: value.as_ref().ok().and_then(PropertyValue::four_cc),
        value: value
            .map(|v| v.to_string())
            .unwrap_or_else(|_| ERROR_VALUE.to_string()),
    }
}

/// Find a property applicable to `class` by case name (case-insensitive)
pub fn find_property(
    class: ClassId,
    name: &str,
) -> Option<(PropertySetKind, &'static str, PropertyDescriptor)> {
    property_sets_for(class, true).into_iter().find_map(|kind| {
        kind.entries()
            .into_iter()
            .find(|(case, _)| case.eq_ignore_ascii_case(name))
            .map(|(case, descriptor)| (kind, case, descriptor))
    })
}

/// Query a property that needs caller input, parsing that input from `text`
///
/// - Translations parse `text` as their source type.
/// - Qualified reads build a qualifier of the declared qualifier type.
/// - Mutating and inbound reads parse `text` as the property's own type.
/// - Status-only reads report the HAL status for the parsed input.
pub fn query_with_input(property: &Property<'_>, text: &str) -> InspectorResult<PropertyValue> {
    let descriptor = property.descriptor();
    debug!("Querying {} on @{} with '{}'", property.name(), property.object(), text);

    match descriptor.semantics {
        ReadSemantics::Translation { from, to } => {
            let input = parse_input(text, from)?;
            let output = property.translate_value(&input)?;
            PropertyValue::from_payload(&output, to)
                .ok_or(InspectorError::Hal(HalError::UnsupportedType(to)))
        }
        ReadSemantics::QualifiedRead(ty) | ReadSemantics::OptionallyQualifiedRead(ty) => {
            let qualifier = parse_qualifier(text, ty)?;
            Ok(description::read(property, Some(&qualifier))?)
        }
        ReadSemantics::MutatingRead | ReadSemantics::InboundOnly => read_with_input(property, text),
        ReadSemantics::InboundOnlyWithStatus => status_with_input(property, text),
        ReadSemantics::Read => Ok(description::read(property, None)?),
    }
}

fn read_with_input(property: &Property<'_>, text: &str) -> InspectorResult<PropertyValue> {
    let value = match property.descriptor().ty {
        PropertyType::Float32 => {
            let input = parse_float::<f32>(text)?;
            PropertyValue::Float32(property.value(Some(input), None)?)
        }
        PropertyType::Float64 => {
            let input = parse_float::<f64>(text)?;
            PropertyValue::Float64(property.value(Some(input), None)?)
        }
        PropertyType::ObjectId => {
            PropertyValue::ObjectId(property.value(Some(parse_word(text)?), None)?)
        }
        PropertyType::UInt32 | PropertyType::Boolean32 => {
            PropertyValue::UInt32(property.value(Some(parse_word(text)?), None)?)
        }
        PropertyType::StreamBasicDescription => {
            PropertyValue::Format(property.value(Some(parse_format(text)?), None)?)
        }
        other => return Err(HalError::UnsupportedType(other).into()),
    };
    Ok(value)
}

fn status_with_input(property: &Property<'_>, text: &str) -> InspectorResult<PropertyValue> {
    let status = match property.descriptor().ty {
        PropertyType::StreamBasicDescription => property.status_for(parse_format(text)?)?,
        PropertyType::Float32 => property.status_for(parse_float::<f32>(text)?)?,
        PropertyType::Float64 => property.status_for(parse_float::<f64>(text)?)?,
        _ => property.status_for(parse_word(text)?)?,
    };
    Ok(PropertyValue::Status(status))
}

fn parse_float<F>(text: &str) -> InspectorResult<F>
where
    F: std::str::FromStr,
    F::Err: std::fmt::Display,
{
    text.trim().parse().map_err(|e: F::Err| {
        InspectorError::Hal(HalError::InvalidInput(format!("'{}': {}", text, e)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use halscope_hal::properties::{DeviceProperty, DevicePropertyDeprecated, SystemProperty};
    use halscope_hal::sim::{SimulatedHal, DEMO_DEVICE_UID};
    use halscope_hal::{scope, status, PropertyAddress, SYSTEM_OBJECT};

    const DEVICE: AudioObjectId = 40;
    const STREAM: AudioObjectId = 41;

    #[test]
    fn test_object_id_row_comes_first() {
        let hal = SimulatedHal::demo();
        let rows = list_properties(&hal, DEVICE, scope::ANY, false);

        assert_eq!(rows[0].name, OBJECT_ID_ROW);
        assert_eq!(rows[0].value, "@40");
        assert_eq!(rows[0].set, None);
        assert!(rows.len() > 1);
        assert_eq!(rows[1].set, Some(PropertySetKind::Object));
    }

    #[test]
    fn test_failing_read_renders_error() {
        let hal = SimulatedHal::demo();
        hal.set_failing(DEVICE, PropertyAddress::any(fourcc(b"nsrt")), status::UNSPECIFIED);

        let rows = list_properties(&hal, DEVICE, scope::ANY, false);
        let rate = rows.iter().find(|r| r.name == "NominalSampleRate").unwrap();
        assert_eq!(rate.value, ERROR_VALUE);
    }

    #[test]
    fn test_rows_carry_four_cc_and_settable() {
        let hal = SimulatedHal::demo();
        let rows = list_properties(&hal, DEVICE, scope::ANY, false);

        let class = rows.iter().find(|r| r.name == "Class").unwrap();
        assert_eq!(class.four_cc, Some(fourcc(b"adev")));
        assert_eq!(class.value, "'adev'");

        let rate = rows.iter().find(|r| r.name == "NominalSampleRate").unwrap();
        assert!(rate.settable);
        assert_eq!(rate.four_cc, None);
    }

    #[test]
    fn test_scope_limits_rows() {
        let hal = SimulatedHal::demo();
        let output = list_properties(&hal, DEVICE, scope::OUTPUT, false);
        let input = list_properties(&hal, DEVICE, scope::INPUT, false);

        assert!(output.iter().any(|r| r.name == "Latency"));
        assert!(!input.iter().any(|r| r.name == "Latency"));
    }

    #[test]
    fn test_stream_lists_stream_set() {
        let hal = SimulatedHal::demo();
        let rows = list_properties(&hal, STREAM, scope::ANY, false);
        assert!(rows.iter().any(|r| r.set == Some(PropertySetKind::Stream)));
        assert!(!rows.iter().any(|r| r.set == Some(PropertySetKind::Device)));
    }

    #[test]
    fn test_find_property_by_name() {
        let (kind, name, descriptor) = find_property(class::DEVICE, "nominalsamplerate").unwrap();
        assert_eq!(kind, PropertySetKind::Device);
        assert_eq!(name, "NominalSampleRate");
        assert_eq!(descriptor.selector, fourcc(b"nsrt"));
        assert!(find_property(class::DEVICE, "NoSuchProperty").is_none());
    }

    #[test]
    fn test_query_translation() {
        let hal = SimulatedHal::demo();
        let property = DeviceProperty::DataSourceNameForIdCfString.on(&hal, DEVICE);
        let value = query_with_input(&property, "2").unwrap();
        assert_eq!(value, PropertyValue::Text("Headphones".into()));

        let err = query_with_input(&property, "two").unwrap_err();
        assert!(matches!(err, InspectorError::Hal(HalError::InvalidInput(_))));
    }

    #[test]
    fn test_query_qualified_read() {
        let hal = SimulatedHal::demo();
        let property = SystemProperty::TranslateUidToDevice.on(&hal, SYSTEM_OBJECT);
        let value = query_with_input(&property, DEMO_DEVICE_UID).unwrap();
        assert_eq!(value, PropertyValue::ObjectId(DEVICE));
    }

    #[test]
    fn test_query_reports_status() {
        let hal = SimulatedHal::demo();
        let property = DevicePropertyDeprecated::StreamFormatSupported.on(&hal, DEVICE);
        assert_eq!(query_with_input(&property, "48000,2").unwrap(), PropertyValue::Status(0));

        let rejected = query_with_input(&property, "22050").unwrap();
        assert_eq!(rejected, PropertyValue::Status(fourcc(b"!dat") as i32));
    }
}
