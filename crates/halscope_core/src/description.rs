//! Property Value Rendering
//!
//! `PropertyValue` is the decoded form of any readable property. `read`
//! picks the access primitive that matches the declared type, and the
//! `Display` impl produces the text an inspector shows for it.
//!
//! Text typed by a user (translation inputs, qualifiers, inbound values) is
//! parsed back with `parse_input` and `parse_qualifier`.

use std::fmt;

use halscope_hal::{
    c_string_from_bytes, four_cc_string, fourcc, status, BufferList, CfObject, ChannelLayout,
    HalError, HalResult, OsStatus, Payload, Property, PropertyType, Qualifier,
    StreamBasicDescription, StreamRangedDescription, ValueRange, UNKNOWN_OBJECT,
};
use serde::{Deserialize, Serialize};

/// Decoded property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Boolean(u32),
    UInt32(u32),
    Float32(f32),
    Float64(f64),
    /// Four-character codes and class ids
    FourCC(u32),
    ObjectId(u32),
    Pid(i32),
    Range(ValueRange),
    Format(StreamBasicDescription),
    ChannelLayout(ChannelLayout),
    BufferList(BufferList),
    Text(String),
    Url(String),
    Dictionary(String),
    TextList(Vec<String>),
    UInt32List(Vec<u32>),
    ObjectIdList(Vec<u32>),
    ClassIdList(Vec<u32>),
    RangeList(Vec<ValueRange>),
    FormatList(Vec<StreamBasicDescription>),
    RangedFormatList(Vec<StreamRangedDescription>),
    /// Bytes of a type with no structured decoding
    Raw(Vec<u8>),
    /// Result of a status-only read
    Status(OsStatus),
}

/// Read `property` with the primitive its declared type calls for
pub fn read(property: &Property<'_>, qualifier: Option<&Qualifier>) -> HalResult<PropertyValue> {
    use PropertyType as T;

    let value = match property.descriptor().ty {
        T::Boolean32 => PropertyValue::Boolean(property.value(None, qualifier)?),
        T::UInt32 => PropertyValue::UInt32(property.value(None, qualifier)?),
        T::Float32 => PropertyValue::Float32(property.value(None, qualifier)?),
        T::Float64 => PropertyValue::Float64(property.value(None, qualifier)?),
        T::FourCC | T::ClassId => PropertyValue::FourCC(property.value(None, qualifier)?),
        T::ObjectId => PropertyValue::ObjectId(property.value(None, qualifier)?),
        T::Pid => PropertyValue::Pid(property.value(None, qualifier)?),
        T::ValueRange => PropertyValue::Range(property.value(None, qualifier)?),
        T::StreamBasicDescription => PropertyValue::Format(property.value(None, qualifier)?),
        T::ChannelLayout => PropertyValue::ChannelLayout(property.channel_layout()?),
        T::BufferList => PropertyValue::BufferList(property.buffer_list()?),
        T::CString => PropertyValue::Text(property.c_string()?),
        T::IoProcStreamUsage => PropertyValue::Raw(property.raw_value(None, qualifier)?),
        T::UInt32Array => PropertyValue::UInt32List(property.array_value(None, qualifier)?),
        T::ObjectIdArray | T::StreamIdArray => {
            PropertyValue::ObjectIdList(property.array_value(None, qualifier)?)
        }
        T::ClassIdArray => PropertyValue::ClassIdList(property.array_value(None, qualifier)?),
        T::ValueRangeArray => PropertyValue::RangeList(property.array_value(None, qualifier)?),
        T::StreamBasicDescriptionArray => {
            PropertyValue::FormatList(property.array_value(None, qualifier)?)
        }
        T::StreamRangedDescriptionArray => {
            PropertyValue::RangedFormatList(property.array_value(None, qualifier)?)
        }
        T::String | T::Url | T::Dictionary | T::StringArray => {
            PropertyValue::from(property.object_value(qualifier)?)
        }
        ty @ (T::ValueTranslation | T::RunLoop) => return Err(HalError::UnsupportedType(ty)),
    };
    Ok(value)
}

impl From<CfObject> for PropertyValue {
    fn from(object: CfObject) -> Self {
        match object {
            CfObject::String(text) => PropertyValue::Text(text),
            CfObject::Url(url) => PropertyValue::Url(url),
            CfObject::Dictionary(text) => PropertyValue::Dictionary(text),
            CfObject::StringArray(items) => PropertyValue::TextList(items),
        }
    }
}

impl PropertyValue {
    /// Decode a translation output of type `ty`
    pub fn from_payload(payload: &Payload, ty: PropertyType) -> Option<Self> {
        use PropertyType as T;

        match (payload, ty) {
            (Payload::Object(object), _) => Some(PropertyValue::from(object.clone())),
            (Payload::Flat(bytes), T::CString) => {
                Some(PropertyValue::Text(c_string_from_bytes(bytes)))
            }
            (Payload::Flat(_), T::Boolean32) => payload.read().map(PropertyValue::Boolean),
            (Payload::Flat(_), T::UInt32) => payload.read().map(PropertyValue::UInt32),
            (Payload::Flat(_), T::FourCC | T::ClassId) => payload.read().map(PropertyValue::FourCC),
            (Payload::Flat(_), T::ObjectId) => payload.read().map(PropertyValue::ObjectId),
            (Payload::Flat(_), T::Float32) => payload.read().map(PropertyValue::Float32),
            (Payload::Flat(_), T::Float64) => payload.read().map(PropertyValue::Float64),
            (Payload::Flat(_), T::Pid) => payload.read().map(PropertyValue::Pid),
            _ => None,
        }
    }

    /// Raw code, for values rendered as four-character codes
    pub fn four_cc(&self) -> Option<u32> {
        match self {
            PropertyValue::FourCC(code) => Some(*code),
            _ => None,
        }
    }
}

fn object_label(id: u32) -> String {
    if id == UNKNOWN_OBJECT {
        "<null>".to_string()
    } else {
        format!("@{}", id)
    }
}

fn code_label(code: u32) -> String {
    match four_cc_string(code) {
        Some(text) => format!("'{}'", text),
        None => code.to_string(),
    }
}

fn list<T, F>(items: &[T], render: F) -> String
where
    F: Fn(&T) -> String,
{
    let rendered: Vec<String> = items.iter().map(render).collect();
    format!("[{}]", rendered.join(", "))
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Boolean(0) => f.write_str("false (0)"),
            PropertyValue::Boolean(value) => write!(f, "true ({})", value),
            PropertyValue::UInt32(value) => write!(f, "{}", value),
            PropertyValue::Float32(value) => write!(f, "{}", value),
            PropertyValue::Float64(value) => write!(f, "{}", value),
            PropertyValue::FourCC(code) => f.write_str(&code_label(*code)),
            PropertyValue::ObjectId(id) => f.write_str(&object_label(*id)),
            PropertyValue::Pid(pid) => write!(f, "{}", pid),
            PropertyValue::Range(range) => write!(f, "AudioValueRange {}", range),
            PropertyValue::Format(format) => write!(f, "{}", format),
            PropertyValue::ChannelLayout(layout) => write!(f, "{}", layout),
            PropertyValue::BufferList(buffers) => write!(f, "{}", buffers),
            PropertyValue::Text(text)
            | PropertyValue::Url(text)
            | PropertyValue::Dictionary(text) => f.write_str(text),
            PropertyValue::TextList(items) => f.write_str(&list(items, |s| s.clone())),
            PropertyValue::UInt32List(items) => f.write_str(&list(items, |v| v.to_string())),
            PropertyValue::ObjectIdList(items) => f.write_str(&list(items, |id| object_label(*id))),
            PropertyValue::ClassIdList(items) => f.write_str(&list(items, |c| code_label(*c))),
            PropertyValue::RangeList(items) => {
                f.write_str(&list(items, |r| format!("AudioValueRange {}", r)))
            }
            PropertyValue::FormatList(items) => f.write_str(&list(items, |d| d.to_string())),
            PropertyValue::RangedFormatList(items) => f.write_str(&list(items, |d| d.to_string())),
            PropertyValue::Raw(bytes) => {
                let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
                write!(f, "<{}>", hex.join(" "))
            }
            PropertyValue::Status(status::NO_ERROR) => f.write_str("noErr (0)"),
            PropertyValue::Status(code) => match four_cc_string(*code as u32) {
                Some(text) => write!(f, "'{}' ({})", text, code),
                None => write!(f, "{}", code),
            },
        }
    }
}

/// Parse a 32-bit word: decimal, `0x` hex, or a quoted four-character code
pub fn parse_word(text: &str) -> HalResult<u32> {
    let text = text.trim();
    let quoted = text
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .filter(|code| code.len() == 4);
    if let Some(code) = quoted {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(code.as_bytes());
        return Ok(fourcc(&raw));
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).map_err(|e| invalid(text, e));
    }
    if let Some(id) = text.strip_prefix('@') {
        return id.parse().map_err(|e| invalid(text, e));
    }
    text.parse().map_err(|e| invalid(text, e))
}

fn parse_words(text: &str) -> HalResult<Vec<u32>> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_word)
        .collect()
}

fn invalid(text: &str, reason: impl fmt::Display) -> HalError {
    HalError::InvalidInput(format!("'{}': {}", text, reason))
}

/// Parse `rate` or `rate,channels` into a float PCM format
pub fn parse_format(text: &str) -> HalResult<StreamBasicDescription> {
    let mut parts = text.split(',').map(str::trim);
    let rate: f64 = parts
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|e| invalid(text, e))?;
    let channels = match parts.next() {
        Some(part) => part.parse().map_err(|e| invalid(text, e))?,
        None => 2,
    };
    Ok(StreamBasicDescription::float_pcm(rate, channels))
}

/// Build a payload of type `ty` from user text
pub fn parse_input(text: &str, ty: PropertyType) -> HalResult<Payload> {
    use PropertyType as T;

    match ty {
        T::Boolean32 | T::UInt32 | T::FourCC | T::ClassId | T::ObjectId => {
            parse_word(text).map(Payload::scalar)
        }
        T::Pid => text.trim().parse::<i32>().map(Payload::scalar).map_err(|e| invalid(text, e)),
        T::Float32 => text.trim().parse::<f32>().map(Payload::scalar).map_err(|e| invalid(text, e)),
        T::Float64 => text.trim().parse::<f64>().map(Payload::scalar).map_err(|e| invalid(text, e)),
        T::StreamBasicDescription => parse_format(text).map(Payload::scalar),
        T::String => Ok(Payload::text(text)),
        T::CString => Ok(Payload::c_string(text)),
        other => Err(HalError::UnsupportedType(other)),
    }
}

/// Build a qualifier of type `ty` from user text
///
/// Array qualifiers take a comma-separated list.
pub fn parse_qualifier(text: &str, ty: PropertyType) -> HalResult<Qualifier> {
    use PropertyType as T;

    match ty {
        T::String => Ok(Qualifier::from_cf_string(text)),
        T::ClassIdArray | T::ObjectIdArray | T::UInt32Array | T::StreamIdArray => {
            Ok(Qualifier::from_slice(&parse_words(text)?))
        }
        T::Boolean32 | T::UInt32 | T::FourCC | T::ClassId | T::ObjectId => {
            parse_word(text).map(Qualifier::from_scalar)
        }
        T::Float32 => text
            .trim()
            .parse::<f32>()
            .map(Qualifier::from_scalar)
            .map_err(|e| invalid(text, e)),
        T::Float64 => text
            .trim()
            .parse::<f64>()
            .map(Qualifier::from_scalar)
            .map_err(|e| invalid(text, e)),
        T::Pid => text
            .trim()
            .parse::<i32>()
            .map(Qualifier::from_scalar)
            .map_err(|e| invalid(text, e)),
        other => Err(HalError::UnsupportedType(other)),
    }
}
