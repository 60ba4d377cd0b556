//! HAL Value Types
//!
//! Plain-data mirrors of the Core Audio structures the inspector reads, plus
//! the `Scalar` trait that marshals them to and from native-endian bytes.
//!
//! # Layouts
//!
//! | Type                       | Bytes      |
//! |----------------------------|------------|
//! | `ValueRange`               | 16         |
//! | `StreamBasicDescription`   | 40         |
//! | `StreamRangedDescription`  | 56         |
//! | `ChannelLayout`            | 12 + 20·n  |
//! | `BufferList`               | 8 + 16·n   |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::property::PropertyType;

pub type AudioObjectId = u32;
pub type ClassId = u32;
pub type Selector = u32;
pub type Scope = u32;
pub type Element = u32;
pub type OsStatus = i32;

/// Pack a four-character code the way the HAL headers do
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    ((code[0] as u32) << 24) | ((code[1] as u32) << 16) | ((code[2] as u32) << 8) | code[3] as u32
}

/// Spell a four-character code, if all four bytes are printable ASCII
pub fn four_cc_string(value: u32) -> Option<String> {
    let bytes = value.to_be_bytes();
    if bytes.iter().all(|b| (0x20..=0x7e).contains(b)) {
        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}

pub const SYSTEM_OBJECT: AudioObjectId = 1;
pub const UNKNOWN_OBJECT: AudioObjectId = 0;

/// Property scopes
pub mod scope {
    use super::{fourcc, Scope};

    pub const GLOBAL: Scope = fourcc(b"glob");
    pub const INPUT: Scope = fourcc(b"inpt");
    pub const OUTPUT: Scope = fourcc(b"outp");
    pub const PLAY_THROUGH: Scope = fourcc(b"ptru");
    pub const ANY: Scope = fourcc(b"****");
}

/// Property elements
pub mod element {
    use super::Element;

    pub const MAIN: Element = 0;
    pub const ANY: Element = 0xFFFF_FFFF;
}

/// HAL status codes this crate produces or inspects
pub mod status {
    use super::{fourcc, OsStatus};

    pub const NO_ERROR: OsStatus = 0;
    pub const NOT_RUNNING: OsStatus = fourcc(b"stop") as OsStatus;
    pub const UNSPECIFIED: OsStatus = fourcc(b"what") as OsStatus;
    pub const UNKNOWN_PROPERTY: OsStatus = fourcc(b"who?") as OsStatus;
    pub const BAD_PROPERTY_SIZE: OsStatus = fourcc(b"!siz") as OsStatus;
    pub const ILLEGAL_OPERATION: OsStatus = fourcc(b"nope") as OsStatus;
    pub const BAD_OBJECT: OsStatus = fourcc(b"!obj") as OsStatus;
    pub const UNSUPPORTED_OPERATION: OsStatus = fourcc(b"unop") as OsStatus;
}

/// `(selector, scope, element)` triple addressing one property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyAddress {
    pub selector: Selector,
    pub scope: Scope,
    pub element: Element,
}

impl PropertyAddress {
    pub const fn new(selector: Selector, scope: Scope, element: Element) -> Self {
        Self {
            selector,
            scope,
            element,
        }
    }

    /// Address with wildcard scope and element
    pub const fn any(selector: Selector) -> Self {
        Self::new(selector, scope::ANY, element::ANY)
    }

    /// Wildcard-aware comparison; a wildcard on either side matches anything
    pub fn matches(&self, other: &PropertyAddress) -> bool {
        self.selector == other.selector
            && (self.scope == scope::ANY || other.scope == scope::ANY || self.scope == other.scope)
            && (self.element == element::ANY
                || other.element == element::ANY
                || self.element == other.element)
    }
}

mod private {
    pub trait Sealed {}
}

/// Fixed-size value that can cross the HAL boundary as raw bytes
///
/// The set of implementors is closed. Each one declares which property types
/// it may be read as, either as a scalar or as an array element.
pub trait Scalar: Copy + Send + Sync + fmt::Debug + private::Sealed + 'static {
    const SIZE: usize;

    fn write_to(&self, out: &mut [u8]);

    fn read_from(bytes: &[u8]) -> Self;

    /// Whether a property declared as `ty` holds exactly one `Self`
    fn fits(ty: PropertyType) -> bool;

    /// Whether a property declared as `ty` holds a sequence of `Self`
    fn fits_element(ty: PropertyType) -> bool;

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; Self::SIZE];
        self.write_to(&mut out);
        out
    }
}

/// Encode a slice of scalars back to back
pub fn encode_slice<T: Scalar>(values: &[T]) -> Vec<u8> {
    let mut out = vec![0u8; T::SIZE * values.len()];
    for (chunk, value) in out.chunks_exact_mut(T::SIZE).zip(values) {
        value.write_to(chunk);
    }
    out
}

/// Decode whole elements; trailing bytes that do not fill an element are ignored
pub fn decode_slice<T: Scalar>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::SIZE).map(T::read_from).collect()
}

fn word(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_ne_bytes(raw)
}

fn double(bytes: &[u8], offset: usize) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    f64::from_ne_bytes(raw)
}

impl private::Sealed for u32 {}
impl Scalar for u32 {
    const SIZE: usize = 4;

    fn write_to(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_ne_bytes());
    }

    fn read_from(bytes: &[u8]) -> Self {
        word(bytes, 0)
    }

    fn fits(ty: PropertyType) -> bool {
        matches!(
            ty,
            PropertyType::Boolean32
                | PropertyType::UInt32
                | PropertyType::FourCC
                | PropertyType::ClassId
                | PropertyType::ObjectId
        )
    }

    fn fits_element(ty: PropertyType) -> bool {
        matches!(
            ty,
            PropertyType::ObjectIdArray
                | PropertyType::StreamIdArray
                | PropertyType::ClassIdArray
                | PropertyType::UInt32Array
        )
    }
}

impl private::Sealed for i32 {}
impl Scalar for i32 {
    const SIZE: usize = 4;

    fn write_to(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_ne_bytes());
    }

    fn read_from(bytes: &[u8]) -> Self {
        word(bytes, 0) as i32
    }

    fn fits(ty: PropertyType) -> bool {
        ty == PropertyType::Pid
    }

    fn fits_element(_ty: PropertyType) -> bool {
        false
    }
}

impl private::Sealed for f32 {}
impl Scalar for f32 {
    const SIZE: usize = 4;

    fn write_to(&self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_ne_bytes());
    }

    fn read_from(bytes: &[u8]) -> Self {
        f32::from_bits(word(bytes, 0))
    }

    fn fits(ty: PropertyType) -> bool {
        ty == PropertyType::Float32
    }

    fn fits_element(_ty: PropertyType) -> bool {
        false
    }
}

impl private::Sealed for f64 {}
impl Scalar for f64 {
    const SIZE: usize = 8;

    fn write_to(&self, out: &mut [u8]) {
        out[..8].copy_from_slice(&self.to_ne_bytes());
    }

    fn read_from(bytes: &[u8]) -> Self {
        double(bytes, 0)
    }

    fn fits(ty: PropertyType) -> bool {
        ty == PropertyType::Float64
    }

    fn fits_element(_ty: PropertyType) -> bool {
        false
    }
}

/// Mirror of `AudioValueRange`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueRange {
    pub minimum: f64,
    pub maximum: f64,
}

impl ValueRange {
    pub const fn new(minimum: f64, maximum: f64) -> Self {
        Self { minimum, maximum }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.minimum && value <= self.maximum
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.minimum, self.maximum)
    }
}

impl private::Sealed for ValueRange {}
impl Scalar for ValueRange {
    const SIZE: usize = 16;

    fn write_to(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.minimum.to_ne_bytes());
        out[8..16].copy_from_slice(&self.maximum.to_ne_bytes());
    }

    fn read_from(bytes: &[u8]) -> Self {
        Self {
            minimum: double(bytes, 0),
            maximum: double(bytes, 8),
        }
    }

    fn fits(ty: PropertyType) -> bool {
        ty == PropertyType::ValueRange
    }

    fn fits_element(ty: PropertyType) -> bool {
        ty == PropertyType::ValueRangeArray
    }
}

/// Mirror of `AudioStreamBasicDescription`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamBasicDescription {
    pub sample_rate: f64,
    pub format_id: u32,
    pub format_flags: u32,
    pub bytes_per_packet: u32,
    pub frames_per_packet: u32,
    pub bytes_per_frame: u32,
    pub channels_per_frame: u32,
    pub bits_per_channel: u32,
}

impl StreamBasicDescription {
    /// Interleaved 32-bit float linear PCM
    pub fn float_pcm(sample_rate: f64, channels: u32) -> Self {
        const FLOAT: u32 = 1;
        const PACKED: u32 = 1 << 3;
        Self {
            sample_rate,
            format_id: fourcc(b"lpcm"),
            format_flags: FLOAT | PACKED,
            bytes_per_packet: 4 * channels,
            frames_per_packet: 1,
            bytes_per_frame: 4 * channels,
            channels_per_frame: channels,
            bits_per_channel: 32,
        }
    }
}

impl fmt::Display for StreamBasicDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = four_cc_string(self.format_id).unwrap_or_else(|| self.format_id.to_string());
        write!(
            f,
            "'{}' {} Hz, {} ch, {} bit, flags {:#x}",
            format,
            self.sample_rate,
            self.channels_per_frame,
            self.bits_per_channel,
            self.format_flags
        )
    }
}

impl private::Sealed for StreamBasicDescription {}
impl Scalar for StreamBasicDescription {
    const SIZE: usize = 40;

    fn write_to(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.sample_rate.to_ne_bytes());
        let words = [
            self.format_id,
            self.format_flags,
            self.bytes_per_packet,
            self.frames_per_packet,
            self.bytes_per_frame,
            self.channels_per_frame,
            self.bits_per_channel,
            0, // mReserved
        ];
        for (index, value) in words.iter().enumerate() {
            let offset = 8 + index * 4;
            out[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
        }
    }

    fn read_from(bytes: &[u8]) -> Self {
        Self {
            sample_rate: double(bytes, 0),
            format_id: word(bytes, 8),
            format_flags: word(bytes, 12),
            bytes_per_packet: word(bytes, 16),
            frames_per_packet: word(bytes, 20),
            bytes_per_frame: word(bytes, 24),
            channels_per_frame: word(bytes, 28),
            bits_per_channel: word(bytes, 32),
        }
    }

    fn fits(ty: PropertyType) -> bool {
        ty == PropertyType::StreamBasicDescription
    }

    fn fits_element(ty: PropertyType) -> bool {
        ty == PropertyType::StreamBasicDescriptionArray
    }
}

/// Mirror of `AudioStreamRangedDescription`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamRangedDescription {
    pub format: StreamBasicDescription,
    pub sample_rate_range: ValueRange,
}

impl fmt::Display for StreamRangedDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.format, self.sample_rate_range)
    }
}

impl private::Sealed for StreamRangedDescription {}
impl Scalar for StreamRangedDescription {
    const SIZE: usize = 56;

    fn write_to(&self, out: &mut [u8]) {
        self.format.write_to(&mut out[0..40]);
        self.sample_rate_range.write_to(&mut out[40..56]);
    }

    fn read_from(bytes: &[u8]) -> Self {
        Self {
            format: StreamBasicDescription::read_from(&bytes[0..40]),
            sample_rate_range: ValueRange::read_from(&bytes[40..56]),
        }
    }

    fn fits(_ty: PropertyType) -> bool {
        false
    }

    fn fits_element(ty: PropertyType) -> bool {
        ty == PropertyType::StreamRangedDescriptionArray
    }
}

const CHANNEL_BITMAP_NAMES: [&str; 18] = [
    "Left",
    "Right",
    "Center",
    "LFEScreen",
    "LeftSurround",
    "RightSurround",
    "LeftCenter",
    "RightCenter",
    "CenterSurround",
    "LeftSurroundDirect",
    "RightSurroundDirect",
    "TopCenterSurround",
    "VerticalHeightLeft",
    "VerticalHeightCenter",
    "VerticalHeightRight",
    "TopBackLeft",
    "TopBackCenter",
    "TopBackRight",
];

/// One entry of a channel layout's description list
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelDescription {
    pub label: u32,
    pub flags: u32,
    pub coordinates: [f32; 3],
}

/// Mirror of the variable-size `AudioChannelLayout`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelLayout {
    pub tag: u32,
    pub bitmap: u32,
    pub descriptions: Vec<ChannelDescription>,
}

impl ChannelLayout {
    const HEADER: usize = 12;
    const DESCRIPTION: usize = 20;

    /// Decode from HAL bytes; `None` when the buffer is shorter than the declared descriptions
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::HEADER {
            return None;
        }
        let count = word(bytes, 8) as usize;
        if bytes.len() < Self::HEADER + count * Self::DESCRIPTION {
            return None;
        }

        let descriptions = (0..count)
            .map(|index| {
                let base = Self::HEADER + index * Self::DESCRIPTION;
                ChannelDescription {
                    label: word(bytes, base),
                    flags: word(bytes, base + 4),
                    coordinates: [
                        f32::from_bits(word(bytes, base + 8)),
                        f32::from_bits(word(bytes, base + 12)),
                        f32::from_bits(word(bytes, base + 16)),
                    ],
                }
            })
            .collect();

        Some(Self {
            tag: word(bytes, 0),
            bitmap: word(bytes, 4),
            descriptions,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let capacity = Self::HEADER + self.descriptions.len() * Self::DESCRIPTION;
        let mut out = Vec::with_capacity(capacity);
        out.extend_from_slice(&self.tag.to_ne_bytes());
        out.extend_from_slice(&self.bitmap.to_ne_bytes());
        out.extend_from_slice(&(self.descriptions.len() as u32).to_ne_bytes());
        for desc in &self.descriptions {
            out.extend_from_slice(&desc.label.to_ne_bytes());
            out.extend_from_slice(&desc.flags.to_ne_bytes());
            for coordinate in desc.coordinates {
                out.extend_from_slice(&coordinate.to_bits().to_ne_bytes());
            }
        }
        out
    }

    /// Names of the speaker positions set in the channel bitmap
    pub fn bitmap_names(&self) -> Vec<&'static str> {
        CHANNEL_BITMAP_NAMES
            .iter()
            .enumerate()
            .filter(|(bit, _)| self.bitmap & (1 << bit) != 0)
            .map(|(_, name)| *name)
            .collect()
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.descriptions.iter().map(|d| d.label.to_string()).collect();
        write!(
            f,
            "tag {:#x}, bitmap [{}], labels [{}]",
            self.tag,
            self.bitmap_names().join(", "),
            labels.join(", ")
        )
    }
}

/// Channel counts of a variable-size `AudioBufferList`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BufferList {
    pub channels_per_buffer: Vec<u32>,
}

impl BufferList {
    // mNumberBuffers is padded to pointer alignment before the first AudioBuffer
    const HEADER: usize = 8;
    const BUFFER: usize = 16;

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }
        let count = word(bytes, 0) as usize;
        if count == 0 {
            return Some(Self::default());
        }
        if bytes.len() < Self::HEADER + count * Self::BUFFER {
            return None;
        }
        let channels_per_buffer = (0..count)
            .map(|index| word(bytes, Self::HEADER + index * Self::BUFFER))
            .collect();
        Some(Self { channels_per_buffer })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; Self::HEADER + self.channels_per_buffer.len() * Self::BUFFER];
        out[0..4].copy_from_slice(&(self.channels_per_buffer.len() as u32).to_ne_bytes());
        for (index, channels) in self.channels_per_buffer.iter().enumerate() {
            let base = Self::HEADER + index * Self::BUFFER;
            out[base..base + 4].copy_from_slice(&channels.to_ne_bytes());
        }
        out
    }

    pub fn total_channels(&self) -> u32 {
        self.channels_per_buffer.iter().sum()
    }
}

impl fmt::Display for BufferList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<String> = self.channels_per_buffer.iter().map(|c| c.to_string()).collect();
        write!(f, "{} buffers [{}]", self.channels_per_buffer.len(), counts.join(", "))
    }
}

/// Decode a NUL-terminated C string buffer
pub fn c_string_from_bytes(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// CoreFoundation-typed property value, copied out of the HAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CfObject {
    String(String),
    Url(String),
    /// Dictionaries are kept as their CoreFoundation description text
    Dictionary(String),
    StringArray(Vec<String>),
}

impl CfObject {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CfObject::String(s) | CfObject::Url(s) | CfObject::Dictionary(s) => Some(s),
            CfObject::StringArray(_) => None,
        }
    }

    /// Whether this object has the shape a property of type `ty` produces
    pub fn fits(&self, ty: PropertyType) -> bool {
        matches!(
            (self, ty),
            (CfObject::String(_), PropertyType::String)
                | (CfObject::Url(_), PropertyType::Url)
                | (CfObject::Dictionary(_), PropertyType::Dictionary)
                | (CfObject::StringArray(_), PropertyType::StringArray)
        )
    }
}

impl fmt::Display for CfObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CfObject::String(s) | CfObject::Url(s) | CfObject::Dictionary(s) => f.write_str(s),
            CfObject::StringArray(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_packing() {
        assert_eq!(fourcc(b"glob"), 0x676C_6F62);
        assert_eq!(four_cc_string(fourcc(b"dev#")).as_deref(), Some("dev#"));
        assert_eq!(four_cc_string(0), None);
    }

    #[test]
    fn test_address_wildcards() {
        let any = PropertyAddress::any(fourcc(b"volm"));
        let output = PropertyAddress::new(fourcc(b"volm"), scope::OUTPUT, 1);
        let input = PropertyAddress::new(fourcc(b"volm"), scope::INPUT, 1);

        assert!(any.matches(&output));
        assert!(output.matches(&any));
        assert!(!output.matches(&input));
        assert!(!any.matches(&PropertyAddress::any(fourcc(b"mute"))));
    }

    #[test]
    fn test_stream_description_layout() {
        let asbd = StreamBasicDescription::float_pcm(48000.0, 2);
        let bytes = asbd.to_bytes();
        assert_eq!(bytes.len(), 40);
        assert_eq!(StreamBasicDescription::read_from(&bytes), asbd);

        let ranged = StreamRangedDescription {
            format: asbd,
            sample_rate_range: ValueRange::new(44100.0, 96000.0),
        };
        assert_eq!(StreamRangedDescription::read_from(&ranged.to_bytes()), ranged);
    }

    #[test]
    fn test_slice_decoding_ignores_partial_tail() {
        let mut bytes = encode_slice(&[1u32, 2, 3]);
        bytes.push(0xff);
        assert_eq!(decode_slice::<u32>(&bytes), vec![1, 2, 3]);
    }

    #[test]
    fn test_channel_layout_bytes() {
        let layout = ChannelLayout {
            tag: 0,
            bitmap: 0b11,
            descriptions: vec![
                ChannelDescription {
                    label: 1,
                    ..Default::default()
                },
                ChannelDescription {
                    label: 2,
                    ..Default::default()
                },
            ],
        };
        let bytes = layout.to_bytes();
        assert_eq!(bytes.len(), 12 + 2 * 20);
        assert_eq!(ChannelLayout::from_bytes(&bytes), Some(layout.clone()));
        assert_eq!(layout.bitmap_names(), vec!["Left", "Right"]);

        // Truncated description list
        assert_eq!(ChannelLayout::from_bytes(&bytes[..20]), None);
    }

    #[test]
    fn test_buffer_list_bytes() {
        let list = BufferList {
            channels_per_buffer: vec![2, 6],
        };
        let decoded = BufferList::from_bytes(&list.to_bytes()).unwrap();
        assert_eq!(decoded.total_channels(), 8);
    }

    #[test]
    fn test_c_string_stops_at_nul() {
        assert_eq!(c_string_from_bytes(b"Built-in\0garbage"), "Built-in");
        assert_eq!(c_string_from_bytes(b"no terminator"), "no terminator");
    }

    #[test]
    fn test_scalar_type_compatibility() {
        assert!(u32::fits(PropertyType::FourCC));
        assert!(!u32::fits(PropertyType::Float32));
        assert!(u32::fits_element(PropertyType::ObjectIdArray));
        assert!(f64::fits(PropertyType::Float64));
        assert!(i32::fits(PropertyType::Pid));
        assert!(!StreamRangedDescription::fits(PropertyType::StreamBasicDescription));
    }
}
