//! Typed Property Access
//!
//! A `PropertyDescriptor` pairs a selector with its value type and read
//! semantics. Binding a descriptor to a HAL and an object yields a
//! `Property`, whose accessors translate typed requests into the HAL's
//! size-negotiated byte protocol.
//!
//! # Validation
//!
//! Every accessor first asks the descriptor's `ReadSemantics` whether the
//! access is legal (`ReadSemantics::check`) and then whether the requested
//! Rust type matches the declared `PropertyType`. Only then is the HAL
//! called. A rejected access never reaches the backend.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{HalError, HalResult};
use crate::hal::{Hal, Payload};
use crate::listener::{ListenerRegistry, NotificationQueue, PropertyListener};
use crate::qualifier::Qualifier;
use crate::types::{
    c_string_from_bytes, decode_slice, element, encode_slice, scope, AudioObjectId, BufferList,
    CfObject, ChannelLayout, Element, OsStatus, PropertyAddress, Scalar, Scope, Selector,
};

/// Value type a property declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Boolean32,
    UInt32,
    Float32,
    Float64,
    FourCC,
    ClassId,
    ObjectId,
    ChannelLayout,
    StreamBasicDescription,
    ValueRange,
    Pid,
    IoProcStreamUsage,
    ValueTranslation,
    BufferList,
    CString,
    ObjectIdArray,
    StreamIdArray,
    ClassIdArray,
    ValueRangeArray,
    UInt32Array,
    StreamRangedDescriptionArray,
    StreamBasicDescriptionArray,
    String,
    Url,
    Dictionary,
    RunLoop,
    StringArray,
}

/// Buffer strategy for a property type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One fixed-size value of the given width
    Scalar(usize),
    /// A sequence of fixed-size elements of the given width
    Array(usize),
    /// Flat data whose size is negotiated with the HAL
    Variable,
    /// CoreFoundation object handed over by reference
    Object,
    /// Not readable as a value (run loops, translation records)
    Opaque,
}

impl PropertyType {
    pub fn layout(self) -> Layout {
        use PropertyType::*;
        match self {
            Boolean32 | UInt32 | Float32 | FourCC | ClassId | ObjectId | Pid => Layout::Scalar(4),
            Float64 => Layout::Scalar(8),
            ValueRange => Layout::Scalar(16),
            StreamBasicDescription => Layout::Scalar(40),
            ChannelLayout | BufferList | CString | IoProcStreamUsage => Layout::Variable,
            ObjectIdArray | StreamIdArray | ClassIdArray | UInt32Array => Layout::Array(4),
            ValueRangeArray => Layout::Array(16),
            StreamBasicDescriptionArray => Layout::Array(40),
            StreamRangedDescriptionArray => Layout::Array(56),
            String | Url | Dictionary | StringArray => Layout::Object,
            RunLoop | ValueTranslation => Layout::Opaque,
        }
    }

    /// Types whose values are rendered as four-character codes
    pub fn is_four_cc(self) -> bool {
        matches!(self, PropertyType::FourCC | PropertyType::ClassId)
    }
}

/// Access discipline a property imposes on its readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadSemantics {
    /// Value is written to the provided buffer
    Read,
    /// Buffer holds an input; the result replaces it in place
    MutatingRead,
    /// Buffer holds an input; nothing is written back
    InboundOnly,
    /// Buffer holds an input; only the call's status is of interest
    InboundOnlyWithStatus,
    /// Input and output travel in an `AudioValueTranslation` record
    Translation { from: PropertyType, to: PropertyType },
    /// A qualifier of the given type is required
    QualifiedRead(PropertyType),
    /// A qualifier of the given type may be supplied
    OptionallyQualifiedRead(PropertyType),
}

/// Kind of access being attempted on a property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Typed or raw value read
    Read { has_input: bool, has_qualifier: bool },
    /// Data size query
    Size { has_qualifier: bool },
    Write,
    Translate,
    Status,
}

impl ReadSemantics {
    /// Decide whether `access` is legal for a property with these semantics
    pub fn check(&self, access: Access) -> HalResult<()> {
        use ReadSemantics::*;
        match access {
            Access::Read {
                has_input,
                has_qualifier,
            } => match self {
                QualifiedRead(_) if !has_qualifier => Err(HalError::MissingQualifier),
                MutatingRead | InboundOnly | InboundOnlyWithStatus | Translation { .. }
                    if !has_input =>
                {
                    Err(HalError::MissingInputValue)
                }
                Translation { .. } => Err(HalError::InvalidOperation),
                _ => Ok(()),
            },
            Access::Size { has_qualifier } => match self {
                QualifiedRead(_) if !has_qualifier => Err(HalError::MissingQualifier),
                _ => Ok(()),
            },
            Access::Write => match self {
                Translation { .. } => Err(HalError::InvalidOperation),
                _ => Ok(()),
            },
            Access::Translate => match self {
                Translation { .. } => Ok(()),
                _ => Err(HalError::InvalidOperation),
            },
            Access::Status => match self {
                InboundOnlyWithStatus => Ok(()),
                _ => Err(HalError::InvalidOperation),
            },
        }
    }

    /// Qualifier type, for qualified and optionally qualified reads
    pub fn qualifier_type(&self) -> Option<PropertyType> {
        match self {
            ReadSemantics::QualifiedRead(ty) | ReadSemantics::OptionallyQualifiedRead(ty) => {
                Some(*ty)
            }
            _ => None,
        }
    }

    /// Whether reading the property needs caller-provided input
    pub fn needs_input(&self) -> bool {
        matches!(
            self,
            ReadSemantics::MutatingRead
                | ReadSemantics::InboundOnly
                | ReadSemantics::InboundOnlyWithStatus
                | ReadSemantics::Translation { .. }
                | ReadSemantics::QualifiedRead(_)
        )
    }
}

impl fmt::Display for ReadSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadSemantics::Read => f.write_str("read"),
            ReadSemantics::MutatingRead => f.write_str("mutating read"),
            ReadSemantics::InboundOnly => f.write_str("inbound only"),
            ReadSemantics::InboundOnlyWithStatus => f.write_str("inbound only (status)"),
            ReadSemantics::Translation { from, to } => {
                write!(f, "translation {:?} -> {:?}", from, to)
            }
            ReadSemantics::QualifiedRead(ty) => write!(f, "qualified by {:?}", ty),
            ReadSemantics::OptionallyQualifiedRead(ty) => {
                write!(f, "optionally qualified by {:?}", ty)
            }
        }
    }
}

/// Static description of one property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub selector: Selector,
    pub ty: PropertyType,
    pub semantics: ReadSemantics,
}

impl PropertyDescriptor {
    pub const fn new(selector: Selector, ty: PropertyType, semantics: ReadSemantics) -> Self {
        Self {
            selector,
            ty,
            semantics,
        }
    }
}

/// A descriptor bound to a HAL, an object and a scope/element pair
///
/// Scope and element default to the wildcards.
#[derive(Clone, Copy)]
pub struct Property<'a> {
    hal: &'a dyn Hal,
    object: AudioObjectId,
    name: &'static str,
    descriptor: PropertyDescriptor,
    scope: Scope,
    element: Element,
}

impl fmt::Debug for Property<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("object", &self.object)
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("scope", &self.scope)
            .field("element", &self.element)
            .finish()
    }
}

impl<'a> Property<'a> {
    pub fn new(
        hal: &'a dyn Hal,
        object: AudioObjectId,
        name: &'static str,
        descriptor: PropertyDescriptor,
    ) -> Self {
        Self {
            hal,
            object,
            name,
            descriptor,
            scope: scope::ANY,
            element: element::ANY,
        }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn element(mut self, element: Element) -> Self {
        self.element = element;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn object(&self) -> AudioObjectId {
        self.object
    }

    pub fn descriptor(&self) -> PropertyDescriptor {
        self.descriptor
    }

    pub fn address(&self) -> PropertyAddress {
        PropertyAddress::new(self.descriptor.selector, self.scope, self.element)
    }

    pub fn exists(&self) -> bool {
        self.hal.has_property(self.object, &self.address())
    }

    /// Settability; a failing HAL call reads as not settable
    pub fn is_settable(&self) -> bool {
        self.hal
            .is_property_settable(self.object, &self.address())
            .unwrap_or(false)
    }

    fn ensure_scalar<T: Scalar>(&self) -> HalResult<()> {
        if T::fits(self.descriptor.ty) {
            Ok(())
        } else {
            Err(self.mismatch::<T>())
        }
    }

    fn ensure_element<T: Scalar>(&self) -> HalResult<()> {
        if T::fits_element(self.descriptor.ty) {
            Ok(())
        } else {
            Err(self.mismatch::<T>())
        }
    }

    fn mismatch<T>(&self) -> HalError {
        HalError::TypeMismatch {
            requested: std::any::type_name::<T>(),
            declared: self.descriptor.ty,
        }
    }

    /// Read a single scalar
    ///
    /// `input` seeds the buffer for mutating and inbound reads.
    pub fn value<T: Scalar>(
        &self,
        input: Option<T>,
        qualifier: Option<&Qualifier>,
    ) -> HalResult<T> {
        self.descriptor.semantics.check(Access::Read {
            has_input: input.is_some(),
            has_qualifier: qualifier.is_some(),
        })?;
        self.ensure_scalar::<T>()?;

        let mut data = vec![0u8; T::SIZE];
        if let Some(input) = input {
            input.write_to(&mut data);
        }

        let address = self.address();
        trace!("{}: reading {} bytes from @{}", self.name, T::SIZE, self.object);
        let written = self
            .hal
            .property_data(self.object, &address, qualifier, &mut data)
            .map_err(HalError::Os)?;
        if written < T::SIZE {
            return Err(HalError::MisalignedData {
                byte_size: written,
                element_size: T::SIZE,
            });
        }

        Ok(T::read_from(&data))
    }

    /// Plain unqualified read
    pub fn get<T: Scalar>(&self) -> HalResult<T> {
        self.value(None, None)
    }

    /// Read a sequence of scalars
    ///
    /// Queries the data size first. A size that is not a whole number of
    /// elements is rejected with `MisalignedData` instead of being truncated,
    /// and an input larger than that size with `InputTooLarge`.
    pub fn array_value<T: Scalar>(
        &self,
        input: Option<&[T]>,
        qualifier: Option<&Qualifier>,
    ) -> HalResult<Vec<T>> {
        self.descriptor.semantics.check(Access::Read {
            has_input: input.is_some(),
            has_qualifier: qualifier.is_some(),
        })?;
        self.ensure_element::<T>()?;

        let address = self.address();
        let byte_size = self
            .hal
            .property_data_size(self.object, &address, qualifier)
            .map_err(HalError::Os)?;
        ensure_whole::<T>(byte_size)?;

        let mut data = vec![0u8; byte_size];
        if let Some(input) = input {
            let seeded = encode_slice(input);
            seed(&mut data, &seeded)?;
        }

        trace!("{}: reading {} bytes from @{}", self.name, byte_size, self.object);
        let written = self
            .hal
            .property_data(self.object, &address, qualifier, &mut data)
            .map_err(HalError::Os)?;
        ensure_whole::<T>(written)?;

        Ok(decode_slice(&data[..written]))
    }

    pub fn get_array<T: Scalar>(&self) -> HalResult<Vec<T>> {
        self.array_value(None, None)
    }

    /// Read flat data of any size-negotiated type as raw bytes
    pub fn raw_value(
        &self,
        input: Option<&[u8]>,
        qualifier: Option<&Qualifier>,
    ) -> HalResult<Vec<u8>> {
        self.descriptor.semantics.check(Access::Read {
            has_input: input.is_some(),
            has_qualifier: qualifier.is_some(),
        })?;
        if matches!(self.descriptor.ty.layout(), Layout::Object | Layout::Opaque) {
            return Err(HalError::UnsupportedType(self.descriptor.ty));
        }

        let address = self.address();
        let byte_size = self
            .hal
            .property_data_size(self.object, &address, qualifier)
            .map_err(HalError::Os)?;
        let mut data = vec![0u8; byte_size];
        if let Some(input) = input {
            seed(&mut data, input)?;
        }

        let written = self
            .hal
            .property_data(self.object, &address, qualifier, &mut data)
            .map_err(HalError::Os)?;
        data.truncate(written);
        Ok(data)
    }

    pub fn channel_layout(&self) -> HalResult<ChannelLayout> {
        self.expect_type(PropertyType::ChannelLayout, "ChannelLayout")?;
        let bytes = self.raw_value(None, None)?;
        ChannelLayout::from_bytes(&bytes).ok_or(HalError::MisalignedData {
            byte_size: bytes.len(),
            element_size: 20,
        })
    }

    pub fn buffer_list(&self) -> HalResult<BufferList> {
        self.expect_type(PropertyType::BufferList, "BufferList")?;
        let bytes = self.raw_value(None, None)?;
        BufferList::from_bytes(&bytes).ok_or(HalError::MisalignedData {
            byte_size: bytes.len(),
            element_size: 16,
        })
    }

    pub fn c_string(&self) -> HalResult<String> {
        self.expect_type(PropertyType::CString, "CString")?;
        Ok(c_string_from_bytes(&self.raw_value(None, None)?))
    }

    fn expect_type(&self, ty: PropertyType, requested: &'static str) -> HalResult<()> {
        if self.descriptor.ty == ty {
            Ok(())
        } else {
            Err(HalError::TypeMismatch {
                requested,
                declared: self.descriptor.ty,
            })
        }
    }

    /// Read a CoreFoundation-typed property
    pub fn object_value(&self, qualifier: Option<&Qualifier>) -> HalResult<CfObject> {
        self.descriptor.semantics.check(Access::Read {
            has_input: false,
            has_qualifier: qualifier.is_some(),
        })?;
        if self.descriptor.ty.layout() != Layout::Object {
            return Err(HalError::TypeMismatch {
                requested: "CfObject",
                declared: self.descriptor.ty,
            });
        }

        trace!("{}: reading object from @{}", self.name, self.object);
        self.hal
            .property_object(self.object, &self.address(), self.descriptor.ty, qualifier)
            .map_err(HalError::Os)
    }

    pub fn string_value(&self, qualifier: Option<&Qualifier>) -> HalResult<String> {
        self.expect_type(PropertyType::String, "String")?;
        match self.object_value(qualifier)? {
            CfObject::String(text) => Ok(text),
            _ => Err(HalError::TypeMismatch {
                requested: "String",
                declared: self.descriptor.ty,
            }),
        }
    }

    pub fn set_value<T: Scalar>(&self, value: T, qualifier: Option<&Qualifier>) -> HalResult<()> {
        self.descriptor.semantics.check(Access::Write)?;
        self.ensure_scalar::<T>()?;

        debug!("{}: writing {:?} to @{}", self.name, value, self.object);
        self.hal
            .set_property_data(self.object, &self.address(), qualifier, &value.to_bytes())
            .map_err(HalError::Os)
    }

    pub fn set_array_value<T: Scalar>(
        &self,
        values: &[T],
        qualifier: Option<&Qualifier>,
    ) -> HalResult<()> {
        self.descriptor.semantics.check(Access::Write)?;
        self.ensure_element::<T>()?;

        debug!("{}: writing {:?} to @{}", self.name, values, self.object);
        self.hal
            .set_property_data(self.object, &self.address(), qualifier, &encode_slice(values))
            .map_err(HalError::Os)
    }

    /// Run a translation property on an input payload
    pub fn translate_value(&self, input: &Payload) -> HalResult<Payload> {
        self.descriptor.semantics.check(Access::Translate)?;
        let (from, to) = match self.descriptor.semantics {
            ReadSemantics::Translation { from, to } => (from, to),
            _ => return Err(HalError::InvalidOperation),
        };
        if !input.fits(from) {
            return Err(HalError::TypeMismatch {
                requested: "Payload",
                declared: from,
            });
        }

        trace!("{}: translating {} on @{}", self.name, input, self.object);
        self.hal
            .translate(self.object, &self.address(), input, to)
            .map_err(HalError::Os)
    }

    /// Scalar-to-scalar translation
    pub fn translate<T: Scalar, U: Scalar>(&self, input: T) -> HalResult<U> {
        self.descriptor.semantics.check(Access::Translate)?;
        if let ReadSemantics::Translation { from, to } = self.descriptor.semantics {
            if !T::fits(from) {
                return Err(self.mismatch::<T>());
            }
            if !U::fits(to) {
                return Err(HalError::TypeMismatch {
                    requested: std::any::type_name::<U>(),
                    declared: to,
                });
            }
        }

        let output = self.translate_value(&Payload::scalar(input))?;
        output.read::<U>().ok_or(HalError::TypeMismatch {
            requested: std::any::type_name::<U>(),
            declared: self.descriptor.ty,
        })
    }

    /// Issue an inbound read and hand back the HAL status instead of failing
    pub fn status_for<T: Scalar>(&self, input: T) -> HalResult<OsStatus> {
        self.descriptor.semantics.check(Access::Status)?;
        self.ensure_scalar::<T>()?;

        let mut data = input.to_bytes();
        let status = match self
            .hal
            .property_data(self.object, &self.address(), None, &mut data)
        {
            Ok(_) => 0,
            Err(status) => status,
        };
        trace!("{}: status {} on @{}", self.name, status, self.object);
        Ok(status)
    }

    pub fn data_size(&self, qualifier: Option<&Qualifier>) -> HalResult<usize> {
        self.descriptor.semantics.check(Access::Size {
            has_qualifier: qualifier.is_some(),
        })?;
        self.hal
            .property_data_size(self.object, &self.address(), qualifier)
            .map_err(HalError::Os)
    }

    /// Register a change listener through `registry`
    ///
    /// When `queue` is given, the callback runs on the queue's worker thread.
    pub fn add_listener<F>(
        &self,
        registry: &ListenerRegistry,
        queue: Option<&NotificationQueue>,
        callback: F,
    ) -> HalResult<PropertyListener>
    where
        F: Fn(&[PropertyAddress]) + Send + Sync + 'static,
    {
        registry.add(self.object, self.address(), queue, Arc::new(callback))
    }
}

fn ensure_whole<T: Scalar>(byte_size: usize) -> HalResult<()> {
    if byte_size % T::SIZE == 0 {
        Ok(())
    } else {
        Err(HalError::MisalignedData {
            byte_size,
            element_size: T::SIZE,
        })
    }
}

/// Copy `input` to the front of a size-negotiated buffer
fn seed(data: &mut [u8], input: &[u8]) -> HalResult<()> {
    if input.len() > data.len() {
        return Err(HalError::InputTooLarge {
            input_size: input.len(),
            byte_size: data.len(),
        });
    }
    data[..input.len()].copy_from_slice(input);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class;
    use crate::properties::{ObjectProperty, PropertySet};
    use crate::sim::SimulatedHal;
    use crate::types::{fourcc, status, StreamBasicDescription, ValueRange};

    const DEVICE: AudioObjectId = 40;

    fn descriptor(
        code: &[u8; 4],
        ty: PropertyType,
        semantics: ReadSemantics,
    ) -> PropertyDescriptor {
        PropertyDescriptor::new(fourcc(code), ty, semantics)
    }

    fn device_hal() -> SimulatedHal {
        let hal = SimulatedHal::new();
        hal.add_object(DEVICE, fourcc(b"adev"), 1, "Test Device");
        hal
    }

    #[test]
    fn test_semantics_rules() {
        let qualified = ReadSemantics::QualifiedRead(PropertyType::UInt32);
        assert_eq!(
            qualified.check(Access::Read {
                has_input: false,
                has_qualifier: false
            }),
            Err(HalError::MissingQualifier)
        );
        assert_eq!(
            qualified.check(Access::Size { has_qualifier: false }),
            Err(HalError::MissingQualifier)
        );

        let translation = ReadSemantics::Translation {
            from: PropertyType::UInt32,
            to: PropertyType::String,
        };
        assert_eq!(translation.check(Access::Write), Err(HalError::InvalidOperation));
        assert_eq!(translation.check(Access::Translate), Ok(()));
        assert_eq!(ReadSemantics::Read.check(Access::Translate), Err(HalError::InvalidOperation));
        assert_eq!(ReadSemantics::Read.check(Access::Status), Err(HalError::InvalidOperation));
        assert_eq!(ReadSemantics::InboundOnlyWithStatus.check(Access::Status), Ok(()));
    }

    #[test]
    fn test_qualified_read_without_qualifier_skips_hal() {
        let hal = device_hal();
        let by_id = ReadSemantics::QualifiedRead(PropertyType::UInt32);
        let desc = descriptor(b"scin", PropertyType::String, by_id);
        let kind = descriptor(b"clkk", PropertyType::UInt32, by_id);
        let before = hal.data_calls();

        let name = Property::new(&hal, DEVICE, "itemName", desc);
        assert_eq!(name.object_value(None), Err(HalError::MissingQualifier));
        let kind = Property::new(&hal, DEVICE, "itemKind", kind);
        assert_eq!(kind.get::<u32>(), Err(HalError::MissingQualifier));
        assert_eq!(kind.get_array::<u32>(), Err(HalError::MissingQualifier));

        assert_eq!(hal.data_calls(), before);
    }

    #[test]
    fn test_inbound_reads_need_input() {
        let hal = device_hal();
        for semantics in [
            ReadSemantics::MutatingRead,
            ReadSemantics::InboundOnly,
            ReadSemantics::InboundOnlyWithStatus,
        ] {
            let desc = descriptor(b"inbd", PropertyType::Float32, semantics);
            let prop = Property::new(&hal, DEVICE, "inbound", desc);
            assert_eq!(prop.get::<f32>(), Err(HalError::MissingInputValue));
        }

        let translation = ReadSemantics::Translation {
            from: PropertyType::UInt32,
            to: PropertyType::UInt32,
        };
        let desc = descriptor(b"ssck", PropertyType::ValueTranslation, translation);
        let prop = Property::new(&hal, DEVICE, "kind", desc);
        assert_eq!(prop.get::<u32>(), Err(HalError::MissingInputValue));
        assert_eq!(prop.value(Some(1u32), None), Err(HalError::InvalidOperation));
    }

    #[test]
    fn test_type_mismatch_skips_hal() {
        let hal = device_hal();
        hal.set_scalar(DEVICE, PropertyAddress::any(fourcc(b"nsrt")), 48000.0f64, true);
        let desc = descriptor(b"nsrt", PropertyType::Float64, ReadSemantics::Read);
        let rate = Property::new(&hal, DEVICE, "nominalSampleRate", desc);
        let before = hal.data_calls();

        assert!(matches!(rate.get::<f32>(), Err(HalError::TypeMismatch { .. })));
        assert!(matches!(rate.get_array::<u32>(), Err(HalError::TypeMismatch { .. })));
        assert_eq!(hal.data_calls(), before);

        assert_eq!(rate.get::<f64>(), Ok(48000.0));
    }

    #[test]
    fn test_array_value_counts_elements() {
        let hal = device_hal();
        hal.set_array(
            DEVICE,
            PropertyAddress::any(fourcc(b"nsr#")),
            &[ValueRange::new(44100.0, 44100.0), ValueRange::new(48000.0, 96000.0)],
            false,
        );
        let desc = descriptor(b"nsr#", PropertyType::ValueRangeArray, ReadSemantics::Read);
        let rates = Property::new(&hal, DEVICE, "availableNominalSampleRates", desc);

        let ranges = rates.get_array::<ValueRange>().unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].maximum, 96000.0);
        assert_eq!(rates.data_size(None), Ok(32));
    }

    #[test]
    fn test_array_value_rejects_misaligned_size() {
        let hal = device_hal();
        let address = PropertyAddress::any(fourcc(b"ctrl"));
        hal.set_property(DEVICE, address, vec![1, 0, 0, 0, 2, 0], false);
        let desc = descriptor(b"ctrl", PropertyType::ObjectIdArray, ReadSemantics::Read);
        let controls = Property::new(&hal, DEVICE, "controlList", desc);

        assert_eq!(
            controls.get_array::<u32>(),
            Err(HalError::MisalignedData {
                byte_size: 6,
                element_size: 4
            })
        );
    }

    #[test]
    fn test_oversized_input_is_rejected_not_truncated() {
        let hal = device_hal();
        hal.set_array(DEVICE, PropertyAddress::any(fourcc(b"ctrl")), &[7u32, 8], false);
        let desc = descriptor(b"ctrl", PropertyType::ObjectIdArray, ReadSemantics::Read);
        let controls = Property::new(&hal, DEVICE, "controlList", desc);
        let before = hal.data_calls();

        assert_eq!(
            controls.array_value(Some(&[1u32, 2, 3]), None),
            Err(HalError::InputTooLarge {
                input_size: 12,
                byte_size: 8
            })
        );
        assert_eq!(
            controls.raw_value(Some(&[0u8; 9]), None),
            Err(HalError::InputTooLarge {
                input_size: 9,
                byte_size: 8
            })
        );
        // Only the two size queries reached the HAL
        assert_eq!(hal.data_calls(), before + 2);

        assert_eq!(controls.array_value(Some(&[1u32, 2]), None), Ok(vec![7, 8]));
        assert_eq!(controls.array_value(Some(&[1u32]), None), Ok(vec![7, 8]));
    }

    #[test]
    fn test_optional_qualifier_filters_owned_objects() {
        let hal = SimulatedHal::demo();
        let owned = ObjectProperty::OwnedObjects.on(&hal, DEVICE);

        let all = owned.array_value::<u32>(None, None).unwrap();
        assert_eq!(all, vec![41, 50, 51, 52, 53, 54]);

        let filter = Qualifier::from_slice(&[class::BOOLEAN_CONTROL, class::STREAM]);
        let filtered = owned.array_value::<u32>(None, Some(&filter)).unwrap();
        assert_eq!(filtered, vec![41, 51]);
        assert_eq!(owned.data_size(Some(&filter)), Ok(8));
    }

    #[test]
    fn test_missing_property_reports_status() {
        let hal = device_hal();
        let desc = descriptor(b"ltnc", PropertyType::UInt32, ReadSemantics::Read);
        let latency = Property::new(&hal, DEVICE, "latency", desc);
        assert!(!latency.exists());
        assert!(!latency.is_settable());
        assert_eq!(latency.get::<u32>(), Err(HalError::Os(status::UNKNOWN_PROPERTY)));
    }

    #[test]
    fn test_set_value_round_trips_through_hal() {
        let hal = device_hal();
        hal.set_scalar(DEVICE, PropertyAddress::any(fourcc(b"fsiz")), 512u32, true);
        let desc = descriptor(b"fsiz", PropertyType::UInt32, ReadSemantics::Read);
        let frames = Property::new(&hal, DEVICE, "bufferFrameSize", desc);

        assert!(frames.is_settable());
        frames.set_value(256u32, None).unwrap();
        assert_eq!(frames.get::<u32>(), Ok(256));
    }

    #[test]
    fn test_translation_is_the_only_legal_path() {
        let hal = device_hal();
        let address = PropertyAddress::any(fourcc(b"lscn"));
        hal.set_translation(DEVICE, address, |input| match input.read::<u32>() {
            Some(1) => Ok(Payload::text("Internal Speakers")),
            _ => Err(status::ILLEGAL_OPERATION),
        });
        let semantics = ReadSemantics::Translation {
            from: PropertyType::UInt32,
            to: PropertyType::String,
        };
        let desc = descriptor(b"lscn", PropertyType::ValueTranslation, semantics);
        let name = Property::new(&hal, DEVICE, "dataSourceNameForIDCFString", desc);

        let out = name.translate_value(&Payload::scalar(1u32)).unwrap();
        assert_eq!(out.as_text().as_deref(), Some("Internal Speakers"));
        assert_eq!(name.set_value(1u32, None), Err(HalError::InvalidOperation));
        assert!(matches!(
            name.translate_value(&Payload::text("1")),
            Err(HalError::TypeMismatch { .. })
        ));
        assert_eq!(
            name.translate_value(&Payload::scalar(5u32)),
            Err(HalError::Os(status::ILLEGAL_OPERATION))
        );
    }

    #[test]
    fn test_status_for_returns_raw_status() {
        let hal = device_hal();
        let address = PropertyAddress::any(fourcc(b"sfm?"));
        hal.set_transform(DEVICE, address, |input| {
            let format = StreamBasicDescription::read_from(input);
            if format.sample_rate == 48000.0 {
                Ok(input.to_vec())
            } else {
                Err(fourcc(b"!dat") as OsStatus)
            }
        });
        let desc = descriptor(
            b"sfm?",
            PropertyType::StreamBasicDescription,
            ReadSemantics::InboundOnlyWithStatus,
        );
        let supported = Property::new(&hal, DEVICE, "streamFormatSupported", desc);

        assert_eq!(supported.status_for(StreamBasicDescription::float_pcm(48000.0, 2)), Ok(0));
        assert_eq!(
            supported.status_for(StreamBasicDescription::float_pcm(22050.0, 2)),
            Ok(fourcc(b"!dat") as OsStatus)
        );
    }

    #[test]
    fn test_mutating_read_uses_input() {
        let hal = device_hal();
        let address = PropertyAddress::any(fourcc(b"lcsd"));
        hal.set_transform(DEVICE, address, |input| {
            let scalar = f32::read_from(input);
            Ok((20.0 * scalar.log10()).to_bytes())
        });
        let desc = descriptor(b"lcsd", PropertyType::Float32, ReadSemantics::MutatingRead);
        let convert = Property::new(&hal, DEVICE, "convertScalarToDecibels", desc);

        let db = convert.value(Some(0.1f32), None).unwrap();
        assert!((db + 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_string_and_raw_values() {
        let hal = device_hal();
        let desc = descriptor(b"lnam", PropertyType::String, ReadSemantics::Read);
        let name = Property::new(&hal, DEVICE, "name", desc);
        assert_eq!(name.string_value(None).as_deref(), Ok("Test Device"));
        assert_eq!(
            name.raw_value(None, None),
            Err(HalError::UnsupportedType(PropertyType::String))
        );

        let address = PropertyAddress::any(fourcc(b"name"));
        hal.set_property(DEVICE, address, b"Legacy\0".to_vec(), false);
        let desc = descriptor(b"name", PropertyType::CString, ReadSemantics::Read);
        let legacy = Property::new(&hal, DEVICE, "deviceName", desc);
        assert_eq!(legacy.c_string().as_deref(), Ok("Legacy"));
    }
}
