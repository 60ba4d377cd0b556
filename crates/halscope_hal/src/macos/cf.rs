//! CoreFoundation Conversions
//!
//! # Safety
//!
//! Object-typed HAL properties hand back a retained reference that the caller
//! owns. Every `*_from_owned` function below takes that ownership over with
//! `wrap_under_create_rule`, so the reference is released exactly once.

use std::ffi::c_void;
use std::mem;
use std::ptr;

use core_foundation::array::{CFArray, CFArrayRef};
use core_foundation::base::{CFType, CFTypeRef, TCFType};
use core_foundation::string::{CFString, CFStringRef};
use core_foundation::url::{CFURL, CFURLRef};

use crate::property::PropertyType;
use crate::qualifier::{Qualifier, QualifierKind};
use crate::types::CfObject;

/// Qualifier bytes ready to pass to the HAL
///
/// A CFString qualifier is passed as a pointer to a `CFStringRef`, so the
/// string and the reference slot both have to outlive the call.
pub(super) struct RawQualifier<'a> {
    flat: Option<&'a [u8]>,
    string: Option<CFString>,
    string_ref: CFStringRef,
}

impl<'a> RawQualifier<'a> {
    pub(super) fn new(qualifier: Option<&'a Qualifier>) -> Self {
        match qualifier {
            None => Self {
                flat: None,
                string: None,
                string_ref: ptr::null(),
            },
            Some(q) => match q.kind() {
                QualifierKind::Flat => Self {
                    flat: Some(q.as_bytes()),
                    string: None,
                    string_ref: ptr::null(),
                },
                QualifierKind::CfString => {
                    let string = CFString::new(q.as_text().unwrap_or_default());
                    let string_ref = string.as_concrete_TypeRef();
                    Self {
                        flat: None,
                        string: Some(string),
                        string_ref,
                    }
                }
            },
        }
    }

    pub(super) fn size(&self) -> u32 {
        match (self.flat, &self.string) {
            (Some(bytes), _) => bytes.len() as u32,
            (None, Some(_)) => mem::size_of::<CFStringRef>() as u32,
            (None, None) => 0,
        }
    }

    pub(super) fn as_ptr(&self) -> *const c_void {
        match (self.flat, &self.string) {
            (Some(bytes), _) => bytes.as_ptr() as *const c_void,
            (None, Some(_)) => &self.string_ref as *const CFStringRef as *const c_void,
            (None, None) => ptr::null(),
        }
    }
}

/// Take ownership of a HAL-returned reference and copy it out as `ty`
///
/// # Safety
///
/// `value` must be null or a +1 reference to an object of the type `ty` names.
pub(super) unsafe fn object_from_owned(value: CFTypeRef, ty: PropertyType) -> Option<CfObject> {
    if value.is_null() {
        return match ty {
            PropertyType::String => Some(CfObject::String(String::new())),
            PropertyType::Url => Some(CfObject::Url(String::new())),
            PropertyType::Dictionary => Some(CfObject::Dictionary(String::new())),
            PropertyType::StringArray => Some(CfObject::StringArray(Vec::new())),
            _ => None,
        };
    }

    match ty {
        PropertyType::String => Some(CfObject::String(string_from_owned(value as CFStringRef))),
        PropertyType::Url => {
            let url = CFURL::wrap_under_create_rule(value as CFURLRef);
            Some(CfObject::Url(url.get_string().to_string()))
        }
        PropertyType::Dictionary => {
            let object = CFType::wrap_under_create_rule(value);
            Some(CfObject::Dictionary(format!("{:?}", object)))
        }
        PropertyType::StringArray => {
            let array = CFArray::<CFString>::wrap_under_create_rule(value as CFArrayRef);
            Some(CfObject::StringArray(
                array.iter().map(|item| item.to_string()).collect(),
            ))
        }
        _ => {
            // Release what we were handed even though it is not ours to describe
            drop(CFType::wrap_under_create_rule(value));
            None
        }
    }
}

/// # Safety
///
/// `value` must be null or a +1 `CFStringRef`.
pub(super) unsafe fn string_from_owned(value: CFStringRef) -> String {
    if value.is_null() {
        return String::new();
    }
    CFString::wrap_under_create_rule(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cf_string_qualifier_points_at_reference() {
        let qualifier = Qualifier::from_cf_string("BuiltInSpeakerDevice");
        let raw = RawQualifier::new(Some(&qualifier));
        assert_eq!(raw.size() as usize, mem::size_of::<CFStringRef>());

        let slot = unsafe { *(raw.as_ptr() as *const CFStringRef) };
        let text = unsafe { CFString::wrap_under_get_rule(slot) }.to_string();
        assert_eq!(text, "BuiltInSpeakerDevice");
    }

    #[test]
    fn test_flat_qualifier_passes_bytes() {
        let qualifier = Qualifier::from_scalar(7u32);
        let raw = RawQualifier::new(Some(&qualifier));
        assert_eq!(raw.size(), 4);
        assert!(!raw.as_ptr().is_null());

        let none = RawQualifier::new(None);
        assert_eq!(none.size(), 0);
        assert!(none.as_ptr().is_null());
    }

    #[test]
    fn test_null_object_maps_to_empty_value() {
        let value = unsafe { object_from_owned(ptr::null(), PropertyType::StringArray) };
        assert_eq!(value, Some(CfObject::StringArray(Vec::new())));
    }
}
