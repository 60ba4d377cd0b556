//! CoreAudio HAL Backend
//!
//! Thin forwarding layer from `Hal` to `AudioObjectHasProperty`,
//! `AudioObjectGetPropertyData` and friends. Buffers are sized and filled by
//! the caller; this module only moves bytes and statuses across the FFI
//! boundary.
//!
//! # Listeners
//!
//! Each registration owns a `ListenerContext` whose address is the client
//! data pointer handed to CoreAudio. A removed context is retired rather than
//! freed, since the HAL may still be running a notification for it on its
//! own thread. Retired contexts are freed once they are older than
//! `RETIRED_GRACE` and no notification is in flight for them.
//!
//! # Safety
//!
//! All `unsafe` blocks pass pointers into stack or heap buffers that outlive
//! the call, with sizes taken from those same buffers.

use std::collections::HashMap;
use std::ffi::c_void;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use coreaudio_sys::{
    AudioObjectAddPropertyListener, AudioObjectGetPropertyData, AudioObjectGetPropertyDataSize,
    AudioObjectHasProperty, AudioObjectID, AudioObjectIsPropertySettable,
    AudioObjectPropertyAddress, AudioObjectRemovePropertyListener, AudioObjectSetPropertyData,
    AudioValueTranslation, Boolean, OSStatus,
};
use core_foundation::base::{CFTypeRef, TCFType};
use core_foundation::string::{CFString, CFStringRef};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::cf::{object_from_owned, string_from_owned, RawQualifier};
use crate::hal::{Hal, ListenerCallback, ListenerToken, Payload};
use crate::property::{Layout, PropertyType};
use crate::qualifier::Qualifier;
use crate::types::{status, AudioObjectId, CfObject, OsStatus, PropertyAddress};

/// Longest C string a translation is allowed to produce
const TRANSLATED_C_STRING_CAPACITY: usize = 256;

/// How long a removed listener context outlives its removal
const RETIRED_GRACE: Duration = Duration::from_secs(1);

fn raw_address(address: &PropertyAddress) -> AudioObjectPropertyAddress {
    AudioObjectPropertyAddress {
        mSelector: address.selector,
        mScope: address.scope,
        mElement: address.element,
    }
}

fn check(status: OSStatus) -> Result<(), OsStatus> {
    if status == status::NO_ERROR {
        Ok(())
    } else {
        Err(status)
    }
}

struct ListenerContext {
    callback: ListenerCallback,
    active: AtomicBool,
    /// Notifications currently running on HAL threads
    in_flight: AtomicUsize,
}

/// Marks one notification as running until dropped
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Retired {
    context: Arc<ListenerContext>,
    since: Instant,
}

impl Retired {
    fn releasable(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.since) >= RETIRED_GRACE
            && self.context.in_flight.load(Ordering::SeqCst) == 0
    }
}

struct Registration {
    object: AudioObjectID,
    address: AudioObjectPropertyAddress,
    context: Arc<ListenerContext>,
}

impl Registration {
    fn client_data(&self) -> *mut c_void {
        Arc::as_ptr(&self.context) as *mut c_void
    }
}

unsafe extern "C" fn listener_proc(
    object: AudioObjectID,
    count: u32,
    addresses: *const AudioObjectPropertyAddress,
    client_data: *mut c_void,
) -> OSStatus {
    if client_data.is_null() {
        return status::NO_ERROR;
    }
    let context = &*(client_data as *const ListenerContext);
    let _running = InFlight::enter(&context.in_flight);
    if !context.active.load(Ordering::SeqCst) {
        return status::NO_ERROR;
    }

    let changed: Vec<PropertyAddress> = if count == 0 || addresses.is_null() {
        Vec::new()
    } else {
        slice::from_raw_parts(addresses, count as usize)
            .iter()
            .map(|a| PropertyAddress::new(a.mSelector, a.mScope, a.mElement))
            .collect()
    };

    if panic::catch_unwind(AssertUnwindSafe(|| (context.callback)(object, &changed))).is_err() {
        warn!("Listener callback for @{} panicked", object);
    }
    status::NO_ERROR
}

/// `Hal` backed by the system audio server
pub struct CoreAudioHal {
    listeners: Mutex<HashMap<u64, Registration>>,
    retired: Mutex<Vec<Retired>>,
    next_token: AtomicU64,
}

impl CoreAudioHal {
    pub fn new() -> Self {
        debug!("Using CoreAudio HAL backend");
        Self {
            listeners: Mutex::new(HashMap::new()),
            retired: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Free retired contexts that are past their grace period and idle
    fn prune_retired(&self, now: Instant) -> usize {
        let mut retired = self.retired.lock();
        let before = retired.len();
        retired.retain(|entry| !entry.releasable(now));
        let freed = before - retired.len();
        if freed > 0 {
            trace!("Freed {} retired listener contexts, {} remain", freed, retired.len());
        }
        freed
    }

    fn translate_into(
        &self,
        object: AudioObjectId,
        address: &AudioObjectPropertyAddress,
        input: *mut c_void,
        input_size: u32,
        output: *mut c_void,
        output_size: u32,
    ) -> Result<u32, OsStatus> {
        let mut translation = AudioValueTranslation {
            mInputData: input,
            mInputDataSize: input_size,
            mOutputData: output,
            mOutputDataSize: output_size,
        };
        let mut size = mem::size_of::<AudioValueTranslation>() as u32;

        let status = unsafe {
            AudioObjectGetPropertyData(
                object,
                address,
                0,
                ptr::null(),
                &mut size,
                &mut translation as *mut AudioValueTranslation as *mut c_void,
            )
        };
        check(status)?;
        Ok(translation.mOutputDataSize)
    }

    fn translate_output(
        &self,
        object: AudioObjectId,
        address: &AudioObjectPropertyAddress,
        input: *mut c_void,
        input_size: u32,
        output: PropertyType,
    ) -> Result<Payload, OsStatus> {
        match output.layout() {
            Layout::Scalar(size) => {
                let mut bytes = vec![0u8; size];
                let written = self.translate_into(
                    object,
                    address,
                    input,
                    input_size,
                    bytes.as_mut_ptr() as *mut c_void,
                    size as u32,
                )?;
                bytes.truncate(written as usize);
                Ok(Payload::Flat(bytes))
            }
            Layout::Object if output == PropertyType::String => {
                let mut value: CFStringRef = ptr::null();
                self.translate_into(
                    object,
                    address,
                    input,
                    input_size,
                    &mut value as *mut CFStringRef as *mut c_void,
                    mem::size_of::<CFStringRef>() as u32,
                )?;
                let text = unsafe { string_from_owned(value) };
                Ok(Payload::Object(CfObject::String(text)))
            }
            Layout::Variable if output == PropertyType::CString => {
                let mut bytes = vec![0u8; TRANSLATED_C_STRING_CAPACITY];
                let written = self.translate_into(
                    object,
                    address,
                    input,
                    input_size,
                    bytes.as_mut_ptr() as *mut c_void,
                    bytes.len() as u32,
                )?;
                bytes.truncate(written as usize);
                Ok(Payload::Flat(bytes))
            }
            _ => Err(status::UNSUPPORTED_OPERATION),
        }
    }
}

impl Default for CoreAudioHal {
    fn default() -> Self {
        Self::new()
    }
}

impl Hal for CoreAudioHal {
    fn has_property(&self, object: AudioObjectId, address: &PropertyAddress) -> bool {
        let address = raw_address(address);
        unsafe { AudioObjectHasProperty(object, &address) != 0 }
    }

    fn is_property_settable(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
    ) -> Result<bool, OsStatus> {
        let address = raw_address(address);
        let mut settable: Boolean = 0;
        let status = unsafe { AudioObjectIsPropertySettable(object, &address, &mut settable) };
        check(status)?;
        Ok(settable != 0)
    }

    fn property_data_size(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        qualifier: Option<&Qualifier>,
    ) -> Result<usize, OsStatus> {
        let address = raw_address(address);
        let qualifier = RawQualifier::new(qualifier);
        let mut size: u32 = 0;
        let status = unsafe {
            AudioObjectGetPropertyDataSize(
                object,
                &address,
                qualifier.size(),
                qualifier.as_ptr(),
                &mut size,
            )
        };
        check(status)?;
        Ok(size as usize)
    }

    fn property_data(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        qualifier: Option<&Qualifier>,
        data: &mut [u8],
    ) -> Result<usize, OsStatus> {
        let address = raw_address(address);
        let qualifier = RawQualifier::new(qualifier);
        let mut size = data.len() as u32;
        let status = unsafe {
            AudioObjectGetPropertyData(
                object,
                &address,
                qualifier.size(),
                qualifier.as_ptr(),
                &mut size,
                data.as_mut_ptr() as *mut c_void,
            )
        };
        check(status)?;
        trace!("@{} '{:08x}': {} bytes", object, address.mSelector, size);
        Ok(size as usize)
    }

    fn property_object(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        ty: PropertyType,
        qualifier: Option<&Qualifier>,
    ) -> Result<CfObject, OsStatus> {
        if ty.layout() != Layout::Object {
            return Err(status::BAD_PROPERTY_SIZE);
        }
        let address = raw_address(address);
        let qualifier = RawQualifier::new(qualifier);
        let mut value: CFTypeRef = ptr::null();
        let mut size = mem::size_of::<CFTypeRef>() as u32;
        let status = unsafe {
            AudioObjectGetPropertyData(
                object,
                &address,
                qualifier.size(),
                qualifier.as_ptr(),
                &mut size,
                &mut value as *mut CFTypeRef as *mut c_void,
            )
        };
        check(status)?;
        unsafe { object_from_owned(value, ty) }.ok_or(status::UNSUPPORTED_OPERATION)
    }

    fn set_property_data(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        qualifier: Option<&Qualifier>,
        data: &[u8],
    ) -> Result<(), OsStatus> {
        let address = raw_address(address);
        let qualifier = RawQualifier::new(qualifier);
        let status = unsafe {
            AudioObjectSetPropertyData(
                object,
                &address,
                qualifier.size(),
                qualifier.as_ptr(),
                data.len() as u32,
                data.as_ptr() as *const c_void,
            )
        };
        debug!(
            "@{} '{:08x}' set {} bytes: status {}",
            object,
            address.mSelector,
            data.len(),
            status
        );
        check(status)
    }

    fn translate(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        input: &Payload,
        output: PropertyType,
    ) -> Result<Payload, OsStatus> {
        let address = raw_address(address);
        match input {
            Payload::Flat(bytes) => {
                let mut bytes = bytes.clone();
                let size = bytes.len() as u32;
                let input = bytes.as_mut_ptr() as *mut c_void;
                self.translate_output(object, &address, input, size, output)
            }
            Payload::Object(CfObject::String(text)) => {
                let string = CFString::new(text);
                let mut string_ref = string.as_concrete_TypeRef();
                self.translate_output(
                    object,
                    &address,
                    &mut string_ref as *mut CFStringRef as *mut c_void,
                    mem::size_of::<CFStringRef>() as u32,
                    output,
                )
            }
            Payload::Object(_) => Err(status::UNSUPPORTED_OPERATION),
        }
    }

    fn add_listener(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        callback: ListenerCallback,
    ) -> Result<ListenerToken, OsStatus> {
        let registration = Registration {
            object,
            address: raw_address(address),
            context: Arc::new(ListenerContext {
                callback,
                active: AtomicBool::new(true),
                in_flight: AtomicUsize::new(0),
            }),
        };

        let status = unsafe {
            AudioObjectAddPropertyListener(
                registration.object,
                &registration.address,
                Some(listener_proc),
                registration.client_data(),
            )
        };
        check(status)?;

        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().insert(token, registration);
        Ok(ListenerToken(token))
    }

    fn remove_listener(&self, token: ListenerToken) -> Result<(), OsStatus> {
        let registration = self
            .listeners
            .lock()
            .remove(&token.0)
            .ok_or(status::UNSPECIFIED)?;

        let status = unsafe {
            AudioObjectRemovePropertyListener(
                registration.object,
                &registration.address,
                Some(listener_proc),
                registration.client_data(),
            )
        };
        if let Err(status) = check(status) {
            self.listeners.lock().insert(token.0, registration);
            return Err(status);
        }

        registration.context.active.store(false, Ordering::SeqCst);
        let now = Instant::now();
        self.retired.lock().push(Retired {
            context: registration.context,
            since: now,
        });
        self.prune_retired(now);
        Ok(())
    }
}

impl Drop for CoreAudioHal {
    fn drop(&mut self) {
        let outstanding: Vec<(u64, Registration)> = self.listeners.lock().drain().collect();
        for (token, registration) in outstanding {
            registration.context.active.store(false, Ordering::SeqCst);
            let status = unsafe {
                AudioObjectRemovePropertyListener(
                    registration.object,
                    &registration.address,
                    Some(listener_proc),
                    registration.client_data(),
                )
            };
            if status != status::NO_ERROR {
                warn!("Failed to remove listener {} on drop: status {}", token, status);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{decode_slice, element, fourcc, scope, SYSTEM_OBJECT};

    fn devices_address() -> PropertyAddress {
        PropertyAddress::new(fourcc(b"dev#"), scope::GLOBAL, element::MAIN)
    }

    #[test]
    fn test_system_object_has_devices_property() {
        let hal = CoreAudioHal::new();
        assert!(hal.has_property(SYSTEM_OBJECT, &devices_address()));
    }

    #[test]
    fn test_device_list_is_whole_ids() {
        let hal = CoreAudioHal::new();
        let address = devices_address();
        let size = hal.property_data_size(SYSTEM_OBJECT, &address, None).unwrap();
        assert_eq!(size % 4, 0);

        let mut data = vec![0u8; size];
        let written = hal.property_data(SYSTEM_OBJECT, &address, None, &mut data).unwrap();
        let ids: Vec<u32> = decode_slice(&data[..written]);
        assert!(ids.iter().all(|&id| id != 0));
    }

    #[test]
    fn test_unknown_selector_reports_status() {
        let hal = CoreAudioHal::new();
        let address = PropertyAddress::new(fourcc(b"zzzz"), scope::GLOBAL, element::MAIN);
        assert!(!hal.has_property(SYSTEM_OBJECT, &address));
        assert!(hal.property_data_size(SYSTEM_OBJECT, &address, None).is_err());
    }

    #[test]
    fn test_remove_unknown_listener_fails() {
        let hal = CoreAudioHal::new();
        assert_eq!(hal.remove_listener(ListenerToken(42)), Err(status::UNSPECIFIED));
    }

    fn quiet_callback() -> ListenerCallback {
        Arc::new(|_object: AudioObjectId, _addresses: &[PropertyAddress]| {})
    }

    #[test]
    fn test_listener_round_trip() {
        let hal = CoreAudioHal::new();
        let token = hal.add_listener(SYSTEM_OBJECT, &devices_address(), quiet_callback()).unwrap();
        assert!(hal.remove_listener(token).is_ok());
        assert_eq!(hal.retired.lock().len(), 1);
    }

    #[test]
    fn test_retired_contexts_are_freed_after_grace() {
        let hal = CoreAudioHal::new();
        let address = devices_address();
        for _ in 0..3 {
            let token = hal.add_listener(SYSTEM_OBJECT, &address, quiet_callback()).unwrap();
            hal.remove_listener(token).unwrap();
        }
        assert_eq!(hal.retired.lock().len(), 3);

        assert_eq!(hal.prune_retired(Instant::now() + RETIRED_GRACE * 2), 3);
        assert!(hal.retired.lock().is_empty());
    }

    #[test]
    fn test_busy_retired_context_is_kept() {
        let hal = CoreAudioHal::new();
        let context = Arc::new(ListenerContext {
            callback: quiet_callback(),
            active: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
        });
        let since = Instant::now();
        hal.retired.lock().push(Retired {
            context: context.clone(),
            since,
        });

        let running = InFlight::enter(&context.in_flight);
        assert_eq!(hal.prune_retired(since + RETIRED_GRACE * 2), 0);
        drop(running);
        assert_eq!(hal.prune_retired(since + RETIRED_GRACE / 2), 0);
        assert_eq!(hal.prune_retired(since + RETIRED_GRACE * 2), 1);
    }
}
