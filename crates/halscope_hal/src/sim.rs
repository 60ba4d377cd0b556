//! Simulated HAL
//!
//! An in-process object graph that answers the `Hal` protocol. Used by the
//! test suites, the benchmark and the CLI's `--simulated` mode.
//!
//! # Behavior
//!
//! - Properties are matched with wildcard-aware addresses, first match wins.
//! - `OwnedObjects` is answered from the object's children and honors a
//!   class-id qualifier.
//! - Writes go through per-selector hooks when one is installed, so derived
//!   values (a level control's scalar after a decibel write) are recomputed
//!   here, the same way the audio server would.
//! - Listeners are notified after a successful write, outside the state lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::class;
use crate::hal::{Hal, ListenerCallback, ListenerToken, Payload};
use crate::property::PropertyType;
use crate::qualifier::Qualifier;
use crate::types::{
    element, encode_slice, fourcc, scope, status, AudioObjectId, BufferList, CfObject,
    ChannelDescription, ChannelLayout, ClassId, OsStatus, PropertyAddress, Scalar, Selector,
    StreamBasicDescription, StreamRangedDescription, ValueRange, SYSTEM_OBJECT, UNKNOWN_OBJECT,
};

pub type QualifiedFn = Arc<dyn Fn(Option<&Qualifier>) -> Result<SimValue, OsStatus> + Send + Sync>;
pub type TransformFn = Arc<dyn Fn(&[u8]) -> Result<Vec<u8>, OsStatus> + Send + Sync>;
pub type TranslationFn = Arc<dyn Fn(&Payload) -> Result<Payload, OsStatus> + Send + Sync>;

/// Applies a write to an object; returns the selectors it changed besides the written one
pub type WriteHook =
    Arc<dyn Fn(&mut SimObject, &[u8]) -> Result<Vec<Selector>, OsStatus> + Send + Sync>;

const CLASS: Selector = fourcc(b"clas");
const BASE_CLASS: Selector = fourcc(b"bcls");
const OWNER: Selector = fourcc(b"stdv");
const NAME: Selector = fourcc(b"lnam");
const OWNED_OBJECTS: Selector = fourcc(b"ownd");
const CONTROL_SCOPE: Selector = fourcc(b"cscp");
const CONTROL_ELEMENT: Selector = fourcc(b"celm");

const LEVEL_SCALAR: Selector = fourcc(b"lcsv");
const LEVEL_DECIBELS: Selector = fourcc(b"lcdv");
const LEVEL_RANGE: Selector = fourcc(b"lcdr");
const LEVEL_SCALAR_TO_DB: Selector = fourcc(b"lcsd");
const LEVEL_DB_TO_SCALAR: Selector = fourcc(b"lcds");

const SELECTOR_CURRENT: Selector = fourcc(b"scci");
const SELECTOR_AVAILABLE: Selector = fourcc(b"scai");
const SELECTOR_ITEM_NAME: Selector = fourcc(b"scin");
const SELECTOR_ITEM_KIND: Selector = fourcc(b"clkk");

const BOOLEAN_VALUE: Selector = fourcc(b"bcvl");
const SLIDER_VALUE: Selector = fourcc(b"sdrv");
const SLIDER_RANGE: Selector = fourcc(b"sdrr");
const PAN_VALUE: Selector = fourcc(b"spcv");
const PAN_CHANNELS: Selector = fourcc(b"spcc");

/// Stored value of a simulated property
#[derive(Clone)]
pub enum SimValue {
    Data(Vec<u8>),
    Object(CfObject),
    /// Computed from the qualifier on every read
    Qualified(QualifiedFn),
    /// Mutating or inbound read: input bytes in, output bytes out
    Transform(TransformFn),
    Translation(TranslationFn),
    /// Every access fails with this status
    Failing(OsStatus),
    /// Answered from the object's children
    OwnedObjects,
}

struct SimProperty {
    address: PropertyAddress,
    value: SimValue,
    settable: bool,
}

/// One simulated audio object
pub struct SimObject {
    pub id: AudioObjectId,
    pub class: ClassId,
    pub owner: AudioObjectId,
    properties: Vec<SimProperty>,
    children: Vec<AudioObjectId>,
    hooks: HashMap<Selector, WriteHook>,
}

impl SimObject {
    fn find(&self, address: &PropertyAddress) -> Option<&SimProperty> {
        self.properties.iter().find(|p| p.address.matches(address))
    }

    fn find_mut(&mut self, address: &PropertyAddress) -> Option<&mut SimProperty> {
        self.properties.iter_mut().find(|p| p.address.matches(address))
    }

    fn upsert(&mut self, address: PropertyAddress, value: SimValue, settable: bool) {
        match self.properties.iter_mut().find(|p| p.address == address) {
            Some(existing) => {
                existing.value = value;
                existing.settable = settable;
            }
            None => self.properties.push(SimProperty {
                address,
                value,
                settable,
            }),
        }
    }

    /// Flat bytes stored for `selector`, in any scope
    pub fn data(&self, selector: Selector) -> Option<&[u8]> {
        match self.find(&PropertyAddress::any(selector)).map(|p| &p.value) {
            Some(SimValue::Data(bytes)) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    pub fn scalar<T: Scalar>(&self, selector: Selector) -> Option<T> {
        self.data(selector)
            .filter(|bytes| bytes.len() >= T::SIZE)
            .map(T::read_from)
    }

    /// Replace the flat bytes stored for `selector`
    pub fn store(&mut self, selector: Selector, bytes: Vec<u8>) {
        if let Some(property) = self.find_mut(&PropertyAddress::any(selector)) {
            property.value = SimValue::Data(bytes);
        }
    }

    pub fn store_scalar<T: Scalar>(&mut self, selector: Selector, value: T) {
        self.store(selector, value.to_bytes());
    }

    pub fn children(&self) -> &[AudioObjectId] {
        &self.children
    }
}

struct ListenerSlot {
    token: ListenerToken,
    object: AudioObjectId,
    address: PropertyAddress,
    callback: ListenerCallback,
}

#[derive(Default)]
struct SimState {
    objects: HashMap<AudioObjectId, SimObject>,
    listeners: Vec<ListenerSlot>,
    next_token: u64,
    /// Status and count of upcoming `remove_listener` calls to refuse
    refused_removals: Option<(OsStatus, usize)>,
}

impl SimState {
    fn object(&self, id: AudioObjectId) -> Result<&SimObject, OsStatus> {
        self.objects.get(&id).ok_or(status::BAD_OBJECT)
    }

    /// Evaluate qualified and derived values down to a concrete value
    fn resolve(
        &self,
        id: AudioObjectId,
        address: &PropertyAddress,
        qualifier: Option<&Qualifier>,
    ) -> Result<SimValue, OsStatus> {
        let object = self.object(id)?;
        let property = object.find(address).ok_or(status::UNKNOWN_PROPERTY)?;

        match &property.value {
            SimValue::Qualified(compute) => compute(qualifier),
            SimValue::Failing(status) => Err(*status),
            SimValue::OwnedObjects => {
                let filter: Vec<ClassId> = qualifier.map(|q| q.to_vec::<u32>()).unwrap_or_default();
                let owned: Vec<AudioObjectId> = object
                    .children
                    .iter()
                    .copied()
                    .filter(|child| {
                        filter.is_empty()
                            || self.objects.get(child).map_or(false, |c| {
                                filter.iter().any(|base| class::is_subclass(c.class, *base))
                            })
                    })
                    .collect();
                Ok(SimValue::Data(encode_slice(&owned)))
            }
            other => Ok(other.clone()),
        }
    }

    fn listeners_for(
        &self,
        object: AudioObjectId,
        addresses: &[PropertyAddress],
    ) -> Vec<ListenerCallback> {
        self.listeners
            .iter()
            .filter(|slot| slot.object == object)
            .filter(|slot| {
                addresses.is_empty() || addresses.iter().any(|a| slot.address.matches(a))
            })
            .map(|slot| slot.callback.clone())
            .collect()
    }
}

/// In-memory `Hal` implementation
pub struct SimulatedHal {
    state: Mutex<SimState>,
    data_calls: AtomicUsize,
}

impl Default for SimulatedHal {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            data_calls: AtomicUsize::new(0),
        }
    }

    /// Number of size, data and translation calls served so far
    pub fn data_calls(&self) -> usize {
        self.data_calls.load(Ordering::SeqCst)
    }

    fn count_call(&self) {
        self.data_calls.fetch_add(1, Ordering::SeqCst);
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Add an object with its class, owner and name properties
    ///
    /// The object is appended to its owner's owned objects when the owner exists.
    pub fn add_object(&self, id: AudioObjectId, class: ClassId, owner: AudioObjectId, name: &str) {
        let base = base_class(class);
        let mut object = SimObject {
            id,
            class,
            owner,
            properties: Vec::new(),
            children: Vec::new(),
            hooks: HashMap::new(),
        };
        object.upsert(PropertyAddress::any(CLASS), SimValue::Data(class.to_bytes()), false);
        object.upsert(PropertyAddress::any(BASE_CLASS), SimValue::Data(base.to_bytes()), false);
        object.upsert(PropertyAddress::any(OWNER), SimValue::Data(owner.to_bytes()), false);
        object.upsert(
            PropertyAddress::any(NAME),
            SimValue::Object(CfObject::String(name.to_string())),
            false,
        );
        object.upsert(PropertyAddress::any(OWNED_OBJECTS), SimValue::OwnedObjects, false);

        let mut state = self.state.lock();
        if let Some(parent) = state.objects.get_mut(&owner) {
            if !parent.children.contains(&id) {
                parent.children.push(id);
            }
        }
        state.objects.insert(id, object);
        trace!("Simulated object @{} added under @{}", id, owner);
    }

    fn with_object(&self, id: AudioObjectId, apply: impl FnOnce(&mut SimObject)) {
        if let Some(object) = self.state.lock().objects.get_mut(&id) {
            apply(object);
        }
    }

    pub fn set_value(
        &self,
        id: AudioObjectId,
        address: PropertyAddress,
        value: SimValue,
        settable: bool,
    ) {
        self.with_object(id, |object| object.upsert(address, value, settable));
    }

    pub fn set_property(
        &self,
        id: AudioObjectId,
        address: PropertyAddress,
        bytes: Vec<u8>,
        settable: bool,
    ) {
        self.set_value(id, address, SimValue::Data(bytes), settable);
    }

    pub fn set_scalar<T: Scalar>(
        &self,
        id: AudioObjectId,
        address: PropertyAddress,
        value: T,
        settable: bool,
    ) {
        self.set_property(id, address, value.to_bytes(), settable);
    }

    pub fn set_array<T: Scalar>(
        &self,
        id: AudioObjectId,
        address: PropertyAddress,
        values: &[T],
        settable: bool,
    ) {
        self.set_property(id, address, encode_slice(values), settable);
    }

    pub fn set_object(&self, id: AudioObjectId, address: PropertyAddress, value: CfObject) {
        self.set_value(id, address, SimValue::Object(value), false);
    }

    pub fn set_string(&self, id: AudioObjectId, address: PropertyAddress, text: &str) {
        self.set_object(id, address, CfObject::String(text.to_string()));
    }

    pub fn set_qualified<F>(&self, id: AudioObjectId, address: PropertyAddress, compute: F)
    where
        F: Fn(Option<&Qualifier>) -> Result<SimValue, OsStatus> + Send + Sync + 'static,
    {
        self.set_value(id, address, SimValue::Qualified(Arc::new(compute)), false);
    }

    pub fn set_transform<F>(&self, id: AudioObjectId, address: PropertyAddress, apply: F)
    where
        F: Fn(&[u8]) -> Result<Vec<u8>, OsStatus> + Send + Sync + 'static,
    {
        self.set_value(id, address, SimValue::Transform(Arc::new(apply)), false);
    }

    pub fn set_translation<F>(&self, id: AudioObjectId, address: PropertyAddress, translate: F)
    where
        F: Fn(&Payload) -> Result<Payload, OsStatus> + Send + Sync + 'static,
    {
        self.set_value(id, address, SimValue::Translation(Arc::new(translate)), false);
    }

    pub fn set_failing(&self, id: AudioObjectId, address: PropertyAddress, status: OsStatus) {
        self.set_value(id, address, SimValue::Failing(status), false);
    }

    /// Route writes to `selector` on `id` through `hook`
    pub fn set_write_hook<F>(&self, id: AudioObjectId, selector: Selector, hook: F)
    where
        F: Fn(&mut SimObject, &[u8]) -> Result<Vec<Selector>, OsStatus> + Send + Sync + 'static,
    {
        self.with_object(id, |object| {
            object.hooks.insert(selector, Arc::new(hook));
        });
    }

    /// Fail the next `count` listener removals with `status`
    pub fn refuse_listener_removals(&self, status: OsStatus, count: usize) {
        self.state.lock().refused_removals = Some((status, count));
    }

    pub fn remove_property(&self, id: AudioObjectId, address: PropertyAddress) {
        self.with_object(id, |object| object.properties.retain(|p| p.address != address));
    }

    /// Deliver a change notification to matching listeners
    ///
    /// An empty address list reaches every listener on the object.
    pub fn notify(&self, id: AudioObjectId, addresses: &[PropertyAddress]) {
        let callbacks = self.state.lock().listeners_for(id, addresses);
        for callback in callbacks {
            callback(id, addresses);
        }
    }

    fn add_control_base(
        &self,
        id: AudioObjectId,
        class: ClassId,
        owner: AudioObjectId,
        name: &str,
    ) {
        self.add_object(id, class, owner, name);
        self.set_scalar(id, PropertyAddress::any(CONTROL_SCOPE), scope::OUTPUT, false);
        self.set_scalar(id, PropertyAddress::any(CONTROL_ELEMENT), element::MAIN, false);
    }

    /// Level control whose scalar follows the decibel value as `10^(dB/20)`
    ///
    /// Initial values are stored as given; every later write recomputes the
    /// other representation.
    pub fn add_level_control(
        &self,
        id: AudioObjectId,
        class: ClassId,
        owner: AudioObjectId,
        name: &str,
        scalar: f32,
        decibels: f32,
        range: ValueRange,
    ) {
        self.add_control_base(id, class, owner, name);
        self.set_scalar(id, PropertyAddress::any(LEVEL_SCALAR), scalar, true);
        self.set_scalar(id, PropertyAddress::any(LEVEL_DECIBELS), decibels, true);
        self.set_scalar(id, PropertyAddress::any(LEVEL_RANGE), range, false);

        self.set_transform(id, PropertyAddress::any(LEVEL_SCALAR_TO_DB), move |input| {
            let scalar = read_f32(input)?;
            Ok((scalar_to_decibels(scalar as f64, range) as f32).to_bytes())
        });
        self.set_transform(id, PropertyAddress::any(LEVEL_DB_TO_SCALAR), |input| {
            let db = read_f32(input)?;
            Ok((decibels_to_scalar(db as f64) as f32).to_bytes())
        });

        self.set_write_hook(id, LEVEL_DECIBELS, |object, data| {
            let range = object.scalar::<ValueRange>(LEVEL_RANGE).ok_or(status::UNSPECIFIED)?;
            let db = (read_f32(data)? as f64).clamp(range.minimum, range.maximum);
            object.store_scalar(LEVEL_DECIBELS, db as f32);
            object.store_scalar(LEVEL_SCALAR, decibels_to_scalar(db) as f32);
            Ok(vec![LEVEL_SCALAR])
        });
        self.set_write_hook(id, LEVEL_SCALAR, |object, data| {
            let range = object.scalar::<ValueRange>(LEVEL_RANGE).ok_or(status::UNSPECIFIED)?;
            let scalar = (read_f32(data)? as f64).clamp(0.0, 1.0);
            object.store_scalar(LEVEL_SCALAR, scalar as f32);
            object.store_scalar(LEVEL_DECIBELS, scalar_to_decibels(scalar, range) as f32);
            Ok(vec![LEVEL_DECIBELS])
        });
    }

    pub fn add_boolean_control(
        &self,
        id: AudioObjectId,
        class: ClassId,
        owner: AudioObjectId,
        name: &str,
        value: bool,
    ) {
        self.add_control_base(id, class, owner, name);
        self.set_scalar(id, PropertyAddress::any(BOOLEAN_VALUE), value as u32, true);
    }

    /// Selector control over `(item id, item name)` pairs
    ///
    /// Writing an id that is not among the available items fails.
    pub fn add_selector_control(
        &self,
        id: AudioObjectId,
        class: ClassId,
        owner: AudioObjectId,
        name: &str,
        items: &[(u32, &str)],
        current: &[u32],
    ) {
        self.add_control_base(id, class, owner, name);
        let ids: Vec<u32> = items.iter().map(|(item, _)| *item).collect();
        let names: Arc<HashMap<u32, String>> =
            Arc::new(items.iter().map(|(item, text)| (*item, text.to_string())).collect());

        self.set_array(id, PropertyAddress::any(SELECTOR_AVAILABLE), &ids, false);
        self.set_array(id, PropertyAddress::any(SELECTOR_CURRENT), current, true);

        let lookup = names.clone();
        self.set_qualified(id, PropertyAddress::any(SELECTOR_ITEM_NAME), move |qualifier| {
            let item = qualifier.and_then(|q| q.read::<u32>()).ok_or(status::BAD_PROPERTY_SIZE)?;
            lookup
                .get(&item)
                .map(|text| SimValue::Object(CfObject::String(text.clone())))
                .ok_or(status::ILLEGAL_OPERATION)
        });
        self.set_qualified(id, PropertyAddress::any(SELECTOR_ITEM_KIND), move |qualifier| {
            let item = qualifier.and_then(|q| q.read::<u32>()).ok_or(status::BAD_PROPERTY_SIZE)?;
            if names.contains_key(&item) {
                Ok(SimValue::Data(0u32.to_bytes()))
            } else {
                Err(status::ILLEGAL_OPERATION)
            }
        });

        self.set_write_hook(id, SELECTOR_CURRENT, move |object, data| {
            if data.len() % 4 != 0 {
                return Err(status::BAD_PROPERTY_SIZE);
            }
            let requested: Vec<u32> = crate::types::decode_slice(data);
            if requested.iter().any(|item| !ids.contains(item)) {
                return Err(status::ILLEGAL_OPERATION);
            }
            object.store(SELECTOR_CURRENT, data.to_vec());
            Ok(Vec::new())
        });
    }

    pub fn add_slider_control(
        &self,
        id: AudioObjectId,
        owner: AudioObjectId,
        name: &str,
        value: u32,
        range: [u32; 2],
    ) {
        self.add_control_base(id, class::SLIDER_CONTROL, owner, name);
        self.set_scalar(id, PropertyAddress::any(SLIDER_VALUE), value, true);
        self.set_array(id, PropertyAddress::any(SLIDER_RANGE), &range, false);
        self.set_write_hook(id, SLIDER_VALUE, move |object, data| {
            let value = u32::read_from(checked(data, 4)?).clamp(range[0], range[1]);
            object.store_scalar(SLIDER_VALUE, value);
            Ok(Vec::new())
        });
    }

    pub fn add_stereo_pan_control(
        &self,
        id: AudioObjectId,
        owner: AudioObjectId,
        name: &str,
        value: f32,
        channels: [u32; 2],
    ) {
        self.add_control_base(id, class::STEREO_PAN_CONTROL, owner, name);
        self.set_scalar(id, PropertyAddress::any(PAN_VALUE), value, true);
        self.set_array(id, PropertyAddress::any(PAN_CHANNELS), &channels, false);
        self.set_write_hook(id, PAN_VALUE, |object, data| {
            let value = read_f32(data)?.clamp(0.0, 1.0);
            object.store_scalar(PAN_VALUE, value);
            Ok(Vec::new())
        });
    }

    /// A small but complete object graph: system, plug-in, one output
    /// device with a stream and one control of each kind
    pub fn demo() -> Self {
        let hal = Self::new();
        let any = PropertyAddress::any;
        let output = |selector| PropertyAddress::new(selector, scope::OUTPUT, element::MAIN);

        hal.add_object(SYSTEM_OBJECT, class::SYSTEM, UNKNOWN_OBJECT, "Audio System");
        hal.set_array(SYSTEM_OBJECT, any(fourcc(b"dev#")), &[40u32], false);
        hal.set_array(SYSTEM_OBJECT, any(fourcc(b"plg#")), &[2u32], false);
        hal.set_scalar(SYSTEM_OBJECT, any(fourcc(b"dOut")), 40u32, true);
        hal.set_scalar(SYSTEM_OBJECT, any(fourcc(b"sOut")), 40u32, true);
        hal.set_scalar(SYSTEM_OBJECT, any(fourcc(b"dIn ")), UNKNOWN_OBJECT, true);
        hal.set_scalar(SYSTEM_OBJECT, any(fourcc(b"stmo")), 0u32, true);
        hal.set_scalar(SYSTEM_OBJECT, any(fourcc(b"slep")), 1u32, true);
        hal.set_qualified(SYSTEM_OBJECT, any(fourcc(b"uidd")), |qualifier| {
            match qualifier.and_then(|q| q.as_text()) {
                Some(DEMO_DEVICE_UID) => Ok(SimValue::Data(40u32.to_bytes())),
                Some(_) => Ok(SimValue::Data(UNKNOWN_OBJECT.to_bytes())),
                None => Err(status::BAD_PROPERTY_SIZE),
            }
        });
        hal.set_translation(SYSTEM_OBJECT, any(fourcc(b"duid")), |input| match input.as_text() {
            Some(uid) if uid == DEMO_DEVICE_UID => Ok(Payload::scalar(40u32)),
            _ => Ok(Payload::scalar(UNKNOWN_OBJECT)),
        });

        hal.add_object(2, class::PLUG_IN, SYSTEM_OBJECT, "Built-in Audio");
        hal.set_string(2, any(fourcc(b"piid")), "com.apple.audio.CoreAudio");
        hal.set_string(2, any(fourcc(b"lmak")), "Apple Inc.");
        hal.set_array(2, any(fourcc(b"dev#")), &[40u32], false);

        hal.add_object(40, class::DEVICE, 2, "Built-in Output");
        hal.set_string(40, any(fourcc(b"uid ")), DEMO_DEVICE_UID);
        hal.set_string(40, any(fourcc(b"muid")), "BuiltInSpeakerModel");
        hal.set_string(40, any(fourcc(b"lmak")), "Apple Inc.");
        hal.set_scalar(40, any(fourcc(b"tran")), fourcc(b"bltn"), false);
        hal.set_scalar(40, any(fourcc(b"livn")), 1u32, false);
        hal.set_scalar(40, any(fourcc(b"goin")), 0u32, false);
        hal.set_scalar(40, any(fourcc(b"dflt")), 1u32, false);
        hal.set_scalar(40, any(fourcc(b"hidn")), 0u32, false);
        hal.set_scalar(40, any(fourcc(b"oink")), -1i32, true);
        hal.set_scalar(40, output(fourcc(b"ltnc")), 12u32, false);
        hal.set_scalar(40, output(fourcc(b"saft")), 24u32, false);
        hal.set_scalar(40, any(fourcc(b"nsrt")), 48000.0f64, true);
        hal.set_array(
            40,
            any(fourcc(b"nsr#")),
            &[
                ValueRange::new(44100.0, 44100.0),
                ValueRange::new(48000.0, 48000.0),
                ValueRange::new(96000.0, 96000.0),
            ],
            false,
        );
        hal.set_scalar(40, any(fourcc(b"fsiz")), 512u32, true);
        hal.set_scalar(40, any(fourcc(b"fsz#")), ValueRange::new(14.0, 4096.0), false);
        hal.set_scalar(40, any(fourcc(b"ncyc")), 1.0f32, true);
        hal.set_array(40, output(fourcc(b"stm#")), &[41u32], false);
        hal.set_array(40, any(fourcc(b"ctrl")), &[50u32, 51, 52, 53, 54], false);
        hal.set_array(40, output(fourcc(b"dch2")), &[1u32, 2], true);
        let icon = CfObject::Url("file:///System/Library/Audio/Speaker.icns".into());
        hal.set_object(40, any(fourcc(b"icon")), icon);
        hal.set_property(
            40,
            output(fourcc(b"srnd")),
            ChannelLayout {
                tag: 0,
                bitmap: 0b11,
                descriptions: vec![
                    ChannelDescription { label: 1, ..Default::default() },
                    ChannelDescription { label: 2, ..Default::default() },
                ],
            }
            .to_bytes(),
            true,
        );
        hal.set_property(
            40,
            output(fourcc(b"slay")),
            BufferList { channels_per_buffer: vec![2] }.to_bytes(),
            false,
        );
        hal.set_property(40, any(fourcc(b"name")), b"Built-in Output\0".to_vec(), false);
        hal.set_array(40, output(fourcc(b"ssrc")), &[1u32], true);
        hal.set_array(40, output(fourcc(b"ssc#")), &[1u32, 2], false);
        hal.set_translation(40, any(fourcc(b"lscn")), |input| match input.read::<u32>() {
            Some(1) => Ok(Payload::text("Internal Speakers")),
            Some(2) => Ok(Payload::text("Headphones")),
            _ => Err(status::ILLEGAL_OPERATION),
        });
        hal.set_translation(40, any(fourcc(b"ssck")), |input| match input.read::<u32>() {
            Some(1) => Ok(Payload::scalar(fourcc(b"ispk"))),
            Some(2) => Ok(Payload::scalar(fourcc(b"hdpn"))),
            _ => Err(status::ILLEGAL_OPERATION),
        });
        hal.set_translation(40, any(fourcc(b"sscn")), |input| match input.read::<u32>() {
            Some(1) => Ok(Payload::c_string("Internal Speakers")),
            Some(2) => Ok(Payload::c_string("Headphones")),
            _ => Err(status::ILLEGAL_OPERATION),
        });
        hal.set_transform(40, any(fourcc(b"sfm?")), |input| {
            let format =
                StreamBasicDescription::read_from(checked(input, StreamBasicDescription::SIZE)?);
            if [44100.0, 48000.0, 96000.0].contains(&format.sample_rate) {
                Ok(input.to_vec())
            } else {
                Err(fourcc(b"!dat") as OsStatus)
            }
        });

        let format = StreamBasicDescription::float_pcm(48000.0, 2);
        hal.add_object(41, class::STREAM, 40, "Speaker Stream");
        hal.set_scalar(41, any(fourcc(b"sact")), 1u32, false);
        hal.set_scalar(41, any(fourcc(b"sdir")), 0u32, false);
        hal.set_scalar(41, any(fourcc(b"term")), fourcc(b"spkr"), false);
        hal.set_scalar(41, any(fourcc(b"schn")), 1u32, false);
        hal.set_scalar(41, any(fourcc(b"ltnc")), 0u32, false);
        hal.set_scalar(41, any(fourcc(b"sfmt")), format, true);
        hal.set_scalar(41, any(fourcc(b"pft ")), format, true);
        let ranged = [44100.0, 48000.0, 96000.0].map(|rate| StreamRangedDescription {
            format: StreamBasicDescription { sample_rate: rate, ..format },
            sample_rate_range: ValueRange::new(rate, rate),
        });
        hal.set_array(41, any(fourcc(b"sfma")), &ranged, false);
        hal.set_array(41, any(fourcc(b"pfta")), &ranged, false);

        hal.add_level_control(
            50,
            class::VOLUME_CONTROL,
            40,
            "Master Volume",
            0.5,
            -6.0,
            ValueRange::new(-60.0, 0.0),
        );
        hal.add_boolean_control(51, class::MUTE_CONTROL, 40, "Mute", false);
        hal.add_selector_control(
            52,
            class::DATA_SOURCE_CONTROL,
            40,
            "Output Source",
            &[(1, "Internal Speakers"), (2, "Headphones")],
            &[1],
        );
        hal.add_stereo_pan_control(53, 40, "Balance", 0.5, [1, 2]);
        hal.add_slider_control(54, 40, "Gain Steps", 3, [0, 10]);

        debug!("Simulated HAL populated with {} objects", hal.object_count());
        hal
    }
}

/// UID the demo graph gives its output device
pub const DEMO_DEVICE_UID: &str = "BuiltInSpeakerDevice";

fn base_class(class_id: ClassId) -> ClassId {
    let parents = [
        class::LEVEL_CONTROL,
        class::BOOLEAN_CONTROL,
        class::SELECTOR_CONTROL,
        class::DEVICE,
        class::PLUG_IN,
    ];
    if let Some(parent) = parents
        .iter()
        .copied()
        .find(|p| *p != class_id && class::is_subclass(class_id, *p))
    {
        return parent;
    }
    if class_id != class::CONTROL && class::is_subclass(class_id, class::CONTROL) {
        return class::CONTROL;
    }
    class::OBJECT
}

fn checked(bytes: &[u8], size: usize) -> Result<&[u8], OsStatus> {
    if bytes.len() < size {
        Err(status::BAD_PROPERTY_SIZE)
    } else {
        Ok(bytes)
    }
}

fn read_f32(bytes: &[u8]) -> Result<f32, OsStatus> {
    checked(bytes, 4).map(f32::read_from)
}

fn decibels_to_scalar(db: f64) -> f64 {
    10f64.powf(db / 20.0).clamp(0.0, 1.0)
}

fn scalar_to_decibels(scalar: f64, range: ValueRange) -> f64 {
    if scalar <= 0.0 {
        range.minimum
    } else {
        (20.0 * scalar.log10()).clamp(range.minimum, range.maximum)
    }
}

impl Hal for SimulatedHal {
    fn has_property(&self, object: AudioObjectId, address: &PropertyAddress) -> bool {
        self.state
            .lock()
            .objects
            .get(&object)
            .map_or(false, |o| o.find(address).is_some())
    }

    fn is_property_settable(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
    ) -> Result<bool, OsStatus> {
        let state = self.state.lock();
        let property = state.object(object)?.find(address).ok_or(status::UNKNOWN_PROPERTY)?;
        Ok(property.settable)
    }

    fn property_data_size(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        qualifier: Option<&Qualifier>,
    ) -> Result<usize, OsStatus> {
        self.count_call();
        let value = self.state.lock().resolve(object, address, qualifier)?;
        match value {
            SimValue::Data(bytes) => Ok(bytes.len()),
            SimValue::Object(_) => Ok(std::mem::size_of::<usize>()),
            // AudioValueTranslation: two pointers, two sizes, padded
            SimValue::Translation(_) => Ok(32),
            _ => Err(status::UNSUPPORTED_OPERATION),
        }
    }

    fn property_data(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        qualifier: Option<&Qualifier>,
        data: &mut [u8],
    ) -> Result<usize, OsStatus> {
        self.count_call();
        let value = self.state.lock().resolve(object, address, qualifier)?;
        let bytes = match value {
            SimValue::Data(bytes) => bytes,
            SimValue::Transform(apply) => apply(data)?,
            SimValue::Translation(_) => return Err(status::ILLEGAL_OPERATION),
            _ => return Err(status::UNSUPPORTED_OPERATION),
        };
        let written = bytes.len().min(data.len());
        data[..written].copy_from_slice(&bytes[..written]);
        Ok(written)
    }

    fn property_object(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        ty: PropertyType,
        qualifier: Option<&Qualifier>,
    ) -> Result<CfObject, OsStatus> {
        self.count_call();
        match self.state.lock().resolve(object, address, qualifier)? {
            SimValue::Object(value) if value.fits(ty) => Ok(value),
            _ => Err(status::BAD_PROPERTY_SIZE),
        }
    }

    fn set_property_data(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        _qualifier: Option<&Qualifier>,
        data: &[u8],
    ) -> Result<(), OsStatus> {
        let (callbacks, changed) = {
            let mut state = self.state.lock();
            let target = state.objects.get_mut(&object).ok_or(status::BAD_OBJECT)?;
            let property = target.find(address).ok_or(status::UNKNOWN_PROPERTY)?;
            if !property.settable {
                return Err(status::ILLEGAL_OPERATION);
            }
            let written = property.address;

            let mut changed = vec![*address];
            match target.hooks.get(&address.selector).cloned() {
                Some(hook) => {
                    let derived = hook(target, data)?;
                    changed.extend(derived.into_iter().map(|selector| {
                        PropertyAddress::new(selector, scope::GLOBAL, element::MAIN)
                    }));
                }
                None => {
                    let property = target.find_mut(&written).ok_or(status::UNKNOWN_PROPERTY)?;
                    match property.value {
                        SimValue::Data(_) => property.value = SimValue::Data(data.to_vec()),
                        _ => return Err(status::ILLEGAL_OPERATION),
                    }
                }
            }
            (state.listeners_for(object, &changed), changed)
        };

        debug!("Simulated write to @{} ({} bytes)", object, data.len());
        for callback in callbacks {
            callback(object, &changed);
        }
        Ok(())
    }

    fn translate(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        input: &Payload,
        output: PropertyType,
    ) -> Result<Payload, OsStatus> {
        self.count_call();
        match self.state.lock().resolve(object, address, None)? {
            SimValue::Translation(translate) => {
                let result = translate(input)?;
                if result.fits(output) {
                    Ok(result)
                } else {
                    Err(status::BAD_PROPERTY_SIZE)
                }
            }
            _ => Err(status::ILLEGAL_OPERATION),
        }
    }

    fn add_listener(
        &self,
        object: AudioObjectId,
        address: &PropertyAddress,
        callback: ListenerCallback,
    ) -> Result<ListenerToken, OsStatus> {
        let mut state = self.state.lock();
        state.object(object)?;
        state.next_token += 1;
        let token = ListenerToken(state.next_token);
        state.listeners.push(ListenerSlot {
            token,
            object,
            address: *address,
            callback,
        });
        Ok(token)
    }

    fn remove_listener(&self, token: ListenerToken) -> Result<(), OsStatus> {
        let mut state = self.state.lock();
        if let Some((refusal, remaining)) = state.refused_removals {
            state.refused_removals = (remaining > 1).then_some((refusal, remaining - 1));
            if remaining > 0 {
                return Err(refusal);
            }
        }
        let before = state.listeners.len();
        state.listeners.retain(|slot| slot.token != token);
        if state.listeners.len() == before {
            Err(status::UNSPECIFIED)
        } else {
            Ok(())
        }
    }
}
