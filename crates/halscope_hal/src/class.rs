//! Audio Object Classes
//!
//! Class-id constants, the category predicate used to pick property sets,
//! and display names.

use crate::properties::PropertySetKind;
use crate::types::{fourcc, ClassId};

pub const OBJECT: ClassId = fourcc(b"aobj");
pub const SYSTEM: ClassId = fourcc(b"asys");
pub const PLUG_IN: ClassId = fourcc(b"aplg");
pub const TRANSPORT_MANAGER: ClassId = fourcc(b"trpm");
pub const BOX: ClassId = fourcc(b"abox");
pub const DEVICE: ClassId = fourcc(b"adev");
pub const CLOCK_DEVICE: ClassId = fourcc(b"aclk");
pub const END_POINT_DEVICE: ClassId = fourcc(b"edev");
pub const END_POINT: ClassId = fourcc(b"endp");
pub const STREAM: ClassId = fourcc(b"astr");
pub const AGGREGATE_DEVICE: ClassId = fourcc(b"aagg");
pub const SUB_DEVICE: ClassId = fourcc(b"asub");

pub const CONTROL: ClassId = fourcc(b"actl");
pub const SLIDER_CONTROL: ClassId = fourcc(b"sldr");
pub const LEVEL_CONTROL: ClassId = fourcc(b"levl");
pub const VOLUME_CONTROL: ClassId = fourcc(b"vlme");
pub const LFE_VOLUME_CONTROL: ClassId = fourcc(b"subv");
pub const BOOT_CHIME_VOLUME_CONTROL: ClassId = fourcc(b"pram");
pub const BOOLEAN_CONTROL: ClassId = fourcc(b"togl");
pub const MUTE_CONTROL: ClassId = fourcc(b"mute");
pub const SOLO_CONTROL: ClassId = fourcc(b"solo");
pub const JACK_CONTROL: ClassId = fourcc(b"jack");
pub const LFE_MUTE_CONTROL: ClassId = fourcc(b"subm");
pub const PHANTOM_POWER_CONTROL: ClassId = fourcc(b"phan");
pub const PHASE_INVERT_CONTROL: ClassId = fourcc(b"phsi");
pub const CLIP_LIGHT_CONTROL: ClassId = fourcc(b"clip");
pub const TALKBACK_CONTROL: ClassId = fourcc(b"talb");
pub const LISTENBACK_CONTROL: ClassId = fourcc(b"lsnb");
pub const ISUB_OWNER_CONTROL: ClassId = fourcc(b"atch");
// Undocumented boolean controls seen on Apple hardware
pub const DONZ_CONTROL: ClassId = fourcc(b"donz");
pub const EVIS_CONTROL: ClassId = fourcc(b"evis");
pub const SELECTOR_CONTROL: ClassId = fourcc(b"slct");
pub const DATA_SOURCE_CONTROL: ClassId = fourcc(b"dsrc");
pub const DATA_DESTINATION_CONTROL: ClassId = fourcc(b"dest");
pub const CLOCK_SOURCE_CONTROL: ClassId = fourcc(b"clck");
pub const LINE_LEVEL_CONTROL: ClassId = fourcc(b"nlvl");
pub const HIGH_PASS_FILTER_CONTROL: ClassId = fourcc(b"hipf");
pub const STEREO_PAN_CONTROL: ClassId = fourcc(b"span");

const PLUG_IN_SIBLINGS: &[ClassId] = &[TRANSPORT_MANAGER];

const DEVICE_SIBLINGS: &[ClassId] = &[END_POINT_DEVICE, END_POINT, AGGREGATE_DEVICE, SUB_DEVICE];

const LEVEL_SIBLINGS: &[ClassId] = &[VOLUME_CONTROL, LFE_VOLUME_CONTROL, BOOT_CHIME_VOLUME_CONTROL];

const BOOLEAN_SIBLINGS: &[ClassId] = &[
    MUTE_CONTROL,
    SOLO_CONTROL,
    JACK_CONTROL,
    LFE_MUTE_CONTROL,
    PHANTOM_POWER_CONTROL,
    PHASE_INVERT_CONTROL,
    CLIP_LIGHT_CONTROL,
    TALKBACK_CONTROL,
    LISTENBACK_CONTROL,
    ISUB_OWNER_CONTROL,
    DONZ_CONTROL,
    EVIS_CONTROL,
];

const SELECTOR_SIBLINGS: &[ClassId] = &[
    DATA_SOURCE_CONTROL,
    DATA_DESTINATION_CONTROL,
    CLOCK_SOURCE_CONTROL,
    LINE_LEVEL_CONTROL,
    HIGH_PASS_FILTER_CONTROL,
];

/// Whether `class` belongs to the category `base`
///
/// Every class is an `OBJECT`. Categories with sibling sets (plug-in,
/// device, control, level, boolean, selector) also accept their siblings;
/// anything else requires an exact match.
pub fn is_subclass(class: ClassId, base: ClassId) -> bool {
    match base {
        OBJECT => true,
        PLUG_IN => class == base || PLUG_IN_SIBLINGS.contains(&class),
        DEVICE => class == base || DEVICE_SIBLINGS.contains(&class),
        CONTROL => {
            matches!(
                class,
                CONTROL
                    | SLIDER_CONTROL
                    | LEVEL_CONTROL
                    | BOOLEAN_CONTROL
                    | SELECTOR_CONTROL
                    | STEREO_PAN_CONTROL
            ) || LEVEL_SIBLINGS.contains(&class)
                || BOOLEAN_SIBLINGS.contains(&class)
                || SELECTOR_SIBLINGS.contains(&class)
        }
        LEVEL_CONTROL => class == base || LEVEL_SIBLINGS.contains(&class),
        BOOLEAN_CONTROL => class == base || BOOLEAN_SIBLINGS.contains(&class),
        SELECTOR_CONTROL => class == base || SELECTOR_SIBLINGS.contains(&class),
        _ => class == base,
    }
}

/// Display name of a class; unknown ids read as "Object"
pub fn class_name(class: ClassId) -> &'static str {
    match class {
        SYSTEM => "SystemObject",
        OBJECT => "Object",
        PLUG_IN => "PlugIn",
        TRANSPORT_MANAGER => "TransportManager",
        BOX => "Box",
        DEVICE => "Device",
        CLOCK_DEVICE => "ClockDevice",
        END_POINT_DEVICE => "EndPointDevice",
        END_POINT => "EndPoint",
        STREAM => "Stream",
        AGGREGATE_DEVICE => "AggregateDevice",
        SUB_DEVICE => "SubDevice",
        CONTROL => "Control",
        SLIDER_CONTROL => "SliderControl",
        LEVEL_CONTROL => "LevelControl",
        VOLUME_CONTROL => "VolumeControl",
        LFE_VOLUME_CONTROL => "LFEVolumeControl",
        BOOT_CHIME_VOLUME_CONTROL => "BootChimeControl",
        BOOLEAN_CONTROL => "BooleanControl",
        MUTE_CONTROL => "MuteControl",
        SOLO_CONTROL => "SoloControl",
        JACK_CONTROL => "JackControl",
        LFE_MUTE_CONTROL => "LFEMuteControl",
        PHANTOM_POWER_CONTROL => "PhantomPowerControl",
        PHASE_INVERT_CONTROL => "PhaseInvertControl",
        CLIP_LIGHT_CONTROL => "ClipLightControl",
        TALKBACK_CONTROL => "TalkbackControl",
        LISTENBACK_CONTROL => "ListenbackControl",
        ISUB_OWNER_CONTROL => "ISubOwnerControl",
        DONZ_CONTROL => "DONZControl",
        EVIS_CONTROL => "EVISControl",
        SELECTOR_CONTROL => "SelectorControl",
        DATA_SOURCE_CONTROL => "DataSourceControl",
        DATA_DESTINATION_CONTROL => "DataDestinationControl",
        CLOCK_SOURCE_CONTROL => "ClockSourceControl",
        LINE_LEVEL_CONTROL => "LineLevelControl",
        HIGH_PASS_FILTER_CONTROL => "HighPassFilterControl",
        STEREO_PAN_CONTROL => "StereoPanControl",
        _ => "Object",
    }
}

/// Property sets to list for an object of `class`, in listing order
///
/// The object set always comes first. Deprecated sets follow the current
/// set they extend when `include_deprecated` is set.
pub fn property_sets_for(class: ClassId, include_deprecated: bool) -> Vec<PropertySetKind> {
    use PropertySetKind as K;

    let mut sets = vec![K::Object];
    let mut push = |current: K, deprecated: Option<K>| {
        sets.push(current);
        if let (true, Some(deprecated)) = (include_deprecated, deprecated) {
            sets.push(deprecated);
        }
    };

    if class == SYSTEM {
        push(K::System, Some(K::SystemDeprecated));
    } else if is_subclass(class, DEVICE) {
        push(K::Device, Some(K::DeviceDeprecated));
        match class {
            END_POINT_DEVICE => push(K::EndPointDevice, None),
            AGGREGATE_DEVICE => push(K::AggregateDevice, None),
            SUB_DEVICE => push(K::SubDevice, None),
            _ => {}
        }
    } else if class == CLOCK_DEVICE {
        push(K::ClockDevice, None);
    } else if class == STREAM {
        push(K::Stream, Some(K::StreamDeprecated));
    } else if is_subclass(class, CONTROL) {
        push(K::Control, Some(K::ControlDeprecated));
        if is_subclass(class, BOOLEAN_CONTROL) {
            push(K::BooleanControl, None);
        } else if is_subclass(class, SELECTOR_CONTROL) {
            push(K::SelectorControl, None);
        } else if is_subclass(class, SLIDER_CONTROL) {
            push(K::SliderControl, None);
        } else if is_subclass(class, LEVEL_CONTROL) {
            push(K::LevelControl, Some(K::LevelControlDeprecated));
        } else if is_subclass(class, STEREO_PAN_CONTROL) {
            push(K::StereoPanControl, None);
        }
    } else if class == PLUG_IN {
        push(K::PlugIn, None);
    } else if class == TRANSPORT_MANAGER {
        push(K::PlugIn, None);
        push(K::TransportManager, None);
    } else if class == BOX {
        push(K::Box, None);
    }

    sets
}
