//! Property Sets
//!
//! One closed enumeration per object category. Each case maps to a static
//! `PropertyDescriptor`; the tables are plain data generated by
//! `property_set!`, so adding a property is one line.
//!
//! # Architecture
//!
//! ```text
//! PropertySetKind ──► entries()/existing()      (runtime dispatch, used by listings)
//!        │
//!        └─ DeviceProperty, StreamProperty, …   (typed cases, used by control models)
//!               └─ PropertySet::on(hal, id) ──► Property
//! ```

use serde::{Deserialize, Serialize};

use crate::hal::Hal;
use crate::property::{Property, PropertyDescriptor, PropertyType, ReadSemantics};
use crate::types::{fourcc, AudioObjectId, Element, Scope, Selector};

/// Closed set of properties for one object category
pub trait PropertySet: Copy + Sized + 'static {
    const KIND: PropertySetKind;

    /// Every case, in declaration order
    fn all() -> &'static [Self];

    fn descriptor(self) -> PropertyDescriptor;

    fn name(self) -> &'static str;

    fn selector(self) -> Selector {
        self.descriptor().selector
    }

    /// Bind this property to an object (wildcard scope and element)
    fn on<'a>(self, hal: &'a dyn Hal, object: AudioObjectId) -> Property<'a> {
        Property::new(hal, object, self.name(), self.descriptor())
    }

    /// Cases that exist on `object`, in declaration order
    fn all_existing(
        hal: &dyn Hal,
        object: AudioObjectId,
        scope: Scope,
        element: Element,
    ) -> Vec<Self> {
        Self::all()
            .iter()
            .copied()
            .filter(|case| case.on(hal, object).scope(scope).element(element).exists())
            .collect()
    }
}

macro_rules! semantics {
    () => {
        ReadSemantics::Read
    };
    (Translation($from:ident, $to:ident)) => {
        ReadSemantics::Translation {
            from: PropertyType::$from,
            to: PropertyType::$to,
        }
    };
    ($sem:ident($arg:ident)) => {
        ReadSemantics::$sem(PropertyType::$arg)
    };
    ($sem:ident) => {
        ReadSemantics::$sem
    };
}

macro_rules! property_set {
    (
        $(#[$meta:meta])*
        $set:ident: $kind:ident {
            $( $case:ident = ($code:literal, $ty:ident $(, $($sem:tt)+)?) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $set {
            $($case),+
        }

        impl PropertySet for $set {
            const KIND: PropertySetKind = PropertySetKind::$kind;

            fn all() -> &'static [Self] {
                &[$($set::$case),+]
            }

            fn descriptor(self) -> PropertyDescriptor {
                match self {
                    $($set::$case => PropertyDescriptor::new(
                        fourcc($code),
                        PropertyType::$ty,
                        semantics!($($($sem)+)?),
                    )),+
                }
            }

            fn name(self) -> &'static str {
                match self {
                    $($set::$case => stringify!($case)),+
                }
            }
        }
    };
}

macro_rules! property_set_kinds {
    ($( $kind:ident => $set:ident, $title:literal, $deprecated:literal; )+) => {
        /// Runtime tag for each property set
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum PropertySetKind {
            $($kind),+
        }

        impl PropertySetKind {
            pub const ALL: &'static [PropertySetKind] = &[$(PropertySetKind::$kind),+];

            pub fn title(self) -> &'static str {
                match self {
                    $(PropertySetKind::$kind => $title),+
                }
            }

            /// Sets holding properties the HAL has deprecated
            pub fn is_deprecated(self) -> bool {
                match self {
                    $(PropertySetKind::$kind => $deprecated),+
                }
            }

            /// `(case name, descriptor)` for every case, in declaration order
            pub fn entries(self) -> Vec<(&'static str, PropertyDescriptor)> {
                match self {
                    $(PropertySetKind::$kind => entries_of::<$set>()),+
                }
            }

            /// Entries whose property exists on `object`, in declaration order
            pub fn existing(
                self,
                hal: &dyn Hal,
                object: AudioObjectId,
                scope: Scope,
                element: Element,
            ) -> Vec<(&'static str, PropertyDescriptor)> {
                match self {
                    $(PropertySetKind::$kind => existing_of::<$set>(hal, object, scope, element)),+
                }
            }
        }
    };
}

fn entries_of<S: PropertySet>() -> Vec<(&'static str, PropertyDescriptor)> {
    S::all().iter().map(|case| (case.name(), case.descriptor())).collect()
}

fn existing_of<S: PropertySet>(
    hal: &dyn Hal,
    object: AudioObjectId,
    scope: Scope,
    element: Element,
) -> Vec<(&'static str, PropertyDescriptor)> {
    S::all_existing(hal, object, scope, element)
        .into_iter()
        .map(|case| (case.name(), case.descriptor()))
        .collect()
}

property_set_kinds! {
    Object => ObjectProperty, "Object", false;
    System => SystemProperty, "System", false;
    SystemDeprecated => SystemPropertyDeprecated, "System (deprecated)", true;
    PlugIn => PlugInProperty, "Plug-in", false;
    TransportManager => TransportManagerProperty, "Transport manager", false;
    Box => BoxProperty, "Box", false;
    Device => DeviceProperty, "Device", false;
    DeviceDeprecated => DevicePropertyDeprecated, "Device (deprecated)", true;
    ClockDevice => ClockDeviceProperty, "Clock device", false;
    EndPointDevice => EndPointDeviceProperty, "End point device", false;
    AggregateDevice => AggregateDeviceProperty, "Aggregate device", false;
    SubDevice => SubDeviceProperty, "Sub-device", false;
    Stream => StreamProperty, "Stream", false;
    StreamDeprecated => StreamPropertyDeprecated, "Stream (deprecated)", true;
    Control => ControlProperty, "Control", false;
    ControlDeprecated => ControlPropertyDeprecated, "Control (deprecated)", true;
    SliderControl => SliderControlProperty, "Slider control", false;
    LevelControl => LevelControlProperty, "Level control", false;
    LevelControlDeprecated => LevelControlPropertyDeprecated, "Level control (deprecated)", true;
    BooleanControl => BooleanControlProperty, "Boolean control", false;
    SelectorControl => SelectorControlProperty, "Selector control", false;
    StereoPanControl => StereoPanControlProperty, "Stereo pan control", false;
}

property_set! {
    /// Properties common to every audio object
    ObjectProperty: Object {
        Creator = (b"oplg", String),
        BaseClass = (b"bcls", ClassId),
        Class = (b"clas", ClassId),
        Owner = (b"stdv", ObjectId),
        Name = (b"lnam", String),
        ModelName = (b"lmod", String),
        Manufacturer = (b"lmak", String),
        ElementName = (b"lchn", String),
        ElementCategoryName = (b"lccn", String),
        ElementNumberName = (b"lcnn", String),
        OwnedObjects = (b"ownd", ObjectIdArray, OptionallyQualifiedRead(ClassIdArray)),
        Identify = (b"iden", Boolean32),
        SerialNumber = (b"snum", String),
        FirmwareVersion = (b"fwvn", String),
    }
}

property_set! {
    SystemProperty: System {
        Devices = (b"dev#", ObjectIdArray),
        DefaultInputDevice = (b"dIn ", ObjectId),
        DefaultOutputDevice = (b"dOut", ObjectId),
        DefaultSystemOutputDevice = (b"sOut", ObjectId),
        TranslateUidToDevice = (b"uidd", ObjectId, QualifiedRead(String)),
        MixStereoToMono = (b"stmo", Boolean32),
        PlugInList = (b"plg#", ObjectIdArray),
        TranslateBundleIdToPlugIn = (b"bidp", ObjectId, QualifiedRead(String)),
        TransportManagerList = (b"tmg#", ObjectIdArray),
        TranslateBundleIdToTransportManager = (b"tmbi", ObjectId, QualifiedRead(String)),
        BoxList = (b"box#", ObjectIdArray),
        TranslateUidToBox = (b"uidb", ObjectId, QualifiedRead(String)),
        ClockDeviceList = (b"clk#", ObjectIdArray),
        TranslateUidToClockDevice = (b"uidc", ObjectId, QualifiedRead(String)),
        ProcessIsMaster = (b"mast", Boolean32),
        IsInitingOrExiting = (b"inot", Boolean32),
        UserIdChanged = (b"euid", UInt32),
        ProcessIsAudible = (b"pmut", Boolean32),
        SleepingIsAllowed = (b"slep", Boolean32),
        UnloadingIsAllowed = (b"unld", Boolean32),
        HogModeIsAllowed = (b"hogr", Boolean32),
        UserSessionIsActiveOrHeadless = (b"user", Boolean32),
        ServiceRestarted = (b"srst", UInt32),
        PowerHint = (b"powh", UInt32),
    }
}

property_set! {
    SystemPropertyDeprecated: SystemDeprecated {
        RunLoop = (b"rnlp", RunLoop),
        DeviceForUid = (b"duid", ValueTranslation, Translation(String, ObjectId)),
        PlugInForBundleId = (b"pibi", ValueTranslation, Translation(String, ObjectId)),
        BootChimeVolumeScalar = (b"bbvs", Float32),
        BootChimeVolumeDecibels = (b"bbvd", Float32),
        BootChimeVolumeRangeDecibels = (b"bbd#", ValueRange),
        BootChimeVolumeScalarToDecibels = (b"bv2d", Float32, MutatingRead),
        BootChimeVolumeDecibelsToScalar = (b"bd2v", Float32, MutatingRead),
        BootChimeVolumeDecibelsToScalarTransferFunction = (b"bvtf", UInt32),
    }
}

property_set! {
    PlugInProperty: PlugIn {
        BundleId = (b"piid", String),
        DeviceList = (b"dev#", ObjectIdArray),
        TranslateUidToDevice = (b"uidd", ObjectId, QualifiedRead(String)),
        BoxList = (b"box#", ObjectIdArray),
        TranslateUidToBox = (b"uidb", ObjectId, QualifiedRead(String)),
        ClockDeviceList = (b"clk#", ObjectIdArray),
        TranslateUidToClockDevice = (b"uidc", ObjectId, QualifiedRead(String)),
        CreateAggregateDevice = (b"cagg", ObjectId, QualifiedRead(Dictionary)),
        DestroyAggregateDevice = (b"dagg", ObjectId, InboundOnly),
        ResourceBundle = (b"rsrc", String),
    }
}

property_set! {
    TransportManagerProperty: TransportManager {
        EndPointList = (b"end#", ObjectIdArray),
        TranslateUidToEndPoint = (b"uide", ObjectId, QualifiedRead(String)),
        TransportType = (b"tran", FourCC),
        CreateEndPointDevice = (b"cdev", ObjectId, QualifiedRead(Dictionary)),
        DestroyEndPointDevice = (b"ddev", ObjectId, InboundOnly),
    }
}

property_set! {
    BoxProperty: Box {
        BoxUid = (b"buid", String),
        TransportType = (b"tran", FourCC),
        HasAudio = (b"bhau", Boolean32),
        HasVideo = (b"bhvi", Boolean32),
        HasMidi = (b"bhmi", Boolean32),
        IsProtected = (b"bpro", Boolean32),
        Acquired = (b"bxon", Boolean32),
        AcquisitionFailed = (b"bxof", UInt32),
        DeviceList = (b"bdv#", ObjectIdArray),
        ClockDeviceList = (b"bcl#", ObjectIdArray),
    }
}

property_set! {
    DeviceProperty: Device {
        ConfigurationApplication = (b"capp", String),
        DeviceUid = (b"uid ", String),
        ModelUid = (b"muid", String),
        TransportType = (b"tran", FourCC),
        RelatedDevices = (b"akin", ObjectIdArray),
        ClockDomain = (b"clkd", UInt32),
        DeviceIsAlive = (b"livn", Boolean32),
        DeviceIsRunning = (b"goin", Boolean32),
        DeviceCanBeDefaultDevice = (b"dflt", Boolean32),
        DeviceCanBeDefaultSystemDevice = (b"sflt", Boolean32),
        Latency = (b"ltnc", UInt32),
        Streams = (b"stm#", StreamIdArray),
        ControlList = (b"ctrl", ObjectIdArray),
        SafetyOffset = (b"saft", UInt32),
        NominalSampleRate = (b"nsrt", Float64),
        AvailableNominalSampleRates = (b"nsr#", ValueRangeArray),
        Icon = (b"icon", Url),
        IsHidden = (b"hidn", Boolean32),
        PreferredChannelsForStereo = (b"dch2", UInt32Array),
        PreferredChannelLayout = (b"srnd", ChannelLayout),
        PlugIn = (b"plug", UInt32),
        DeviceHasChanged = (b"diff", UInt32),
        DeviceIsRunningSomewhere = (b"gone", Boolean32),
        ProcessorOverload = (b"over", UInt32),
        IoStoppedAbnormally = (b"stpd", UInt32),
        HogMode = (b"oink", Pid),
        BufferFrameSize = (b"fsiz", UInt32),
        BufferFrameSizeRange = (b"fsz#", ValueRange),
        UsesVariableBufferFrameSizes = (b"vfsz", UInt32),
        IoCycleUsage = (b"ncyc", Float32),
        StreamConfiguration = (b"slay", BufferList),
        IoProcStreamUsage = (b"suse", IoProcStreamUsage, MutatingRead),
        ActualSampleRate = (b"asrt", Float64),
        ClockDevice = (b"apcd", String),
        JackIsConnected = (b"jack", Boolean32),
        VolumeScalar = (b"volm", Float32),
        VolumeDecibels = (b"vold", Float32),
        VolumeRangeDecibels = (b"vdb#", ValueRange),
        VolumeScalarToDecibels = (b"v2db", Float32, MutatingRead),
        VolumeDecibelsToScalar = (b"db2v", Float32, MutatingRead),
        StereoPan = (b"span", Float32),
        StereoPanChannels = (b"spn#", UInt32Array),
        Mute = (b"mute", Boolean32),
        Solo = (b"solo", Boolean32),
        PhantomPower = (b"phan", Boolean32),
        PhaseInvert = (b"phsi", Boolean32),
        ClipLight = (b"clip", Boolean32),
        Talkback = (b"talb", Boolean32),
        Listenback = (b"lsnb", Boolean32),
        DataSource = (b"ssrc", UInt32Array),
        DataSources = (b"ssc#", UInt32Array),
        DataSourceNameForIdCfString = (b"lscn", ValueTranslation, Translation(UInt32, String)),
        DataSourceKindForId = (b"ssck", ValueTranslation, Translation(UInt32, UInt32)),
        ClockSource = (b"csrc", UInt32Array),
        ClockSources = (b"csc#", UInt32Array),
        ClockSourceNameForIdCfString = (b"lcsn", ValueTranslation, Translation(UInt32, String)),
        ClockSourceKindForId = (b"csck", ValueTranslation, Translation(UInt32, UInt32)),
        PlayThru = (b"thru", Boolean32),
        PlayThruSolo = (b"thrs", Boolean32),
        PlayThruVolumeScalar = (b"mvsc", Float32),
        PlayThruVolumeDecibels = (b"mvdb", Float32),
        PlayThruVolumeRangeDecibels = (b"mvd#", ValueRange),
        PlayThruVolumeScalarToDecibels = (b"mv2d", Float32, MutatingRead),
        PlayThruVolumeDecibelsToScalar = (b"mv2s", Float32, MutatingRead),
        PlayThruStereoPan = (b"mspn", Float32),
        PlayThruStereoPanChannels = (b"msp#", UInt32Array),
        PlayThruDestination = (b"mdds", UInt32Array),
        PlayThruDestinations = (b"mdd#", UInt32Array),
        PlayThruDestinationNameForIdCfString =
            (b"mddc", ValueTranslation, Translation(UInt32, String)),
        ChannelNominalLineLevel = (b"nlvl", UInt32Array),
        ChannelNominalLineLevels = (b"nlv#", UInt32Array),
        ChannelNominalLineLevelNameForIdCfString =
            (b"lcnl", ValueTranslation, Translation(UInt32, String)),
        HighPassFilterSetting = (b"hipf", UInt32Array),
        HighPassFilterSettings = (b"hip#", UInt32Array),
        HighPassFilterSettingNameForIdCfString =
            (b"hipl", ValueTranslation, Translation(UInt32, String)),
        SubVolumeScalar = (b"svlm", Float32),
        SubVolumeDecibels = (b"svld", Float32),
        SubVolumeRangeDecibels = (b"svd#", ValueRange),
        SubVolumeScalarToDecibels = (b"sv2d", Float32, MutatingRead),
        SubVolumeDecibelsToScalar = (b"sd2v", Float32, MutatingRead),
        SubMute = (b"smut", Boolean32),
        ZeroTimeStampPeriod = (b"ring", UInt32),
        ClockAlgorithm = (b"clok", UInt32),
        ClockIsStable = (b"cstb", UInt32),
    }
}

property_set! {
    DevicePropertyDeprecated: DeviceDeprecated {
        VolumeDecibelsToScalarTransferFunction = (b"vctf", UInt32),
        PlayThruVolumeDecibelsToScalarTransferFunction = (b"mvtf", UInt32),
        DriverShouldOwniSub = (b"isub", Boolean32),
        SubVolumeDecibelsToScalarTransferFunction = (b"svtf", UInt32),
        DeviceName = (b"name", CString),
        DeviceNameCfString = (b"lnam", String),
        DeviceManufacturer = (b"makr", CString),
        DeviceManufacturerCfString = (b"lmak", String),
        RegisterBufferList = (b"rbuf", BufferList),
        BufferSize = (b"bsiz", UInt32),
        BufferSizeRange = (b"bsz#", ValueRange),
        ChannelName = (b"chnm", CString),
        ChannelNameCfString = (b"lchn", String),
        ChannelCategoryName = (b"ccnm", CString),
        ChannelCategoryNameCfString = (b"lccn", String),
        ChannelNumberName = (b"cnnm", CString),
        ChannelNumberNameCfString = (b"lcnn", String),
        SupportsMixing = (b"mix?", Boolean32),
        StreamFormat = (b"sfmt", StreamBasicDescription),
        StreamFormats = (b"sfm#", StreamBasicDescriptionArray),
        StreamFormatSupported = (b"sfm?", StreamBasicDescription, InboundOnlyWithStatus),
        StreamFormatMatch = (b"sfmm", StreamBasicDescription, MutatingRead),
        DataSourceNameForId = (b"sscn", ValueTranslation, Translation(UInt32, CString)),
        ClockSourceNameForId = (b"cscn", ValueTranslation, Translation(UInt32, CString)),
        PlayThruDestinationNameForId = (b"mddn", ValueTranslation, Translation(UInt32, CString)),
        ChannelNominalLineLevelNameForId =
            (b"cnlv", ValueTranslation, Translation(UInt32, CString)),
        HighPassFilterSettingNameForId = (b"chip", ValueTranslation, Translation(UInt32, CString)),
    }
}

property_set! {
    ClockDeviceProperty: ClockDevice {
        DeviceUid = (b"cuid", String),
        TransportType = (b"tran", FourCC),
        ClockDomain = (b"clkd", UInt32),
        DeviceIsAlive = (b"livn", Boolean32),
        DeviceIsRunning = (b"goin", Boolean32),
        Latency = (b"ltnc", UInt32),
        ControlList = (b"ctrl", ObjectIdArray),
        NominalSampleRate = (b"nsrt", Float64),
        AvailableNominalSampleRates = (b"nsr#", ValueRangeArray),
    }
}

property_set! {
    EndPointDeviceProperty: EndPointDevice {
        Composition = (b"acom", Dictionary),
        EndPointList = (b"agrp", ObjectIdArray),
        IsPrivate = (b"priv", Pid),
    }
}

property_set! {
    AggregateDeviceProperty: AggregateDevice {
        FullSubDeviceList = (b"grup", StringArray),
        ActiveSubDeviceList = (b"agrp", ObjectIdArray),
        Composition = (b"acom", Dictionary),
        MasterSubDevice = (b"amst", String),
        ClockDevice = (b"apcd", ObjectId),
    }
}

property_set! {
    SubDeviceProperty: SubDevice {
        ExtraLatency = (b"xltc", Float64),
        DriftCompensation = (b"drft", Boolean32),
        DriftCompensationQuality = (b"drfq", UInt32),
    }
}

property_set! {
    StreamProperty: Stream {
        IsActive = (b"sact", Boolean32),
        Direction = (b"sdir", UInt32),
        TerminalType = (b"term", FourCC),
        StartingChannel = (b"schn", UInt32),
        Latency = (b"ltnc", UInt32),
        VirtualFormat = (b"sfmt", StreamBasicDescription),
        AvailableVirtualFormats = (b"sfma", StreamRangedDescriptionArray),
        PhysicalFormat = (b"pft ", StreamBasicDescription),
        AvailablePhysicalFormats = (b"pfta", StreamRangedDescriptionArray),
    }
}

property_set! {
    StreamPropertyDeprecated: StreamDeprecated {
        OwningDevice = (b"stdv", ObjectId),
        PhysicalFormats = (b"pft#", StreamBasicDescriptionArray),
        PhysicalFormatSupported = (b"pft?", StreamBasicDescription, InboundOnlyWithStatus),
        PhysicalFormatMatch = (b"pftm", StreamBasicDescription, MutatingRead),
    }
}

property_set! {
    ControlProperty: Control {
        Scope = (b"cscp", FourCC),
        Element = (b"celm", UInt32),
    }
}

property_set! {
    ControlPropertyDeprecated: ControlDeprecated {
        Variant = (b"cvar", UInt32),
    }
}

property_set! {
    SliderControlProperty: SliderControl {
        Value = (b"sdrv", UInt32),
        Range = (b"sdrr", UInt32Array),
    }
}

property_set! {
    LevelControlProperty: LevelControl {
        ScalarValue = (b"lcsv", Float32),
        DecibelValue = (b"lcdv", Float32),
        DecibelRange = (b"lcdr", ValueRange),
        ConvertScalarToDecibels = (b"lcsd", Float32, MutatingRead),
        ConvertDecibelsToScalar = (b"lcds", Float32, MutatingRead),
    }
}

property_set! {
    LevelControlPropertyDeprecated: LevelControlDeprecated {
        DecibelsToScalarTransferFunction = (b"lctf", UInt32),
    }
}

property_set! {
    BooleanControlProperty: BooleanControl {
        Value = (b"bcvl", Boolean32),
    }
}

property_set! {
    SelectorControlProperty: SelectorControl {
        CurrentItem = (b"scci", UInt32Array),
        AvailableItems = (b"scai", UInt32Array),
        ItemName = (b"scin", String, QualifiedRead(UInt32)),
        ItemKind = (b"clkk", UInt32, QualifiedRead(UInt32)),
    }
}

property_set! {
    StereoPanControlProperty: StereoPanControl {
        Value = (b"spcv", Float32),
        PanningChannels = (b"spcc", UInt32Array),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HalError;
    use crate::sim::SimulatedHal;
    use crate::types::{element, scope, PropertyAddress};
    use std::collections::HashSet;

    #[test]
    fn test_selectors_unique_within_each_set() {
        for kind in PropertySetKind::ALL {
            let entries = kind.entries();
            let selectors: HashSet<Selector> = entries.iter().map(|(_, d)| d.selector).collect();
            assert_eq!(selectors.len(), entries.len(), "duplicate selector in {:?}", kind);
        }
    }

    #[test]
    fn test_macro_generated_metadata() {
        assert_eq!(ObjectProperty::OwnedObjects.name(), "OwnedObjects");
        assert_eq!(ObjectProperty::OwnedObjects.selector(), fourcc(b"ownd"));
        assert_eq!(
            ObjectProperty::OwnedObjects.descriptor().semantics,
            ReadSemantics::OptionallyQualifiedRead(PropertyType::ClassIdArray)
        );
        assert_eq!(
            DeviceProperty::DataSourceNameForIdCfString.descriptor().semantics,
            ReadSemantics::Translation {
                from: PropertyType::UInt32,
                to: PropertyType::String
            }
        );
        assert_eq!(SelectorControlProperty::KIND, PropertySetKind::SelectorControl);
        assert_eq!(ObjectProperty::all().first(), Some(&ObjectProperty::Creator));
        assert!(PropertySetKind::DeviceDeprecated.is_deprecated());
        assert!(!PropertySetKind::Device.is_deprecated());
    }

    #[test]
    fn test_every_qualified_read_needs_a_qualifier() {
        let hal = SimulatedHal::new();
        hal.add_object(40, fourcc(b"adev"), 1, "Device");
        let before = hal.data_calls();

        for kind in PropertySetKind::ALL {
            for (name, descriptor) in kind.entries() {
                if !matches!(descriptor.semantics, ReadSemantics::QualifiedRead(_)) {
                    continue;
                }
                let property = Property::new(&hal, 40, name, descriptor);
                let result = match descriptor.ty {
                    PropertyType::String => property.object_value(None).map(|_| ()),
                    _ => property.get::<u32>().map(|_| ()),
                };
                assert_eq!(result, Err(HalError::MissingQualifier), "{} in {:?}", name, kind);
            }
        }

        assert_eq!(hal.data_calls(), before);
    }

    #[test]
    fn test_every_inbound_read_needs_input() {
        let hal = SimulatedHal::new();
        hal.add_object(40, fourcc(b"adev"), 1, "Device");

        for kind in PropertySetKind::ALL {
            for (name, descriptor) in kind.entries() {
                if !matches!(
                    descriptor.semantics,
                    ReadSemantics::MutatingRead
                        | ReadSemantics::InboundOnly
                        | ReadSemantics::InboundOnlyWithStatus
                        | ReadSemantics::Translation { .. }
                ) {
                    continue;
                }
                let property = Property::new(&hal, 40, name, descriptor);
                assert_eq!(
                    property.raw_value(None, None),
                    Err(HalError::MissingInputValue),
                    "{} in {:?}",
                    name,
                    kind
                );
            }
        }
    }

    #[test]
    fn test_existence_filter_keeps_declaration_order() {
        let hal = SimulatedHal::new();
        hal.add_object(50, fourcc(b"vlme"), 40, "Volume");
        // Registered out of declaration order on purpose
        let range = crate::types::ValueRange::new(-60.0, 0.0);
        hal.set_scalar(50, PropertyAddress::any(fourcc(b"lcdr")), range, false);
        hal.set_scalar(50, PropertyAddress::any(fourcc(b"lcsv")), 0.5f32, true);

        let existing = LevelControlProperty::all_existing(&hal, 50, scope::ANY, element::ANY);
        assert_eq!(
            existing,
            vec![LevelControlProperty::ScalarValue, LevelControlProperty::DecibelRange]
        );

        let names: Vec<&str> = PropertySetKind::LevelControl
            .existing(&hal, 50, scope::ANY, element::ANY)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["ScalarValue", "DecibelRange"]);
    }

    #[test]
    fn test_existence_filter_respects_scope() {
        let hal = SimulatedHal::new();
        hal.add_object(40, fourcc(b"adev"), 1, "Device");
        let latency = PropertyAddress::new(fourcc(b"ltnc"), scope::OUTPUT, element::MAIN);
        hal.set_scalar(40, latency, 12u32, false);

        let output = DeviceProperty::all_existing(&hal, 40, scope::OUTPUT, element::MAIN);
        let input = DeviceProperty::all_existing(&hal, 40, scope::INPUT, element::MAIN);
        assert!(output.contains(&DeviceProperty::Latency));
        assert!(!input.contains(&DeviceProperty::Latency));
    }
}
