// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![allow(clippy::needless_return)]

use core::ffi::c_void;
use std::ptr;
use std::slice;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use etw_provider as etw;
use etw_provider::*;

const START_SORT_BLOB: [u8; 28] = [
    0x1C, 0x00, 0x00, b'S', b't', b'a', b'r', b't', b'S', b'o', b'r', b't', 0x00, b'e', b'l',
    b'e', b'm', b'e', b'n', b't', b'_', b'c', b'o', b'u', b'n', b't', 0x00, 0x07,
];

const INITIALIZED: EventDescriptor = EventDescriptor::new(101, Level::Informational);
const START_SORT: EventDescriptor =
    EventDescriptor::new(102, Level::Informational).with_opcode(Opcode::Start);
const STOP_SORT: EventDescriptor =
    EventDescriptor::new(103, Level::Informational).with_opcode(Opcode::Stop);
const SOURCE_LOAD: EventDescriptor =
    EventDescriptor::from_parts(41, Level::Informational, 1, Opcode::from_int(12), 2);

struct RecordedWrite {
    handle: u64,
    descriptor: EventDescriptor,
    activity_id: Option<Guid>,
    related_id: Option<Guid>,
    blocks: Vec<(DataKind, Vec<u8>)>,
}

#[derive(Default)]
struct MockState {
    register_error: Option<u32>,
    registration: Mutex<Option<(EnableCallback, usize)>>,
    unregister_count: AtomicU32,
    write_status: AtomicU32,
    writes: Mutex<Vec<RecordedWrite>>,
}

/// Records registrations and writes instead of calling ETW.
#[derive(Clone, Default)]
struct MockEtw(Arc<MockState>);

impl MockEtw {
    const HANDLE: u64 = 0x5a5a;

    fn failing(error: u32) -> Self {
        return Self(Arc::new(MockState {
            register_error: Some(error),
            ..MockState::default()
        }));
    }

    /// Invokes the registered enable callback the way ETW would.
    fn control(&self, control_code: u32, level: u8, match_any_keyword: u64) {
        let registration = *self.0.registration.lock().unwrap();
        let (callback, context) = registration.expect("provider is not registered");
        unsafe {
            callback(
                ptr::null(),
                control_code,
                level,
                match_any_keyword,
                0,
                ptr::null(),
                context as *mut c_void,
            )
        };
    }

    fn write_count(&self) -> usize {
        return self.0.writes.lock().unwrap().len();
    }
}

impl EtwApi for MockEtw {
    unsafe fn register(
        &self,
        _provider_id: &Guid,
        callback: EnableCallback,
        callback_context: *mut c_void,
    ) -> Result<u64, u32> {
        if let Some(error) = self.0.register_error {
            return Err(error);
        }

        *self.0.registration.lock().unwrap() = Some((callback, callback_context as usize));
        return Ok(Self::HANDLE);
    }

    fn unregister(&self, handle: u64) -> u32 {
        assert_eq!(handle, Self::HANDLE);
        *self.0.registration.lock().unwrap() = None;
        self.0.unregister_count.fetch_add(1, Ordering::Relaxed);
        return 0;
    }

    fn write_transfer(
        &self,
        handle: u64,
        descriptor: &EventDescriptor,
        activity_id: Option<&Guid>,
        related_id: Option<&Guid>,
        data: &[EventDataDescriptor<'_>],
    ) -> u32 {
        let blocks = data
            .iter()
            .map(|d| {
                let bytes =
                    unsafe { slice::from_raw_parts(d.ptr() as usize as *const u8, d.size() as usize) };
                (d.kind(), bytes.to_vec())
            })
            .collect();
        self.0.writes.lock().unwrap().push(RecordedWrite {
            handle,
            descriptor: *descriptor,
            activity_id: activity_id.copied(),
            related_id: related_id.copied(),
            blocks,
        });
        return self.0.write_status.load(Ordering::Relaxed);
    }
}

fn mock_provider(name: &str) -> (MockEtw, std::pin::Pin<Arc<Provider<MockEtw>>>) {
    let mock = MockEtw::default();
    let provider = Provider::with_api(
        mock.clone(),
        Guid::from_name(name),
        name,
        &Provider::new_options(),
    );
    return (mock, provider);
}

#[allow(clippy::unusual_byte_groupings)]
#[test]
fn guid() {
    use uuid::Uuid;

    let myprovider = Guid::from_u128(&0xb3864c38_4273_58c5_545b_8b3608343471);
    let a3a2a1a0 = Guid::from_u128(&0xa3a2a1a0_b1b0_c1c0_d7d6_d5d4d3d2d1d0);

    assert_eq!(Guid::default(), Guid::zero());
    assert_eq!(Guid::from_name("MyProvider"), myprovider);
    assert_eq!(Guid::from_name("myprovider"), myprovider);
    assert_eq!(Guid::from_name("MYPROVIDER"), myprovider);
    assert_ne!(Guid::from_name("MyProvider2"), myprovider);

    assert_eq!(
        a3a2a1a0.to_fields(),
        (
            0xa3a2a1a0,
            0xb1b0,
            0xc1c0,
            [0xd7, 0xd6, 0xd5, 0xd4, 0xd3, 0xd2, 0xd1, 0xd0]
        )
    );
    assert_eq!(
        a3a2a1a0.to_bytes_le(),
        [
            0xa0, 0xa1, 0xa2, 0xa3, 0xb0, 0xb1, 0xc0, 0xc1, 0xd7, 0xd6, 0xd5, 0xd4, 0xd3, 0xd2,
            0xd1, 0xd0
        ]
    );
    assert_eq!(Guid::from_bytes_le(&a3a2a1a0.to_bytes_le()), a3a2a1a0);
    assert_eq!(a3a2a1a0.to_u128(), 0xa3a2a1a0_b1b0_c1c0_d7d6d5d4d3d2d1d0);
    assert_eq!(
        format!("{}", a3a2a1a0),
        "a3a2a1a0-b1b0-c1c0-d7d6-d5d4d3d2d1d0"
    );
    assert_eq!(format!("{:?}", a3a2a1a0), format!("{}", a3a2a1a0));

    assert_eq!(Guid::try_parse("{a3a2a1a0-b1b0-c1c0-d7d6-d5d4d3d2d1d0}"), Some(a3a2a1a0));
    assert_eq!(Guid::try_parse("A3A2A1A0B1B0C1C0D7D6D5D4D3D2D1D0"), Some(a3a2a1a0));
    assert_eq!(Guid::try_parse("a3a2a1a0_b1b0_c1c0_d7d6_d5d4d3d2d1d0"), None);
    assert_eq!(Guid::try_parse("g3a2a1a0-b1b0-c1c0-d7d6-d5d4d3d2d1d0"), None);
    assert_eq!(Guid::try_parse(""), None);

    let uuid = Uuid::from_u128(0xa3a2a1a0_b1b0_c1c0_d7d6_d5d4d3d2d1d0);
    assert_eq!(Guid::from_bytes_be(uuid.as_bytes()), a3a2a1a0);
    assert_eq!(Guid::from_u128(&uuid.as_u128()), a3a2a1a0);
    assert_eq!(uuid.to_string(), a3a2a1a0.to_string());
}

#[test]
fn enums() {
    assert_eq!(Level::Informational.as_int(), 4);
    assert_eq!(Level::from(5), Level::Verbose);
    assert_eq!(u8::from(Opcode::Stop), 2);
    assert_eq!(Opcode::default(), Opcode::Info);
    assert_eq!(format!("{}", Level::Warning), "3");

    assert_eq!(InType::AnsiString.as_int(), 2);
    assert_eq!(InType::Int8.as_int(), 3);
    assert_eq!(InType::Int32.as_int(), 7);
    assert_eq!(InType::Double.as_int(), 12);
    assert_eq!(InType::HexInt64.as_int(), 21);
    assert_eq!(InType::UnicodeString.as_int(), 1);
    assert_eq!(InType::Bool32.as_int(), 13);
    assert_eq!(InType::HexInt32.as_int(), 20);
    if cfg!(target_pointer_width = "64") {
        assert_eq!(InType::Pointer.as_int(), 21);
    } else {
        assert_eq!(InType::Pointer.as_int(), 20);
    }

    assert_eq!(InType::Int16.fixed_size(), Some(2));
    assert_eq!(InType::Bool32.fixed_size(), Some(4));
    assert_eq!(InType::Double.fixed_size(), Some(8));
    assert_eq!(InType::AnsiString.fixed_size(), None);
    assert!(!InType::from_int(14).is_known());
    assert!(!InType::Null.is_known());
}

#[test]
fn descriptors() {
    use core::mem::size_of;

    assert_eq!(size_of::<EventDescriptor>(), 16);
    assert_eq!(size_of::<EventDataDescriptor>(), 16);

    assert_eq!(
        INITIALIZED,
        EventDescriptor {
            id: 101,
            version: 0,
            channel: 11,
            level: Level::Informational,
            opcode: Opcode::Info,
            task: 0,
            keyword: 0,
        }
    );
    assert_eq!(START_SORT.opcode, Opcode::Start);
    assert_eq!(SOURCE_LOAD.task, 2);
    assert_eq!(SOURCE_LOAD.keyword, 1);
    assert_eq!(
        EventDescriptor::new(9, Level::Verbose)
            .with_keyword(1)
            .with_opcode(Opcode::from_int(10))
            .with_task(1),
        EventDescriptor::from_parts(9, Level::Verbose, 1, Opcode::from_int(10), 1)
    );

    let zero = EventDataDescriptor::zero();
    assert!(zero.is_empty());
    assert_eq!(zero.kind(), DataKind::Payload);

    let value = 7u16;
    let d = EventDataDescriptor::from_value(&value);
    assert_eq!(d.size(), 2);
    assert_eq!(d.ptr(), &value as *const u16 as usize as u64);

    let meta = [1u8, 2, 3];
    assert_eq!(
        EventDataDescriptor::from_event_metadata(&meta).kind(),
        DataKind::EventMetadata
    );
    assert_eq!(
        EventDataDescriptor::from_provider_traits(&meta).kind(),
        DataKind::ProviderMetadata
    );
}

#[test]
fn start_sort_metadata() {
    let blob = event_metadata!("StartSort", int32("element_count"));
    assert_eq!(blob, &START_SORT_BLOB);
    assert_eq!(
        event_metadata!("StartSort", "element_count" => InType::Int32),
        &START_SORT_BLOB
    );

    const FIELDS: &[FieldSpec] = &[FieldSpec::new("element_count", InType::Int32)];
    const LEN: usize = event_metadata_len("StartSort", FIELDS);
    const META: EventMetadata<LEN> = EventMetadata::new("StartSort", FIELDS);
    assert_eq!(LEN, 28);
    assert_eq!(META.as_bytes(), &START_SORT_BLOB);

    let field: [u8; 15] = FIELDS[0].encode();
    assert_eq!(field, START_SORT_BLOB[13..]);
}

#[test]
fn zero_field_metadata() {
    let blob = event_metadata!("Initialized");
    assert_eq!(blob, b"\x0f\x00\x00Initialized\x00");

    let view = EventMetadataView::parse(blob).unwrap();
    assert_eq!(view.name(), "Initialized");
    assert_eq!(view.field_count(), 0);
    assert_eq!(view.fields().count(), 0);

    let empty = event_metadata!("");
    assert_eq!(empty, &[4, 0, 0, 0]);
    assert_eq!(EventMetadataView::parse(empty).unwrap().name(), "");
}

#[test]
fn metadata_decode() {
    let blob = event_metadata!(
        "MethodLoad",
        "ScriptContextID" => InType::Pointer,
        "MethodStartAddress" => InType::Pointer,
        "MethodSize" => InType::UInt64,
        "MethodID" => InType::UInt32,
        "MethodFlags" => InType::UInt16,
        "MethodAddressRangeID" => InType::UInt16,
        "SourceID" => InType::UInt64,
        "Line" => InType::UInt32,
        "Column" => InType::UInt32,
        "MethodName" => InType::UnicodeString,
    );

    assert_eq!(u16::from_le_bytes([blob[0], blob[1]]) as usize, blob.len());

    let view = EventMetadataView::parse(blob).unwrap();
    assert_eq!(view.name(), "MethodLoad");
    assert_eq!(view.field_count(), 10);

    let fields: Vec<FieldSpec> = view.fields().collect();
    assert_eq!(fields[0], FieldSpec::new("ScriptContextID", InType::Pointer));
    assert_eq!(fields[3], FieldSpec::new("MethodID", InType::UInt32));
    assert_eq!(fields[9].name(), "MethodName");
    assert_eq!(fields[9].in_type(), InType::UnicodeString);

    let debug = format!("{:?}", view);
    assert!(debug.contains("MethodLoad"));
    assert!(debug.contains("MethodName"));
}

#[test]
fn metadata_decode_errors() {
    assert_eq!(
        EventMetadataView::parse(&[1, 0]).unwrap_err(),
        MetadataError::Truncated(2)
    );
    assert_eq!(
        EventMetadataView::parse(&[5, 0, 0, b'A', 0, 0]).unwrap_err(),
        MetadataError::SizeMismatch {
            declared: 5,
            actual: 6
        }
    );
    assert_eq!(
        EventMetadataView::parse(&[5, 0, 1, b'A', 0]).unwrap_err(),
        MetadataError::UnexpectedTag(1)
    );
    assert_eq!(
        EventMetadataView::parse(&[5, 0, 0, b'A', b'B']).unwrap_err(),
        MetadataError::Unterminated(3)
    );
    assert_eq!(
        EventMetadataView::parse(&[7, 0, 0, b'A', 0, b'f', 0]).unwrap_err(),
        MetadataError::Unterminated(5)
    );
    assert_eq!(
        EventMetadataView::parse(&[8, 0, 0, b'A', 0, b'f', 0, 99]).unwrap_err(),
        MetadataError::UnknownInType {
            offset: 5,
            in_type: 99
        }
    );
    assert_eq!(
        EventMetadataView::parse(&[5, 0, 0, 0xFF, 0]).unwrap_err(),
        MetadataError::InvalidUtf8(3)
    );

    let message = MetadataError::UnexpectedTag(1).to_string();
    assert!(message.contains("tag"));
}

#[test]
fn provider_traits_blob() {
    let traits = provider_traits("example", None);
    assert_eq!(&*traits, b"\x0a\x00example\x00");

    let group = Guid::from_u128(&0xa3a2a1a0_b1b0_c1c0_d7d6_d5d4d3d2d1d0);
    let traits = provider_traits("example", Some(&group));
    assert_eq!(traits.len(), 10 + 19);
    assert_eq!(u16::from_le_bytes([traits[0], traits[1]]), 29);
    assert_eq!(&traits[2..10], b"example\x00");
    assert_eq!(&traits[10..13], &[19, 0, 1]);
    assert_eq!(traits[13..], group.to_bytes_le());
}

#[test]
fn field_marshalling() {
    let narrow = c"sorted";
    let narrow_data = FieldData::str8(narrow);
    assert_eq!(narrow_data.byte_len(), 7);
    assert_eq!(narrow_data.descriptor().size(), 7);
    assert!(narrow_data.is_compatible(InType::AnsiString));
    assert!(!narrow_data.is_compatible(InType::UnicodeString));

    let units: Vec<u16> = "sorted".encode_utf16().chain([0, 0x41]).collect();
    let wide = WStr::from_slice_with_nul(&units).unwrap();
    assert_eq!(wide.len(), 6);
    assert_eq!(wide.as_slice(), &units[..6]);
    let wide_data = FieldData::str16(wide);
    assert_eq!(wide_data.byte_len(), 14);
    assert_eq!(wide_data.descriptor().size(), 2 * 6 + 2);
    assert!(wide_data.is_compatible(InType::UnicodeString));
    assert_eq!(WStr::from_slice_with_nul(&[0x41, 0x42]), None);
    assert!(WStr::EMPTY.is_empty());
    assert_eq!(FieldData::str16(WStr::EMPTY).byte_len(), 2);

    let empty = FieldData::str8(c"");
    assert_eq!(empty.byte_len(), 1);

    let small = -3i16;
    let small_data = FieldData::value(&small);
    assert_eq!(small_data.byte_len(), 2);
    assert_eq!(small_data, FieldData::Value(&small.to_ne_bytes()));
    assert!(small_data.is_compatible(InType::Int16));
    assert!(small_data.is_compatible(InType::UInt16));
    assert!(!small_data.is_compatible(InType::Int32));
    assert!(!small_data.is_compatible(InType::AnsiString));

    // Values are matched by size only.
    let int_data = FieldData::value(&7i32);
    assert!(int_data.is_compatible(InType::Int32));
    assert!(int_data.is_compatible(InType::Float));
    assert!(int_data.is_compatible(InType::HexInt32));
    assert!(!int_data.is_compatible(InType::Double));
    assert!(!int_data.is_compatible(InType::UnicodeString));

    let null: *const u8 = ptr::null();
    let null_data = FieldData::value(&null);
    assert_eq!(null_data.byte_len(), core::mem::size_of::<usize>());
    assert!(null_data.is_compatible(InType::Pointer));
    match null_data {
        FieldData::Value(bytes) => assert!(bytes.iter().all(|&b| b == 0)),
        _ => panic!("pointer should marshal as a value"),
    }

    assert_eq!(<f64 as ValueField>::IN_TYPE, InType::Double);
    assert_eq!(<usize as ValueField>::IN_TYPE, InType::Pointer);
}

#[test]
fn provider_state() {
    let state = ProviderState::new();
    let levels = [0u8, 1, 4, 5, 255];
    let keywords = [0u64, 1, 0x2, 0x8000_0000_0000_0000, u64::MAX];

    for &level in &levels {
        for &keyword in &keywords {
            assert!(!state.enabled(Level::from_int(level), keyword));
        }
    }

    state.enable_callback(ProviderState::CONTROL_ENABLE, 4, 0x0F, 0);
    assert!(state.any_enabled());
    assert!(state.enabled(Level::Informational, 0x2));
    assert!(state.enabled(Level::Informational, 0));
    assert!(state.enabled(Level::Warning, 0x2));
    assert!(!state.enabled(Level::Verbose, 0x2));
    assert!(!state.enabled(Level::Informational, 0x10));
    assert!(state.enabled(Level::Informational, 0x12));

    state.enable_callback(ProviderState::CONTROL_ENABLE, 3, 0x0F, 0);
    assert!(!state.enabled(Level::Informational, 0x2));

    state.enable_callback(ProviderState::CONTROL_ENABLE, 5, 0, 0);
    assert!(!state.enabled(Level::Informational, 0x2));
    assert!(state.enabled(Level::Informational, 0));

    state.enable_callback(ProviderState::CONTROL_ENABLE, 4, 0x0F, 0);
    state.enable_callback(ProviderState::CONTROL_DISABLE, 0, 0, 0);
    for &level in &levels {
        for &keyword in &keywords {
            assert!(!state.enabled(Level::from_int(level), keyword));
        }
    }

    // Disable keeps the last level and keywords.
    assert_eq!(state.active_level(), Level::Informational);
    assert_eq!(state.active_keywords(), 0x0F);

    // Capture-state and other codes do not change anything.
    state.enable_callback(2, 5, u64::MAX, 0);
    assert!(!state.any_enabled());
    assert_eq!(state.active_level(), Level::Informational);
}

#[test]
fn provider_state_concurrent() {
    let state = ProviderState::new();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for i in 0..10_000u32 {
                if i % 2 == 0 {
                    state.enable_callback(ProviderState::CONTROL_ENABLE, 5, 0x3, 0);
                } else {
                    state.enable_callback(ProviderState::CONTROL_DISABLE, 0, 0, 0);
                }
            }
        });

        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..10_000 {
                    // Keyword 0x4 never matches the active mask.
                    assert!(!state.enabled(Level::Verbose, 0x4));
                    assert!(!state.enabled(Level::from_int(6), 0));
                }
            });
        }
    });

    state.enable_callback(ProviderState::CONTROL_ENABLE, 5, 0x3, 0);
    assert!(state.enabled(Level::Verbose, 0x1));
}

#[test]
fn provider_lifecycle() {
    let (mock, provider) = mock_provider("example");

    assert_eq!(provider.name(), "example");
    assert_eq!(*provider.id(), Guid::from_name("example"));
    assert_eq!(provider.status(), ProviderStatus::Registered);
    assert_eq!(provider.traits(), b"\x0a\x00example\x00");
    assert!(!provider.enabled(Level::CriticalError, 0));
    assert!(format!("{:?}", provider).contains("example"));

    mock.control(ProviderState::CONTROL_ENABLE, 4, 0x0F);
    assert!(provider.enabled(Level::Informational, 0x2));
    assert!(provider.enabled_for(&START_SORT));
    assert!(!provider.enabled_for(&START_SORT.with_keyword(0x10)));

    mock.control(ProviderState::CONTROL_DISABLE, 0, 0);
    assert!(!provider.enabled_for(&START_SORT));

    assert_eq!(provider.unregister(), 0);
    assert_eq!(provider.status(), ProviderStatus::Unregistered);
    assert_eq!(mock.0.unregister_count.load(Ordering::Relaxed), 1);

    // Already unregistered.
    assert_eq!(provider.unregister(), 0);
    drop(provider);
    assert_eq!(mock.0.unregister_count.load(Ordering::Relaxed), 1);
}

#[test]
fn provider_drop_unregisters() {
    let (mock, provider) = mock_provider("example");
    assert!(mock.0.registration.lock().unwrap().is_some());
    drop(provider);
    assert!(mock.0.registration.lock().unwrap().is_none());
    assert_eq!(mock.0.unregister_count.load(Ordering::Relaxed), 1);
}

#[test]
fn provider_name_truncated() {
    let (mock, provider) = mock_provider("bad\0name");
    assert_eq!(provider.status(), ProviderStatus::Registered);
    assert_eq!(provider.name(), "bad");
    assert_eq!(&*provider.traits(), b"\x06\x00bad\x00");

    mock.control(ProviderState::CONTROL_ENABLE, 5, 0);
    assert_eq!(etw::write_event!(provider, INITIALIZED, "Initialized"), 0);
    assert_eq!(mock.0.writes.lock().unwrap()[0].blocks[0].1, b"\x06\x00bad\x00");

    assert_eq!(provider_traits_name("\0", None), "");
    assert_eq!(&*provider_traits("\0", None), b"\x03\x00\x00");

    // Shortened on a character boundary.
    let long = format!("a{}", "\u{20ac}".repeat(30000));
    let traits = provider_traits(&long, None);
    assert_eq!(traits.len(), 65533);
    assert_eq!(u16::from_le_bytes([traits[0], traits[1]]), 65533);
    assert_eq!(provider_traits_name(&long, None).len(), 65530);

    let group = Guid::from_name("MyGroup");
    let provider = Provider::with_api(
        MockEtw::default(),
        Guid::from_name("long"),
        &long,
        Provider::new_options().group_id(group),
    );
    assert!(provider.traits().len() <= 65535);
    assert_eq!(provider.name().len() + 3 + 19, provider.traits().len());
    assert!(long.starts_with(provider.name()));
}

#[test]
fn provider_group() {
    let group = Guid::from_name("MyGroup");
    let provider = Provider::with_api(
        MockEtw::default(),
        Guid::from_name("example"),
        "example",
        Provider::new_options().group_id(group),
    );
    assert_eq!(provider.traits().len(), 29);
    assert_eq!(provider.traits()[13..], group.to_bytes_le());
}

#[test]
fn degraded_provider() {
    let mock = MockEtw::failing(5);
    let provider = Provider::with_api(
        mock.clone(),
        Guid::from_name("example"),
        "example",
        &Provider::new_options(),
    );
    assert_eq!(provider.status(), ProviderStatus::Degraded(5));

    // Even if the state says enabled, nothing reaches the native write.
    provider
        .state()
        .enable_callback(ProviderState::CONTROL_ENABLE, 5, u64::MAX, 0);
    assert!(!provider.enabled(Level::Verbose, 1));

    let null: *const c_void = ptr::null();
    assert_eq!(etw::write_event!(provider, INITIALIZED, "Initialized"), 0);
    assert_eq!(
        etw::write_event!(provider, START_SORT, "StartSort", int32("element_count", 10)),
        0
    );
    assert_eq!(
        etw::write_event!(provider, INITIALIZED, "Address", pointer("Address", null)),
        0
    );
    assert_eq!(
        provider.write_fields(&INITIALIZED, event_metadata!("Initialized"), &[]),
        0
    );
    let mut data = [EventDataDescriptor::zero(), EventDataDescriptor::zero()];
    assert_eq!(
        provider.write_descriptors(&INITIALIZED, event_metadata!("Initialized"), &mut data),
        0
    );
    assert_eq!(mock.write_count(), 0);

    assert_eq!(provider.unregister(), 0);
    assert_eq!(provider.status(), ProviderStatus::Degraded(5));
    drop(provider);
    assert_eq!(mock.0.unregister_count.load(Ordering::Relaxed), 0);
}

#[test]
fn native_without_etw() {
    if NATIVE_IMPLEMENTATION == NativeImplementation::Other {
        let provider = Provider::new(
            Guid::from_name("example"),
            "example",
            &Provider::new_options(),
        );
        assert_eq!(
            provider.status(),
            ProviderStatus::Degraded(etw::_internal::ERROR_NOT_SUPPORTED)
        );
        assert_eq!(etw::write_event!(provider, INITIALIZED, "Initialized"), 0);
    }
}

#[test]
fn write_event() {
    let (mock, provider) = mock_provider("example");

    let mut evaluated = 0;
    etw::write_event!(
        provider,
        START_SORT,
        "StartSort",
        int32("element_count", {
            evaluated += 1;
            1000
        })
    );
    assert_eq!(evaluated, 0, "arguments must not be evaluated when disabled");
    assert_eq!(mock.write_count(), 0);

    mock.control(ProviderState::CONTROL_ENABLE, 5, 0);

    assert_eq!(etw::write_event!(provider, INITIALIZED, "Initialized"), 0);
    assert_eq!(
        etw::write_event!(
            provider,
            START_SORT,
            "StartSort",
            int32("element_count", {
                evaluated += 1;
                1000
            }),
        ),
        0
    );
    assert_eq!(evaluated, 1);
    etw::write_event!(provider, STOP_SORT, "StopSort");

    // Keyword 1 does not match an active mask of 0.
    let units: Vec<u16> = "script.js".encode_utf16().chain([0]).collect();
    let url = WStr::from_slice_with_nul(&units).unwrap();
    etw::write_event!(
        provider,
        SOURCE_LOAD,
        "SourceLoad",
        uint64("SourceID", 1u64),
        pointer("ScriptContextID", 0x1000usize),
        uint32("SourceFlags", 0u32),
        unicode_str("Url", url),
    );

    let writes = mock.0.writes.lock().unwrap();
    assert_eq!(writes.len(), 3);

    let initialized = &writes[0];
    assert_eq!(initialized.handle, MockEtw::HANDLE);
    assert_eq!(initialized.descriptor, INITIALIZED);
    assert_eq!(initialized.activity_id, None);
    assert_eq!(initialized.blocks.len(), 2);
    assert_eq!(
        initialized.blocks[0],
        (DataKind::ProviderMetadata, b"\x0a\x00example\x00".to_vec())
    );
    assert_eq!(
        initialized.blocks[1],
        (DataKind::EventMetadata, b"\x0f\x00\x00Initialized\x00".to_vec())
    );

    let start = &writes[1];
    assert_eq!(start.descriptor, START_SORT);
    assert_eq!(start.blocks.len(), 3);
    assert_eq!(start.blocks[1], (DataKind::EventMetadata, START_SORT_BLOB.to_vec()));
    assert_eq!(
        start.blocks[2],
        (DataKind::Payload, 1000i32.to_ne_bytes().to_vec())
    );

    assert_eq!(writes[2].descriptor, STOP_SORT);
    drop(writes);

    mock.control(ProviderState::CONTROL_ENABLE, 5, 1);
    etw::write_event!(
        provider,
        SOURCE_LOAD,
        "SourceLoad",
        uint64("SourceID", 1u64),
        pointer("ScriptContextID", 0x1000usize),
        uint32("SourceFlags", 0u32),
        unicode_str("Url", url),
    );

    let writes = mock.0.writes.lock().unwrap();
    let source_load = &writes[3];
    let sizes: Vec<usize> = source_load.blocks[2..].iter().map(|b| b.1.len()).collect();
    assert_eq!(
        sizes,
        [8, core::mem::size_of::<usize>(), 4, 2 * "script.js".len() + 2]
    );

    let view = EventMetadataView::parse(&source_load.blocks[1].1).unwrap();
    assert_eq!(view.name(), "SourceLoad");
    let types: Vec<InType> = view.fields().map(|f| f.in_type()).collect();
    assert_eq!(
        types,
        [
            InType::UInt64,
            InType::Pointer,
            InType::UInt32,
            InType::UnicodeString
        ]
    );
}

#[test]
fn write_event_all_kinds() {
    let (mock, provider) = mock_provider("example");
    mock.control(ProviderState::CONTROL_ENABLE, 5, 0);

    let message = c"hello";
    let units: Vec<u16> = "wide".encode_utf16().chain([0]).collect();
    let wide = WStr::from_slice_with_nul(&units).unwrap();
    let address: *const u8 = ptr::null();

    etw::write_event!(
        provider,
        INITIALIZED,
        "AllKinds",
        ansi_str("a", message),
        unicode_str("b", wide),
        int8("c", -1i8),
        uint8("d", 1u8),
        int16("e", -1i16),
        uint16("f", 1u16),
        int32("g", -1),
        uint32("h", 1u32),
        int64("i", -1i64),
        uint64("j", 1u64),
        float("k", 1.5f32),
        double("l", 2.5f64),
        bool32("m", 1),
        hex_int32("n", 0xdeadbeef),
        hex_int64("o", 0xdeadbeef_feeef000),
        pointer("p", address),
    );

    let writes = mock.0.writes.lock().unwrap();
    let blocks = &writes[0].blocks;
    let sizes: Vec<usize> = blocks[2..].iter().map(|b| b.1.len()).collect();
    let ptr_size = core::mem::size_of::<usize>();
    assert_eq!(
        sizes,
        [6, 10, 1, 1, 2, 2, 4, 4, 8, 8, 4, 8, 4, 4, 8, ptr_size]
    );
    assert_eq!(blocks[2].1, b"hello\0");
    assert_eq!(blocks[17].1, vec![0u8; ptr_size]);

    let view = EventMetadataView::parse(&blocks[1].1).unwrap();
    assert_eq!(view.field_count(), 16);
    for (spec, block) in view.fields().zip(&blocks[2..]) {
        match spec.in_type().fixed_size() {
            Some(size) => assert_eq!(size, block.1.len(), "{}", spec.name()),
            None => assert_eq!(block.1.last(), Some(&0)),
        }
    }
}

#[test]
fn write_transfer_activity() {
    let (mock, provider) = mock_provider("example");
    mock.control(ProviderState::CONTROL_ENABLE, 5, 0);

    let activity = Guid::from_u128(&0x7ae27afb_11cf_4edd_8b15_9997ec20e0fc);
    let related = Guid::from_u128(&0x848292a8_7cae_45b8_b3e6_ad51a6433d11);
    let count = 10i32;
    let status = provider.write_transfer(
        &START_SORT,
        Some(&activity),
        Some(&related),
        event_metadata!("StartSort", int32("element_count")),
        &mut [
            EventDataDescriptor::zero(),
            EventDataDescriptor::zero(),
            EventDataDescriptor::from_value(&count),
        ],
    );
    assert_eq!(status, 0);

    let writes = mock.0.writes.lock().unwrap();
    assert_eq!(writes[0].activity_id, Some(activity));
    assert_eq!(writes[0].related_id, Some(related));
    assert_eq!(writes[0].blocks[1].1, START_SORT_BLOB);
}

#[test]
fn write_fields() {
    let (mock, provider) = mock_provider("example");
    let meta = event_metadata!("StartSort", int32("element_count"));
    let count = 42i32;

    assert_eq!(
        provider.write_fields(&START_SORT, meta, &[FieldData::value(&count)]),
        0
    );
    assert_eq!(mock.write_count(), 0);

    mock.control(ProviderState::CONTROL_ENABLE, 4, 0);
    assert_eq!(
        provider.write_fields(&START_SORT, meta, &[FieldData::value(&count)]),
        0
    );
    {
        let writes = mock.0.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].blocks.len(), 3);
        assert_eq!(writes[0].blocks[2].1, count.to_ne_bytes());
    }

    let too_many = vec![FieldData::value(&count); MAX_FIELDS + 1];
    assert_eq!(
        provider.write_fields(&START_SORT, meta, &too_many),
        etw::_internal::ERROR_INVALID_PARAMETER
    );

    // Verbose events are filtered at level 4.
    let verbose = EventDescriptor::new(1, Level::Verbose);
    assert_eq!(
        provider.write_fields(&verbose, meta, &[FieldData::value(&count)]),
        0
    );
    assert_eq!(mock.write_count(), 1);
}

#[test]
fn write_failure_ignored() {
    const ERROR_NOT_ENOUGH_MEMORY: u32 = 8;

    let (mock, provider) = mock_provider("example");
    mock.control(ProviderState::CONTROL_ENABLE, 5, 0);
    mock.0
        .write_status
        .store(ERROR_NOT_ENOUGH_MEMORY, Ordering::Relaxed);

    let count = 42i32;
    assert_eq!(
        etw::write_event!(provider, START_SORT, "StartSort", int32("element_count", count)),
        ERROR_NOT_ENOUGH_MEMORY
    );
    assert_eq!(
        provider.write_fields(
            &START_SORT,
            event_metadata!("StartSort", int32("element_count")),
            &[FieldData::value(&count)]
        ),
        ERROR_NOT_ENOUGH_MEMORY
    );
    assert_eq!(mock.write_count(), 2);

    // The provider stays registered and enabled.
    assert_eq!(provider.status(), ProviderStatus::Registered);
    assert!(provider.enabled(Level::Informational, 0));

    mock.0.write_status.store(0, Ordering::Relaxed);
    assert_eq!(etw::write_event!(provider, INITIALIZED, "Initialized"), 0);
    assert_eq!(mock.write_count(), 3);
}

#[cfg(feature = "tracing")]
#[test]
fn lifecycle_with_tracing() {
    let (mock, provider) = mock_provider("example");
    assert_eq!(provider.status(), ProviderStatus::Registered);
    assert_eq!(provider.unregister(), 0);
    assert_eq!(provider.status(), ProviderStatus::Unregistered);

    let degraded = Provider::with_api(
        MockEtw::failing(5),
        Guid::from_name("example"),
        "example",
        &Provider::new_options(),
    );
    assert_eq!(degraded.status(), ProviderStatus::Degraded(5));
    drop(degraded);
    assert_eq!(mock.0.unregister_count.load(Ordering::Relaxed), 1);
}

const MAX_FIELDS: usize = etw::_internal::MAX_EVENT_DATA_DESCRIPTORS - 2;

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "fields do not match")]
fn write_fields_mismatch() {
    let (mock, provider) = mock_provider("example");
    mock.control(ProviderState::CONTROL_ENABLE, 5, 0);

    let wrong = 1i64;
    provider.write_fields(
        &START_SORT,
        event_metadata!("StartSort", int32("element_count")),
        &[FieldData::value(&wrong)],
    );
}

#[test]
fn enable_callback_null_context() {
    let (mock, provider) = mock_provider("example");
    let registration = *mock.0.registration.lock().unwrap();
    let (callback, _) = registration.unwrap();

    unsafe {
        callback(
            ptr::null(),
            ProviderState::CONTROL_ENABLE,
            5,
            u64::MAX,
            0,
            ptr::null(),
            ptr::null_mut(),
        )
    };
    assert!(!provider.enabled(Level::CriticalError, 0));
}
