// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::ffi::c_void;
use core::fmt;
use core::marker::PhantomPinned;
use core::pin::Pin;
use core::sync::atomic::AtomicBool;
use core::sync::atomic::AtomicU32;
use core::sync::atomic::AtomicU64;
use core::sync::atomic::AtomicU8;
use core::sync::atomic::Ordering;

use crate::descriptors::EventDataDescriptor;
use crate::descriptors::EventDescriptor;
use crate::enums::Level;
use crate::fields::FieldData;
use crate::guid::Guid;
use crate::metadata;
use crate::native;
use crate::native::CallbackFilterData;
use crate::native::CallbackSourceId;
use crate::native::EtwApi;
use crate::native::NativeEtw;

/// Enablement state of a provider as set by listening sessions.
///
/// Each field is an independent atomic. Readers may observe a mix of values from
/// before and after a concurrent update, but never a torn value of a single field.
#[derive(Debug, Default)]
pub struct ProviderState {
    enabled: AtomicBool,
    level: AtomicU8,
    keywords: AtomicU64,
}

impl ProviderState {
    /// Control code for "session disabled the provider".
    pub const CONTROL_DISABLE: u32 = 0;

    /// Control code for "session enabled the provider or changed its filter".
    pub const CONTROL_ENABLE: u32 = 1;

    /// Creates a disabled state with level 0 and keywords 0.
    pub const fn new() -> Self {
        return Self {
            enabled: AtomicBool::new(false),
            level: AtomicU8::new(0),
            keywords: AtomicU64::new(0),
        };
    }

    /// Returns true if any session is listening.
    #[inline(always)]
    pub fn any_enabled(&self) -> bool {
        return self.enabled.load(Ordering::Relaxed);
    }

    /// Returns true if an event with the specified level and keyword passes the
    /// current filter: enabled, `level <= active level`, and either `keyword == 0`
    /// or `keyword` shares a bit with the active keywords.
    #[inline(always)]
    pub fn enabled(&self, level: Level, keyword: u64) -> bool {
        if !self.enabled.load(Ordering::Relaxed) {
            return false;
        }

        return level.as_int() <= self.level.load(Ordering::Relaxed)
            && (keyword == 0 || (keyword & self.keywords.load(Ordering::Relaxed)) != 0);
    }

    /// Returns the level set by the most recent enable.
    pub fn active_level(&self) -> Level {
        return Level::from_int(self.level.load(Ordering::Relaxed));
    }

    /// Returns the keywords set by the most recent enable.
    pub fn active_keywords(&self) -> u64 {
        return self.keywords.load(Ordering::Relaxed);
    }

    /// Applies a session control request.
    ///
    /// - `CONTROL_ENABLE` stores enabled, level and keywords.
    /// - `CONTROL_DISABLE` stores only enabled = false. Level and keywords keep
    ///   their last values.
    /// - Other codes are ignored.
    ///
    /// `match_all_keyword` is accepted for signature compatibility and not used
    /// by the filter.
    pub fn enable_callback(
        &self,
        control_code: u32,
        level: u8,
        match_any_keyword: u64,
        _match_all_keyword: u64,
    ) {
        match control_code {
            Self::CONTROL_DISABLE => {
                self.enabled.store(false, Ordering::Relaxed);
            }
            Self::CONTROL_ENABLE => {
                self.level.store(level, Ordering::Relaxed);
                self.keywords.store(match_any_keyword, Ordering::Relaxed);
                self.enabled.store(true, Ordering::Relaxed);
            }
            _ => {}
        }
    }
}

/// Entry point registered with ETW. The context is the provider's `ProviderState`.
unsafe extern "system" fn enable_callback(
    _source_id: *const CallbackSourceId,
    is_enabled: u32,
    level: u8,
    match_any_keyword: u64,
    match_all_keyword: u64,
    _filter_data: *const CallbackFilterData,
    callback_context: *mut c_void,
) {
    if callback_context.is_null() {
        return;
    }

    // Safety: the context was registered by Provider::with_api as a pointer to the
    // provider's pinned state, and the registration is removed before the state
    // is dropped.
    let state = &*(callback_context as *const ProviderState);
    state.enable_callback(is_enabled, level, match_any_keyword, match_all_keyword);
}

/// Options for configuring a provider. Start from [`Provider::new_options`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProviderOptions {
    group_id: Option<Guid>,
}

impl ProviderOptions {
    /// Returns options with no provider group.
    pub const fn new() -> Self {
        return Self { group_id: None };
    }

    /// Adds the provider to a provider group. Sessions can enable every provider in
    /// the group by enabling the group id.
    pub fn group_id(&mut self, value: Guid) -> &mut Self {
        self.group_id = Some(value);
        return self;
    }
}

/// Registration status of a [`Provider`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderStatus {
    /// Registered with ETW. Writes are delivered to listening sessions.
    Registered,

    /// Registration failed with the contained Win32 error. The provider is a
    /// permanent no-op sink.
    Degraded(u32),

    /// Unregistered by [`Provider::unregister`]. All writes are no-ops.
    Unregistered,
}

/// A connection for writing manifest-free ETW events.
///
/// # Overview
///
/// 1. Create the provider once per provider id with [`Provider::new`] and pass
///    the returned handle to the components that log. Only one provider
///    object should exist for a given id in a process.
/// 2. Define each event's [`EventDescriptor`] and metadata as constants.
/// 3. Use [`write_event!`](crate::write_event) to write events.
/// 4. The provider unregisters when dropped. Call [`Provider::unregister`] to
///    unregister sooner.
///
/// Registration failure never fails construction: the provider instead becomes a
/// no-op sink and [`Provider::status`] reports the error.
pub struct Provider<A: EtwApi = NativeEtw> {
    state: ProviderState,
    reg_handle: AtomicU64,
    registration_error: AtomicU32,
    busy: AtomicBool,
    id: Guid,
    name: Box<str>,
    traits: Box<[u8]>,
    api: A,
    _pinned: PhantomPinned,
}

impl Provider {
    /// Returns a default ProviderOptions.
    pub const fn new_options() -> ProviderOptions {
        return ProviderOptions::new();
    }

    /// Creates a provider with the specified id and name and registers it with ETW.
    ///
    /// - `id` identifies the provider to sessions. Use [`Guid::from_name`] to get
    ///   the conventional id for `name`.
    /// - `name` is the provider name recorded in every event. It should not
    ///   contain `'\0'`. A name is cut at its first `'\0'` and shortened to fit
    ///   the 65535-byte traits blob.
    ///
    /// ```
    /// # use etw_provider::*;
    /// let provider = Provider::new(
    ///     Guid::from_name("MyCompany.MyComponent"),
    ///     "MyCompany.MyComponent",
    ///     &Provider::new_options(),
    /// );
    /// assert_eq!(provider.name(), "MyCompany.MyComponent");
    /// ```
    pub fn new(id: Guid, name: &str, options: &ProviderOptions) -> Pin<Arc<Self>> {
        return Self::with_api(NativeEtw, id, name, options);
    }
}

impl<A: EtwApi> Provider<A> {
    /// Creates a provider that uses the specified [`EtwApi`] implementation and
    /// registers it.
    pub fn with_api(api: A, id: Guid, name: &str, options: &ProviderOptions) -> Pin<Arc<Self>> {
        let name = metadata::provider_traits_name(name, options.group_id.as_ref());
        let provider = Arc::pin(Self {
            state: ProviderState::new(),
            reg_handle: AtomicU64::new(0),
            registration_error: AtomicU32::new(0),
            busy: AtomicBool::new(false),
            id,
            name: name.into(),
            traits: metadata::provider_traits(name, options.group_id.as_ref()),
            api,
            _pinned: PhantomPinned,
        });

        let context = &provider.state as *const ProviderState as *mut c_void;

        // Safety: the state is pinned inside the Arc and Drop unregisters before
        // the state is released.
        match unsafe { provider.api.register(&provider.id, enable_callback, context) } {
            Ok(handle) => {
                provider.reg_handle.store(handle, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                tracing::debug!(provider = %provider.name, id = %provider.id, "registered ETW provider");
            }
            Err(error) => {
                provider.registration_error.store(error, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                tracing::warn!(provider = %provider.name, id = %provider.id, error, "ETW provider registration failed, provider disabled");
            }
        }

        return provider;
    }

    /// Returns this provider's id.
    pub fn id(&self) -> &Guid {
        return &self.id;
    }

    /// Returns this provider's name.
    pub fn name(&self) -> &str {
        return &self.name;
    }

    /// Returns this provider's traits blob (size-prefixed name and optional group).
    pub fn traits(&self) -> &[u8] {
        return &self.traits;
    }

    /// Returns this provider's enablement state.
    pub fn state(&self) -> &ProviderState {
        return &self.state;
    }

    /// Returns the current registration status.
    pub fn status(&self) -> ProviderStatus {
        let error = self.registration_error.load(Ordering::Relaxed);
        return if self.reg_handle.load(Ordering::Relaxed) != 0 {
            ProviderStatus::Registered
        } else if error != 0 {
            ProviderStatus::Degraded(error)
        } else {
            ProviderStatus::Unregistered
        };
    }

    /// Returns true if an event with the specified level and keyword would be
    /// recorded by at least one session.
    ///
    /// Use this to skip building arguments for an event that nobody is listening to.
    #[inline(always)]
    pub fn enabled(&self, level: Level, keyword: u64) -> bool {
        return self.state.enabled(level, keyword) && self.reg_handle.load(Ordering::Relaxed) != 0;
    }

    /// Returns true if the event described by `descriptor` would be recorded by at
    /// least one session.
    #[inline(always)]
    pub fn enabled_for(&self, descriptor: &EventDescriptor) -> bool {
        return self.enabled(descriptor.level, descriptor.keyword);
    }

    /// If this provider is not registered, does nothing and returns 0.
    /// Otherwise unregisters it; subsequent writes are no-ops.
    ///
    /// Returns 0 for success or a Win32 error. The return value is for diagnostic
    /// purposes only and should generally be ignored in retail builds.
    pub fn unregister(&self) -> u32 {
        let mut result = 0;

        let was_busy = self.busy.swap(true, Ordering::Acquire);
        if !was_busy {
            let handle = self.reg_handle.swap(0, Ordering::Relaxed);
            if handle != 0 {
                result = self.api.unregister(handle);
                #[cfg(feature = "tracing")]
                tracing::debug!(provider = %self.name, result, "unregistered ETW provider");
            }

            self.busy.store(false, Ordering::Release);
        }

        return result;
    }

    /// Fills in `data[0]` with the provider traits and `data[1]` with `metadata`,
    /// then sends the event to ETW.
    ///
    /// Does nothing and returns 0 if the provider is not registered or the event is
    /// not enabled. Otherwise returns the status of the native write, for
    /// diagnostic purposes only.
    ///
    /// Requires:
    /// - `data.len() >= 2`, and `data[0]` and `data[1]` are empty.
    /// - `data[2..]` holds one descriptor per field declared in `metadata`.
    pub fn write_descriptors<'b>(
        &'b self,
        descriptor: &EventDescriptor,
        metadata: &'b [u8],
        data: &mut [EventDataDescriptor<'b>],
    ) -> u32 {
        return self.write_transfer(descriptor, None, None, metadata, data);
    }

    /// Same as [`Provider::write_descriptors`], with an activity id and an
    /// optional related (parent) activity id.
    ///
    /// `related_id` may only be present if `activity_id` is present.
    pub fn write_transfer<'b>(
        &'b self,
        descriptor: &EventDescriptor,
        activity_id: Option<&Guid>,
        related_id: Option<&Guid>,
        metadata: &'b [u8],
        data: &mut [EventDataDescriptor<'b>],
    ) -> u32 {
        debug_assert!(data.len() >= 2);
        debug_assert!(data[0].is_empty() && data[1].is_empty());
        debug_assert!(related_id.is_none() || activity_id.is_some());

        let handle = self.reg_handle.load(Ordering::Relaxed);
        if handle == 0 || !self.state.enabled(descriptor.level, descriptor.keyword) {
            return 0;
        }

        data[0] = EventDataDescriptor::from_provider_traits(&self.traits);
        data[1] = EventDataDescriptor::from_event_metadata(metadata);
        return self
            .api
            .write_transfer(handle, descriptor, activity_id, related_id, data);
    }

    /// Writes an event whose arguments are given as [`FieldData`] values.
    ///
    /// Prefer [`write_event!`](crate::write_event), which checks argument types at
    /// compile time. Debug builds verify that `fields` matches the fields declared
    /// in `metadata`.
    ///
    /// Returns `ERROR_INVALID_PARAMETER` if there are more than 126 fields.
    pub fn write_fields(
        &self,
        descriptor: &EventDescriptor,
        metadata: &[u8],
        fields: &[FieldData<'_>],
    ) -> u32 {
        if !self.enabled_for(descriptor) {
            return 0;
        }

        if fields.len() > native::MAX_EVENT_DATA_DESCRIPTORS - 2 {
            return native::ERROR_INVALID_PARAMETER;
        }

        debug_assert!(
            fields_match_metadata(metadata, fields),
            "fields do not match the event metadata"
        );

        let mut data = [EventDataDescriptor::zero(); native::MAX_EVENT_DATA_DESCRIPTORS];
        for (slot, field) in data[2..].iter_mut().zip(fields) {
            *slot = field.descriptor();
        }

        return self.write_descriptors(descriptor, metadata, &mut data[..2 + fields.len()]);
    }
}

fn fields_match_metadata(metadata: &[u8], fields: &[FieldData<'_>]) -> bool {
    return match metadata::EventMetadataView::parse(metadata) {
        Ok(view) => {
            view.field_count() == fields.len()
                && view
                    .fields()
                    .zip(fields)
                    .all(|(spec, field)| field.is_compatible(spec.in_type()))
        }
        Err(_) => false,
    };
}

impl<A: EtwApi> Drop for Provider<A> {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl<A: EtwApi> fmt::Debug for Provider<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f
            .debug_struct("Provider")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status())
            .field("state", &self.state)
            .finish();
    }
}
