// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use core::ffi::c_void;

use crate::descriptors::EventDataDescriptor;
use crate::descriptors::EventDescriptor;
use crate::guid::Guid;

/// Win32 `ERROR_SUCCESS`.
pub const ERROR_SUCCESS: u32 = 0;

/// Win32 `ERROR_NOT_SUPPORTED`, returned when ETW is not available.
pub const ERROR_NOT_SUPPORTED: u32 = 50;

/// Win32 `ERROR_INVALID_PARAMETER`.
pub const ERROR_INVALID_PARAMETER: u32 = 87;

/// Win32 `ERROR_ARITHMETIC_OVERFLOW`, returned for events that are too large.
pub const ERROR_ARITHMETIC_OVERFLOW: u32 = 534;

/// Maximum number of data descriptors accepted by a single native write.
pub const MAX_EVENT_DATA_DESCRIPTORS: usize = 128;

/// Target of the enable callback's `source_id` pointer: the native `GUID` when
/// compiled for ETW, opaque otherwise.
#[cfg(all(windows, feature = "etw"))]
pub type CallbackSourceId = windows_sys::core::GUID;

/// Target of the enable callback's `source_id` pointer: the native `GUID` when
/// compiled for ETW, opaque otherwise.
#[cfg(not(all(windows, feature = "etw")))]
pub type CallbackSourceId = c_void;

/// Target of the enable callback's `filter_data` pointer:
/// `EVENT_FILTER_DESCRIPTOR` when compiled for ETW, opaque otherwise.
#[cfg(all(windows, feature = "etw"))]
pub type CallbackFilterData = windows_sys::Win32::System::Diagnostics::Etw::EVENT_FILTER_DESCRIPTOR;

/// Target of the enable callback's `filter_data` pointer:
/// `EVENT_FILTER_DESCRIPTOR` when compiled for ETW, opaque otherwise.
#[cfg(not(all(windows, feature = "etw")))]
pub type CallbackFilterData = c_void;

/// Signature of the callback ETW invokes when a session enables, disables, or
/// changes its filter for a provider (`PENABLECALLBACK`).
///
/// `is_enabled` is 0 for disable, 1 for enable; other values (e.g. capture-state
/// requests) carry no state change.
pub type EnableCallback = unsafe extern "system" fn(
    source_id: *const CallbackSourceId,
    is_enabled: u32,
    level: u8,
    match_any_keyword: u64,
    match_all_keyword: u64,
    filter_data: *const CallbackFilterData,
    callback_context: *mut c_void,
);

/// The operating-system calls a [`Provider`](crate::Provider) depends on.
///
/// [`NativeEtw`] forwards to the Windows ETW API. Tests and hosts without ETW can
/// supply their own implementation.
pub trait EtwApi: Sync {
    /// Registers a provider. Returns a nonzero registration handle, or a Win32
    /// error code.
    ///
    /// # Safety
    ///
    /// `callback_context` must remain valid, and `callback` must remain callable
    /// with it, until `unregister` is called with the returned handle.
    unsafe fn register(
        &self,
        provider_id: &Guid,
        callback: EnableCallback,
        callback_context: *mut c_void,
    ) -> Result<u64, u32>;

    /// Unregisters a handle returned by `register`. After this returns, the
    /// callback is not invoked again for this registration.
    fn unregister(&self, handle: u64) -> u32;

    /// Sends an event. `data` is the complete descriptor array: provider traits,
    /// event metadata, then one descriptor per field.
    fn write_transfer(
        &self,
        handle: u64,
        descriptor: &EventDescriptor,
        activity_id: Option<&Guid>,
        related_id: Option<&Guid>,
        data: &[EventDataDescriptor<'_>],
    ) -> u32;
}

/// [`EtwApi`] implementation backed by `advapi32.dll` on Windows when the `etw`
/// feature is enabled. In other configurations registration fails with
/// `ERROR_NOT_SUPPORTED`, so providers operate as no-op sinks.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeEtw;

#[cfg(all(windows, feature = "etw"))]
mod windows {
    use windows_sys::core::GUID;
    pub use windows_sys::Win32::System::Diagnostics::Etw::EventRegister;
    pub use windows_sys::Win32::System::Diagnostics::Etw::EventUnregister;
    pub use windows_sys::Win32::System::Diagnostics::Etw::EventWriteTransfer;
    pub use windows_sys::Win32::System::Diagnostics::Etw::EVENT_DATA_DESCRIPTOR;
    pub use windows_sys::Win32::System::Diagnostics::Etw::EVENT_DESCRIPTOR;

    use crate::guid::Guid;

    pub fn native_guid(guid: &Guid) -> GUID {
        let (data1, data2, data3, data4) = guid.to_fields();
        return GUID {
            data1,
            data2,
            data3,
            data4,
        };
    }

    pub fn native_guid_ptr(guid: Option<&GUID>) -> *const GUID {
        return guid.map_or(core::ptr::null(), |g| g as *const GUID);
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn guid_layout() {
            let guid = Guid::from_u128(&0xa3a2a1a0_b1b0_c1c0_d7d6_d5d4d3d2d1d0);
            let native = native_guid(&guid);
            assert_eq!(native.data1, 0xa3a2a1a0);
            assert_eq!(native.data2, 0xb1b0);
            assert_eq!(native.data3, 0xc1c0);
            assert_eq!(native.data4, [0xd7, 0xd6, 0xd5, 0xd4, 0xd3, 0xd2, 0xd1, 0xd0]);
            assert!(native_guid_ptr(None).is_null());

            assert_eq!(
                core::mem::size_of::<crate::EventDescriptor>(),
                core::mem::size_of::<EVENT_DESCRIPTOR>()
            );
            assert_eq!(
                core::mem::size_of::<crate::EventDataDescriptor<'static>>(),
                core::mem::size_of::<EVENT_DATA_DESCRIPTOR>()
            );
        }
    }
}

impl EtwApi for NativeEtw {
    #[cfg(all(windows, feature = "etw"))]
    unsafe fn register(
        &self,
        provider_id: &Guid,
        callback: EnableCallback,
        callback_context: *mut c_void,
    ) -> Result<u64, u32> {
        let native_id = windows::native_guid(provider_id);
        let mut handle = 0i64;
        let error = windows::EventRegister(&native_id, Some(callback), callback_context, &mut handle);
        return if error != ERROR_SUCCESS {
            Err(error)
        } else if handle == 0 {
            Err(ERROR_INVALID_PARAMETER)
        } else {
            Ok(handle as u64)
        };
    }

    #[cfg(not(all(windows, feature = "etw")))]
    unsafe fn register(
        &self,
        _provider_id: &Guid,
        _callback: EnableCallback,
        _callback_context: *mut c_void,
    ) -> Result<u64, u32> {
        return Err(ERROR_NOT_SUPPORTED);
    }

    fn unregister(&self, _handle: u64) -> u32 {
        #[cfg(all(windows, feature = "etw"))]
        {
            return unsafe { windows::EventUnregister(_handle as i64) };
        }

        #[cfg(not(all(windows, feature = "etw")))]
        {
            return ERROR_SUCCESS;
        }
    }

    fn write_transfer(
        &self,
        _handle: u64,
        _descriptor: &EventDescriptor,
        _activity_id: Option<&Guid>,
        _related_id: Option<&Guid>,
        _data: &[EventDataDescriptor<'_>],
    ) -> u32 {
        #[cfg(all(windows, feature = "etw"))]
        {
            let activity = _activity_id.map(windows::native_guid);
            let related = _related_id.map(windows::native_guid);

            // EventDescriptor and EventDataDescriptor are repr(C) with the same
            // layout as EVENT_DESCRIPTOR and EVENT_DATA_DESCRIPTOR.
            return unsafe {
                windows::EventWriteTransfer(
                    _handle as i64,
                    (_descriptor as *const EventDescriptor).cast::<windows::EVENT_DESCRIPTOR>(),
                    windows::native_guid_ptr(activity.as_ref()),
                    windows::native_guid_ptr(related.as_ref()),
                    _data.len() as u32,
                    _data.as_ptr().cast::<windows::EVENT_DATA_DESCRIPTOR>(),
                )
            };
        }

        #[cfg(not(all(windows, feature = "etw")))]
        {
            return ERROR_NOT_SUPPORTED;
        }
    }
}

/// Possible configurations under which this crate can be compiled: `WindowsEtw` or
/// `Other`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeImplementation {
    /// Crate compiled for other configuration (no logging is performed).
    Other,

    /// Crate compiled for Windows with the `etw` feature (logging is performed via
    /// `EventWriteTransfer`).
    WindowsEtw,
}

/// The configuration under which this crate was compiled: `WindowsEtw` or `Other`.
pub const NATIVE_IMPLEMENTATION: NativeImplementation = if cfg!(all(windows, feature = "etw")) {
    NativeImplementation::WindowsEtw
} else {
    NativeImplementation::Other
};
