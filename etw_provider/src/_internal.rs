// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![doc(hidden)]
//! Internal implementation details for etw_provider macros and etw_provider_dynamic.
//! Contents subject to change without notice.

pub use crate::descriptors::EventDataDescriptor;
pub use crate::fields::kinds as fields;
pub use crate::metadata::event_metadata_len;
pub use crate::metadata::EventMetadata;
pub use crate::metadata::FieldSpec;
pub use crate::metadata::EVENT_METADATA_HEADER_LEN;
pub use crate::metadata::METADATA_SIZE_MAX;
pub use crate::native::ERROR_ARITHMETIC_OVERFLOW;
pub use crate::native::ERROR_INVALID_PARAMETER;
pub use crate::native::ERROR_NOT_SUPPORTED;
pub use crate::native::ERROR_SUCCESS;
pub use crate::native::MAX_EVENT_DATA_DESCRIPTORS;
