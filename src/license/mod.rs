//! Explorer license codes.
//!
//! - [`spdx`] — maps SPDX identifiers to the explorer's numeric [`LicenseType`] codes.
//! - [`classifier`] — finds the `SPDX-License-Identifier` header in source text.

pub mod classifier;
pub mod spdx;

pub use spdx::LicenseType;
