use std::path::Path;

use crate::error::Result;
use crate::license::spdx::{LicenseType, SPDX_ID_KEY};

/// Only the leading lines of a file are searched for the license header.
const HEADER_LINES: usize = 10;

/// Classify a source file's license from its `SPDX-License-Identifier` header.
pub fn license_from_source(source: &str) -> LicenseType {
    source
        .lines()
        .take(HEADER_LINES)
        .find(|line| line.contains(SPDX_ID_KEY))
        .map(LicenseType::from_spdx_id)
        .unwrap_or(LicenseType::NoLicense)
}

pub fn license_from_file(path: &Path) -> Result<LicenseType> {
    let content = std::fs::read_to_string(path)?;
    Ok(license_from_source(&content))
}
