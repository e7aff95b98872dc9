use std::fmt;

use serde::Serialize;
use tracing::warn;

pub const SPDX_ID_KEY: &str = "SPDX-License-Identifier: ";

/// License codes accepted by `verifysourcecode` (see
/// <https://etherscan.io/contract-license-types>).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum LicenseType {
    /// No license; nobody else may copy, distribute or modify the work.
    NoLicense = 1,
    /// The Unlicense: dedicates the work to the public domain.
    Unlicense = 2,
    Mit = 3,
    Gpl2 = 4,
    Gpl3 = 5,
    Lgpl2_1 = 6,
    Lgpl3 = 7,
    Bsd2Clause = 8,
    Bsd3Clause = 9,
    Mpl2 = 10,
    Osl3 = 11,
    Apache2 = 12,
    Agpl3 = 13,
    /// Business Source License; production use needs a commercial license.
    Busl1_1 = 14,
}

impl LicenseType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        ALL.iter().copied().find(|l| l.code() == code)
    }

    /// Parse a header line such as `// SPDX-License-Identifier: MIT`.
    ///
    /// Lines without the identifier key, and unsupported identifiers, give
    /// [`LicenseType::NoLicense`].
    pub fn from_spdx_id(line: &str) -> Self {
        let Some((_, rest)) = line.split_once(SPDX_ID_KEY) else {
            return LicenseType::NoLicense;
        };

        let license_id = rest
            .trim()
            .trim_end_matches("*/")
            .trim()
            .to_lowercase();
        match lookup(&license_id) {
            Some(license) => license,
            None => {
                warn!("Unsupported license type '{}'.", license_id);
                LicenseType::NoLicense
            }
        }
    }
}

/// Every license code the explorers accept, in code order.
pub const ALL: [LicenseType; 14] = [
    LicenseType::NoLicense,
    LicenseType::Unlicense,
    LicenseType::Mit,
    LicenseType::Gpl2,
    LicenseType::Gpl3,
    LicenseType::Lgpl2_1,
    LicenseType::Lgpl3,
    LicenseType::Bsd2Clause,
    LicenseType::Bsd3Clause,
    LicenseType::Mpl2,
    LicenseType::Osl3,
    LicenseType::Apache2,
    LicenseType::Agpl3,
    LicenseType::Busl1_1,
];

/// Map a lowercase SPDX identifier to its license code.
pub fn lookup(license_id: &str) -> Option<LicenseType> {
    let license = match license_id.trim() {
        // `UNLICENSED` marks proprietary code, unlike The Unlicense.
        "unlicensed" | "none" => LicenseType::NoLicense,
        "unlicense" => LicenseType::Unlicense,
        "mit" => LicenseType::Mit,
        "gpl-2.0" | "gpl-2.0-only" | "gpl-2.0-or-later" => LicenseType::Gpl2,
        "gpl-3.0" | "gpl-3.0-only" | "gpl-3.0-or-later" => LicenseType::Gpl3,
        "lgpl-2.1" | "lgpl-2.1-only" | "lgpl-2.1-or-later" => LicenseType::Lgpl2_1,
        "lgpl-3.0" | "lgpl-3.0-only" | "lgpl-3.0-or-later" => LicenseType::Lgpl3,
        "bsd-2-clause" => LicenseType::Bsd2Clause,
        "bsd-3-clause" => LicenseType::Bsd3Clause,
        "mpl-2.0" => LicenseType::Mpl2,
        "osl-3.0" => LicenseType::Osl3,
        "apache-2.0" | "apache 2.0" => LicenseType::Apache2,
        "agpl-3.0" | "agpl-3.0-only" | "agpl-3.0-or-later" | "agpl-3.0-later" => LicenseType::Agpl3,
        "busl-1.1" => LicenseType::Busl1_1,
        _ => return None,
    };
    Some(license)
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LicenseType::NoLicense => "No License (None)",
            LicenseType::Unlicense => "The Unlicense (Unlicense)",
            LicenseType::Mit => "MIT License (MIT)",
            LicenseType::Gpl2 => "GNU General Public License v2.0 (GNU GPLv2)",
            LicenseType::Gpl3 => "GNU General Public License v3.0 (GNU GPLv3)",
            LicenseType::Lgpl2_1 => "GNU Lesser General Public License v2.1 (GNU LGPLv2.1)",
            LicenseType::Lgpl3 => "GNU Lesser General Public License v3.0 (GNU LGPLv3)",
            LicenseType::Bsd2Clause => "BSD 2-clause \"Simplified\" license (BSD-2-Clause)",
            LicenseType::Bsd3Clause => "BSD 3-clause \"New\" Or \"Revised\" license (BSD-3-Clause)",
            LicenseType::Mpl2 => "Mozilla Public License 2.0 (MPL-2.0)",
            LicenseType::Osl3 => "Open Software License 3.0 (OSL-3.0)",
            LicenseType::Apache2 => "Apache 2.0 (Apache-2.0)",
            LicenseType::Agpl3 => "GNU Affero General Public License (GNU AGPLv3)",
            LicenseType::Busl1_1 => "Business Source License (BSL 1.1)",
        };
        write!(f, "{}", name)
    }
}
