use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Contract languages the explorers can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceLanguage {
    Solidity,
    Vyper,
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLanguage::Solidity => write!(f, "Solidity"),
            SourceLanguage::Vyper => write!(f, "Vyper"),
        }
    }
}

impl SourceLanguage {
    pub fn extension(&self) -> &'static str {
        match self {
            SourceLanguage::Solidity => "sol",
            SourceLanguage::Vyper => "vy",
        }
    }

    /// Language of a compiler, by its name (`solc`, `Solidity`, `vyper`, ...).
    pub fn from_compiler_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "solidity" | "solc" => Some(SourceLanguage::Solidity),
            "vyper" => Some(SourceLanguage::Vyper),
            _ => None,
        }
    }
}

/// Detect the source language of a contract file from its extension.
pub fn detect_language(path: &Path) -> Option<SourceLanguage> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("sol") => Some(SourceLanguage::Solidity),
        Some("vy") | Some("vyi") => Some(SourceLanguage::Vyper),
        _ => None,
    }
}
