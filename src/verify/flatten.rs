use regex::Regex;

use super::imports::SOLIDITY_IMPORT;
use super::{BundleInput, SourceBundler};
use crate::detector::SourceLanguage;
use crate::error::{EtherscanError, Result};
use crate::license::spdx::SPDX_ID_KEY;

/// Concatenates a contract and its imports into one single-file submission.
pub struct FlattenBundler;

impl SourceBundler for FlattenBundler {
    fn code_format(&self, language: SourceLanguage) -> Result<&'static str> {
        match language {
            SourceLanguage::Solidity => Ok("solidity-single-file"),
            SourceLanguage::Vyper => Err(EtherscanError::IncompatibleCompilerSettings(
                "Vyper contracts cannot be flattened; use the standard-json approach".to_string(),
            )),
        }
    }

    fn contract_name(&self, _source_id: &str, name: &str) -> String {
        name.to_string()
    }

    fn bundle(&self, input: &BundleInput<'_>) -> Result<String> {
        self.code_format(input.language)?;
        let import_re = Regex::new(SOLIDITY_IMPORT)?;

        let mut license: Option<String> = None;
        let mut pragmas: Vec<String> = Vec::new();
        let mut bodies: Vec<String> = Vec::new();

        for source in input.sources {
            let without_imports = import_re.replace_all(&source.content, "");
            let mut body = Vec::new();
            for line in without_imports.lines() {
                let trimmed = line.trim();
                if trimmed.contains(SPDX_ID_KEY) {
                    // The header belongs to the contract being verified.
                    if source.source_id == input.source_id || license.is_none() {
                        license = Some(trimmed.to_string());
                    }
                } else if trimmed.starts_with("pragma ") {
                    if !pragmas.iter().any(|p| p == trimmed) {
                        pragmas.push(trimmed.to_string());
                    }
                } else {
                    body.push(line);
                }
            }

            bodies.push(format!(
                "// File: {}\n\n{}",
                source.source_id,
                body.join("\n").trim()
            ));
        }

        let mut out = String::new();
        if let Some(license) = license {
            out.push_str(&license);
            out.push('\n');
        }
        for pragma in &pragmas {
            out.push_str(pragma);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&bodies.join("\n\n"));
        out.push('\n');
        Ok(out)
    }
}
