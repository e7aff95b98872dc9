use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::debug;

use super::{BundleInput, SourceBundler};
use crate::detector::SourceLanguage;
use crate::error::Result;

/// Submits the compiler's standard JSON input, preserving every source file.
pub struct StandardJsonBundler;

impl SourceBundler for StandardJsonBundler {
    fn code_format(&self, language: SourceLanguage) -> Result<&'static str> {
        Ok(match language {
            SourceLanguage::Solidity => "solidity-standard-json-input",
            SourceLanguage::Vyper => "vyper-json",
        })
    }

    fn contract_name(&self, source_id: &str, name: &str) -> String {
        format!("{}:{}", source_id, name)
    }

    fn bundle(&self, input: &BundleInput<'_>) -> Result<String> {
        let sources: BTreeMap<&str, Value> = input
            .sources
            .iter()
            .map(|s| (s.source_id.as_str(), json!({ "content": s.content })))
            .collect();

        let settings = if input.settings.is_null() {
            json!({})
        } else {
            input.settings.clone()
        };

        let standard_input = json!({
            "language": input.language.to_string(),
            "sources": sources,
            "settings": settings,
        });

        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                "Dumping standard JSON output:\n{}",
                serde_json::to_string_pretty(&standard_input)?
            );
        }
        Ok(serde_json::to_string(&standard_input)?)
    }
}
