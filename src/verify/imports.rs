use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::detector::SourceLanguage;
use crate::error::{EtherscanError, Result};

pub(crate) const SOLIDITY_IMPORT: &str = r#"(?m)^\s*import\s+(?:[^;"']*?\s+from\s+)?["']([^"']+)["'][^;]*;"#;
const VYPER_IMPORT: &str = r"(?m)^\s*import\s+([\w.]+)(?:\s+as\s+\w+)?\s*$";
const VYPER_FROM_IMPORT: &str = r"(?m)^\s*from\s+([\w.]+)\s+import\s+(\w+)";

/// Module prefixes provided by the Vyper compiler itself.
const VYPER_BUILTINS: &[&str] = &["vyper.", "ethereum."];

/// A contract source, keyed by its path relative to the contracts folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub source_id: String,
    pub content: String,
}

/// A `prefix=target` import remapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remapping {
    pub prefix: String,
    pub target: String,
}

impl Remapping {
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, target) = raw.split_once('=')?;
        Some(Remapping {
            prefix: prefix.trim().to_string(),
            target: target.trim().to_string(),
        })
    }
}

/// Walks the import graph of a contract inside one contracts folder.
pub struct ImportResolver<'a> {
    base: &'a Path,
    language: SourceLanguage,
    remappings: Vec<Remapping>,
}

impl<'a> ImportResolver<'a> {
    pub fn new(base: &'a Path, language: SourceLanguage, remappings: Vec<Remapping>) -> Self {
        ImportResolver {
            base,
            language,
            remappings,
        }
    }

    /// The contract and everything it imports, dependencies before dependents.
    pub fn collect(&self, source_id: &str) -> Result<Vec<SourceFile>> {
        let mut ordered = Vec::new();
        let mut seen = HashSet::new();
        self.visit(&normalize_source_id(source_id), &mut seen, &mut ordered)?;
        Ok(ordered)
    }

    fn visit(
        &self,
        source_id: &str,
        seen: &mut HashSet<String>,
        ordered: &mut Vec<SourceFile>,
    ) -> Result<()> {
        if !seen.insert(source_id.to_string()) {
            return Ok(());
        }

        let content = std::fs::read_to_string(self.base.join(source_id))?;
        for import in self.resolve_imports(source_id, &content)? {
            self.visit(&import, seen, ordered)?;
        }

        ordered.push(SourceFile {
            source_id: source_id.to_string(),
            content,
        });
        Ok(())
    }

    /// Source ids imported directly by `source_id`.
    pub fn resolve_imports(&self, source_id: &str, content: &str) -> Result<Vec<String>> {
        match self.language {
            SourceLanguage::Solidity => self.resolve_solidity(source_id, content),
            SourceLanguage::Vyper => self.resolve_vyper(source_id, content),
        }
    }

    fn resolve_solidity(&self, source_id: &str, content: &str) -> Result<Vec<String>> {
        let re = Regex::new(SOLIDITY_IMPORT)?;
        let mut imports = Vec::new();
        for cap in re.captures_iter(content) {
            let raw = &cap[1];
            let resolved = if raw.starts_with("./") || raw.starts_with("../") {
                join_relative(parent_of(source_id), raw)
            } else {
                normalize_source_id(&self.remap(raw))
            };

            if !self.base.join(&resolved).is_file() {
                return Err(EtherscanError::ContractVerification(format!(
                    "Unable to resolve import '{}' in '{}'",
                    raw, source_id
                )));
            }
            imports.push(resolved);
        }
        Ok(imports)
    }

    fn resolve_vyper(&self, source_id: &str, content: &str) -> Result<Vec<String>> {
        let mut modules: Vec<Vec<String>> = Vec::new();
        for cap in Regex::new(VYPER_IMPORT)?.captures_iter(content) {
            modules.push(vec![cap[1].to_string()]);
        }
        for cap in Regex::new(VYPER_FROM_IMPORT)?.captures_iter(content) {
            let module = &cap[1];
            let name = &cap[2];
            let joined = if module.ends_with('.') {
                format!("{}{}", module, name)
            } else {
                format!("{}.{}", module, name)
            };
            modules.push(vec![joined, module.to_string()]);
        }

        let mut imports = Vec::new();
        for candidates in modules {
            if VYPER_BUILTINS.iter().any(|b| candidates[0].starts_with(b)) {
                continue;
            }

            let found = candidates
                .iter()
                .flat_map(|module| {
                    let path = vyper_module_path(source_id, module);
                    ["vy", "vyi"].map(|ext| format!("{}.{}", path, ext))
                })
                .find(|candidate| self.base.join(candidate).is_file());

            match found {
                Some(path) => imports.push(path),
                None => debug!("Skipping unresolved Vyper import '{}' in '{}'", candidates[0], source_id),
            }
        }
        Ok(imports)
    }

    /// Apply the longest matching remapping.
    fn remap(&self, import: &str) -> String {
        self.remappings
            .iter()
            .filter(|r| import.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len())
            .map(|r| format!("{}{}", r.target, &import[r.prefix.len()..]))
            .unwrap_or_else(|| import.to_string())
    }
}

/// Path (without extension) of a dotted Vyper module. Leading dots are relative
/// to the importing file.
fn vyper_module_path(importer: &str, module: &str) -> String {
    let trimmed = module.trim_start_matches('.');
    let dots = module.len() - trimmed.len();
    let relative = trimmed.replace('.', "/");
    if dots == 0 {
        return normalize_source_id(&relative);
    }

    let mut prefix = String::new();
    for _ in 1..dots {
        prefix.push_str("../");
    }
    join_relative(parent_of(importer), &format!("{}{}", prefix, relative))
}

fn parent_of(source_id: &str) -> &str {
    source_id.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn join_relative(dir: &str, relative: &str) -> String {
    if dir.is_empty() {
        normalize_source_id(relative)
    } else {
        normalize_source_id(&format!("{}/{}", dir, relative))
    }
}

/// Collapse `.` / `..` segments and use forward slashes.
pub fn normalize_source_id(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
