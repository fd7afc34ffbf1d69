// Threat rule definitions
//
// Rules are data, not code: an ordered list of {pattern, category, severity}
// evaluated in declaration order. External JSON rule files replace the
// built-in defaults wholesale.

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    /// Attempts to override or discard prior instructions.
    PromptInjection,
    /// Attempts to exfiltrate the system prompt or hidden context.
    PromptLeak,
    /// Role-play framings that sidestep safety behavior.
    Jailbreak,
    /// Encoding tricks used to smuggle payloads past filters.
    Obfuscation,
}

impl ThreatCategory {
    pub const ALL: [ThreatCategory; 4] = [
        ThreatCategory::PromptInjection,
        ThreatCategory::PromptLeak,
        ThreatCategory::Jailbreak,
        ThreatCategory::Obfuscation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatCategory::PromptInjection => "prompt_injection",
            ThreatCategory::PromptLeak => "prompt_leak",
            ThreatCategory::Jailbreak => "jailbreak",
            ThreatCategory::Obfuscation => "obfuscation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatSeverity {
    Low,
    Medium,
    High,
}

/// One rule as configured: a regex pattern plus its classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatRule {
    pub pattern: String,
    pub category: ThreatCategory,
    pub severity: ThreatSeverity,
}

/// A rule with its pattern compiled. Case-insensitive search anywhere in the
/// input, never a full match.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub regex: regex::Regex,
    pub category: ThreatCategory,
    pub severity: ThreatSeverity,
}

impl CompiledRule {
    pub fn compile(rule: &ThreatRule) -> Result<Self> {
        let regex = RegexBuilder::new(&rule.pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Failed to compile threat pattern: {}", rule.pattern))?;
        Ok(Self {
            regex,
            category: rule.category,
            severity: rule.severity,
        })
    }
}

/// Compile an ordered rule list, preserving declaration order.
pub fn compile_rules(rules: &[ThreatRule]) -> Result<Vec<CompiledRule>> {
    rules.iter().map(CompiledRule::compile).collect()
}

/// Load an ordered rule list from a JSON array file. An empty rule set is a
/// deployment error.
pub fn load_rules_from_file(path: &Path) -> Result<Vec<ThreatRule>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read threat rules file: {}", path.display()))?;

    let rules: Vec<ThreatRule> =
        serde_json::from_str(&contents).context("Failed to parse threat rules JSON")?;

    if rules.is_empty() {
        bail!("Threat rules file {} contains no rules", path.display());
    }

    Ok(rules)
}

/// Built-in defaults, compiled once on first use.
pub static DEFAULT_COMPILED_RULES: Lazy<Vec<CompiledRule>> =
    Lazy::new(|| compile_rules(&default_rules()).expect("built-in threat rules must compile"));

/// Built-in rule set used when no external rule file is configured.
///
/// Patterns are deliberately plain alternations with no nested repetition,
/// so evaluation time stays linear in the input length.
pub fn default_rules() -> Vec<ThreatRule> {
    let defaults: &[(&str, ThreatCategory, ThreatSeverity)] = &[
        (
            r"(ignore|disregard|forget) (all |any )?(previous|prior|above|earlier) (instructions|directives|rules|prompts)",
            ThreatCategory::PromptInjection,
            ThreatSeverity::High,
        ),
        (
            r"new instructions\s*:",
            ThreatCategory::PromptInjection,
            ThreatSeverity::Medium,
        ),
        (
            r"(reveal|show|print|repeat|output) (me )?(your|the) (system|hidden|initial) (prompt|instructions)",
            ThreatCategory::PromptLeak,
            ThreatSeverity::High,
        ),
        (
            r"what (is|was) your system prompt",
            ThreatCategory::PromptLeak,
            ThreatSeverity::High,
        ),
        (
            r"you are now (dan|unrestricted|jailbroken|in developer mode)",
            ThreatCategory::Jailbreak,
            ThreatSeverity::High,
        ),
        (
            r"pretend (you are|to be|you have) no (rules|restrictions|guidelines)",
            ThreatCategory::Jailbreak,
            ThreatSeverity::Medium,
        ),
        (
            r"(decode|respond in|answer in) (base64|rot13|hex|leetspeak)",
            ThreatCategory::Obfuscation,
            ThreatSeverity::Medium,
        ),
    ];

    defaults
        .iter()
        .map(|(pattern, category, severity)| ThreatRule {
            pattern: (*pattern).to_string(),
            category: *category,
            severity: *severity,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_rules_compile() {
        let compiled = compile_rules(&default_rules()).unwrap();
        assert!(!compiled.is_empty());
    }

    #[test]
    fn test_bad_pattern_fails() {
        let rule = ThreatRule {
            pattern: "(unclosed".to_string(),
            category: ThreatCategory::PromptInjection,
            severity: ThreatSeverity::Low,
        };
        assert!(CompiledRule::compile(&rule).is_err());
    }

    #[test]
    fn test_load_rules_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"pattern": "forbidden phrase", "category": "jailbreak", "severity": "low"}}]"#
        )
        .unwrap();

        let rules = load_rules_from_file(file.path()).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].category, ThreatCategory::Jailbreak);
        assert_eq!(rules[0].severity, ThreatSeverity::Low);
    }

    #[test]
    fn test_empty_rules_file_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();
        assert!(load_rules_from_file(file.path()).is_err());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(ThreatSeverity::High > ThreatSeverity::Medium);
        assert!(ThreatSeverity::Medium > ThreatSeverity::Low);
    }
}
