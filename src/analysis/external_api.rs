use crate::analysis::diagnostic::{Diagnostic, DiagnosticSeverity};
use crate::analysis::diagnostic_printer::DiagnosticPrinter;
use crate::analysis::rule_registry::{RegisteredTreeRule, RuleEngine, RuleInfo, RuleRegistry};
use crate::analysis::rules::declarative::{DeclarativeRule, RuleSpec};
use crate::analysis::{Analyzer, SourceUnit};
use crate::parser::ast::{NodeModel, ResolvedLocation, SourcePosition};
use crate::{CheckError, ConfigurationError, misra_error};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ffi::{CStr, CString, c_char};
use std::ptr;

/// Host-side policy for one analyzer; every field may be omitted in JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub disabled_rules: Vec<String>,
    /// Rules that are off unless listed here, e.g. `misra-c-7.1`
    pub enabled_rules: Vec<String>,
    pub warning_as_error: bool,
    /// Maximum number of errors kept per unit
    pub error_limit: Option<usize>,
    pub system_header_dirs: Vec<String>,
    pub severity_overrides: BTreeMap<String, DiagnosticSeverity>,
    /// Extra tree rules defined by pattern and message
    pub rules: Vec<RuleSpec>,
}

impl AnalyzerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, CheckError> {
        let config = serde_json::from_str(json).inspect_err(|err| {
            error!("invalid analyzer configuration: {err}");
        })?;
        Ok(config)
    }

    /// Checks every rule id the configuration mentions and compiles the declarative rules
    pub fn validate(&self, registry: &RuleRegistry) -> Result<(), ConfigurationError> {
        self.compile_rules(registry).map(|_| ())
    }

    pub(crate) fn compile_rules(
        &self,
        registry: &RuleRegistry,
    ) -> Result<Vec<RegisteredTreeRule>, ConfigurationError> {
        let mut declared = HashSet::new();
        let mut compiled = Vec::with_capacity(self.rules.len());
        for spec in &self.rules {
            if registry.contains(&spec.id) || !declared.insert(spec.id.as_str()) {
                error!("configured rule '{}' reuses an existing rule id", spec.id);
                return Err(ConfigurationError::DuplicateRule(spec.id.clone()));
            }
            spec.validate().inspect_err(|err| error!("{err}"))?;
            compiled.push(RegisteredTreeRule::new(Box::new(DeclarativeRule::new(
                spec.clone(),
            )))?);
        }

        let mentioned = self
            .disabled_rules
            .iter()
            .chain(&self.enabled_rules)
            .chain(self.severity_overrides.keys());
        for id in mentioned {
            if !registry.contains(id) && !declared.contains(id.as_str()) {
                error!("configuration refers to unknown rule '{id}'");
                return Err(ConfigurationError::UnknownRule(id.clone()));
            }
        }
        Ok(compiled)
    }

    pub fn is_enabled(&self, rule_id: &str, enabled_by_default: bool) -> bool {
        if self.disabled_rules.iter().any(|id| id == rule_id) {
            return false;
        }
        enabled_by_default || self.enabled_rules.iter().any(|id| id == rule_id)
    }

    /// Override first, then `warning_as_error`
    pub fn severity_for(&self, rule_id: &str, default: DiagnosticSeverity) -> DiagnosticSeverity {
        let severity = self
            .severity_overrides
            .get(rule_id)
            .copied()
            .unwrap_or(default);
        if self.warning_as_error && severity == DiagnosticSeverity::Warning {
            DiagnosticSeverity::Error
        } else {
            severity
        }
    }

    /// Applies the error limit to one unit's sorted diagnostics
    pub fn apply_policies(&self, diagnostics: &mut Vec<Diagnostic>, main_file: &str) {
        let Some(limit) = self.error_limit else {
            return;
        };
        let error_count = diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
            .count();
        if error_count <= limit {
            return;
        }

        let mut kept = 0;
        diagnostics.retain(|d| {
            if d.severity != DiagnosticSeverity::Error {
                return true;
            }
            kept += 1;
            kept <= limit
        });
        debug!("{main_file}: error limit {limit} reached, {error_count} errors found");

        diagnostics.push(Diagnostic {
            message: format!("Too many errors ({}), stopping analysis", error_count),
            location: ResolvedLocation {
                file: main_file.to_string(),
                line: 0,
                column: 0,
            },
            position: SourcePosition { line: 0, column: 0 },
            severity: DiagnosticSeverity::Info,
            rule_id: "error-limit".to_string(),
            related_info: Vec::new(),
        });
    }
}

impl Analyzer {
    /// Analyzes an already parsed unit under a configuration other than the analyzer's own
    pub fn analyze_with_config(
        &self,
        model: &NodeModel,
        config: &AnalyzerConfig,
    ) -> Result<Vec<Diagnostic>, CheckError> {
        let config_rules = config.compile_rules(self.registry())?;
        let report = self.run_unit(model, config, &config_rules)?;
        Ok(report.diagnostics)
    }

    /// Built-in rules followed by the configured ones
    pub fn list_rules(&self) -> Vec<RuleInfo> {
        let mut rules = self.registry().get_all_rules();
        rules.extend(
            self.config_rules()
                .iter()
                .map(|registered| RuleInfo::of(registered.rule.as_ref(), RuleEngine::Tree)),
        );
        rules
    }
}

/// Borrows a C string the caller keeps owning
unsafe fn borrow_c_str<'a>(ptr: *const c_char, what: &str) -> Option<&'a str> {
    if ptr.is_null() {
        misra_error(&format!("the passed {what} pointer is null"));
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    match unsafe { CStr::from_ptr(ptr) }.to_str() {
        Ok(s) => Some(s),
        Err(err) => {
            misra_error(&CheckError::Utf8Error(format!("{what}: {err}")).to_string());
            None
        }
    }
}

fn check_to_text(source: &str, file_name: &str, config_json: Option<&str>) -> Result<String, CheckError> {
    let config = match config_json {
        Some(json) => AnalyzerConfig::from_json_str(json)?,
        None => AnalyzerConfig::default(),
    };
    let analyzer = Analyzer::with_config(config)?;
    let unit = SourceUnit::new(file_name, source);
    let report = analyzer.analyze_unit(&unit)?;
    let printer = DiagnosticPrinter::new(source, file_name, false);
    Ok(printer.sprint_errors(&report.diagnostics))
}

fn into_c_string(result: Result<String, CheckError>) -> *mut c_char {
    match result {
        Ok(text) => match CString::new(text) {
            Ok(cstring) => cstring.into_raw(),
            Err(_) => {
                misra_error("failed to create CString from rendered diagnostics");
                ptr::null_mut()
            }
        },
        Err(err) => {
            misra_error(&format!("misra_check_source failed: {err}"));
            ptr::null_mut()
        }
    }
}

/// Checks one translation unit with the default configuration and returns the rendered
/// diagnostics, an empty string when the unit is clean, or null on failure
///
/// # Safety
/// `source` and `file_name` must be null or valid NUL-terminated strings. They stay owned by
/// the caller; the returned string must be freed with `misra_free_string`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn misra_check_source(
    source: *const c_char,
    file_name: *const c_char,
) -> *mut c_char {
    // SAFETY: same contract as this function.
    unsafe { misra_check_source_with_config(source, file_name, ptr::null()) }
}

/// Like `misra_check_source`, with an `AnalyzerConfig` in JSON; null means the default
///
/// # Safety
/// Every pointer must be null or a valid NUL-terminated string owned by the caller.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn misra_check_source_with_config(
    source: *const c_char,
    file_name: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    // SAFETY: forwarded from this function's contract.
    let Some(source) = (unsafe { borrow_c_str(source, "source") }) else {
        return ptr::null_mut();
    };
    let Some(file_name) = (unsafe { borrow_c_str(file_name, "file name") }) else {
        return ptr::null_mut();
    };
    let config_json = if config_json.is_null() {
        None
    } else {
        match unsafe { borrow_c_str(config_json, "configuration") } {
            Some(json) => Some(json),
            None => return ptr::null_mut(),
        }
    };

    into_c_string(check_to_text(source, file_name, config_json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::misra_free_string;
    use crate::misra_get_errors;
    use pretty_assertions::assert_eq;

    fn take(raw: *mut c_char) -> Option<String> {
        if raw.is_null() {
            return None;
        }
        let text = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
        unsafe { misra_free_string(raw) };
        Some(text)
    }

    #[test]
    fn config_from_json_with_defaults() {
        let config = AnalyzerConfig::from_json_str(
            r#"{"disabled_rules": ["misra-cpp-3.9.3"], "severity_overrides": {"misra-cpp-2.13.4": "info"}}"#,
        )
        .unwrap();
        assert_eq!(config.disabled_rules, vec!["misra-cpp-3.9.3".to_string()]);
        assert_eq!(config.error_limit, None);
        assert!(!config.warning_as_error);
        assert_eq!(
            config.severity_for("misra-cpp-2.13.4", DiagnosticSeverity::Error),
            DiagnosticSeverity::Info
        );

        assert!(matches!(
            AnalyzerConfig::from_json_str("{\"error_limit\": \"many\"}"),
            Err(CheckError::ConfigFormatError(_))
        ));
    }

    #[test]
    fn unknown_and_colliding_rule_ids_are_rejected() {
        let registry = RuleRegistry::with_builtin_rules().unwrap();

        let config = AnalyzerConfig {
            disabled_rules: vec!["misra-cpp-0.0.0".into()],
            ..AnalyzerConfig::default()
        };
        assert_eq!(
            config.validate(&registry),
            Err(ConfigurationError::UnknownRule("misra-cpp-0.0.0".into()))
        );

        let colliding = AnalyzerConfig::from_json_str(
            r#"{"rules": [{"id": "misra-cpp-4.5.1", "message": "m", "pattern": "anything"}]}"#,
        )
        .unwrap();
        assert_eq!(
            colliding.validate(&registry),
            Err(ConfigurationError::DuplicateRule("misra-cpp-4.5.1".into()))
        );

        let bad_pattern = AnalyzerConfig::from_json_str(
            r#"{"rules": [{"id": "custom", "message": "m", "pattern": {"kind": "Lambda"}}]}"#,
        )
        .unwrap();
        assert_eq!(
            bad_pattern.validate(&registry),
            Err(ConfigurationError::UnknownKind("Lambda".into()))
        );

        let custom = AnalyzerConfig::from_json_str(
            r#"{"rules": [{"id": "custom", "message": "m", "pattern": "anything"}],
                "disabled_rules": ["custom"]}"#,
        )
        .unwrap();
        assert_eq!(custom.validate(&registry), Ok(()));

        let bad_message = AnalyzerConfig::from_json_str(
            r#"{"rules": [{"id": "custom", "message": "bad %99999999999999999999999",
                           "pattern": {"kind": "BinaryOperator"}}]}"#,
        )
        .unwrap();
        assert_eq!(
            bad_message.validate(&registry),
            Err(ConfigurationError::UnboundPlaceholder {
                rule: "custom".into(),
                placeholder: "99999999999999999999999".into(),
            })
        );
    }

    #[test]
    fn enablement_and_warning_as_error() {
        let config = AnalyzerConfig {
            disabled_rules: vec!["a".into()],
            enabled_rules: vec!["b".into()],
            warning_as_error: true,
            ..AnalyzerConfig::default()
        };
        assert!(!config.is_enabled("a", true));
        assert!(config.is_enabled("b", false));
        assert!(!config.is_enabled("c", false));
        assert!(config.is_enabled("c", true));
        assert_eq!(
            config.severity_for("c", DiagnosticSeverity::Warning),
            DiagnosticSeverity::Error
        );
        assert_eq!(
            config.severity_for("c", DiagnosticSeverity::Info),
            DiagnosticSeverity::Info
        );
    }

    #[test]
    fn c_surface_renders_diagnostics() {
        let source = CString::new("int x = 010;\n").unwrap();
        let file = CString::new("unit.cpp").unwrap();
        let text = take(unsafe { misra_check_source(source.as_ptr(), file.as_ptr()) }).unwrap();
        assert!(text.contains("unit.cpp:1:9: error: octal constant '010' shall not be used [misra-cpp-2.13.2]"));

        let clean = CString::new("int x = 10;\n").unwrap();
        let text = take(unsafe { misra_check_source(clean.as_ptr(), file.as_ptr()) }).unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn c_surface_records_failures() {
        let file = CString::new("unit.cpp").unwrap();
        let broken = CString::new("int x = ;\n").unwrap();
        let raw = unsafe { misra_check_source(broken.as_ptr(), file.as_ptr()) };
        // a parse error is a diagnostic, not a failure
        assert!(take(raw).unwrap().contains("[parse-error]"));

        let raw = unsafe { misra_check_source(ptr::null(), file.as_ptr()) };
        assert!(raw.is_null());
        assert_eq!(
            take(misra_get_errors()).as_deref(),
            Some("the passed source pointer is null")
        );

        let source = CString::new("int x;\n").unwrap();
        let config = CString::new("{\"disabled_rules\": [\"nope\"]}").unwrap();
        let raw = unsafe {
            misra_check_source_with_config(source.as_ptr(), file.as_ptr(), config.as_ptr())
        };
        assert!(raw.is_null());
        assert!(take(misra_get_errors()).unwrap().contains("unknown rule 'nope'"));

        let source = CString::new("int a;\nint b = a + 1;\n").unwrap();
        let config = CString::new(
            r#"{"rules": [{"id": "c", "message": "%1", "pattern": {"kind": "BinaryOperator"}}]}"#,
        )
        .unwrap();
        let raw = unsafe {
            misra_check_source_with_config(source.as_ptr(), file.as_ptr(), config.as_ptr())
        };
        assert!(raw.is_null());
        assert!(take(misra_get_errors()).unwrap().contains("uses '%1'"));
    }
}
