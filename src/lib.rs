use log::error;
use std::ffi::{CString, c_char};
use std::ptr;
use thiserror::Error;

pub mod analysis;
pub mod lexer;
pub mod parser;
pub mod preprocessor;

pub use analysis::context::{AnalysisContext, RuleContext, UnitState};
pub use analysis::diagnostic::{
    Diagnostic, DiagnosticChannel, DiagnosticCollector, DiagnosticSeverity, DiagnosticSink,
    LogChannel, SharedChannel,
};
pub use analysis::diagnostic_printer::DiagnosticPrinter;
pub use analysis::external_api::AnalyzerConfig;
pub use analysis::pattern::{MatchResult, Pattern, PatternSpec, Target};
pub use analysis::rule::{Rule, TokenMatch, TokenRule, TreeMatch, TreeRule};
pub use analysis::rule_registry::{RuleEngine, RuleInfo, RuleRegistry};
pub use analysis::rules::declarative::RuleSpec;
pub use analysis::{AnalysisSummary, Analyzer, ScanState, SourceUnit, UnitReport};
pub use parser::ast::{NodeId, NodeKind, NodeModel, ResolvedLocation, SourcePosition, SourceSpan};
pub use parser::{CompileOptions, parse};

/// Problems found while compiling rule patterns or applying a configuration.
///
/// These are reported at registration time; analysis never starts with a bad rule set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("unknown node or token kind '{0}'")]
    UnknownKind(String),
    #[error("unknown pattern attribute '{0}'")]
    UnknownAttribute(String),
    #[error("unknown value '{value}' for attribute '{attribute}'")]
    UnknownAttributeValue { attribute: String, value: String },
    #[error("attribute '{0}' needs at least one value")]
    MissingAttributeValues(String),
    #[error("unknown child role '{0}'")]
    UnknownRole(String),
    #[error("capture '{0}' is bound more than once in the same pattern")]
    DuplicateCapture(String),
    #[error("'{0}' needs at least one sub-pattern")]
    EmptyCombinator(&'static str),
    #[error("rule '{0}' is registered more than once")]
    DuplicateRule(String),
    #[error("unknown rule '{0}'")]
    UnknownRule(String),
    #[error("message of rule '{rule}' uses '%{placeholder}', but only %0 is filled in")]
    UnboundPlaceholder { rule: String, placeholder: String },
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Invalid rule configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Failed to parse preprocessor directive: {0}")]
    ParseDirectiveError(String),
    #[error("Unknown preprocessor directive encountered: {0}")]
    UnknownDirectiveError(String),
    #[error("Lexer encountered an error at {line}:{column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("{file}:{line}:{column}: {message}")]
    ParseError {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },
    #[error("rule '{rule}' expected capture '{capture}' but the match did not bind it")]
    InvariantViolation { rule: String, capture: String },
    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(String),
    #[error("Failed to read analyzer configuration: {0}")]
    ConfigFormatError(#[from] serde_json::Error),
}

impl CheckError {
    /// Errors that only invalidate the translation unit that produced them.
    ///
    /// A batch skips the unit and keeps going; every other error stops the run.
    pub fn is_unit_local(&self) -> bool {
        matches!(
            self,
            CheckError::ParseError { .. }
                | CheckError::LexerError { .. }
                | CheckError::ParseDirectiveError(_)
                | CheckError::UnknownDirectiveError(_)
        )
    }
}

thread_local! {
    static ERRORS: std::cell::RefCell<Vec<String>> = const { std::cell::RefCell::new(Vec::new()) };
}

pub fn misra_error(err: &str) {
    ERRORS.with(|errors| errors.borrow_mut().push(err.to_string()));
    error!("{:?}", err);
}

/// returns the last error emitted by misra_check on this thread, or a null pointer if there is none
///
/// you have to free the returned string using `misra_free_string`
#[unsafe(no_mangle)]
pub extern "C" fn misra_get_errors() -> *mut c_char {
    ERRORS.with(|errors| {
        let errors = errors.borrow();
        match errors.last() {
            Some(last_error) => match CString::new(last_error.clone()) {
                Ok(cstring) => cstring.into_raw(),
                Err(_) => ptr::null_mut(),
            },
            None => ptr::null_mut(),
        }
    })
}

/// Use to free any strings allocated by misra_check
///
/// # Safety
/// `ptr` must be null or a pointer previously returned by this library and not freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn misra_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        // SAFETY: the caller hands back a pointer produced by `CString::into_raw`.
        drop(unsafe { CString::from_raw(ptr) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn last_error_is_returned_and_freed() {
        misra_error("first");
        misra_error("second");
        let raw = misra_get_errors();
        assert!(!raw.is_null());
        let text = unsafe { CStr::from_ptr(raw) }.to_str().map(str::to_owned);
        unsafe { misra_free_string(raw) };
        assert_eq!(text.ok().as_deref(), Some("second"));
    }

    #[test]
    fn parse_errors_are_unit_local() {
        let err = CheckError::ParseError {
            file: "a.c".into(),
            line: 1,
            column: 1,
            message: "boom".into(),
        };
        assert!(err.is_unit_local());
        let err = CheckError::InvariantViolation {
            rule: "r".into(),
            capture: "c".into(),
        };
        assert!(!err.is_unit_local());
        let err = CheckError::from(ConfigurationError::UnknownKind("Foo".into()));
        assert!(!err.is_unit_local());
    }
}
