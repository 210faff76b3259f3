use crate::parser::ast::{NodeModel, ResolvedLocation, SourcePosition};
use log::{error, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use std::iter::Peekable;
use std::str::Chars;
use std::sync::{Mutex, PoisonError};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    #[default]
    Warning,
    Info,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "error"),
            DiagnosticSeverity::Warning => write!(f, "warning"),
            DiagnosticSeverity::Info => write!(f, "info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub location: ResolvedLocation,
    /// Physical position in the analyzed text, used to quote the offending line
    #[serde(skip)]
    pub position: SourcePosition,
    pub severity: DiagnosticSeverity,
    pub rule_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_info: Vec<DiagnosticRelatedInfo>, // optional
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticRelatedInfo {
    pub message: String,
    pub location: ResolvedLocation,
    #[serde(skip)]
    pub position: SourcePosition,
}

/// Fills `%0`, `%1`, … from `args`; `%%` is a literal percent sign.
///
/// Placeholders without a matching argument are kept verbatim.
pub fn format_message(template: &str, args: &[&dyn fmt::Display]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        match chars.peek() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some(next) if next.is_ascii_digit() => {
                let digits = take_digits(&mut chars);
                match digits.parse::<usize>().ok().and_then(|index| args.get(index)) {
                    Some(arg) => {
                        let _ = write!(out, "{arg}");
                    }
                    None => {
                        out.push('%');
                        out.push_str(&digits);
                    }
                }
            }
            _ => out.push('%'),
        }
    }

    out
}

/// The `%N` placeholders of `template` as written, digits only, e.g. `["0", "12"]`
pub fn placeholders(template: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        match chars.peek() {
            Some('%') => {
                chars.next();
            }
            Some(next) if next.is_ascii_digit() => found.push(take_digits(&mut chars)),
            _ => {}
        }
    }
    found
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(digit) = chars.next_if(char::is_ascii_digit) {
        digits.push(digit);
    }
    digits
}

/// Where finished diagnostics go: console, log, a collector, structured output...
pub trait DiagnosticChannel {
    fn emit(&mut self, diagnostic: Diagnostic);

    /// Delivers the diagnostics of one translation unit, in order
    fn emit_unit(&mut self, diagnostics: Vec<Diagnostic>) {
        for diagnostic in diagnostics {
            self.emit(diagnostic);
        }
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
        }
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }

    pub fn count(&self, severity: DiagnosticSeverity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl DiagnosticChannel for DiagnosticCollector {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.add(diagnostic);
    }
}

/// Serializes writes from units analyzed on several threads.
///
/// Each unit is written as one block, so per-unit order survives; blocks from different
/// units may interleave in any order.
#[derive(Debug, Default)]
pub struct SharedChannel<C> {
    inner: Mutex<C>,
}

impl<C: DiagnosticChannel> SharedChannel<C> {
    pub fn new(channel: C) -> Self {
        Self {
            inner: Mutex::new(channel),
        }
    }

    pub fn emit_unit(&self, diagnostics: Vec<Diagnostic>) {
        // a panic in another writer leaves the channel itself consistent
        let mut channel = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        channel.emit_unit(diagnostics);
    }

    pub fn into_inner(self) -> C {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: DiagnosticChannel> DiagnosticChannel for SharedChannel<C> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .emit(diagnostic);
    }
}

/// Forwards diagnostics to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

impl DiagnosticChannel for LogChannel {
    fn emit(&mut self, diagnostic: Diagnostic) {
        let Diagnostic {
            location,
            message,
            rule_id,
            severity,
            ..
        } = diagnostic;
        match severity {
            DiagnosticSeverity::Error => error!("{location}: {message} [{rule_id}]"),
            DiagnosticSeverity::Warning => warn!("{location}: {message} [{rule_id}]"),
            DiagnosticSeverity::Info => info!("{location}: {message} [{rule_id}]"),
        }
    }
}

/// Records the violations of one translation unit.
///
/// Locations are resolved through the unit's line map and anything inside a system header
/// is dropped here, whichever engine reported it.
#[derive(Debug)]
pub struct DiagnosticSink<'m> {
    model: &'m NodeModel,
    diagnostics: Vec<Diagnostic>,
    suppressed: usize,
}

impl<'m> DiagnosticSink<'m> {
    pub fn new(model: &'m NodeModel) -> Self {
        Self {
            model,
            diagnostics: Vec::new(),
            suppressed: 0,
        }
    }

    pub fn model(&self) -> &'m NodeModel {
        self.model
    }

    /// Returns `false` when the position lies in a system header and nothing was recorded
    pub fn report(
        &mut self,
        position: SourcePosition,
        rule_id: &str,
        severity: DiagnosticSeverity,
        template: &str,
        args: &[&dyn fmt::Display],
    ) -> bool {
        self.record(position, rule_id, severity, format_message(template, args), Vec::new())
    }

    /// Like `report`, with a note pointing at a related location
    pub fn report_with_note(
        &mut self,
        position: SourcePosition,
        rule_id: &str,
        severity: DiagnosticSeverity,
        template: &str,
        args: &[&dyn fmt::Display],
        note_position: SourcePosition,
        note: String,
    ) -> bool {
        let related = vec![DiagnosticRelatedInfo {
            message: note,
            location: self.model.resolve(note_position),
            position: note_position,
        }];
        self.record(position, rule_id, severity, format_message(template, args), related)
    }

    /// Counts a match the engine dropped before it reached a rule
    pub fn note_suppressed(&mut self) {
        self.suppressed += 1;
    }

    fn record(
        &mut self,
        position: SourcePosition,
        rule_id: &str,
        severity: DiagnosticSeverity,
        message: String,
        related_info: Vec<DiagnosticRelatedInfo>,
    ) -> bool {
        if self.model.is_system_location(position) {
            trace!("[{rule_id}] suppressed report in system header at {position:?}");
            self.suppressed += 1;
            return false;
        }

        self.diagnostics.push(Diagnostic {
            message,
            location: self.model.resolve(position),
            position,
            severity,
            rule_id: rule_id.to_string(),
            related_info,
        });
        true
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    pub fn finish(self) -> (Vec<Diagnostic>, usize) {
        (self.diagnostics, self.suppressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{CompileOptions, parse};
    use pretty_assertions::assert_eq;

    fn pos(line: usize, column: usize) -> SourcePosition {
        SourcePosition { line, column }
    }

    fn diagnostic(rule_id: &str, line: usize) -> Diagnostic {
        Diagnostic {
            message: format!("message from {rule_id}"),
            location: ResolvedLocation {
                file: "a.c".into(),
                line,
                column: 1,
            },
            position: pos(line, 1),
            severity: DiagnosticSeverity::Warning,
            rule_id: rule_id.to_string(),
            related_info: Vec::new(),
        }
    }

    #[test]
    fn message_placeholders() {
        assert_eq!(
            format_message("octal constant '%0' on line %1", &[&"010", &7]),
            "octal constant '010' on line 7"
        );
        assert_eq!(format_message("100%% sure, %2 missing", &[&1]), "100% sure, %2 missing");
        assert_eq!(format_message("trailing %", &[]), "trailing %");
    }

    #[test]
    fn unmatched_placeholders_stay_verbatim() {
        assert_eq!(
            format_message("bad %99999999999999999999999 here", &[&1]),
            "bad %99999999999999999999999 here"
        );
        assert_eq!(format_message("%007 and %0", &[&"x"]), "%007 and x");
        assert_eq!(
            placeholders("%0, %% and %12 of %99999999999999999999999"),
            vec!["0", "12", "99999999999999999999999"]
        );
    }

    #[test]
    fn collector_keeps_call_order_and_duplicates() {
        let mut collector = DiagnosticCollector::new();
        collector.emit_unit(vec![diagnostic("b", 5), diagnostic("a", 3), diagnostic("a", 3)]);
        let rules: Vec<&str> = collector
            .diagnostics()
            .iter()
            .map(|d| d.rule_id.as_str())
            .collect();
        assert_eq!(rules, vec!["b", "a", "a"]);
        assert_eq!(collector.count(DiagnosticSeverity::Warning), 3);
        assert!(!collector.has_errors());
    }

    #[test]
    fn shared_channel_writes_units_as_blocks() {
        let shared = SharedChannel::new(DiagnosticCollector::new());
        shared.emit_unit(vec![diagnostic("x", 1), diagnostic("x", 2)]);
        shared.emit_unit(vec![diagnostic("y", 1)]);
        let collected = shared.into_inner();
        assert_eq!(collected.len(), 3);
        assert_eq!(collected.diagnostics()[2].rule_id, "y");
    }

    #[test]
    fn sink_resolves_and_suppresses() {
        let source = "int a;\n# 1 \"/usr/include/lib.h\" 1 3\nint b;\n# 3 \"main.c\" 2\nint c;\n";
        let model = parse(source, &CompileOptions::new("main.c")).unwrap();
        let mut sink = DiagnosticSink::new(&model);

        assert!(sink.report(pos(1, 5), "r", DiagnosticSeverity::Error, "first %0", &[&"a"]));
        assert!(!sink.report(pos(3, 5), "r", DiagnosticSeverity::Error, "hidden", &[]));
        assert!(sink.report_with_note(
            pos(5, 5),
            "r",
            DiagnosticSeverity::Warning,
            "third",
            &[],
            pos(1, 5),
            "see here".into()
        ));

        let (diagnostics, suppressed) = sink.finish();
        assert_eq!(suppressed, 1);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].message, "first a");
        assert_eq!(
            diagnostics[1].location,
            ResolvedLocation {
                file: "main.c".into(),
                line: 3,
                column: 5
            }
        );
        assert_eq!(diagnostics[1].related_info[0].location.line, 1);
    }
}
