use crate::CheckError;
use crate::analysis::diagnostic::{Diagnostic, DiagnosticSeverity};
use crate::parser::ast::SourcePosition;
use colored::*;
use std::fmt::Write;

/// Renders diagnostics the way compilers do, quoting the offending line under each one
pub struct DiagnosticPrinter {
    pub use_colors: bool,
    pub source_code: String,
    pub file_name: String,
}

impl DiagnosticPrinter {
    pub fn new(source_code: &str, file_name: &str, use_colors: bool) -> Self {
        Self {
            use_colors,
            source_code: source_code.to_string(),
            file_name: file_name.to_string(),
        }
    }

    fn severity_str(&self, severity: DiagnosticSeverity) -> ColoredString {
        let s = severity.to_string();
        if !self.use_colors {
            return s.normal();
        }
        match severity {
            DiagnosticSeverity::Error => s.red().bold(),
            DiagnosticSeverity::Warning => s.yellow().bold(),
            DiagnosticSeverity::Info => s.blue(),
        }
    }

    fn gutter(&self, text: String) -> String {
        if self.use_colors {
            text.blue().to_string()
        } else {
            text
        }
    }

    /// Source line and caret; nothing for positions outside the analyzed text
    fn write_snippet(&self, out: &mut String, position: SourcePosition) {
        if position.line == 0 {
            return;
        }
        let Some(line) = self.source_code.lines().nth(position.line - 1) else {
            return;
        };
        let number = format!("{:>5} |", position.line);
        let width = number.len() - 1;
        let _ = writeln!(out, "{} {}", self.gutter(number), line);

        let caret = "^".to_string();
        let caret = if self.use_colors {
            caret.green().bold()
        } else {
            caret.normal()
        };
        let padding = " ".repeat(position.column.saturating_sub(1));
        let _ = writeln!(
            out,
            "{} {}{}",
            self.gutter(format!("{:>width$}|", "")),
            padding,
            caret
        );
    }

    pub fn sprint_errors(&self, diagnostics: &[Diagnostic]) -> String {
        let mut out = String::new();

        for diagnostic in diagnostics {
            let rule_id = if self.use_colors {
                diagnostic.rule_id.cyan().to_string()
            } else {
                diagnostic.rule_id.clone()
            };
            let _ = writeln!(
                out,
                "{}: {}: {} [{}]",
                diagnostic.location,
                self.severity_str(diagnostic.severity),
                diagnostic.message,
                rule_id
            );
            self.write_snippet(&mut out, diagnostic.position);

            for related in &diagnostic.related_info {
                let note = if self.use_colors {
                    "note".bold().to_string()
                } else {
                    "note".to_string()
                };
                let _ = writeln!(out, "{}: {}: {}", related.location, note, related.message);
                self.write_snippet(&mut out, related.position);
            }
        }
        out
    }

    pub fn print_errors(&self, diagnostics: &[Diagnostic]) {
        print!("{}", self.sprint_errors(diagnostics))
    }

    /// Machine-readable rendering for hosts that post-process results
    pub fn to_json(&self, diagnostics: &[Diagnostic]) -> Result<String, CheckError> {
        Ok(serde_json::to_string_pretty(diagnostics)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Analyzer;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "typedef int a;\nvoid f(void)\n{\n    int a = 010;\n}\n";

    fn diagnostics() -> Vec<Diagnostic> {
        Analyzer::new()
            .unwrap()
            .analyze_source(SOURCE, "unit.cpp")
            .unwrap()
    }

    #[test]
    fn plain_rendering_quotes_the_line() {
        let printer = DiagnosticPrinter::new(SOURCE, "unit.cpp", false);
        let text = printer.sprint_errors(&diagnostics());
        let expected = "\
unit.cpp:4:9: error: variable 'a' reuses a name already declared in this unit; a typedef name shall be a unique identifier [misra-cpp-2.10.3]
    4 |     int a = 010;
      |         ^
unit.cpp:1:13: note: previous declaration of 'a' as a typedef
    1 | typedef int a;
      |             ^
unit.cpp:4:13: error: octal constant '010' shall not be used [misra-cpp-2.13.2]
    4 |     int a = 010;
      |             ^
";
        assert_eq!(text, expected);
    }

    #[test]
    fn empty_input_renders_nothing() {
        let printer = DiagnosticPrinter::new("", "unit.cpp", true);
        assert_eq!(printer.sprint_errors(&[]), "");
    }

    #[test]
    fn json_rendering_keeps_resolved_locations() {
        let printer = DiagnosticPrinter::new(SOURCE, "unit.cpp", false);
        let json = printer.to_json(&diagnostics()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["rule_id"], "misra-cpp-2.10.3");
        assert_eq!(value[0]["severity"], "error");
        assert_eq!(value[0]["location"]["line"], 4);
        assert_eq!(value[0]["related_info"][0]["location"]["line"], 1);
        assert_eq!(value[1]["message"], "octal constant '010' shall not be used");
    }
}
