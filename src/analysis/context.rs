use crate::analysis::diagnostic::{Diagnostic, DiagnosticSeverity, DiagnosticSink};
use crate::parser::ast::{NodeModel, ResolvedLocation, SourcePosition};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredKind {
    Typedef,
    Variable,
}

impl fmt::Display for DeclaredKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredKind::Typedef => write!(f, "typedef"),
            DeclaredKind::Variable => write!(f, "variable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredName {
    pub name: String,
    pub kind: DeclaredKind,
    pub position: SourcePosition,
}

/// Per-rule bookkeeping that lives exactly as long as one translation unit's analysis
#[derive(Debug, Default)]
pub struct UnitState {
    declared: Vec<DeclaredName>,
}

impl UnitState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the declaration and returns the first earlier one with the same name.
    ///
    /// The new name is recorded even when it collides.
    pub fn declare(
        &mut self,
        name: &str,
        kind: DeclaredKind,
        position: SourcePosition,
    ) -> Option<DeclaredName> {
        let previous = self.declared.iter().find(|d| d.name == name).cloned();
        self.declared.push(DeclaredName {
            name: name.to_string(),
            kind,
            position,
        });
        previous
    }

    pub fn declared(&self) -> &[DeclaredName] {
        &self.declared
    }
}

/// Everything one analysis run of one unit owns; dropped when the run ends
#[derive(Debug)]
pub struct AnalysisContext<'m> {
    pub diagnostics: DiagnosticSink<'m>,
    unit_states: HashMap<String, UnitState>,
}

impl<'m> AnalysisContext<'m> {
    pub fn new(model: &'m NodeModel) -> Self {
        Self {
            diagnostics: DiagnosticSink::new(model),
            unit_states: HashMap::new(),
        }
    }

    pub fn model(&self) -> &'m NodeModel {
        self.diagnostics.model()
    }

    /// The view handed to one rule callback
    pub fn rule_context<'c>(
        &'c mut self,
        rule_id: &'c str,
        severity: DiagnosticSeverity,
    ) -> RuleContext<'c, 'm> {
        let state = self.unit_states.entry(rule_id.to_string()).or_default();
        RuleContext {
            rule_id,
            severity,
            sink: &mut self.diagnostics,
            state,
        }
    }

    /// Diagnostics in report order plus the number of suppressed matches
    pub fn finish(self) -> (Vec<Diagnostic>, usize) {
        self.diagnostics.finish()
    }
}

pub struct RuleContext<'c, 'm> {
    rule_id: &'c str,
    severity: DiagnosticSeverity,
    sink: &'c mut DiagnosticSink<'m>,
    state: &'c mut UnitState,
}

impl<'c, 'm> RuleContext<'c, 'm> {
    pub fn rule_id(&self) -> &str {
        self.rule_id
    }

    pub fn model(&self) -> &'m NodeModel {
        self.sink.model()
    }

    pub fn unit_state(&mut self) -> &mut UnitState {
        self.state
    }

    pub fn resolve(&self, position: SourcePosition) -> ResolvedLocation {
        self.model().resolve(position)
    }

    pub fn report(
        &mut self,
        position: SourcePosition,
        template: &str,
        args: &[&dyn fmt::Display],
    ) -> bool {
        self.sink
            .report(position, self.rule_id, self.severity, template, args)
    }

    pub fn report_with_note(
        &mut self,
        position: SourcePosition,
        template: &str,
        args: &[&dyn fmt::Display],
        note_position: SourcePosition,
        note: String,
    ) -> bool {
        self.sink.report_with_note(
            position,
            self.rule_id,
            self.severity,
            template,
            args,
            note_position,
            note,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{CompileOptions, parse};

    fn pos(line: usize) -> SourcePosition {
        SourcePosition { line, column: 1 }
    }

    #[test]
    fn declare_reports_first_collision_and_keeps_recording() {
        let mut state = UnitState::new();
        assert_eq!(state.declare("a", DeclaredKind::Typedef, pos(1)), None);
        assert_eq!(state.declare("b", DeclaredKind::Variable, pos(2)), None);

        let previous = state.declare("a", DeclaredKind::Variable, pos(3)).unwrap();
        assert_eq!(previous.position, pos(1));
        assert_eq!(previous.kind, DeclaredKind::Typedef);

        let previous = state.declare("a", DeclaredKind::Variable, pos(4)).unwrap();
        assert_eq!(previous.position, pos(1));
        assert_eq!(state.declared().len(), 4);
    }

    #[test]
    fn unit_state_is_kept_per_rule() {
        let model = parse("int a;", &CompileOptions::default()).unwrap();
        let mut context = AnalysisContext::new(&model);

        let mut first = context.rule_context("first", DiagnosticSeverity::Error);
        first.unit_state().declare("a", DeclaredKind::Variable, pos(1));

        let mut second = context.rule_context("second", DiagnosticSeverity::Error);
        assert!(second.unit_state().declared().is_empty());
        assert!(second.report(pos(1), "from %0", &[&"second"]));

        let mut first = context.rule_context("first", DiagnosticSeverity::Error);
        assert_eq!(first.unit_state().declared().len(), 1);

        let (diagnostics, _) = context.finish();
        assert_eq!(diagnostics[0].rule_id, "second");
        assert_eq!(diagnostics[0].message, "from second");
    }
}
