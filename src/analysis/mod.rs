pub mod context;
pub mod diagnostic;
pub mod diagnostic_printer;
pub mod external_api;
pub mod pattern;
pub mod rule;
pub mod rule_registry;
pub mod rules;
mod token_engine;
mod tree_engine;

pub use token_engine::ScanState;

use crate::CheckError;
use crate::analysis::context::AnalysisContext;
use crate::analysis::diagnostic::{
    Diagnostic, DiagnosticChannel, DiagnosticSeverity, SharedChannel,
};
use crate::analysis::external_api::AnalyzerConfig;
use crate::analysis::rule_registry::{RegisteredTreeRule, RuleRegistry};
use crate::parser::ast::{NodeModel, ResolvedLocation, SourcePosition};
use crate::parser::{CompileOptions, parse};
use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;

/// One translation unit handed to a batch
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub file_name: String,
    pub source: String,
}

impl SourceUnit {
    pub fn new(file_name: &str, source: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            source: source.to_string(),
        }
    }
}

/// Diagnostics of one unit after sorting and policies
#[derive(Debug, Clone, Default)]
pub struct UnitReport {
    pub diagnostics: Vec<Diagnostic>,
    /// Matches and reports dropped because they were in system headers
    pub suppressed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisSummary {
    pub units: usize,
    pub diagnostics: usize,
    pub errors: usize,
    pub warnings: usize,
    pub suppressed: usize,
}

impl AnalysisSummary {
    pub fn for_unit(report: &UnitReport) -> Self {
        let count = |severity| {
            report
                .diagnostics
                .iter()
                .filter(|d| d.severity == severity)
                .count()
        };
        Self {
            units: 1,
            diagnostics: report.diagnostics.len(),
            errors: count(DiagnosticSeverity::Error),
            warnings: count(DiagnosticSeverity::Warning),
            suppressed: report.suppressed,
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            units: self.units + other.units,
            diagnostics: self.diagnostics + other.diagnostics,
            errors: self.errors + other.errors,
            warnings: self.warnings + other.warnings,
            suppressed: self.suppressed + other.suppressed,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// A rule set plus the configuration it runs under.
///
/// The analyzer itself holds no per-unit state, so one instance can check any number of
/// units, also from several threads at once.
pub struct Analyzer {
    registry: RuleRegistry,
    config: AnalyzerConfig,
    config_rules: Vec<RegisteredTreeRule>,
}

impl Analyzer {
    /// Built-in rules, default configuration
    pub fn new() -> Result<Self, CheckError> {
        Self::with_config(AnalyzerConfig::default())
    }

    pub fn with_config(config: AnalyzerConfig) -> Result<Self, CheckError> {
        Self::with_registry(RuleRegistry::with_builtin_rules()?, config)
    }

    /// Fails when the configuration names unknown rules or carries invalid patterns
    pub fn with_registry(
        registry: RuleRegistry,
        config: AnalyzerConfig,
    ) -> Result<Self, CheckError> {
        let config_rules = config.compile_rules(&registry)?;
        Ok(Self {
            registry,
            config,
            config_rules,
        })
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub(crate) fn config_rules(&self) -> &[RegisteredTreeRule] {
        &self.config_rules
    }

    pub fn compile_options(&self, file_name: &str) -> CompileOptions {
        CompileOptions {
            file_name: file_name.to_string(),
            system_header_dirs: self.config.system_header_dirs.clone(),
        }
    }

    pub fn analyze(&self, model: &NodeModel) -> Result<Vec<Diagnostic>, CheckError> {
        let report = self.run_unit(model, &self.config, &self.config_rules)?;
        Ok(report.diagnostics)
    }

    /// Parses and analyzes; a parse failure is returned as an error
    pub fn analyze_source(
        &self,
        source: &str,
        file_name: &str,
    ) -> Result<Vec<Diagnostic>, CheckError> {
        let model = parse(source, &self.compile_options(file_name))?;
        self.analyze(&model)
    }

    /// Like `analyze_source`, but a unit that does not parse yields a `parse-error`
    /// diagnostic instead of failing
    pub fn analyze_unit(&self, unit: &SourceUnit) -> Result<UnitReport, CheckError> {
        match parse(&unit.source, &self.compile_options(&unit.file_name)) {
            Ok(model) => self.run_unit(&model, &self.config, &self.config_rules),
            Err(err) if err.is_unit_local() => {
                warn!("skipping {}: {err}", unit.file_name);
                Ok(UnitReport {
                    diagnostics: vec![parse_error_diagnostic(&err, &unit.file_name)],
                    suppressed: 0,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Units in order; each unit's diagnostics reach `channel` as one block
    pub fn analyze_batch<C: DiagnosticChannel>(
        &self,
        units: &[SourceUnit],
        channel: &mut C,
    ) -> Result<AnalysisSummary, CheckError> {
        let mut summary = AnalysisSummary::default();
        for unit in units {
            let report = self.analyze_unit(unit)?;
            summary = summary.merge(AnalysisSummary::for_unit(&report));
            channel.emit_unit(report.diagnostics);
        }
        debug!("batch finished: {summary:?}");
        Ok(summary)
    }

    /// Units on the rayon pool, each with its own engine state; a unit's block stays contiguous
    pub fn analyze_batch_parallel<C: DiagnosticChannel + Send>(
        &self,
        units: &[SourceUnit],
        channel: &SharedChannel<C>,
    ) -> Result<AnalysisSummary, CheckError> {
        let summary = units
            .par_iter()
            .map(|unit| {
                let report = self.analyze_unit(unit)?;
                let summary = AnalysisSummary::for_unit(&report);
                channel.emit_unit(report.diagnostics);
                Ok::<_, CheckError>(summary)
            })
            .try_reduce(AnalysisSummary::default, |a, b| Ok(a.merge(b)))?;
        debug!("parallel batch finished: {summary:?}");
        Ok(summary)
    }

    pub(crate) fn run_unit(
        &self,
        model: &NodeModel,
        config: &AnalyzerConfig,
        config_rules: &[RegisteredTreeRule],
    ) -> Result<UnitReport, CheckError> {
        let tree_rules: Vec<_> = self
            .registry
            .tree_rules()
            .iter()
            .chain(config_rules)
            .filter(|r| config.is_enabled(r.rule.id(), r.rule.enabled_by_default()))
            .map(|r| (r, config.severity_for(r.rule.id(), r.rule.severity())))
            .collect();
        let token_rules: Vec<_> = self
            .registry
            .token_rules()
            .iter()
            .filter(|r| config.is_enabled(r.rule.id(), r.rule.enabled_by_default()))
            .map(|r| (r, config.severity_for(r.rule.id(), r.rule.severity())))
            .collect();

        debug!(
            "analyzing {}: {} tree rules, {} token rules",
            model.main_file(),
            tree_rules.len(),
            token_rules.len()
        );

        let mut ctx = AnalysisContext::new(model);
        tree_engine::run(&tree_rules, &mut ctx)?;
        token_engine::run(&token_rules, &mut ctx)?;
        let (mut diagnostics, suppressed) = ctx.finish();

        diagnostics.sort_by_key(|d| d.position);
        config.apply_policies(&mut diagnostics, model.main_file());

        debug!(
            "finished {}: {} diagnostics, {} suppressed",
            model.main_file(),
            diagnostics.len(),
            suppressed
        );
        Ok(UnitReport {
            diagnostics,
            suppressed,
        })
    }
}

fn parse_error_diagnostic(err: &CheckError, file_name: &str) -> Diagnostic {
    let (location, message) = match err {
        CheckError::ParseError {
            file,
            line,
            column,
            message,
        } => (
            ResolvedLocation {
                file: file.clone(),
                line: *line,
                column: *column,
            },
            message.clone(),
        ),
        other => (
            ResolvedLocation {
                file: file_name.to_string(),
                line: 0,
                column: 0,
            },
            other.to_string(),
        ),
    };
    Diagnostic {
        position: SourcePosition {
            line: location.line,
            column: location.column,
        },
        location,
        message,
        severity: DiagnosticSeverity::Error,
        rule_id: "parse-error".to_string(),
        related_info: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::diagnostic::DiagnosticCollector;
    use crate::analysis::rules::declarative::RuleSpec;
    use crate::analysis::context::RuleContext;
    use crate::analysis::pattern::{PatternSpec, all_of, has_operator, kind};
    use crate::analysis::rule::{Rule, TreeMatch, TreeRule};
    use pretty_assertions::assert_eq;

    /// Asks for a capture its pattern never binds
    struct UnboundCaptureRule;

    impl Rule for UnboundCaptureRule {
        fn id(&self) -> &str {
            "unbound-capture"
        }

        fn description(&self) -> &str {
            "reads a capture that does not exist"
        }
    }

    impl TreeRule for UnboundCaptureRule {
        fn pattern(&self) -> PatternSpec {
            kind("BinaryOperator")
        }

        fn on_match(
            &self,
            found: &TreeMatch<'_>,
            _ctx: &mut RuleContext<'_, '_>,
        ) -> Result<(), CheckError> {
            found.bound("missing").map(|_| ())
        }
    }

    fn ids(diagnostics: &[Diagnostic]) -> Vec<(usize, &str)> {
        diagnostics
            .iter()
            .map(|d| (d.location.line, d.rule_id.as_str()))
            .collect()
    }

    #[test]
    fn clean_unit_has_no_diagnostics() {
        let source = "\
unsigned int mask = 15U;
bool ready = false;
int count(int limit)
{
    int total = 0;
    for (int i = 0; i < limit; ++i) {
        if (ready) {
            total += i;
        }
    }
    return total;
}
";
        let analyzer = Analyzer::new().unwrap();
        let diagnostics = analyzer.analyze_source(source, "clean.cpp").unwrap();
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn system_header_code_is_exempt() {
        let source = "\
# 1 \"/usr/include/lib.h\" 1 3
int lib_flags = 010;
bool lib_on = true;
int lib_sum = lib_on + 1;
# 5 \"main.cpp\" 2
int own = 010;
";
        let analyzer = Analyzer::new().unwrap();
        let unit = SourceUnit::new("main.cpp", source);
        let report = analyzer.analyze_unit(&unit).unwrap();
        assert_eq!(ids(&report.diagnostics), vec![(5, "misra-cpp-2.13.2")]);
        assert_eq!(report.diagnostics[0].location.file, "main.cpp");
        assert!(report.suppressed >= 2);
    }

    #[test]
    fn system_header_dirs_from_config() {
        let source = "\
# 1 \"/opt/vendor/api.h\"
int vendor = 010;
# 3 \"main.cpp\"
int own = 1;
";
        let config = AnalyzerConfig {
            system_header_dirs: vec!["/opt/vendor".into()],
            ..AnalyzerConfig::default()
        };
        let analyzer = Analyzer::with_config(config).unwrap();
        assert!(analyzer.analyze_source(source, "main.cpp").unwrap().is_empty());
    }

    #[test]
    fn analysis_is_idempotent() {
        let source = "typedef int t;\nint f(void)\n{\n    int t = 010;\n    return t;\n}\n";
        let analyzer = Analyzer::new().unwrap();
        let model = parse(source, &analyzer.compile_options("unit.cpp")).unwrap();
        let first = analyzer.analyze(&model).unwrap();
        let second = analyzer.analyze(&model).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            ids(&first),
            vec![(4, "misra-cpp-2.10.3"), (4, "misra-cpp-2.13.2")]
        );
    }

    #[test]
    fn diagnostics_are_ordered_by_position() {
        let source = "\
bool flag = false;
int f(int v)
{
    int a = flag + 1;
    int b = 010;
    return a + b + v;
}
";
        let analyzer = Analyzer::new().unwrap();
        let diagnostics = analyzer.analyze_source(source, "unit.cpp").unwrap();
        assert_eq!(
            ids(&diagnostics),
            vec![(4, "misra-cpp-4.5.1"), (5, "misra-cpp-2.13.2")]
        );
    }

    #[test]
    fn batch_continues_after_a_parse_error() {
        let units = vec![
            SourceUnit::new("a.cpp", "int a = 010;\n"),
            SourceUnit::new("broken.cpp", "int = ;\n"),
            SourceUnit::new("c.cpp", "int c = 0x1U;\n"),
        ];
        let analyzer = Analyzer::new().unwrap();
        let mut collector = DiagnosticCollector::new();
        let summary = analyzer.analyze_batch(&units, &mut collector).unwrap();

        assert_eq!(summary.units, 3);
        assert_eq!(summary.errors, 3);
        let rules: Vec<_> = collector
            .diagnostics()
            .iter()
            .map(|d| (d.location.file.as_str(), d.rule_id.as_str()))
            .collect();
        assert_eq!(
            rules,
            vec![
                ("a.cpp", "misra-cpp-2.13.2"),
                ("broken.cpp", "parse-error"),
                ("c.cpp", "misra-cpp-3.9.3"),
            ]
        );
    }

    #[test]
    fn missing_capture_aborts_the_unit() {
        let mut registry = RuleRegistry::new();
        registry.register_tree_rule(UnboundCaptureRule).unwrap();
        let analyzer = Analyzer::with_registry(registry, AnalyzerConfig::default()).unwrap();

        let unit = SourceUnit::new("unit.cpp", "int a = 1;\nint b = a + 1;\n");
        match analyzer.analyze_unit(&unit) {
            Err(CheckError::InvariantViolation { rule, capture }) => {
                assert_eq!(rule, "unbound-capture");
                assert_eq!(capture, "missing");
            }
            other => panic!("Expected InvariantViolation, got {other:?}"),
        }

        let mut collector = DiagnosticCollector::new();
        let result = analyzer.analyze_batch(std::slice::from_ref(&unit), &mut collector);
        assert!(matches!(result, Err(CheckError::InvariantViolation { .. })));
        assert!(collector.diagnostics().is_empty());
    }

    #[test]
    fn overly_deep_nesting_is_a_parse_error() {
        let depth = 4 * crate::parser::MAX_NESTING_DEPTH;
        let source = format!("int a = {}1{};\n", "(".repeat(depth), ")".repeat(depth));
        let analyzer = Analyzer::new().unwrap();
        let report = analyzer.analyze_unit(&SourceUnit::new("deep.cpp", &source)).unwrap();
        assert_eq!(ids(&report.diagnostics), vec![(1, "parse-error")]);
        assert!(report.diagnostics[0].message.contains("maximum depth"));
    }

    #[test]
    fn parallel_batch_matches_sequential() {
        let units: Vec<_> = (0..8)
            .map(|i| {
                SourceUnit::new(
                    &format!("unit{i}.cpp"),
                    "int x = 010;\nbool b = false;\nint y = b + 2;\n",
                )
            })
            .collect();
        let analyzer = Analyzer::new().unwrap();

        let mut sequential = DiagnosticCollector::new();
        let expected = analyzer.analyze_batch(&units, &mut sequential).unwrap();

        let shared = SharedChannel::new(DiagnosticCollector::new());
        let summary = analyzer.analyze_batch_parallel(&units, &shared).unwrap();
        let parallel = shared.into_inner();

        assert_eq!(summary, expected);
        assert_eq!(parallel.len(), sequential.len());
        // every unit's block stays contiguous and ordered
        for block in parallel.diagnostics().chunks(2) {
            assert_eq!(block[0].location.file, block[1].location.file);
            assert_eq!(block[0].rule_id, "misra-cpp-2.13.2");
            assert_eq!(block[1].rule_id, "misra-cpp-4.5.1");
        }
    }

    #[test]
    fn config_disables_and_overrides() {
        let source = "unsigned int m = 0x10U;\nint o = 010;\n";
        let config = AnalyzerConfig::from_json_str(
            r#"{"disabled_rules": ["misra-cpp-2.13.2"],
                "severity_overrides": {"misra-cpp-3.9.3": "warning"},
                "enabled_rules": ["misra-c-7.1"]}"#,
        )
        .unwrap();
        let analyzer = Analyzer::with_config(config).unwrap();
        let diagnostics = analyzer.analyze_source(source, "unit.cpp").unwrap();
        assert_eq!(
            ids(&diagnostics),
            vec![(1, "misra-cpp-3.9.3"), (2, "misra-c-7.1")]
        );
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Warning);
        assert_eq!(diagnostics[1].severity, DiagnosticSeverity::Error);

        let strict = AnalyzerConfig {
            warning_as_error: true,
            ..analyzer.config().clone()
        };
        let model = parse(source, &analyzer.compile_options("unit.cpp")).unwrap();
        let diagnostics = analyzer.analyze_with_config(&model, &strict).unwrap();
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Error);
    }

    #[test]
    fn error_limit_truncates_and_reports() {
        let source = "int a = 01;\nint b = 02;\nint c = 03;\n";
        let config = AnalyzerConfig {
            error_limit: Some(2),
            ..AnalyzerConfig::default()
        };
        let analyzer = Analyzer::with_config(config).unwrap();
        let diagnostics = analyzer.analyze_source(source, "unit.cpp").unwrap();
        assert_eq!(
            ids(&diagnostics),
            vec![
                (1, "misra-cpp-2.13.2"),
                (2, "misra-cpp-2.13.2"),
                (0, "error-limit"),
            ]
        );
        assert_eq!(diagnostics[2].message, "Too many errors (3), stopping analysis");
        assert_eq!(diagnostics[2].severity, DiagnosticSeverity::Info);
    }

    #[test]
    fn declarative_rules_run_with_builtins() {
        let config = AnalyzerConfig {
            rules: vec![RuleSpec {
                id: "no-shift".into(),
                message: "shift operator '%0' used".into(),
                severity: DiagnosticSeverity::Warning,
                pattern: all_of(vec![kind("BinaryOperator"), has_operator(&["<<"])]),
                description: None,
            }],
            ..AnalyzerConfig::default()
        };
        let analyzer = Analyzer::with_config(config).unwrap();
        let source = "unsigned int f(unsigned int v)\n{\n    return v << 2U;\n}\n";
        let diagnostics = analyzer.analyze_source(source, "unit.cpp").unwrap();
        assert_eq!(ids(&diagnostics), vec![(3, "no-shift")]);
        assert_eq!(diagnostics[0].message, "shift operator '<<' used");
        assert_eq!(diagnostics[0].location.column, 14);
        assert!(analyzer.list_rules().iter().any(|info| info.id == "no-shift"));
    }
}
