pub mod bitwise_operands;
pub mod bool_operands;
pub mod condition_type;
pub mod conditional_operand;
pub mod declarative;
pub mod enum_operands;
pub mod floating_integral_conversion;
pub mod hex_literal;
pub mod literal;
pub mod literal_suffix_case;
pub mod logical_operands;
pub mod octal_constant;
pub mod unique_identifier;
pub mod unsigned_literal_suffix;
pub mod unsigned_negation;

use crate::ConfigurationError;
use crate::analysis::rule_registry::RuleRegistry;

/// Registers every built-in rule; tree rules run in this order at each node, token rules
/// in this order at each token
pub fn register_builtin_rules(registry: &mut RuleRegistry) -> Result<(), ConfigurationError> {
    registry.register_tree_rule(unique_identifier::UniqueIdentifierRule)?;
    registry.register_tree_rule(bool_operands::BoolOperandsRule)?;
    registry.register_tree_rule(enum_operands::EnumOperandsRule)?;
    registry.register_tree_rule(floating_integral_conversion::FloatingIntegralConversionRule)?;
    registry.register_tree_rule(condition_type::ConditionTypeRule)?;
    registry.register_tree_rule(conditional_operand::ConditionalOperandRule)?;
    registry.register_tree_rule(bitwise_operands::BitwiseOperandsRule)?;
    registry.register_tree_rule(logical_operands::LogicalOperandsRule)?;
    registry.register_tree_rule(unsigned_negation::UnsignedNegationRule)?;

    registry.register_token_rule(octal_constant::OctalConstantRule::cpp())?;
    registry.register_token_rule(unsigned_literal_suffix::UnsignedLiteralSuffixRule)?;
    registry.register_token_rule(literal_suffix_case::LiteralSuffixCaseRule)?;
    registry.register_token_rule(hex_literal::HexLiteralRule)?;
    registry.register_token_rule(octal_constant::OctalConstantRule::c())?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::analysis::diagnostic::Diagnostic;
    use crate::analysis::external_api::AnalyzerConfig;
    use crate::analysis::Analyzer;

    /// Runs a single rule over `source` and keeps only its diagnostics
    pub(crate) fn check(rule_id: &str, source: &str) -> Vec<Diagnostic> {
        let config = AnalyzerConfig {
            enabled_rules: vec![rule_id.to_string()],
            ..AnalyzerConfig::default()
        };
        let analyzer = Analyzer::with_config(config).unwrap();
        analyzer
            .analyze_source(source, "test.cpp")
            .unwrap()
            .into_iter()
            .filter(|d| d.rule_id == rule_id)
            .collect()
    }

    pub(crate) fn lines(diagnostics: &[Diagnostic]) -> Vec<usize> {
        diagnostics.iter().map(|d| d.location.line).collect()
    }
}
