use crate::CheckError;
use crate::analysis::context::RuleContext;
use crate::analysis::pattern::{
    PatternSpec, all_of, any_of, bind, has_either_operand, has_operand, has_operator, has_type,
    ignoring_implicit, kind, not,
};
use crate::analysis::rule::{Rule, TreeMatch, TreeRule};

// Rule to restrict bool operands to the operators that make sense for truth values
pub struct BoolOperandsRule;

impl Rule for BoolOperandsRule {
    fn id(&self) -> &str {
        "misra-cpp-4.5.1"
    }

    fn description(&self) -> &str {
        "Expressions with type bool shall not be used as operands to built-in operators other than =, &&, ||, !, ==, != and the unary & operator"
    }
}

impl TreeRule for BoolOperandsRule {
    fn pattern(&self) -> PatternSpec {
        let is_bool = || ignoring_implicit(has_type("boolean"));
        any_of(vec![
            bind(
                "operator",
                all_of(vec![
                    kind("BinaryOperator"),
                    not(has_operator(&["||", "&&", "==", "!=", "="])),
                    has_either_operand(is_bool()),
                ]),
            ),
            bind(
                "operator",
                all_of(vec![
                    kind("UnaryOperator"),
                    not(has_operator(&["&", "!"])),
                    has_operand(is_bool()),
                ]),
            ),
        ])
    }

    fn on_match(
        &self,
        found: &TreeMatch<'_>,
        ctx: &mut RuleContext<'_, '_>,
    ) -> Result<(), CheckError> {
        let operator = found.bound_node("operator")?;
        let spelling = operator.operator_name().unwrap_or_default();
        ctx.report(
            operator.loc,
            "bool operand used with operator '%0'; only =, &&, ||, !, ==, != and unary & accept bool operands",
            &[&spelling],
        );
        Ok(())
    }
}
