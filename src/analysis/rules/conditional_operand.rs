use crate::CheckError;
use crate::analysis::context::RuleContext;
use crate::analysis::pattern::{
    PatternSpec, all_of, any_of, bind, has_condition, has_false_expression, has_type,
    ignoring_implicit, kind, not, refers_to,
};
use crate::analysis::rule::{Rule, TreeMatch, TreeRule};

// Rule to require a bool first operand for `?:` when it names a variable or parameter
pub struct ConditionalOperandRule;

fn variable_reference(ty: PatternSpec) -> PatternSpec {
    all_of(vec![
        kind("DeclRefExpr"),
        refers_to(all_of(vec![
            any_of(vec![kind("VarDecl"), kind("ParmVarDecl")]),
            ty,
        ])),
    ])
}

impl Rule for ConditionalOperandRule {
    fn id(&self) -> &str {
        "misra-cpp-5.0.14"
    }

    fn description(&self) -> &str {
        "The first operand of a conditional-operator shall have type bool"
    }
}

impl TreeRule for ConditionalOperandRule {
    fn pattern(&self) -> PatternSpec {
        bind(
            "conditional",
            all_of(vec![
                kind("ConditionalOperator"),
                has_condition(ignoring_implicit(bind(
                    "condition",
                    variable_reference(not(has_type("boolean"))),
                ))),
                not(has_false_expression(ignoring_implicit(variable_reference(
                    has_type("boolean"),
                )))),
            ]),
        )
    }

    fn on_match(
        &self,
        found: &TreeMatch<'_>,
        ctx: &mut RuleContext<'_, '_>,
    ) -> Result<(), CheckError> {
        let conditional = found.bound_node("conditional")?;
        let condition = found.bound_node("condition")?;
        ctx.report(
            conditional.span.start,
            "first operand '%0' of the conditional operator does not have type bool",
            &[&condition.name().unwrap_or_default()],
        );
        Ok(())
    }
}
