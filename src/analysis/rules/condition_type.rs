use crate::CheckError;
use crate::analysis::context::RuleContext;
use crate::analysis::pattern::{
    PatternSpec, all_of, any_of, bind, has_cast_kind, has_either_operand, has_operand,
    has_operator, has_parent, has_role, has_type, ignoring_implicit, kind, not,
};
use crate::analysis::rule::{Rule, TreeMatch, TreeRule};

// Rule to require bool conditions in selection and iteration statements, and bool operands
// for the logical operators
pub struct ConditionTypeRule;

impl Rule for ConditionTypeRule {
    fn id(&self) -> &str {
        "misra-cpp-5.0.13"
    }

    fn description(&self) -> &str {
        "The condition of an if-statement and the condition of an iteration-statement shall have type bool"
    }
}

impl TreeRule for ConditionTypeRule {
    fn pattern(&self) -> PatternSpec {
        let not_bool = || ignoring_implicit(not(has_type("boolean")));
        any_of(vec![
            bind(
                "condition",
                all_of(vec![
                    kind("ImplicitCastExpr"),
                    has_cast_kind(&["IntegralToBoolean"]),
                    has_role("condition"),
                    has_parent(any_of(vec![
                        kind("IfStmt"),
                        kind("WhileStmt"),
                        kind("DoStmt"),
                        kind("ForStmt"),
                    ])),
                ]),
            ),
            bind(
                "operator",
                all_of(vec![
                    kind("BinaryOperator"),
                    has_operator(&["||", "&&"]),
                    has_either_operand(not_bool()),
                ]),
            ),
            bind(
                "operator",
                all_of(vec![
                    kind("UnaryOperator"),
                    has_operator(&["!"]),
                    has_operand(not_bool()),
                ]),
            ),
        ])
    }

    fn on_match(
        &self,
        found: &TreeMatch<'_>,
        ctx: &mut RuleContext<'_, '_>,
    ) -> Result<(), CheckError> {
        if let Some(condition) = found.optional("condition") {
            let cast = found.model().node(condition);
            ctx.report(
                cast.span.start,
                "condition has integral type instead of bool",
                &[],
            );
            return Ok(());
        }

        let operator = found.bound_node("operator")?;
        let spelling = operator.operator_name().unwrap_or_default();
        ctx.report(
            operator.loc,
            "operand of '%0' does not have type bool",
            &[&spelling],
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::rules::test_support::{check, lines};
    use pretty_assertions::assert_eq;

    #[test]
    fn conditions_and_logical_operands() {
        let source = "\
int n = 3;
bool ok = true;
void f(void)
{
    if (n) { }
    while (ok) { }
    for (; n; ) { }
    do { } while (n);
    if (n > 0) { }
    bool x = n && ok;
    bool y = !n;
    bool z = ok || !ok;
}
";
        let found = check("misra-cpp-5.0.13", source);
        assert_eq!(lines(&found), vec![5, 7, 8, 10, 11]);
        assert_eq!(found[0].location.column, 9);
        assert_eq!(found[0].message, "condition has integral type instead of bool");
        assert_eq!(found[3].message, "operand of '&&' does not have type bool");
    }
}
