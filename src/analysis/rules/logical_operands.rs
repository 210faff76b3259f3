use crate::CheckError;
use crate::analysis::context::RuleContext;
use crate::analysis::pattern::{
    PatternSpec, all_of, any_of, bind, has_cast_kind, has_operator, has_parent, kind,
};
use crate::analysis::rule::{Rule, TreeMatch, TreeRule};

// Rule to flag integral operands converted to bool by `!`, `&&`, `||` or a comparison
pub struct LogicalOperandsRule;

impl Rule for LogicalOperandsRule {
    fn id(&self) -> &str {
        "misra-cpp-5.3.1"
    }

    fn description(&self) -> &str {
        "Each operand of the ! operator, the logical && or the logical || operators shall have type bool"
    }
}

impl TreeRule for LogicalOperandsRule {
    fn pattern(&self) -> PatternSpec {
        bind(
            "cast",
            all_of(vec![
                kind("ImplicitCastExpr"),
                has_cast_kind(&["IntegralToBoolean"]),
                has_parent(any_of(vec![
                    all_of(vec![
                        kind("BinaryOperator"),
                        has_operator(&["||", "&&", "<", "<=", ">", ">=", "==", "!="]),
                    ]),
                    all_of(vec![kind("UnaryOperator"), has_operator(&["!"])]),
                ])),
            ]),
        )
    }

    fn on_match(
        &self,
        found: &TreeMatch<'_>,
        ctx: &mut RuleContext<'_, '_>,
    ) -> Result<(), CheckError> {
        let cast = found.bound_node("cast")?;
        let model = found.model();
        let operator = cast
            .parent
            .and_then(|parent| model.node(parent).operator_name())
            .unwrap_or_default();
        ctx.report(
            cast.span.start,
            "operand of '%0' is converted from an integral type to bool",
            &[&operator],
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::rules::test_support::{check, lines};
    use pretty_assertions::assert_eq;

    #[test]
    fn integral_operands_of_logical_operators() {
        let source = "\
int n = 1;
bool ok = true;
void f(void)
{
    bool a = n && ok;
    bool b = ok || n;
    bool c = !n;
    bool d = ok && !ok;
    bool e = (n > 0) && ok;
}
";
        let found = check("misra-cpp-5.3.1", source);
        assert_eq!(lines(&found), vec![5, 6, 7]);
        assert_eq!(found[0].location.column, 14);
        assert_eq!(
            found[2].message,
            "operand of '!' is converted from an integral type to bool"
        );
    }
}
