use crate::CheckError;
use crate::analysis::context::RuleContext;
use crate::analysis::pattern::{
    PatternSpec, all_of, any_of, bind, has_either_operand, has_operand, has_operator, has_type,
    kind, not,
};
use crate::analysis::rule::{Rule, TreeMatch, TreeRule};

// Rule to keep bitwise operators on unsigned operands; operand types are taken after the
// usual arithmetic conversions
pub struct BitwiseOperandsRule;

impl Rule for BitwiseOperandsRule {
    fn id(&self) -> &str {
        "misra-cpp-5.0.21"
    }

    fn description(&self) -> &str {
        "Bitwise operators shall only be applied to operands of unsigned underlying type"
    }
}

impl TreeRule for BitwiseOperandsRule {
    fn pattern(&self) -> PatternSpec {
        let unsigned = || has_type("unsigned_integer");
        any_of(vec![
            bind(
                "operator",
                all_of(vec![
                    kind("BinaryOperator"),
                    has_operator(&["|", "&", "^", "<<", ">>", "|=", "&=", "^=", "<<=", ">>="]),
                    has_either_operand(has_type("signed_integer")),
                    has_either_operand(not(unsigned())),
                    not(unsigned()),
                ]),
            ),
            bind(
                "operator",
                all_of(vec![
                    kind("UnaryOperator"),
                    has_operator(&["~"]),
                    has_operand(has_type("signed_integer")),
                    not(unsigned()),
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
            operator.span.start,
            "bitwise operator '%0' applied to operands of non-unsigned underlying type",
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
    fn signed_operands_are_flagged() {
        let source = "\
int s = 1;
unsigned int u = 2U;
void f(void)
{
    int a = s & 1;
    unsigned int b = u & 1U;
    unsigned int c = u | s;
    int d = ~s;
    unsigned int e = ~u;
    int g = s << 2;
    s <<= 1;
}
";
        let found = check("misra-cpp-5.0.21", source);
        assert_eq!(lines(&found), vec![5, 8, 10, 11]);
        assert_eq!(found[0].location.column, 13);
        assert_eq!(
            found[3].message,
            "bitwise operator '<<=' applied to operands of non-unsigned underlying type"
        );
    }
}
