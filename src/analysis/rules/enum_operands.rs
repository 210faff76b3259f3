use crate::CheckError;
use crate::analysis::context::RuleContext;
use crate::analysis::pattern::{
    PatternSpec, all_of, any_of, bind, has_either_operand, has_operand, has_operator, has_type,
    ignoring_implicit, kind, not,
};
use crate::analysis::rule::{Rule, TreeMatch, TreeRule};

// Rule to restrict enum operands to subscripts, assignment, comparisons and unary &
pub struct EnumOperandsRule;

impl Rule for EnumOperandsRule {
    fn id(&self) -> &str {
        "misra-cpp-4.5.2"
    }

    fn description(&self) -> &str {
        "Expressions with type enum shall not be used as operands to built-in operators other than [], =, ==, !=, <, <=, >, >= and the unary & operator"
    }
}

impl TreeRule for EnumOperandsRule {
    fn pattern(&self) -> PatternSpec {
        let is_enum = || ignoring_implicit(has_type("enumeral"));
        any_of(vec![
            bind(
                "operator",
                all_of(vec![
                    kind("BinaryOperator"),
                    not(has_operator(&["<", "<=", ">", ">=", "==", "!=", "="])),
                    has_either_operand(is_enum()),
                ]),
            ),
            bind(
                "operator",
                all_of(vec![
                    kind("UnaryOperator"),
                    not(has_operator(&["&"])),
                    has_operand(is_enum()),
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
            "enum operand used with operator '%0'; only [], =, ==, !=, <, <=, >, >= and unary & accept enum operands",
            &[&spelling],
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::rules::test_support::{check, lines};
    use pretty_assertions::assert_eq;

    const RULE: &str = "misra-cpp-4.5.2";

    #[test]
    fn only_real_enum_operands_are_flagged() {
        let source = "\
enum Color { RED, GREEN };
enum Color c = RED;
int n = 1;
int table[2];
int f(void)
{
    int a = c + 1;
    bool b = c == GREEN;
    bool d = c < GREEN;
    int e = n + 1;
    int g = n * n;
    int h = 2 - c;
    bool z = !c;
    int t = table[c];
    c = GREEN;
    return a + e + g + h + t;
}
";
        let found = check(RULE, source);
        assert_eq!(lines(&found), vec![7, 12, 13]);
        assert_eq!(found[0].location.column, 15);
        assert!(found[1].message.contains("operator '-'"));
    }

    #[test]
    fn plain_integer_arithmetic_is_never_flagged() {
        assert!(check(RULE, "int f(int a, int b) { return (a + b) * (a - b); }").is_empty());
    }
}
