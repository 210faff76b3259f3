use crate::CheckError;
use crate::analysis::context::RuleContext;
use crate::analysis::pattern::{
    PatternSpec, all_of, bind, has_initializer, has_operator, has_type, ignoring_implicit, kind,
};
use crate::analysis::rule::{Rule, TreeMatch, TreeRule};

// Rule to flag unsigned variables initialized from a negation
pub struct UnsignedNegationRule;

impl Rule for UnsignedNegationRule {
    fn id(&self) -> &str {
        "misra-cpp-5.3.2"
    }

    fn description(&self) -> &str {
        "The unary minus operator shall not be applied to an expression whose underlying type is unsigned"
    }
}

impl TreeRule for UnsignedNegationRule {
    fn pattern(&self) -> PatternSpec {
        bind(
            "variable",
            all_of(vec![
                kind("VarDecl"),
                has_type("unsigned_integer"),
                has_initializer(ignoring_implicit(all_of(vec![
                    kind("UnaryOperator"),
                    has_operator(&["-"]),
                ]))),
            ]),
        )
    }

    fn on_match(
        &self,
        found: &TreeMatch<'_>,
        ctx: &mut RuleContext<'_, '_>,
    ) -> Result<(), CheckError> {
        let variable = found.bound_node("variable")?;
        ctx.report(
            variable.loc,
            "unsigned variable '%0' is initialized with a unary minus expression",
            &[&variable.name().unwrap_or_default()],
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::rules::test_support::{check, lines};
    use pretty_assertions::assert_eq;

    #[test]
    fn negated_initializers_of_unsigned_variables() {
        let source = "\
void f(int v)
{
    unsigned int a = -1;
    unsigned int b = -v;
    int c = -1;
    unsigned int d = 1U;
    unsigned int e = 0U - 1U;
}
";
        let found = check("misra-cpp-5.3.2", source);
        assert_eq!(lines(&found), vec![3, 4]);
        assert_eq!(found[0].location.column, 18);
    }
}
