use crate::CheckError;
use crate::analysis::context::RuleContext;
use crate::analysis::pattern::{
    PatternSpec, all_of, attr, has_spelling_prefix, is_keyword, kind, not,
};
use crate::analysis::rule::{Rule, TokenMatch, TokenRule};
use crate::analysis::rules::literal;
use crate::analysis::token_engine::ScanState;
use crate::parser::types::is_floating_literal;

// Rule to require a `U` suffix on octal/hex literals that follow an `unsigned` keyword
pub struct UnsignedLiteralSuffixRule;

impl Rule for UnsignedLiteralSuffixRule {
    fn id(&self) -> &str {
        "misra-cpp-2.13.3"
    }

    fn description(&self) -> &str {
        "A U suffix shall be applied to all octal or hexadecimal integer literals of unsigned type"
    }
}

impl TokenRule for UnsignedLiteralSuffixRule {
    /// Any constant of two or more characters starting with `0`; a lone `0` is decimal
    fn pattern(&self) -> PatternSpec {
        all_of(vec![
            kind("numeric_constant"),
            has_spelling_prefix(&["0"]),
            not(attr("spelling", &["0"])),
        ])
    }

    fn arming_pattern(&self) -> Option<PatternSpec> {
        Some(is_keyword("unsigned"))
    }

    fn on_token(
        &self,
        found: &TokenMatch<'_>,
        state: ScanState,
        ctx: &mut RuleContext<'_, '_>,
    ) -> Result<(), CheckError> {
        let token = found.token();
        let spelling = token.spelling.as_str();
        if !state.is_armed() || is_floating_literal(spelling) {
            return Ok(());
        }

        if !literal::has_unsigned_suffix(spelling) {
            ctx.report(
                token.location(),
                "A U suffix shall be applied to all octal or hexadecimal integer literals of unsigned type",
                &[],
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::rules::test_support::{check, lines};
    use pretty_assertions::assert_eq;

    const RULE: &str = "misra-cpp-2.13.3";

    #[test]
    fn unsigned_then_octal_without_suffix() {
        assert_eq!(lines(&check(RULE, "unsigned int x = 010;")), vec![1]);
        assert!(check(RULE, "unsigned int x = 010U;").is_empty());
        assert!(check(RULE, "unsigned int x = 010UL;").is_empty());
    }

    #[test]
    fn hex_literals_qualify_too() {
        assert_eq!(lines(&check(RULE, "unsigned int x = 0x10u;")), vec![1]);
        assert!(check(RULE, "unsigned int x = 0x10U;").is_empty());
    }

    #[test]
    fn literal_without_keyword_is_ignored() {
        assert!(check(RULE, "int x = 010;").is_empty());
    }

    #[test]
    fn first_qualifying_literal_consumes_the_keyword() {
        let source = "unsigned int x = 010U;\nint y = 020;\n";
        assert!(check(RULE, source).is_empty());

        // decimal literals do not qualify and leave the keyword pending
        let source = "unsigned int a[2] = { 1, 020 };\n";
        assert_eq!(lines(&check(RULE, source)), vec![1]);
    }

    #[test]
    fn suffixed_zero_consumes_the_keyword() {
        let source = "unsigned int a = 0U;\nint b = 010;\n";
        assert!(check(RULE, source).is_empty());

        assert_eq!(lines(&check(RULE, "unsigned int a = 0u;")), vec![1]);
        let source = "unsigned long a = 0L;\nint b = 010;\n";
        assert_eq!(lines(&check(RULE, source)), vec![1]);
    }

    #[test]
    fn plain_zero_leaves_the_keyword_pending() {
        let source = "unsigned int a = 0;\nint b = 010;\n";
        assert_eq!(lines(&check(RULE, source)), vec![2]);
    }

    #[test]
    fn pending_keyword_at_end_of_input_is_dropped() {
        assert!(check(RULE, "int f(unsigned int v);").is_empty());
    }
}
