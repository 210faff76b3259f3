use crate::CheckError;
use crate::analysis::context::RuleContext;
use crate::analysis::pattern::{PatternSpec, any_of, kind};
use crate::analysis::rule::{Rule, TokenMatch, TokenRule};
use crate::analysis::rules::literal;
use crate::analysis::token_engine::ScanState;

// Rule to flag literal suffixes written in lower case (`10l`, `1.0f`)
pub struct LiteralSuffixCaseRule;

impl Rule for LiteralSuffixCaseRule {
    fn id(&self) -> &str {
        "misra-cpp-2.13.4"
    }

    fn description(&self) -> &str {
        "Literal suffixes shall be upper case"
    }
}

impl TokenRule for LiteralSuffixCaseRule {
    fn pattern(&self) -> PatternSpec {
        any_of(vec![kind("numeric_constant"), kind("char_constant")])
    }

    fn on_token(
        &self,
        found: &TokenMatch<'_>,
        _state: ScanState,
        ctx: &mut RuleContext<'_, '_>,
    ) -> Result<(), CheckError> {
        let token = found.token();
        if literal::has_lowercase_suffix(&token.spelling) {
            ctx.report(
                token.location(),
                "literal suffix of '%0' shall be upper case",
                &[&token.spelling],
            );
        }
        Ok(())
    }
}
