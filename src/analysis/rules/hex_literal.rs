use crate::CheckError;
use crate::analysis::context::RuleContext;
use crate::analysis::pattern::{PatternSpec, all_of, has_spelling_prefix, kind};
use crate::analysis::rule::{Rule, TokenMatch, TokenRule};
use crate::analysis::token_engine::ScanState;

// Rule to flag hexadecimal literals, which spell out a value's bit representation
pub struct HexLiteralRule;

impl Rule for HexLiteralRule {
    fn id(&self) -> &str {
        "misra-cpp-3.9.3"
    }

    fn description(&self) -> &str {
        "The underlying bit representations of floating-point values shall not be used"
    }
}

impl TokenRule for HexLiteralRule {
    fn pattern(&self) -> PatternSpec {
        all_of(vec![
            kind("numeric_constant"),
            has_spelling_prefix(&["0x", "0X"]),
        ])
    }

    fn on_token(
        &self,
        found: &TokenMatch<'_>,
        _state: ScanState,
        ctx: &mut RuleContext<'_, '_>,
    ) -> Result<(), CheckError> {
        let token = found.token();
        ctx.report(
            token.location(),
            "hexadecimal literal '%0' exposes an underlying bit representation",
            &[&token.spelling],
        );
        Ok(())
    }
}
