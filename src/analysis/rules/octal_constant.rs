use crate::CheckError;
use crate::analysis::context::RuleContext;
use crate::analysis::pattern::{PatternSpec, all_of, has_spelling_prefix, kind};
use crate::analysis::rule::{Rule, TokenMatch, TokenRule};
use crate::analysis::rules::literal;
use crate::analysis::token_engine::ScanState;

// Rule to flag octal constants; the same check exists in MISRA C++ and MISRA C
pub struct OctalConstantRule {
    id: &'static str,
    description: &'static str,
    enabled_by_default: bool,
}

impl OctalConstantRule {
    pub fn cpp() -> Self {
        Self {
            id: "misra-cpp-2.13.2",
            description: "Octal constants (other than zero) shall not be used",
            enabled_by_default: true,
        }
    }

    /// Off unless enabled, it duplicates the C++ rule for C sources
    pub fn c() -> Self {
        Self {
            id: "misra-c-7.1",
            description: "Octal constants shall not be used",
            enabled_by_default: false,
        }
    }
}

impl Rule for OctalConstantRule {
    fn id(&self) -> &str {
        self.id
    }

    fn description(&self) -> &str {
        self.description
    }

    fn enabled_by_default(&self) -> bool {
        self.enabled_by_default
    }
}

impl TokenRule for OctalConstantRule {
    fn pattern(&self) -> PatternSpec {
        all_of(vec![kind("numeric_constant"), has_spelling_prefix(&["0"])])
    }

    fn on_token(
        &self,
        found: &TokenMatch<'_>,
        _state: ScanState,
        ctx: &mut RuleContext<'_, '_>,
    ) -> Result<(), CheckError> {
        let token = found.token();
        if literal::is_octal(&token.spelling) {
            ctx.report(
                token.location(),
                "octal constant '%0' shall not be used",
                &[&token.spelling],
            );
        }
        Ok(())
    }
}
