use crate::CheckError;
use crate::analysis::context::AnalysisContext;
use crate::analysis::diagnostic::DiagnosticSeverity;
use crate::analysis::pattern::Target;
use crate::analysis::rule::TokenMatch;
use crate::analysis::rule_registry::RegisteredTokenRule;
use crate::lexer::TokenKind;
use log::debug;

/// Two-state automaton a token rule carries through one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanState {
    #[default]
    Idle,
    /// An arming token was seen and no qualifying token has consumed it yet
    Armed,
}

impl ScanState {
    pub fn is_armed(self) -> bool {
        self == ScanState::Armed
    }
}

/// One left-to-right pass over the tokens, each token offered to every rule in order.
///
/// A rule's state starts idle, becomes armed on an arming match, and returns to idle after
/// every token its pattern matches. Whatever is still armed at end of input is dropped.
pub(crate) fn run(
    rules: &[(&RegisteredTokenRule, DiagnosticSeverity)],
    ctx: &mut AnalysisContext<'_>,
) -> Result<(), CheckError> {
    let model = ctx.model();
    let mut states = vec![ScanState::default(); rules.len()];
    let mut match_counts = vec![0usize; rules.len()];

    for (index, token) in model.tokens().iter().enumerate() {
        if token.kind == TokenKind::Eof {
            break;
        }
        let target = Target::Token(index);

        for (slot, (registered, severity)) in rules.iter().enumerate() {
            if let Some(captures) = registered.pattern.matches(model, target) {
                match_counts[slot] += 1;
                let rule_id = registered.rule.id();
                let found = TokenMatch::new(model, index, &captures, rule_id);
                let mut rule_ctx = ctx.rule_context(rule_id, *severity);
                registered.rule.on_token(&found, states[slot], &mut rule_ctx)?;
                states[slot] = ScanState::Idle;
            } else if registered
                .arming
                .as_ref()
                .is_some_and(|arming| arming.matches(model, target).is_some())
            {
                states[slot] = ScanState::Armed;
            }
        }
    }

    for ((registered, _), count) in rules.iter().zip(match_counts) {
        debug!("[{}] {} token matches", registered.rule.id(), count);
    }
    Ok(())
}
