use crate::CheckError;
use crate::analysis::context::AnalysisContext;
use crate::analysis::diagnostic::DiagnosticSeverity;
use crate::analysis::pattern::Target;
use crate::analysis::rule::TreeMatch;
use crate::analysis::rule_registry::RegisteredTreeRule;
use log::{debug, trace};

/// One pre-order pass over the tree; at each node the rules run in the given order.
///
/// Matches whose primary location is in a system header never reach the rule.
pub(crate) fn run(
    rules: &[(&RegisteredTreeRule, DiagnosticSeverity)],
    ctx: &mut AnalysisContext<'_>,
) -> Result<(), CheckError> {
    let model = ctx.model();
    let mut match_counts = vec![0usize; rules.len()];

    for id in model.preorder() {
        for (slot, (registered, severity)) in rules.iter().enumerate() {
            let Some(captures) = registered.pattern.matches(model, Target::Node(id)) else {
                continue;
            };

            let rule_id = registered.rule.id();
            let loc = model.node(id).loc;
            if model.is_system_location(loc) {
                trace!("[{rule_id}] match in system header at {loc:?} suppressed");
                ctx.diagnostics.note_suppressed();
                continue;
            }

            match_counts[slot] += 1;
            let found = TreeMatch::new(model, id, &captures, rule_id);
            let mut rule_ctx = ctx.rule_context(rule_id, *severity);
            registered.rule.on_match(&found, &mut rule_ctx)?;
        }
    }

    for ((registered, _), count) in rules.iter().zip(match_counts) {
        debug!("[{}] {} tree matches", registered.rule.id(), count);
    }
    Ok(())
}
