use crate::CheckError;
use crate::analysis::context::{DeclaredKind, RuleContext};
use crate::analysis::pattern::{PatternSpec, any_of, bind, kind};
use crate::analysis::rule::{Rule, TreeMatch, TreeRule};
use crate::parser::ast::NodeKind;

// Rule to keep typedef names unique: typedefs and variables share one namespace for the
// whole translation unit, whatever their scope
pub struct UniqueIdentifierRule;

impl Rule for UniqueIdentifierRule {
    fn id(&self) -> &str {
        "misra-cpp-2.10.3"
    }

    fn description(&self) -> &str {
        "A typedef name shall be a unique identifier"
    }
}

impl TreeRule for UniqueIdentifierRule {
    fn pattern(&self) -> PatternSpec {
        bind("decl", any_of(vec![kind("TypedefDecl"), kind("VarDecl")]))
    }

    fn on_match(
        &self,
        found: &TreeMatch<'_>,
        ctx: &mut RuleContext<'_, '_>,
    ) -> Result<(), CheckError> {
        let decl = found.bound_node("decl")?;
        let Some(name) = decl.name() else {
            return Ok(());
        };
        let kind = match decl.kind {
            NodeKind::TypedefDecl { .. } => DeclaredKind::Typedef,
            _ => DeclaredKind::Variable,
        };

        if let Some(previous) = ctx.unit_state().declare(name, kind, decl.loc) {
            ctx.report_with_note(
                decl.loc,
                "%0 '%1' reuses a name already declared in this unit; a typedef name shall be a unique identifier",
                &[&kind, &name],
                previous.position,
                format!("previous declaration of '{}' as a {}", name, previous.kind),
            );
        }
        Ok(())
    }
}
