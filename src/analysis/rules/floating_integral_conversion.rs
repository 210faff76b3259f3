use crate::CheckError;
use crate::analysis::context::RuleContext;
use crate::analysis::pattern::{
    PatternSpec, all_of, any_of, bind, has_cast_kind, has_parent, kind, not,
};
use crate::analysis::rule::{Rule, TreeMatch, TreeRule};
use crate::parser::ast::Role;
use crate::parser::types::CastKind;

// Rule to flag conversions between floating and integral types the compiler inserts
pub struct FloatingIntegralConversionRule;

impl Rule for FloatingIntegralConversionRule {
    fn id(&self) -> &str {
        "misra-cpp-5.0.5"
    }

    fn description(&self) -> &str {
        "There shall be no implicit floating-integral conversions"
    }
}

impl TreeRule for FloatingIntegralConversionRule {
    fn pattern(&self) -> PatternSpec {
        bind(
            "cast",
            all_of(vec![
                kind("ImplicitCastExpr"),
                any_of(vec![
                    has_cast_kind(&["FloatingToIntegral"]),
                    all_of(vec![
                        has_cast_kind(&["IntegralToFloating"]),
                        not(has_parent(kind("ExplicitCastExpr"))),
                    ]),
                ]),
            ]),
        )
    }

    fn on_match(
        &self,
        found: &TreeMatch<'_>,
        ctx: &mut RuleContext<'_, '_>,
    ) -> Result<(), CheckError> {
        let model = found.model();
        let cast_id = found.bound("cast")?;
        let cast = model.node(cast_id);

        let direction = match cast.cast_kind() {
            Some(CastKind::FloatingToIntegral) => "floating to integral",
            _ => "integral to floating",
        };
        let from = model
            .child(cast_id, Role::SubExpr)
            .and_then(|inner| model.node(inner).ty.as_ref())
            .map(|ty| ty.to_string())
            .unwrap_or_default();
        let to = cast.ty.as_ref().map(|ty| ty.to_string()).unwrap_or_default();

        ctx.report(
            cast.span.start,
            "implicit %0 conversion from '%1' to '%2'",
            &[&direction, &from, &to],
        );
        Ok(())
    }
}
