use crate::analysis::context::RuleContext;
use crate::analysis::diagnostic::{DiagnosticSeverity, placeholders};
use crate::analysis::pattern::PatternSpec;
use crate::analysis::rule::{Rule, TreeMatch, TreeRule};
use crate::{CheckError, ConfigurationError};
use serde::{Deserialize, Serialize};

/// A tree rule defined entirely by configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    /// Reported at every match; `%0` is the matched node's name, operator or literal
    pub message: String,
    #[serde(default)]
    pub severity: DiagnosticSeverity,
    pub pattern: PatternSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RuleSpec {
    /// The message may only refer to `%0`, the one argument a match supplies
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match placeholders(&self.message).into_iter().find(|p| p != "0") {
            Some(placeholder) => Err(ConfigurationError::UnboundPlaceholder {
                rule: self.id.clone(),
                placeholder,
            }),
            None => Ok(()),
        }
    }
}

pub struct DeclarativeRule {
    spec: RuleSpec,
}

impl DeclarativeRule {
    pub fn new(spec: RuleSpec) -> Self {
        Self { spec }
    }
}

impl Rule for DeclarativeRule {
    fn id(&self) -> &str {
        &self.spec.id
    }

    fn description(&self) -> &str {
        self.spec.description.as_deref().unwrap_or(&self.spec.message)
    }

    fn severity(&self) -> DiagnosticSeverity {
        self.spec.severity
    }
}

impl TreeRule for DeclarativeRule {
    fn pattern(&self) -> PatternSpec {
        self.spec.pattern.clone()
    }

    fn on_match(
        &self,
        found: &TreeMatch<'_>,
        ctx: &mut RuleContext<'_, '_>,
    ) -> Result<(), CheckError> {
        let node = found.model().node(found.root());
        let subject = node
            .name()
            .or(node.operator_name())
            .or(node.literal_spelling())
            .unwrap_or(node.kind.class().name());
        ctx.report(node.loc, &self.spec.message, &[&subject]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::pattern::{all_of, has_operator, kind};
    use pretty_assertions::assert_eq;

    #[test]
    fn spec_from_json_defaults_to_warning() {
        let json = r#"{
            "id": "no-shift",
            "message": "shift operator '%0' used",
            "pattern": {"all_of": [
                {"kind": "BinaryOperator"},
                {"attr": {"name": "operator", "values": ["<<", ">>"]}}
            ]}
        }"#;
        let spec: RuleSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.severity, DiagnosticSeverity::Warning);
        assert_eq!(
            spec.pattern,
            all_of(vec![kind("BinaryOperator"), has_operator(&["<<", ">>"])])
        );

        let rule = DeclarativeRule::new(spec);
        assert_eq!(rule.id(), "no-shift");
        assert_eq!(rule.description(), "shift operator '%0' used");
        assert_eq!(rule.severity(), DiagnosticSeverity::Warning);
    }

    #[test]
    fn message_may_only_use_the_first_argument() {
        let spec = |message: &str| RuleSpec {
            id: "custom".into(),
            message: message.into(),
            severity: DiagnosticSeverity::Warning,
            pattern: kind("BinaryOperator"),
            description: None,
        };
        assert_eq!(spec("'%0' at 100%%").validate(), Ok(()));
        assert_eq!(
            spec("'%0' and '%1'").validate(),
            Err(ConfigurationError::UnboundPlaceholder {
                rule: "custom".into(),
                placeholder: "1".into(),
            })
        );
    }
}
