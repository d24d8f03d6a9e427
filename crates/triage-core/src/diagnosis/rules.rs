//! Built-in diagnosis rules.

use super::{DiagnosisRule, Finding, TriageContext};
use crate::config::MigrationRuleConfig;
use crate::error::Result;
use crate::types::Confidence;

pub const MIGRATION_MISCONFIGURATION: &str = "migration_misconfiguration";
pub const UNKNOWN_ROOT_CAUSE: &str = "unknown";

const UNKNOWN_CONFIDENCE: f64 = 0.3;

/// Several merchants reporting problems while platform errors are present
/// points at a botched migration of their API credentials.
pub struct MigrationMisconfigurationRule {
    min_distinct_subjects: usize,
    min_error_volume: u64,
    confidence: Confidence,
    tool: String,
}

impl MigrationMisconfigurationRule {
    pub fn from_config(config: &MigrationRuleConfig) -> Result<Self> {
        Ok(Self {
            min_distinct_subjects: config.min_distinct_subjects,
            min_error_volume: config.min_error_volume,
            confidence: Confidence::new(config.confidence)?,
            tool: config.tool.clone(),
        })
    }
}

impl DiagnosisRule for MigrationMisconfigurationRule {
    fn name(&self) -> &str {
        MIGRATION_MISCONFIGURATION
    }

    fn evaluate(&self, context: &TriageContext) -> Option<Finding> {
        let subjects = context.subjects();
        let volume = context.error_volume();

        if subjects.len() < self.min_distinct_subjects || volume < self.min_error_volume {
            return None;
        }

        Some(Finding {
            hypothesis: "Migration caused payment API auth failure".to_string(),
            confidence: self.confidence,
            root_cause: MIGRATION_MISCONFIGURATION.to_string(),
            recommended_action: "Alert merchants to update API keys".to_string(),
            tool: Some(self.tool.clone()),
            reasoning: vec![
                format!(
                    "{} distinct merchants opened support tickets",
                    subjects.len()
                ),
                format!(
                    "{} platform errors recorded across {} error events",
                    volume,
                    context.errors.len()
                ),
                "Ticket volume and error volume co-occur, consistent with stale API keys after migration"
                    .to_string(),
            ],
            affected_subject_ids: subjects,
        })
    }
}

/// Fallback when no rule matches.
pub fn unknown_finding(context: &TriageContext) -> Finding {
    Finding {
        hypothesis: "Unknown issue".to_string(),
        confidence: Confidence::saturating(UNKNOWN_CONFIDENCE),
        root_cause: UNKNOWN_ROOT_CAUSE.to_string(),
        recommended_action: "Investigate manually".to_string(),
        tool: None,
        reasoning: vec![format!(
            "{} tickets and error volume {} match no known pattern",
            context.tickets.len(),
            context.error_volume()
        )],
        affected_subject_ids: context.subjects(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Event;

    #[test]
    fn test_rule_thresholds_are_configurable() {
        let rule = MigrationMisconfigurationRule::from_config(&MigrationRuleConfig {
            min_distinct_subjects: 3,
            min_error_volume: 10,
            ..Default::default()
        })
        .unwrap();

        let context = TriageContext::new(
            vec![Event::ticket("a"), Event::ticket("b"), Event::ticket("c")],
            vec![Event::platform_error(9)],
        );
        assert!(rule.evaluate(&context).is_none());

        let context = TriageContext::new(context.tickets, vec![Event::platform_error(10)]);
        let finding = rule.evaluate(&context).unwrap();
        assert_eq!(finding.affected_subject_ids.len(), 3);
    }

    #[test]
    fn test_invalid_rule_confidence_rejected() {
        let result = MigrationMisconfigurationRule::from_config(&MigrationRuleConfig {
            confidence: 1.2,
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
