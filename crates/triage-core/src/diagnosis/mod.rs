//! Diagnosis engine - turn a filtered observation into a diagnosis.
//!
//! The engine is a pure function of its inputs. Rules are evaluated in
//! order and the first match wins; when nothing matches, a low-confidence
//! `unknown` diagnosis is returned, so `reason` always produces a result.
//!
//! Risk is classified separately from the rule's confidence: the risk table
//! maps root causes to levels, and only unlisted causes fall back to a
//! confidence band.

mod rules;

pub use rules::*;

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::config::TriageConfig;
use crate::error::Result;
use crate::memory::{MemorySnapshot, SubjectStatus};
use crate::observer::Observation;
use crate::types::{Confidence, Diagnosis, Event, RiskLevel, SubjectId};

/// Events a diagnosis is made from, with resolved subjects removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TriageContext {
    pub tickets: Vec<Event>,
    pub errors: Vec<Event>,
}

impl TriageContext {
    pub fn new(tickets: Vec<Event>, errors: Vec<Event>) -> Self {
        Self { tickets, errors }
    }

    /// Drop tickets whose subject is already resolved; keep every error.
    pub fn from_observation(observation: &Observation, memory: &MemorySnapshot) -> Self {
        let tickets = observation
            .tickets
            .iter()
            .filter(|t| {
                t.subject_id
                    .as_deref()
                    .map(|id| !memory.is_resolved(id))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        Self {
            tickets,
            errors: observation.errors.clone(),
        }
    }

    pub fn subjects(&self) -> BTreeSet<SubjectId> {
        self.tickets
            .iter()
            .filter_map(|t| t.subject_id.clone())
            .collect()
    }

    pub fn error_volume(&self) -> u64 {
        self.errors
            .iter()
            .fold(0u64, |acc, e| acc.saturating_add(e.error_count()))
    }
}

/// What a rule concluded, before risk classification.
#[derive(Debug, Clone)]
pub struct Finding {
    pub hypothesis: String,
    pub confidence: Confidence,
    pub root_cause: String,
    pub recommended_action: String,
    pub tool: Option<String>,
    pub reasoning: Vec<String>,
    pub affected_subject_ids: BTreeSet<SubjectId>,
}

/// A pluggable diagnosis rule.
pub trait DiagnosisRule: Send + Sync {
    /// Rule identifier, for logs.
    fn name(&self) -> &str;

    /// Return a finding when the context matches this rule.
    fn evaluate(&self, context: &TriageContext) -> Option<Finding>;
}

/// Root cause to risk level mapping.
#[derive(Debug, Clone, Default)]
pub struct RiskTable {
    levels: HashMap<String, RiskLevel>,
}

impl RiskTable {
    pub fn new(levels: HashMap<String, RiskLevel>) -> Self {
        Self { levels }
    }

    pub fn classify(&self, root_cause: &str, confidence: Confidence) -> RiskLevel {
        if let Some(level) = self.levels.get(root_cause) {
            return *level;
        }
        if confidence.value() >= 0.7 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

pub struct DiagnosisEngine {
    rules: Vec<Box<dyn DiagnosisRule>>,
    risk: RiskTable,
}

impl DiagnosisEngine {
    pub fn new(rules: Vec<Box<dyn DiagnosisRule>>, risk: RiskTable) -> Self {
        Self { rules, risk }
    }

    /// Engine with the built-in rule table, tuned by configuration.
    pub fn from_config(config: &TriageConfig) -> Result<Self> {
        let rules: Vec<Box<dyn DiagnosisRule>> = vec![Box::new(
            MigrationMisconfigurationRule::from_config(&config.rules.migration)?,
        )];
        Ok(Self::new(rules, RiskTable::new(config.risk.levels.clone())))
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Diagnose a context. Deterministic and total.
    pub fn reason(&self, context: &TriageContext, memory: &MemorySnapshot) -> Diagnosis {
        let finding = self
            .rules
            .iter()
            .find_map(|rule| rule.evaluate(context))
            .unwrap_or_else(|| unknown_finding(context));

        let mut reasoning = finding.reasoning;
        reasoning.extend(memory_clauses(&finding.affected_subject_ids, memory));

        Diagnosis {
            risk_level: self.risk.classify(&finding.root_cause, finding.confidence),
            hypothesis: finding.hypothesis,
            confidence: finding.confidence,
            root_cause: finding.root_cause,
            recommended_action: finding.recommended_action,
            tool: finding.tool,
            reasoning,
            affected_subject_ids: finding.affected_subject_ids,
        }
    }
}

/// Reasoning clauses about what memory already knows of the affected subjects.
fn memory_clauses(subjects: &BTreeSet<SubjectId>, memory: &MemorySnapshot) -> Vec<String> {
    let mut clauses = Vec::new();
    for id in subjects {
        match memory.get(id) {
            Some(record) if record.status == SubjectStatus::Rejected => clauses.push(format!(
                "Subject {} was previously rejected for {}",
                id, record.last_diagnosis.root_cause
            )),
            Some(record) if record.status == SubjectStatus::PendingApproval => {
                clauses.push(format!("Subject {} is already awaiting approval", id))
            }
            _ => {}
        }
    }
    clauses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{test_support::diagnosis_for, InMemoryStore, MemoryStore};

    fn engine() -> DiagnosisEngine {
        DiagnosisEngine::from_config(&TriageConfig::default()).unwrap()
    }

    #[test]
    fn test_migration_scenario() {
        let context = TriageContext::new(
            vec![Event::ticket("m-1"), Event::ticket("m-2")],
            vec![Event::platform_error(5)],
        );

        let diagnosis = engine().reason(&context, &MemorySnapshot::default());
        assert_eq!(diagnosis.confidence.value(), 0.8);
        assert_eq!(diagnosis.root_cause, MIGRATION_MISCONFIGURATION);
        assert_eq!(diagnosis.risk_level, RiskLevel::Medium);
        assert_eq!(diagnosis.tool.as_deref(), Some("notify_subjects"));
        assert_eq!(
            diagnosis.affected_subject_ids,
            ["m-1".to_string(), "m-2".to_string()].into()
        );
    }

    #[test]
    fn test_huge_error_counts_still_diagnosed() {
        let context = TriageContext::new(
            vec![Event::ticket("m-1"), Event::ticket("m-2")],
            vec![Event::platform_error(u64::MAX), Event::platform_error(1)],
        );
        assert_eq!(context.error_volume(), u64::MAX);

        let diagnosis = engine().reason(&context, &MemorySnapshot::default());
        assert_eq!(diagnosis.root_cause, MIGRATION_MISCONFIGURATION);
    }

    #[test]
    fn test_unknown_scenario() {
        let context = TriageContext::new(vec![Event::ticket("m-1")], vec![]);

        let diagnosis = engine().reason(&context, &MemorySnapshot::default());
        assert_eq!(diagnosis.confidence.value(), 0.3);
        assert_eq!(diagnosis.root_cause, UNKNOWN_ROOT_CAUSE);
        assert_eq!(diagnosis.risk_level, RiskLevel::Low);
        assert!(diagnosis.tool.is_none());
        assert!(!diagnosis.reasoning.is_empty());
    }

    #[test]
    fn test_empty_context_still_diagnosed() {
        let diagnosis = engine().reason(&TriageContext::default(), &MemorySnapshot::default());
        assert_eq!(diagnosis.root_cause, UNKNOWN_ROOT_CAUSE);
        assert!(diagnosis.affected_subject_ids.is_empty());
    }

    #[test]
    fn test_reason_is_deterministic() {
        let context = TriageContext::new(
            vec![Event::ticket("m-2"), Event::ticket("m-1")],
            vec![Event::platform_error(3)],
        );
        let memory = MemorySnapshot::default();
        let engine = engine();
        assert_eq!(engine.reason(&context, &memory), engine.reason(&context, &memory));
    }

    #[test]
    fn test_duplicate_tickets_count_once() {
        let context = TriageContext::new(
            vec![Event::ticket("m-1"), Event::ticket("m-1")],
            vec![Event::platform_error(5)],
        );
        let diagnosis = engine().reason(&context, &MemorySnapshot::default());
        assert_eq!(diagnosis.root_cause, UNKNOWN_ROOT_CAUSE);
    }

    #[test]
    fn test_risk_table_independent_of_confidence() {
        let mut levels = HashMap::new();
        levels.insert("credential_leak".to_string(), RiskLevel::High);
        let table = RiskTable::new(levels);

        let moderate = Confidence::new(0.5).unwrap();
        assert_eq!(table.classify("credential_leak", moderate), RiskLevel::High);
        assert_eq!(table.classify("other", moderate), RiskLevel::Low);
        assert_eq!(
            table.classify("other", Confidence::new(0.9).unwrap()),
            RiskLevel::Medium
        );
    }

    #[test]
    fn test_memory_adds_reasoning_context() {
        let store = InMemoryStore::new();
        let prior = diagnosis_for(MIGRATION_MISCONFIGURATION, &["m-1"]);
        store
            .update(&["m-1".to_string()].into(), &prior, SubjectStatus::Rejected)
            .unwrap();

        let context = TriageContext::new(
            vec![Event::ticket("m-1"), Event::ticket("m-2")],
            vec![Event::platform_error(1)],
        );
        let diagnosis = engine().reason(&context, &store.load().unwrap());
        assert!(diagnosis
            .reasoning
            .iter()
            .any(|c| c.contains("m-1 was previously rejected")));
    }

    #[test]
    fn test_context_drops_resolved_subjects() {
        let store = InMemoryStore::new();
        let prior = diagnosis_for(MIGRATION_MISCONFIGURATION, &["m-1"]);
        store
            .update(&["m-1".to_string()].into(), &prior, SubjectStatus::Resolved)
            .unwrap();

        let observation = Observation {
            tickets: vec![Event::ticket("m-1"), Event::ticket("m-2")],
            errors: vec![Event::platform_error(4)],
        };
        let context = TriageContext::from_observation(&observation, &store.load().unwrap());
        assert_eq!(context.subjects(), ["m-2".to_string()].into());
        assert_eq!(context.error_volume(), 4);
    }
}
