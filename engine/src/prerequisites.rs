use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use shared::{EngineError, NodeId, SkillNode, Stars};

use crate::store::{NodeStore, ProgressStore};

/// Per-prerequisite breakdown for UI display.
#[derive(Debug, Clone, Serialize)]
pub struct PrerequisiteDetail {
    pub node_id: NodeId,
    pub title: String,
    pub completed: bool,
    pub best_score: u32,
    pub stars: Stars,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrerequisiteReport {
    pub is_met: bool,
    pub missing: Vec<NodeId>,
    pub completed: Vec<NodeId>,
    pub details: Vec<PrerequisiteDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessDecision {
    pub can_access: bool,
    pub is_locked: bool,
    pub lock_reason: Option<String>,
    pub level_requirement: Option<u32>,
}

impl AccessDecision {
    fn granted() -> Self {
        Self {
            can_access: true,
            is_locked: false,
            lock_reason: None,
            level_requirement: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizAccessDecision {
    pub can_access: bool,
    pub lock_reason: Option<String>,
    pub requires_lesson_view: bool,
}

/// Catalog partitioned by what the user can do next.
#[derive(Debug, Clone, Serialize)]
pub struct NodePartition {
    pub accessible: Vec<SkillNode>,
    pub locked: Vec<SkillNode>,
    pub completed: Vec<SkillNode>,
}

/// Read-only access checks over the skill graph. Never mutates the stores;
/// a failed lookup aborts the whole computation.
#[derive(Clone)]
pub struct PrerequisiteValidator {
    nodes: Arc<dyn NodeStore>,
    progress: Arc<dyn ProgressStore>,
}

impl PrerequisiteValidator {
    pub fn new(nodes: Arc<dyn NodeStore>, progress: Arc<dyn ProgressStore>) -> Self {
        Self { nodes, progress }
    }

    async fn require_node(&self, node_id: &str) -> Result<SkillNode, EngineError> {
        self.nodes
            .find_node(node_id)
            .await?
            .ok_or_else(|| EngineError::NodeNotFound(node_id.to_string()))
    }

    async fn completed_set(&self, user: &str) -> Result<BTreeSet<NodeId>, EngineError> {
        Ok(self
            .progress
            .list_completed(user)
            .await?
            .into_iter()
            .map(|record| record.node_id)
            .collect())
    }

    /// Whether all of `node_id`'s prerequisites are completed, with the
    /// per-prerequisite detail the UI shows on locked nodes.
    #[instrument(skip(self))]
    pub async fn check_prerequisites(
        &self,
        user: &str,
        node_id: &str,
    ) -> Result<PrerequisiteReport, EngineError> {
        let node = self.require_node(node_id).await?;
        if node.prerequisites.is_empty() {
            return Ok(PrerequisiteReport {
                is_met: true,
                missing: vec![],
                completed: vec![],
                details: vec![],
            });
        }

        let completed_set = self.completed_set(user).await?;
        let mut missing = Vec::new();
        let mut completed = Vec::new();
        let mut details = Vec::with_capacity(node.prerequisites.len());

        for prerequisite in &node.prerequisites {
            let is_completed = completed_set.contains(prerequisite);
            if is_completed {
                completed.push(prerequisite.clone());
            } else {
                missing.push(prerequisite.clone());
            }

            let title = self
                .require_node(prerequisite)
                .await
                .map(|n| n.title)
                .unwrap_or_else(|_| prerequisite.clone());
            let record = self.progress.get_progress(user, prerequisite).await?;
            details.push(PrerequisiteDetail {
                node_id: prerequisite.clone(),
                title,
                completed: is_completed,
                best_score: record.as_ref().map(|r| r.best_score).unwrap_or(0),
                stars: record.map(|r| r.stars).unwrap_or_default(),
            });
        }

        Ok(PrerequisiteReport {
            is_met: missing.is_empty(),
            missing,
            completed,
            details,
        })
    }

    /// Prerequisite check composed with the optional minimum-level gate.
    /// An unmet prerequisite is reported before an unmet level gate.
    #[instrument(skip(self))]
    pub async fn validate_node_access(
        &self,
        user: &str,
        node_id: &str,
        user_level: u32,
    ) -> Result<AccessDecision, EngineError> {
        let node = self.require_node(node_id).await?;
        let report = self.check_prerequisites(user, node_id).await?;

        if !report.is_met {
            return Ok(AccessDecision {
                can_access: false,
                is_locked: true,
                lock_reason: Some(format!(
                    "complete {} more prerequisite(s) first",
                    report.missing.len()
                )),
                level_requirement: node.minimum_level.filter(|required| user_level < *required),
            });
        }

        if let Some(required) = node.minimum_level {
            if user_level < required {
                return Ok(AccessDecision {
                    can_access: false,
                    is_locked: true,
                    lock_reason: Some(format!("reach level {required} to unlock")),
                    level_requirement: Some(required),
                });
            }
        }

        Ok(AccessDecision::granted())
    }

    /// Partitions the catalog (optionally one subject) into what the user
    /// has completed, can start now, and cannot reach yet.
    #[instrument(skip(self))]
    pub async fn accessible_nodes(
        &self,
        user: &str,
        user_level: u32,
        subject: Option<&str>,
    ) -> Result<NodePartition, EngineError> {
        let catalog = self.nodes.list_nodes(subject).await?;
        let completed_set = self.completed_set(user).await?;

        let mut partition = NodePartition {
            accessible: vec![],
            locked: vec![],
            completed: vec![],
        };

        for node in catalog {
            if completed_set.contains(&node.id) {
                partition.completed.push(node);
                continue;
            }

            let prerequisites_met = node
                .prerequisites
                .iter()
                .all(|prerequisite| completed_set.contains(prerequisite));
            let level_met = node.minimum_level.map_or(true, |min| user_level >= min);

            if prerequisites_met && level_met {
                partition.accessible.push(node);
            } else {
                partition.locked.push(node);
            }
        }

        Ok(partition)
    }

    /// Quiz access is node access plus the lesson-view gate: when the node
    /// requires its lesson, an unseen lesson fails closed.
    #[instrument(skip(self))]
    pub async fn validate_quiz_access(
        &self,
        user: &str,
        node_id: &str,
        user_level: u32,
    ) -> Result<QuizAccessDecision, EngineError> {
        let node = self.require_node(node_id).await?;
        let access = self.validate_node_access(user, node_id, user_level).await?;
        if !access.can_access {
            return Ok(QuizAccessDecision {
                can_access: false,
                lock_reason: access.lock_reason,
                requires_lesson_view: node.requires_lesson_view,
            });
        }

        if node.requires_lesson_view {
            let viewed = self
                .progress
                .get_progress(user, node_id)
                .await?
                .map(|record| record.lesson_viewed)
                .unwrap_or(false);
            if !viewed {
                return Ok(QuizAccessDecision {
                    can_access: false,
                    lock_reason: Some("must view lesson first".to_string()),
                    requires_lesson_view: true,
                });
            }
        }

        Ok(QuizAccessDecision {
            can_access: true,
            lock_reason: None,
            requires_lesson_view: node.requires_lesson_view,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use shared::{NodeStatus, ProgressRecord};

    use crate::store::{InMemoryStore, ProgressStore};

    async fn fixture() -> (Arc<InMemoryStore>, PrerequisiteValidator) {
        let store = Arc::new(InMemoryStore::new());
        store
            .seed_nodes(vec![
                SkillNode::new("counting", "Counting", "math"),
                SkillNode::new("addition", "Addition", "math")
                    .with_prerequisites(vec!["counting".into()]),
                SkillNode::new("multiplication", "Multiplication", "math")
                    .with_prerequisites(vec!["addition".into()])
                    .with_minimum_level(3),
                SkillNode::new("reading", "Reading", "english")
                    .with_lesson("Sounding out words", true),
            ])
            .await
            .unwrap();
        let validator = PrerequisiteValidator::new(store.clone(), store.clone());
        (store, validator)
    }

    async fn complete(store: &InMemoryStore, user: &str, node_id: &str, score: u32) {
        let mut record =
            ProgressRecord::new(user.to_string(), node_id.to_string(), NodeStatus::Available);
        record.record_attempt(score, Utc::now());
        store.upsert_progress(record).await.unwrap();
    }

    #[tokio::test]
    async fn empty_prerequisites_are_trivially_met() {
        let (_, validator) = fixture().await;
        let report = validator
            .check_prerequisites("alice", "counting")
            .await
            .unwrap();
        assert!(report.is_met);
        assert!(report.missing.is_empty());
    }

    #[tokio::test]
    async fn missing_node_is_an_error() {
        let (_, validator) = fixture().await;
        let result = validator.check_prerequisites("alice", "ghost").await;
        assert!(matches!(result, Err(EngineError::NodeNotFound(_))));
    }

    #[tokio::test]
    async fn unmet_prerequisite_locks_the_node() {
        let (_, validator) = fixture().await;
        let report = validator
            .check_prerequisites("alice", "addition")
            .await
            .unwrap();
        assert!(!report.is_met);
        assert_eq!(report.missing, vec!["counting".to_string()]);
        assert_eq!(report.details.len(), 1);
        assert!(!report.details[0].completed);
    }

    #[tokio::test]
    async fn prerequisite_failure_outranks_level_failure() {
        let (_, validator) = fixture().await;
        let decision = validator
            .validate_node_access("alice", "multiplication", 1)
            .await
            .unwrap();
        assert!(!decision.can_access);
        assert!(decision.lock_reason.unwrap().contains("prerequisite"));
    }

    #[tokio::test]
    async fn level_gate_applies_once_prerequisites_pass() {
        let (store, validator) = fixture().await;
        complete(&store, "alice", "counting", 80).await;
        complete(&store, "alice", "addition", 80).await;

        let decision = validator
            .validate_node_access("alice", "multiplication", 2)
            .await
            .unwrap();
        assert!(!decision.can_access);
        assert_eq!(decision.level_requirement, Some(3));

        let decision = validator
            .validate_node_access("alice", "multiplication", 3)
            .await
            .unwrap();
        assert!(decision.can_access);
    }

    #[tokio::test]
    async fn partitions_catalog_by_progress() {
        let (store, validator) = fixture().await;
        complete(&store, "alice", "counting", 92).await;

        let partition = validator
            .accessible_nodes("alice", 1, Some("math"))
            .await
            .unwrap();
        let ids = |nodes: &[SkillNode]| {
            nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&partition.completed), vec!["counting"]);
        assert_eq!(ids(&partition.accessible), vec!["addition"]);
        assert_eq!(ids(&partition.locked), vec!["multiplication"]);
    }

    #[tokio::test]
    async fn quiz_access_requires_lesson_view() {
        let (store, validator) = fixture().await;

        let decision = validator
            .validate_quiz_access("alice", "reading", 1)
            .await
            .unwrap();
        assert!(!decision.can_access);
        assert!(decision.requires_lesson_view);
        assert_eq!(decision.lock_reason.as_deref(), Some("must view lesson first"));

        let mut record =
            ProgressRecord::new("alice".into(), "reading".into(), NodeStatus::Available);
        record.record_lesson_view(60, Utc::now());
        store.upsert_progress(record).await.unwrap();

        let decision = validator
            .validate_quiz_access("alice", "reading", 1)
            .await
            .unwrap();
        assert!(decision.can_access);
    }
}
