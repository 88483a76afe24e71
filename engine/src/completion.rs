use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use shared::{
    blend_mastery, EngineError, NodeId, NodeStatus, ProgressRecord, SkillNode, Stars,
};

use crate::achievements::Achievement;
use crate::leveling::{self, LevelingEngine};
use crate::prerequisites::PrerequisiteValidator;
use crate::store::{NodeStore, ProgressStore};
use crate::UserLocks;

/// Everything a completion call hands back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub stars: Stars,
    pub xp_earned: u64,
    pub gems_earned: u64,
    pub leveled_up: bool,
    pub new_level: u32,
    pub unlocked_nodes: Vec<NodeId>,
    pub achievements: Vec<Achievement>,
}

/// Orchestrates a completion event: access check, best-of progress upsert,
/// XP/streak/mastery update, achievement settlement and the unlock cascade.
/// The whole sequence runs under the per-user lock, and every step is
/// either a best-of merge or create-if-absent, so a retry after a store
/// failure converges instead of double-awarding.
#[derive(Clone)]
pub struct CompletionEngine {
    nodes: Arc<dyn NodeStore>,
    progress: Arc<dyn ProgressStore>,
    validator: PrerequisiteValidator,
    leveling: LevelingEngine,
    locks: UserLocks,
}

impl CompletionEngine {
    pub fn new(
        nodes: Arc<dyn NodeStore>,
        progress: Arc<dyn ProgressStore>,
        validator: PrerequisiteValidator,
        leveling: LevelingEngine,
        locks: UserLocks,
    ) -> Self {
        Self {
            nodes,
            progress,
            validator,
            leveling,
            locks,
        }
    }

    async fn require_node(&self, node_id: &str) -> Result<SkillNode, EngineError> {
        self.nodes
            .find_node(node_id)
            .await?
            .ok_or_else(|| EngineError::NodeNotFound(node_id.to_string()))
    }

    /// Access gate for an attempt: prerequisites first, then the level
    /// requirement, then the lesson-view requirement.
    async fn assert_can_attempt(
        &self,
        user: &str,
        node: &SkillNode,
        user_level: u32,
    ) -> Result<(), EngineError> {
        let report = self.validator.check_prerequisites(user, &node.id).await?;
        if !report.is_met {
            return Err(EngineError::PrerequisitesNotMet {
                missing: report.missing,
            });
        }

        if let Some(required) = node.minimum_level {
            if user_level < required {
                return Err(EngineError::LevelRequirementNotMet {
                    required,
                    current: user_level,
                });
            }
        }

        if node.requires_lesson_view {
            let viewed = self
                .progress
                .get_progress(user, &node.id)
                .await?
                .map(|record| record.lesson_viewed)
                .unwrap_or(false);
            if !viewed {
                return Err(EngineError::LessonNotViewed);
            }
        }

        Ok(())
    }

    /// Handles a quiz completion for `node_id` with a 0-100 score.
    ///
    /// A completion always lands the record on `Completed`, even at zero
    /// stars; stars and best score are best-of across attempts. Returns the
    /// node ids the cascade newly made available this call.
    #[instrument(skip(self))]
    pub async fn complete_node(
        &self,
        user: &str,
        node_id: &str,
        score: u32,
        time_spent_secs: u64,
    ) -> Result<CompletionOutcome, EngineError> {
        if score > 100 {
            return Err(EngineError::ScoreOutOfRange(score));
        }

        let lock = self.locks.lock_for(user).await;
        let _guard = lock.lock().await;

        let node = self.require_node(node_id).await?;
        let mut profile = self.leveling.load_or_create(user).await?;
        self.assert_can_attempt(user, &node, profile.level).await?;

        let now = Utc::now();
        let mut record = self
            .progress
            .get_progress(user, node_id)
            .await?
            .unwrap_or_else(|| {
                ProgressRecord::new(user.to_string(), node_id.to_string(), NodeStatus::Available)
            });
        let first_completion = !record.is_completed();
        record.record_attempt(score, now);
        self.progress.upsert_progress(record).await?;

        // Rewards track this attempt's quality, not the stored best.
        let stars = Stars::from_score(score);

        let xp_earned = (node.xp_reward as f64 * stars.xp_multiplier()).round() as u64;
        let gems_earned = if first_completion { node.gems_reward } else { 0 };

        let streak = leveling::update_streak(&mut profile, now);
        let award = leveling::apply_xp(&mut profile, xp_earned);
        profile.gems += gems_earned;
        let mastery = blend_mastery(profile.mastery_for(&node.subject), score as f64);
        profile.mastery.insert(node.subject.clone(), mastery);

        let achievements = self.leveling.settle_achievements(&mut profile).await;
        self.leveling
            .notify_progress(&profile, &award, Some(&streak))
            .await;
        let new_level = profile.level;
        let leveled_up = award.leveled_up;
        self.leveling.save_profile(profile).await?;

        let unlocked_nodes = self.unlock_cascade(user, node_id).await?;

        info!(
            user,
            node_id,
            score,
            time_spent_secs,
            stars = stars.count(),
            xp_earned,
            unlocked = unlocked_nodes.len(),
            "node completed"
        );

        Ok(CompletionOutcome {
            stars,
            xp_earned,
            gems_earned,
            leveled_up,
            new_level,
            unlocked_nodes,
            achievements,
        })
    }

    /// Records a lesson view, promoting the record to InProgress. The node
    /// must already be reachable (prerequisites and level gate).
    #[instrument(skip(self))]
    pub async fn record_lesson_view(
        &self,
        user: &str,
        node_id: &str,
        time_spent_secs: u64,
    ) -> Result<NodeStatus, EngineError> {
        let lock = self.locks.lock_for(user).await;
        let _guard = lock.lock().await;

        let node = self.require_node(node_id).await?;
        let profile = self.leveling.load_or_create(user).await?;

        let report = self.validator.check_prerequisites(user, &node.id).await?;
        if !report.is_met {
            return Err(EngineError::PrerequisitesNotMet {
                missing: report.missing,
            });
        }
        if let Some(required) = node.minimum_level {
            if profile.level < required {
                return Err(EngineError::LevelRequirementNotMet {
                    required,
                    current: profile.level,
                });
            }
        }

        let mut record = self
            .progress
            .get_progress(user, node_id)
            .await?
            .unwrap_or_else(|| {
                ProgressRecord::new(user.to_string(), node_id.to_string(), NodeStatus::Available)
            });
        record.record_lesson_view(time_spent_secs, Utc::now());
        let status = record.status;
        self.progress.upsert_progress(record).await?;
        Ok(status)
    }

    /// Re-evaluates every node depending on `completed_id`. Nodes whose
    /// prerequisites are now all completed get a record created as
    /// Available; an existing Locked record is promoted, anything further
    /// along is left alone. Returns only the ids that changed this call.
    async fn unlock_cascade(
        &self,
        user: &str,
        completed_id: &str,
    ) -> Result<Vec<NodeId>, EngineError> {
        let dependents = self.nodes.find_nodes_with_prerequisite(completed_id).await?;
        if dependents.is_empty() {
            return Ok(vec![]);
        }

        let completed_set: BTreeSet<NodeId> = self
            .progress
            .list_completed(user)
            .await?
            .into_iter()
            .map(|record| record.node_id)
            .collect();

        let mut unlocked = Vec::new();
        for dependent in dependents {
            let all_met = dependent
                .prerequisites
                .iter()
                .all(|prerequisite| completed_set.contains(prerequisite));
            if !all_met {
                continue;
            }

            match self.progress.get_progress(user, &dependent.id).await? {
                None => {
                    let record = ProgressRecord::new(
                        user.to_string(),
                        dependent.id.clone(),
                        NodeStatus::Available,
                    );
                    self.progress.upsert_progress(record).await?;
                    unlocked.push(dependent.id);
                }
                Some(mut record) if record.status == NodeStatus::Locked => {
                    record.status = NodeStatus::Available;
                    self.progress.upsert_progress(record).await?;
                    unlocked.push(dependent.id);
                }
                // Already available or further along; nothing to do.
                Some(_) => {}
            }
        }

        Ok(unlocked)
    }
}
