pub mod achievements;
pub mod completion;
pub mod graph;
pub mod league;
pub mod leveling;
pub mod prerequisites;
pub mod store;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use shared::UserId;

pub use achievements::{
    Achievement, AchievementEvaluator, LogSink, NotificationEvent, NotificationSink,
    NoopEvaluator, StandardAchievements,
};
pub use completion::{CompletionEngine, CompletionOutcome};
pub use league::LeagueEngine;
pub use leveling::LevelingEngine;
pub use prerequisites::{
    AccessDecision, NodePartition, PrerequisiteReport, PrerequisiteValidator, QuizAccessDecision,
};

use crate::store::{NodeStore, ProfileStore, ProgressStore};

/// Wires the validator and the three engines over one set of stores and
/// collaborators. This is the object services hold in state.
#[derive(Clone)]
pub struct Engine {
    pub validator: PrerequisiteValidator,
    pub completion: CompletionEngine,
    pub leveling: LevelingEngine,
    pub league: LeagueEngine,
}

impl Engine {
    pub fn new(
        nodes: Arc<dyn NodeStore>,
        progress: Arc<dyn ProgressStore>,
        profiles: Arc<dyn ProfileStore>,
        evaluator: Arc<dyn AchievementEvaluator>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        let locks = UserLocks::new();
        let validator = PrerequisiteValidator::new(nodes.clone(), progress.clone());
        let leveling = LevelingEngine::new(
            profiles.clone(),
            locks.clone(),
            evaluator,
            notifications.clone(),
        );
        let completion = CompletionEngine::new(
            nodes,
            progress,
            validator.clone(),
            leveling.clone(),
            locks.clone(),
        );
        let league = LeagueEngine::new(profiles, notifications, locks);
        Self {
            validator,
            completion,
            leveling,
            league,
        }
    }
}

/// Hands out one async mutex per user so every progress-and-XP mutation for
/// a user runs single-writer. Guards attempts counting, best-of merges and
/// XP/level updates against concurrent completion calls.
#[derive(Clone, Default)]
pub struct UserLocks {
    locks: Arc<Mutex<HashMap<UserId, Arc<Mutex<()>>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_for(&self, user: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        // Evict entries nobody holds; the map stays bounded by the number
        // of users with an operation in flight.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(user.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    #[cfg(test)]
    async fn live_entries(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_lock_entries_are_evicted() {
        let locks = UserLocks::new();
        let alice = locks.lock_for("alice").await;
        let _bob = locks.lock_for("bob").await;
        assert_eq!(locks.live_entries().await, 2);

        drop(alice);
        let _carol = locks.lock_for("carol").await;
        assert_eq!(locks.live_entries().await, 2, "alice's idle entry is gone");
    }

    #[tokio::test]
    async fn held_lock_survives_eviction() {
        let locks = UserLocks::new();
        let first = locks.lock_for("alice").await;
        let guard = first.lock().await;

        // A second caller must get the same mutex, not a fresh one.
        let second = locks.lock_for("alice").await;
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.try_lock().is_err());
        drop(guard);
    }
}
