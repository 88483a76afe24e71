use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use shared::{GamificationProfile, UserId};

/// An award handed back by the evaluator. Its rewards loop back into the
/// profile through the normal XP/gems paths.
#[derive(Debug, Clone, Serialize)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub xp_reward: u64,
    pub gems_reward: u64,
}

/// Events pushed to the notification sink. Delivery is fire-and-forget;
/// the engine never blocks on or inspects the outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    LevelUp { user: UserId, new_level: u32 },
    StreakMilestone { user: UserId, streak: u32 },
    AchievementUnlocked { user: UserId, achievement: Achievement },
    LeagueChanged { user: UserId, league: String, promoted: bool },
}

/// External achievement rules engine, re-run after every XP/streak change.
#[async_trait]
pub trait AchievementEvaluator: Send + Sync {
    async fn evaluate(&self, profile: &GamificationProfile) -> Vec<Achievement>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: NotificationEvent);
}

/// Default collaborators for deployments that wire the real ones in later.
pub struct NoopEvaluator;

#[async_trait]
impl AchievementEvaluator for NoopEvaluator {
    async fn evaluate(&self, _profile: &GamificationProfile) -> Vec<Achievement> {
        Vec::new()
    }
}

pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, event: NotificationEvent) {
        info!(?event, "notification");
    }
}

/// Streak lengths worth announcing.
pub const STREAK_MILESTONES: [u32; 5] = [3, 7, 14, 30, 100];

/// Stock evaluator: level and streak thresholds. Thresholds use `>=` so a
/// multi-level jump cannot skip one; the engine deduplicates grants against
/// the profile's earned set.
pub struct StandardAchievements;

impl StandardAchievements {
    fn threshold(
        granted: &mut Vec<Achievement>,
        reached: bool,
        id: &str,
        title: &str,
        xp: u64,
        gems: u64,
    ) {
        if reached {
            granted.push(Achievement {
                id: id.to_string(),
                title: title.to_string(),
                xp_reward: xp,
                gems_reward: gems,
            });
        }
    }
}

#[async_trait]
impl AchievementEvaluator for StandardAchievements {
    async fn evaluate(&self, profile: &GamificationProfile) -> Vec<Achievement> {
        let mut granted = Vec::new();
        Self::threshold(
            &mut granted,
            profile.level >= 5,
            "level-5",
            "Getting serious",
            50,
            5,
        );
        Self::threshold(
            &mut granted,
            profile.level >= 10,
            "level-10",
            "Double digits",
            150,
            15,
        );
        Self::threshold(
            &mut granted,
            profile.streak >= 7,
            "streak-7",
            "One week streak",
            70,
            7,
        );
        Self::threshold(
            &mut granted,
            profile.streak >= 30,
            "streak-30",
            "One month streak",
            300,
            30,
        );
        granted
    }
}
