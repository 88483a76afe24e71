use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use shared::{
    daily_goal_bonus_gems, daily_goal_bonus_xp, xp_for_level, EngineError, GamificationProfile,
};

use crate::achievements::{
    Achievement, AchievementEvaluator, NotificationEvent, NotificationSink, STREAK_MILESTONES,
};
use crate::store::ProfileStore;
use crate::UserLocks;

#[derive(Debug, Clone, Serialize)]
pub struct XpAward {
    pub new_xp: u64,
    pub leveled_up: bool,
    pub levels_gained: u32,
    pub new_level: u32,
    pub daily_goal_met: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreakUpdate {
    pub streak: u32,
    pub best_streak: u32,
    pub extended: bool,
    pub reset: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyGoalClaim {
    pub bonus_xp: u64,
    pub bonus_gems: u64,
    pub award: XpAward,
}

/// Applies `amount` XP to the profile: lifetime and weekly totals, the
/// level loop (handles multi-level jumps in one call) and the daily-goal
/// latch. Leaves `xp_in_level < xp_for_next_level`.
pub fn apply_xp(profile: &mut GamificationProfile, amount: u64) -> XpAward {
    profile.xp += amount;
    profile.weekly_xp += amount;
    profile.xp_in_level += amount;

    let mut levels_gained = 0u32;
    while profile.xp_in_level >= profile.xp_for_next_level {
        profile.xp_in_level -= profile.xp_for_next_level;
        profile.level += 1;
        levels_gained += 1;
        profile.xp_for_next_level = xp_for_level(profile.level);
    }

    profile.daily_goal_progress += amount;
    if !profile.daily_goal_met && profile.daily_goal_progress >= profile.daily_goal_xp {
        // One-way latch until the daily reset.
        profile.daily_goal_met = true;
    }

    XpAward {
        new_xp: profile.xp,
        leveled_up: levels_gained > 0,
        levels_gained,
        new_level: profile.level,
        daily_goal_met: profile.daily_goal_met,
    }
}

/// Rolling-window streak classifier: under 24h since the last counted
/// activity is a no-op, 24-48h extends the streak, beyond 48h resets it.
/// The anchor only moves when the streak changes, so repeated same-window
/// activity keeps measuring from the first hit.
pub fn update_streak(profile: &mut GamificationProfile, now: DateTime<Utc>) -> StreakUpdate {
    let (streak, extended, reset) = match profile.last_activity_at {
        None => (1, true, false),
        Some(last) => {
            let elapsed_hours = (now - last).num_hours();
            if elapsed_hours < 24 {
                (profile.streak, false, false)
            } else if elapsed_hours < 48 {
                (profile.streak + 1, true, false)
            } else {
                (1, false, true)
            }
        }
    };

    if extended || reset {
        profile.last_activity_at = Some(now);
    }
    profile.streak = streak;
    profile.best_streak = profile.best_streak.max(streak);

    StreakUpdate {
        streak,
        best_streak: profile.best_streak,
        extended,
        reset,
    }
}

/// Claims the daily-goal bonus: flat 50 XP plus 5 per streak day, and one
/// gem per full streak week. The bonus XP runs through `apply_xp` and may
/// itself level the user up.
pub fn claim_daily_goal(
    profile: &mut GamificationProfile,
) -> Result<DailyGoalClaim, EngineError> {
    if !profile.daily_goal_met {
        return Err(EngineError::GoalNotMet);
    }
    if profile.daily_goal_claimed {
        return Err(EngineError::AlreadyClaimed);
    }

    profile.daily_goal_claimed = true;
    let bonus_xp = daily_goal_bonus_xp(profile.streak);
    let bonus_gems = daily_goal_bonus_gems(profile.streak);
    let award = apply_xp(profile, bonus_xp);
    profile.gems += bonus_gems;

    Ok(DailyGoalClaim {
        bonus_xp,
        bonus_gems,
        award,
    })
}

pub fn spend_gems(profile: &mut GamificationProfile, amount: u64) -> Result<(), EngineError> {
    if profile.gems < amount {
        return Err(EngineError::InsufficientGems {
            needed: amount,
            available: profile.gems,
        });
    }
    profile.gems -= amount;
    Ok(())
}

/// Store-backed XP/streak/daily-goal operations. Every mutation runs under
/// the per-user lock so concurrent requests serialize per user.
#[derive(Clone)]
pub struct LevelingEngine {
    profiles: Arc<dyn ProfileStore>,
    locks: UserLocks,
    evaluator: Arc<dyn AchievementEvaluator>,
    notifications: Arc<dyn NotificationSink>,
}

impl LevelingEngine {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        locks: UserLocks,
        evaluator: Arc<dyn AchievementEvaluator>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            profiles,
            locks,
            evaluator,
            notifications,
        }
    }

    pub(crate) async fn load_or_create(
        &self,
        user: &str,
    ) -> Result<GamificationProfile, EngineError> {
        Ok(self
            .profiles
            .get_profile(user)
            .await?
            .unwrap_or_else(|| GamificationProfile::new(user.to_string())))
    }

    /// Current snapshot, a fresh default if the user has none yet. Read
    /// paths use this for the level gate without creating the profile.
    pub async fn profile(&self, user: &str) -> Result<GamificationProfile, EngineError> {
        self.load_or_create(user).await
    }

    pub(crate) async fn save_profile(
        &self,
        profile: GamificationProfile,
    ) -> Result<(), EngineError> {
        self.profiles.save_profile(profile).await?;
        Ok(())
    }

    /// Evaluates achievements once against the current profile and folds
    /// their rewards back in. A single pass: achievement rewards do not
    /// re-trigger evaluation, which keeps the loop bounded, and already
    /// earned ids are skipped so nothing pays out twice.
    pub(crate) async fn settle_achievements(
        &self,
        profile: &mut GamificationProfile,
    ) -> Vec<Achievement> {
        let unlocked: Vec<Achievement> = self
            .evaluator
            .evaluate(profile)
            .await
            .into_iter()
            .filter(|achievement| profile.earned_achievements.insert(achievement.id.clone()))
            .collect();
        for achievement in &unlocked {
            apply_xp(profile, achievement.xp_reward);
            profile.gems += achievement.gems_reward;
            self.notifications
                .notify(NotificationEvent::AchievementUnlocked {
                    user: profile.user.clone(),
                    achievement: achievement.clone(),
                })
                .await;
        }
        unlocked
    }

    pub(crate) async fn notify_progress(
        &self,
        profile: &GamificationProfile,
        award: &XpAward,
        streak: Option<&StreakUpdate>,
    ) {
        if award.leveled_up {
            self.notifications
                .notify(NotificationEvent::LevelUp {
                    user: profile.user.clone(),
                    new_level: award.new_level,
                })
                .await;
        }
        if let Some(update) = streak {
            if update.extended && STREAK_MILESTONES.contains(&update.streak) {
                self.notifications
                    .notify(NotificationEvent::StreakMilestone {
                        user: profile.user.clone(),
                        streak: update.streak,
                    })
                    .await;
            }
        }
    }

    /// Awards XP to a user outside the completion path (admin grants,
    /// achievement rewards from external evaluators, and the like).
    #[instrument(skip(self))]
    pub async fn add_xp(
        &self,
        user: &str,
        amount: u64,
        reason: &str,
    ) -> Result<XpAward, EngineError> {
        let lock = self.locks.lock_for(user).await;
        let _guard = lock.lock().await;

        let mut profile = self.load_or_create(user).await?;
        let award = apply_xp(&mut profile, amount);
        self.settle_achievements(&mut profile).await;
        self.notify_progress(&profile, &award, None).await;
        self.profiles.save_profile(profile).await?;

        info!(user, amount, reason, "awarded xp");
        Ok(award)
    }

    #[instrument(skip(self))]
    pub async fn update_streak(&self, user: &str) -> Result<StreakUpdate, EngineError> {
        let lock = self.locks.lock_for(user).await;
        let _guard = lock.lock().await;

        let mut profile = self.load_or_create(user).await?;
        let update = update_streak(&mut profile, Utc::now());
        self.profiles.save_profile(profile).await?;
        Ok(update)
    }

    #[instrument(skip(self))]
    pub async fn claim_daily_goal(&self, user: &str) -> Result<DailyGoalClaim, EngineError> {
        let lock = self.locks.lock_for(user).await;
        let _guard = lock.lock().await;

        let mut profile = self
            .profiles
            .get_profile(user)
            .await?
            .ok_or_else(|| EngineError::ProfileNotFound(user.to_string()))?;
        let claim = claim_daily_goal(&mut profile)?;
        self.settle_achievements(&mut profile).await;
        self.notify_progress(&profile, &claim.award, None).await;
        self.profiles.save_profile(profile).await?;
        Ok(claim)
    }

    #[instrument(skip(self))]
    pub async fn spend_gems(&self, user: &str, amount: u64) -> Result<u64, EngineError> {
        let lock = self.locks.lock_for(user).await;
        let _guard = lock.lock().await;

        let mut profile = self
            .profiles
            .get_profile(user)
            .await?
            .ok_or_else(|| EngineError::ProfileNotFound(user.to_string()))?;
        spend_gems(&mut profile, amount)?;
        let remaining = profile.gems;
        self.profiles.save_profile(profile).await?;
        Ok(remaining)
    }

    /// Daily scheduler entry point: clears goal progress for everyone.
    #[instrument(skip(self))]
    pub async fn reset_daily_goals(&self) -> Result<usize, EngineError> {
        let users = self.profiles.list_users().await?;
        let count = users.len();
        for user in users {
            let lock = self.locks.lock_for(&user).await;
            let _guard = lock.lock().await;
            if let Some(mut profile) = self.profiles.get_profile(&user).await? {
                profile.reset_daily_goal();
                self.profiles.save_profile(profile).await?;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    fn profile() -> GamificationProfile {
        GamificationProfile::new("alice".into())
    }

    #[test]
    fn single_level_up_carries_overflow() {
        let mut p = profile();
        let award = apply_xp(&mut p, 130);
        assert!(award.leveled_up);
        assert_eq!(award.new_level, 2);
        assert_eq!(p.xp_in_level, 30);
        assert_eq!(p.xp_for_next_level, 282);
    }

    #[test]
    fn multi_level_jump_runs_the_loop() {
        let mut p = profile();
        // Level 1 needs 100, level 2 needs floor(100 * 2^1.5) = 282.
        let award = apply_xp(&mut p, 250);
        assert!(award.leveled_up);
        assert_eq!(award.levels_gained, 1);
        assert_eq!(award.new_level, 2);
        assert_eq!(p.xp_in_level, 150);
        assert!(p.xp_in_level < p.xp_for_next_level);

        // 150 + 800 crosses the 282 and 519 thresholds in one call.
        let award = apply_xp(&mut p, 800);
        assert_eq!(award.levels_gained, 2);
        assert_eq!(award.new_level, 4);
        assert_eq!(p.xp_in_level, 950 - 282 - xp_for_level(3));
        assert!(p.xp_in_level < p.xp_for_next_level);
    }

    #[test]
    fn daily_goal_latch_is_one_way() {
        let mut p = profile();
        p.daily_goal_xp = 60;
        assert!(!apply_xp(&mut p, 30).daily_goal_met);
        assert!(apply_xp(&mut p, 30).daily_goal_met);
        assert!(apply_xp(&mut p, 1).daily_goal_met);
    }

    #[test]
    fn streak_buckets_on_elapsed_hours() {
        let start = Utc::now();

        // First-ever activity starts the streak.
        let mut p = profile();
        let update = update_streak(&mut p, start);
        assert_eq!(update.streak, 1);

        // Under 24h: counted already, no change.
        let mut p = with_streak(start, 4);
        let update = update_streak(&mut p, start + Duration::hours(23));
        assert_eq!(update.streak, 4);
        assert!(!update.extended);

        // 24-48h: extends.
        let mut p = with_streak(start, 4);
        let update = update_streak(&mut p, start + Duration::hours(47));
        assert_eq!(update.streak, 5);
        assert!(update.extended);

        // Beyond 48h: resets.
        let mut p = with_streak(start, 4);
        let update = update_streak(&mut p, start + Duration::hours(49));
        assert_eq!(update.streak, 1);
        assert!(update.reset);
        assert_eq!(p.best_streak, 4);
    }

    fn with_streak(last_activity: DateTime<Utc>, streak: u32) -> GamificationProfile {
        let mut p = profile();
        p.streak = streak;
        p.best_streak = streak;
        p.last_activity_at = Some(last_activity);
        p
    }

    #[test]
    fn claim_requires_goal_met_and_is_single_shot() {
        let mut p = profile();
        assert!(matches!(claim_daily_goal(&mut p), Err(EngineError::GoalNotMet)));

        p.daily_goal_xp = 50;
        apply_xp(&mut p, 50);
        p.streak = 14;

        let claim = claim_daily_goal(&mut p).unwrap();
        assert_eq!(claim.bonus_xp, 50 + 14 * 5);
        assert_eq!(claim.bonus_gems, 3);
        assert_eq!(p.gems, 3);

        assert!(matches!(
            claim_daily_goal(&mut p),
            Err(EngineError::AlreadyClaimed)
        ));
    }

    #[test]
    fn gems_cannot_go_negative() {
        let mut p = profile();
        p.gems = 10;
        assert!(spend_gems(&mut p, 4).is_ok());
        assert_eq!(p.gems, 6);
        assert!(matches!(
            spend_gems(&mut p, 7),
            Err(EngineError::InsufficientGems { needed: 7, available: 6 })
        ));
    }
}
