use std::sync::Arc;

use itertools::Itertools;
use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::{info, instrument};

use shared::{EngineError, GamificationProfile, LeagueTier, UserId};

use crate::achievements::{NotificationEvent, NotificationSink};
use crate::store::ProfileStore;
use crate::UserLocks;

/// Top ranks that move up a tier each week.
pub const PROMOTION_SLOTS: usize = 10;
/// Ranks beyond this demote, independent of league size.
pub const DEMOTION_RANK_FLOOR: usize = 20;

#[derive(Debug, Clone, Serialize, Default)]
pub struct TierOutcome {
    pub promoted: Vec<UserId>,
    pub demoted: Vec<UserId>,
    pub held: Vec<UserId>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct WeeklyResetSummary {
    pub users_processed: usize,
    pub promoted: usize,
    pub demoted: usize,
}

/// Weekly league pass: ranks each tier by the XP earned that week, promotes
/// the top, demotes the tail, and starts the next week from zero. Runs as a
/// single writer over each tier bucket.
#[derive(Clone)]
pub struct LeagueEngine {
    profiles: Arc<dyn ProfileStore>,
    notifications: Arc<dyn NotificationSink>,
    locks: UserLocks,
}

impl LeagueEngine {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        notifications: Arc<dyn NotificationSink>,
        locks: UserLocks,
    ) -> Self {
        Self {
            profiles,
            notifications,
            locks,
        }
    }

    /// Splits a ranked bucket into movement bands. Pure; the bucket must
    /// already be sorted by weekly XP descending.
    pub fn classify(tier: LeagueTier, ranked: &[GamificationProfile]) -> TierOutcome {
        let mut outcome = TierOutcome::default();
        for (index, profile) in ranked.iter().enumerate() {
            let rank = index + 1;
            if rank <= PROMOTION_SLOTS && tier.promoted().is_some() {
                outcome.promoted.push(profile.user.clone());
            } else if rank > DEMOTION_RANK_FLOOR && tier.demoted().is_some() {
                outcome.demoted.push(profile.user.clone());
            } else {
                outcome.held.push(profile.user.clone());
            }
        }
        outcome
    }

    #[instrument(skip(self))]
    pub async fn run_weekly_reset(&self) -> Result<WeeklyResetSummary, EngineError> {
        // Snapshot every bucket before writing anything, so a user promoted
        // out of silver is not ranked again in gold within the same pass.
        // The snapshot is only used for ranking; writes below re-read each
        // profile under its lock and touch league fields alone, so a
        // completion landing mid-pass is never overwritten.
        let mut buckets = Vec::new();
        for tier in LeagueTier::iter() {
            let mut bucket = self.profiles.list_by_league(tier).await?;
            bucket.sort_by(|a, b| {
                b.weekly_xp
                    .cmp(&a.weekly_xp)
                    .then_with(|| a.user.cmp(&b.user))
            });
            buckets.push((tier, bucket));
        }

        let mut summary = WeeklyResetSummary::default();
        for (tier, ranked) in buckets {
            let outcome = Self::classify(tier, &ranked);
            summary.users_processed += ranked.len();
            summary.promoted += outcome.promoted.len();
            summary.demoted += outcome.demoted.len();

            for (index, snapshot) in ranked.into_iter().enumerate() {
                let rank = index + 1;
                let target = if outcome.promoted.contains(&snapshot.user) {
                    tier.promoted()
                } else if outcome.demoted.contains(&snapshot.user) {
                    tier.demoted()
                } else {
                    None
                };

                let lock = self.locks.lock_for(&snapshot.user).await;
                let _guard = lock.lock().await;
                let mut profile = match self.profiles.get_profile(&snapshot.user).await? {
                    Some(profile) => profile,
                    None => continue,
                };

                if let Some(new_tier) = target {
                    let promoted = new_tier > tier;
                    profile.league = new_tier;
                    profile.rank = 1;
                    self.notifications
                        .notify(NotificationEvent::LeagueChanged {
                            user: profile.user.clone(),
                            league: new_tier.to_string(),
                            promoted,
                        })
                        .await;
                } else {
                    profile.rank = rank as u32;
                }
                // Next week's race starts from zero for everyone.
                profile.weekly_xp = 0;
                self.profiles.save_profile(profile).await?;
            }
        }

        info!(
            users = summary.users_processed,
            promoted = summary.promoted,
            demoted = summary.demoted,
            "weekly league reset"
        );
        Ok(summary)
    }

    /// Current standings of one tier, ranked by weekly XP.
    pub async fn standings(
        &self,
        tier: LeagueTier,
    ) -> Result<Vec<(u32, UserId, u64)>, EngineError> {
        let bucket = self.profiles.list_by_league(tier).await?;
        Ok(bucket
            .into_iter()
            .sorted_by(|a, b| {
                b.weekly_xp
                    .cmp(&a.weekly_xp)
                    .then_with(|| a.user.cmp(&b.user))
            })
            .enumerate()
            .map(|(index, profile)| (index as u32 + 1, profile.user, profile.weekly_xp))
            .collect())
    }
}
