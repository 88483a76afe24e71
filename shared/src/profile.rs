use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use super::{xp_for_level, Subject, UserId};

/// Weekly competitive cohorts, lowest to highest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeagueTier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Sapphire,
    Ruby,
    Diamond,
}

impl LeagueTier {
    /// Next tier up, or None at the top.
    pub const fn promoted(self) -> Option<Self> {
        match self {
            Self::Bronze => Some(Self::Silver),
            Self::Silver => Some(Self::Gold),
            Self::Gold => Some(Self::Sapphire),
            Self::Sapphire => Some(Self::Ruby),
            Self::Ruby => Some(Self::Diamond),
            Self::Diamond => None,
        }
    }

    /// Previous tier down, or None at the bottom.
    pub const fn demoted(self) -> Option<Self> {
        match self {
            Self::Bronze => None,
            Self::Silver => Some(Self::Bronze),
            Self::Gold => Some(Self::Silver),
            Self::Sapphire => Some(Self::Gold),
            Self::Ruby => Some(Self::Sapphire),
            Self::Diamond => Some(Self::Ruby),
        }
    }
}

/// Per-user gamification state: lifetime XP, level progression, streaks,
/// daily goal, league standing, gems and per-subject mastery.
///
/// At rest `xp_in_level < xp_for_next_level`; overflow rolls into level-ups
/// and level only ever increases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamificationProfile {
    pub user: UserId,
    pub xp: u64,
    pub level: u32,
    pub xp_in_level: u64,
    pub xp_for_next_level: u64,
    pub gems: u64,
    pub streak: u32,
    pub best_streak: u32,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub daily_goal_xp: u64,
    pub daily_goal_progress: u64,
    pub daily_goal_met: bool,
    pub daily_goal_claimed: bool,
    pub league: LeagueTier,
    pub weekly_xp: u64,
    pub rank: u32,
    pub mastery: BTreeMap<Subject, f64>,
    /// Achievement ids already granted, so re-evaluation never double-pays.
    pub earned_achievements: BTreeSet<String>,
}

impl GamificationProfile {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            xp: 0,
            level: 1,
            xp_in_level: 0,
            xp_for_next_level: xp_for_level(1),
            gems: 0,
            streak: 0,
            best_streak: 0,
            last_activity_at: None,
            daily_goal_xp: 50,
            daily_goal_progress: 0,
            daily_goal_met: false,
            daily_goal_claimed: false,
            league: LeagueTier::default(),
            weekly_xp: 0,
            rank: 1,
            mastery: BTreeMap::new(),
            earned_achievements: BTreeSet::new(),
        }
    }

    pub fn mastery_for(&self, subject: &str) -> f64 {
        self.mastery.get(subject).copied().unwrap_or(0.0)
    }

    /// Called by the daily scheduler at local midnight.
    pub fn reset_daily_goal(&mut self) {
        self.daily_goal_progress = 0;
        self.daily_goal_met = false;
        self.daily_goal_claimed = false;
    }
}
