use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NodeId, UserId};

/// Per-user, per-node progression state. Ordered: a record never moves
/// backwards through these states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Locked,
    Available,
    InProgress,
    Completed,
}

/// Quiz quality rating, 0 to 3 stars, derived from the score bands. The
/// range holds on every path in, including deserialization of stored
/// records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Default)]
#[serde(transparent)]
pub struct Stars(u8);

impl TryFrom<u8> for Stars {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= 3 {
            Ok(Stars(value))
        } else {
            Err(format!("stars value {value} is out of range 0..=3"))
        }
    }
}

impl<'de> Deserialize<'de> for Stars {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Stars::try_from(value).map_err(serde::de::Error::custom)
    }
}

impl Stars {
    pub const ZERO: Stars = Stars(0);
    pub const MAX: Stars = Stars(3);

    pub fn from_score(score: u32) -> Self {
        match score {
            90.. => Stars(3),
            75.. => Stars(2),
            60.. => Stars(1),
            _ => Stars(0),
        }
    }

    pub const fn count(self) -> u8 {
        self.0
    }

    /// XP multiplier applied to the node's base reward.
    pub const fn xp_multiplier(self) -> f64 {
        match self.0 {
            0 => 0.5,
            1 => 0.75,
            2 => 1.0,
            _ => 1.25,
        }
    }
}

/// One record per user x node, created on first interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user: UserId,
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub stars: Stars,
    pub best_score: u32,
    pub attempts: u32,
    pub completed_at: Option<DateTime<Utc>>,
    pub lesson_viewed: bool,
    pub lesson_viewed_at: Option<DateTime<Utc>>,
    pub lesson_time_spent_secs: u64,
}

impl ProgressRecord {
    pub fn new(user: UserId, node_id: NodeId, status: NodeStatus) -> Self {
        Self {
            user,
            node_id,
            status,
            stars: Stars::ZERO,
            best_score: 0,
            attempts: 0,
            completed_at: None,
            lesson_viewed: false,
            lesson_viewed_at: None,
            lesson_time_spent_secs: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == NodeStatus::Completed
    }

    /// Records an attempt. Score and stars are best-of across attempts and
    /// never regress; status always lands on Completed.
    pub fn record_attempt(&mut self, score: u32, now: DateTime<Utc>) {
        self.attempts += 1;
        self.best_score = self.best_score.max(score);
        self.stars = self.stars.max(Stars::from_score(score));
        self.status = NodeStatus::Completed;
        self.completed_at = Some(now);
    }

    pub fn record_lesson_view(&mut self, time_spent_secs: u64, now: DateTime<Utc>) {
        self.lesson_viewed = true;
        self.lesson_viewed_at = Some(now);
        self.lesson_time_spent_secs += time_spent_secs;
        if self.status < NodeStatus::InProgress {
            self.status = NodeStatus::InProgress;
        }
    }
}
