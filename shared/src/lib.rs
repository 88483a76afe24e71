mod error;
mod node;
mod profile;
mod progress;

pub use error::*;
pub use node::*;
pub use profile::*;
pub use progress::*;

pub type UserId = String;
pub type NodeId = String;
pub type Subject = String;

/// XP required to advance from `level` to `level + 1`.
pub fn xp_for_level(level: u32) -> u64 {
    (100.0 * (level as f64).powf(1.5)).floor() as u64
}

/// Daily goal claim bonus: base 50 XP plus 5 per day of current streak.
pub fn daily_goal_bonus_xp(streak: u32) -> u64 {
    50 + streak as u64 * 5
}

/// One gem per full week of streak, minimum one.
pub fn daily_goal_bonus_gems(streak: u32) -> u64 {
    (streak / 7) as u64 + 1
}

/// Exponential moving average used for per-subject mastery.
pub fn blend_mastery(old: f64, score: f64) -> f64 {
    old * 0.7 + score * 0.3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_thresholds() {
        assert_eq!(xp_for_level(1), 100);
        assert_eq!(xp_for_level(2), 282);
        assert_eq!(xp_for_level(4), 800);
        assert!(xp_for_level(10) > xp_for_level(9));
    }

    #[test]
    fn daily_goal_bonuses() {
        assert_eq!(daily_goal_bonus_xp(0), 50);
        assert_eq!(daily_goal_bonus_xp(10), 100);
        assert_eq!(daily_goal_bonus_gems(0), 1);
        assert_eq!(daily_goal_bonus_gems(6), 1);
        assert_eq!(daily_goal_bonus_gems(7), 2);
        assert_eq!(daily_goal_bonus_gems(21), 4);
    }
}
