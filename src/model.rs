use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub(crate) const SAVE_VERSION: u32 = 2;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) enum Status {
    Healthy,
    Unhealthy,
    Tired,
    Sleeping,
    Refreshed,
    Overfed,
    Dead,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Healthy => "Healthy",
            Status::Unhealthy => "Unhealthy",
            Status::Tired => "Tired",
            Status::Sleeping => "Sleeping",
            Status::Refreshed => "Refreshed",
            Status::Overfed => "Over-fed",
            Status::Dead => "Dead",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) enum Feelings {
    Happy,
    Full,
    Okay,
    Hungry,
    Overfed,
    Overjoyed,
}

impl fmt::Display for Feelings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Inclusive integer range a rule rolls from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) lo: u32,
    pub(crate) hi: u32,
}

impl Span {
    pub(crate) const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    pub(crate) fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        rng.gen_range(self.lo..=self.hi.max(self.lo))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Rules {
    pub(crate) spam_window_secs: i64, // 30s
    pub(crate) spam_limit: u32,       // 4th action in the window is overuse
    pub(crate) grace_secs: i64,       // 5 minutes at hunger 0 before death
    pub(crate) sleep_secs: i64,
    pub(crate) sleep_threshold: u8, // 100, or 90 for the light-sleeper variant
    pub(crate) tired_threshold: u8,
    pub(crate) unhealthy_at: u8,
    pub(crate) hungry_at: u8,
    pub(crate) decay_interval_mins: Span,
    pub(crate) hunger_decay: Span,
    pub(crate) feed_gain: Span,
    pub(crate) overfeed_gain: Span,
    pub(crate) play_joy: Span,
    pub(crate) overplay_joy: Span,
    pub(crate) play_tire: Span,
    pub(crate) overuse_tire: u32,
    pub(crate) overuse_sick_chance: f64,
    pub(crate) fresh_happiness: Span,
    pub(crate) offline_after_secs: i64,
    pub(crate) offline_hunger: Span,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            spam_window_secs: 30,
            spam_limit: 3,
            grace_secs: 5 * 60,
            sleep_secs: 30,
            sleep_threshold: 100,
            tired_threshold: 70,
            unhealthy_at: 40,
            hungry_at: 20,
            decay_interval_mins: Span::new(1, 5),
            hunger_decay: Span::new(1, 5),
            feed_gain: Span::new(5, 20),
            overfeed_gain: Span::new(1, 5),
            play_joy: Span::new(5, 35),
            overplay_joy: Span::new(1, 5),
            play_tire: Span::new(1, 10),
            overuse_tire: 35,
            overuse_sick_chance: 0.1,
            fresh_happiness: Span::new(50, 75),
            offline_after_secs: 3600,
            offline_hunger: Span::new(20, 60),
        }
    }
}

const DAY_SECS: i64 = 24 * 60 * 60;

impl Rules {
    /// Pulls hand-edited values back into ranges the clock arithmetic can take.
    pub(crate) fn clamped(mut self) -> Self {
        self.spam_window_secs = self.spam_window_secs.clamp(1, DAY_SECS);
        self.grace_secs = self.grace_secs.clamp(0, 30 * DAY_SECS);
        self.sleep_secs = self.sleep_secs.clamp(1, DAY_SECS);
        self.offline_after_secs = self.offline_after_secs.clamp(0, 365 * DAY_SECS);
        self.decay_interval_mins = Span::new(
            self.decay_interval_mins.lo.clamp(1, 24 * 60),
            self.decay_interval_mins.hi.clamp(1, 24 * 60),
        );
        self
    }
}

/// Cell coordinates inside the pen, `(x, y)`.
pub(crate) type Point = (u16, u16);

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct PetState {
    pub(crate) name: String,
    pub(crate) birth_time: DateTime<Utc>,
    pub(crate) hunger: u8,
    pub(crate) happiness: u8,
    pub(crate) tiredness: u8,
    pub(crate) feelings: Feelings,
    pub(crate) status: Status,
    pub(crate) last_activity_time: DateTime<Utc>,
    pub(crate) decay_interval_secs: i64,
    pub(crate) last_feed_time: Option<DateTime<Utc>>,
    pub(crate) last_play_time: Option<DateTime<Utc>>,
    pub(crate) feed_count: u32,
    pub(crate) play_count: u32,
    pub(crate) death_time: Option<DateTime<Utc>>,
    pub(crate) sleep_until: Option<DateTime<Utc>>,
    /// End of a sickness caught from overuse.
    #[serde(default)]
    pub(crate) sick_until: Option<DateTime<Utc>>,
    pub(crate) position: Point,
    pub(crate) boundary: Point,
}

impl PetState {
    pub(crate) fn new<R: Rng + ?Sized>(
        name: &str,
        now: DateTime<Utc>,
        boundary: Point,
        rules: &Rules,
        rng: &mut R,
    ) -> Self {
        Self {
            name: name.to_string(),
            birth_time: now,
            hunger: 50,
            happiness: rules.fresh_happiness.roll(rng).min(100) as u8,
            tiredness: 0,
            feelings: Feelings::Happy,
            status: Status::Healthy,
            last_activity_time: now,
            decay_interval_secs: draw_decay_interval(rules, rng),
            last_feed_time: None,
            last_play_time: None,
            feed_count: 0,
            play_count: 0,
            death_time: None,
            sleep_until: None,
            sick_until: None,
            position: centre(boundary),
            boundary,
        }
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.status == Status::Dead
    }

    /// Shrinks or grows the pen, pulling the pet back inside it.
    pub(crate) fn fit_to(&mut self, boundary: Point) {
        self.boundary = boundary;
        self.position = (
            self.position.0.min(boundary.0),
            self.position.1.min(boundary.1),
        );
    }
}

pub(crate) fn centre(boundary: Point) -> Point {
    (boundary.0 / 2, boundary.1 / 2)
}

pub(crate) fn draw_decay_interval<R: Rng + ?Sized>(rules: &Rules, rng: &mut R) -> i64 {
    i64::from(rules.decay_interval_mins.roll(rng)) * 60
}

/// Moves a vital by `delta`, saturating at both ends of 0..=100.
pub(crate) fn nudge(value: u8, delta: i64) -> u8 {
    (i64::from(value) + delta).clamp(0, 100) as u8
}

/// The on-disk record as written; reading goes through `storage::load`.
#[derive(Debug, Serialize)]
pub(crate) struct SaveFile<'a> {
    pub(crate) version: u32,
    pub(crate) saved_at: DateTime<Utc>,
    pub(crate) pet: &'a PetState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn new_pet_starts_half_full_and_content() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = Utc::now();
        let pet = PetState::new("Rex", now, (40, 10), &Rules::default(), &mut rng);

        assert_eq!(pet.name, "Rex");
        assert_eq!(pet.hunger, 50);
        assert!((50..=75).contains(&pet.happiness));
        assert_eq!(pet.tiredness, 0);
        assert_eq!(pet.status, Status::Healthy);
        assert_eq!(pet.feelings, Feelings::Happy);
        assert_eq!(pet.position, (20, 5));
        assert!((60..=300).contains(&pet.decay_interval_secs));
        assert_eq!(pet.birth_time, now);
    }

    #[test]
    fn fit_to_pulls_pet_inside_smaller_pen() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut pet = PetState::new("Rex", Utc::now(), (40, 20), &Rules::default(), &mut rng);
        pet.position = (39, 19);
        pet.fit_to((10, 4));
        assert_eq!(pet.position, (10, 4));
        assert_eq!(pet.boundary, (10, 4));
    }

    #[test]
    fn overfed_status_prints_with_hyphen() {
        assert_eq!(Status::Overfed.to_string(), "Over-fed");
        assert_eq!(Feelings::Overjoyed.to_string(), "Overjoyed");
    }

    #[test]
    fn partial_rules_fill_from_defaults() {
        let rules: Rules = serde_json::from_str(r#"{ "sleep_threshold": 90 }"#).unwrap();
        assert_eq!(rules.sleep_threshold, 90);
        assert_eq!(rules.spam_window_secs, 30);
        assert_eq!(rules.feed_gain, Span::new(5, 20));
    }

    #[test]
    fn clamped_rules_tame_huge_durations() {
        let rules = Rules {
            spam_window_secs: i64::MAX,
            grace_secs: -5,
            sleep_secs: i64::MAX,
            offline_after_secs: i64::MIN,
            decay_interval_mins: Span::new(0, u32::MAX),
            ..Rules::default()
        }
        .clamped();

        assert_eq!(rules.spam_window_secs, DAY_SECS);
        assert_eq!(rules.grace_secs, 0);
        assert_eq!(rules.sleep_secs, DAY_SECS);
        assert_eq!(rules.offline_after_secs, 0);
        assert_eq!(rules.decay_interval_mins, Span::new(1, 24 * 60));
        assert_eq!(Rules::default().clamped().sleep_secs, 30);
    }

    proptest! {
        #[test]
        fn nudge_stays_in_bounds(value in 0u8..=100, delta in any::<i32>()) {
            let out = nudge(value, i64::from(delta));
            prop_assert!(out <= 100);
        }

        #[test]
        fn span_roll_stays_in_range(lo in 0u32..50, width in 0u32..50, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let span = Span::new(lo, lo + width);
            let v = span.roll(&mut rng);
            prop_assert!(v >= lo && v <= lo + width);
        }
    }
}
