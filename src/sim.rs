use crate::model::{draw_decay_interval, nudge, Feelings, PetState, Rules, Status};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Feed,
    Play,
    Sleep,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ActionOutcome {
    Applied,
    /// Too many of the same action inside the spam window.
    Overdone,
    Ignored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Derived {
    pub(crate) status: Status,
    pub(crate) feelings: Feelings,
}

fn within_window(last: Option<DateTime<Utc>>, now: DateTime<Utc>, window_secs: i64) -> bool {
    last.is_some_and(|t| now - t <= ChronoDuration::seconds(window_secs))
}

fn bump_count(count: u32, last: Option<DateTime<Utc>>, now: DateTime<Utc>, rules: &Rules) -> u32 {
    if within_window(last, now, rules.spam_window_secs) {
        count.saturating_add(1)
    } else {
        1
    }
}

fn is_overfed(pet: &PetState, now: DateTime<Utc>, rules: &Rules) -> bool {
    pet.feed_count > rules.spam_limit
        && within_window(pet.last_feed_time, now, rules.spam_window_secs)
}

fn is_overplayed(pet: &PetState, now: DateTime<Utc>, rules: &Rules) -> bool {
    pet.play_count > rules.spam_limit
        && within_window(pet.last_play_time, now, rules.spam_window_secs)
}

/// Computes the status and feelings the pet should have at `now`.
///
/// Pure: side effects of entering a state (sleep timer, happiness reset,
/// halving) are applied by [`PetState::settle`] when the status changes.
pub(crate) fn derive(pet: &PetState, now: DateTime<Utc>, rules: &Rules) -> Derived {
    let starved = pet.hunger == 0
        && pet
            .death_time
            .is_some_and(|t| now - t >= ChronoDuration::seconds(rules.grace_secs));
    if pet.is_dead() || starved {
        return Derived {
            status: Status::Dead,
            feelings: pet.feelings,
        };
    }

    let overfed = is_overfed(pet, now, rules);
    let overplayed = is_overplayed(pet, now, rules);

    let status = if pet.status == Status::Sleeping {
        match pet.sleep_until {
            Some(t) if now < t => Status::Sleeping,
            _ => Status::Refreshed,
        }
    } else if pet.tiredness >= rules.sleep_threshold {
        Status::Sleeping
    } else if pet.sick_until.is_some_and(|t| now <= t) {
        Status::Unhealthy
    } else if pet.hunger <= rules.unhealthy_at {
        Status::Unhealthy
    } else if pet.tiredness >= rules.tired_threshold {
        Status::Tired
    } else if pet.hunger >= 100 {
        Status::Overfed
    } else {
        Status::Healthy
    };

    let feelings = if overfed {
        Feelings::Overfed
    } else if overplayed {
        Feelings::Overjoyed
    } else if pet.hunger <= rules.hungry_at {
        Feelings::Hungry
    } else if pet.hunger <= rules.unhealthy_at {
        Feelings::Okay
    } else {
        Feelings::Full
    };

    Derived { status, feelings }
}

impl PetState {
    pub(crate) fn apply<R: Rng + ?Sized>(
        &mut self,
        cmd: Command,
        now: DateTime<Utc>,
        rules: &Rules,
        rng: &mut R,
    ) -> ActionOutcome {
        let outcome = match cmd {
            Command::Feed => self.feed(now, rules, rng),
            Command::Play => self.play(now, rules, rng),
            Command::Sleep => self.sleep(now, rules, rng),
        };
        debug!(?cmd, ?outcome, hunger = self.hunger, status = %self.status, "command applied");
        outcome
    }

    /// One tick of the clock: hunger decay, wandering, then re-derivation.
    pub(crate) fn advance<R: Rng + ?Sized>(
        &mut self,
        now: DateTime<Utc>,
        rules: &Rules,
        rng: &mut R,
    ) {
        if self.is_dead() {
            return;
        }

        let interval = ChronoDuration::seconds(self.decay_interval_secs.clamp(0, 24 * 60 * 60));
        if now - self.last_activity_time >= interval {
            let loss = rules.hunger_decay.roll(rng);
            self.hunger = nudge(self.hunger, -i64::from(loss));
            self.last_activity_time = now;
            self.decay_interval_secs = draw_decay_interval(rules, rng);
            debug!(loss, hunger = self.hunger, next_in = self.decay_interval_secs, "hunger decayed");
        }

        if self.status != Status::Sleeping {
            self.wander(rng);
        }

        self.settle(now, rules, rng);
    }

    pub(crate) fn feed<R: Rng + ?Sized>(
        &mut self,
        now: DateTime<Utc>,
        rules: &Rules,
        rng: &mut R,
    ) -> ActionOutcome {
        if matches!(self.status, Status::Dead | Status::Sleeping) {
            return ActionOutcome::Ignored;
        }

        self.feed_count = bump_count(self.feed_count, self.last_feed_time, now, rules);
        self.last_feed_time = Some(now);

        let outcome = if self.feed_count > rules.spam_limit {
            let gain = rules.overfeed_gain.roll(rng);
            self.hunger = nudge(self.hunger, i64::from(gain));
            self.tiredness = nudge(self.tiredness, i64::from(rules.overuse_tire));
            self.maybe_fall_ill(now, rules, rng);
            ActionOutcome::Overdone
        } else {
            let gain = rules.feed_gain.roll(rng);
            self.hunger = nudge(self.hunger, i64::from(gain));
            ActionOutcome::Applied
        };

        self.settle(now, rules, rng);
        outcome
    }

    pub(crate) fn play<R: Rng + ?Sized>(
        &mut self,
        now: DateTime<Utc>,
        rules: &Rules,
        rng: &mut R,
    ) -> ActionOutcome {
        if matches!(self.status, Status::Dead | Status::Sleeping) {
            return ActionOutcome::Ignored;
        }

        self.play_count = bump_count(self.play_count, self.last_play_time, now, rules);
        self.last_play_time = Some(now);

        let outcome = if self.play_count > rules.spam_limit {
            let joy = rules.overplay_joy.roll(rng);
            self.happiness = nudge(self.happiness, i64::from(joy));
            self.tiredness = nudge(self.tiredness, i64::from(rules.overuse_tire));
            self.maybe_fall_ill(now, rules, rng);
            ActionOutcome::Overdone
        } else {
            let joy = rules.play_joy.roll(rng);
            let tire = rules.play_tire.roll(rng);
            self.happiness = nudge(self.happiness, i64::from(joy));
            self.tiredness = nudge(self.tiredness, i64::from(tire));
            ActionOutcome::Applied
        };

        self.settle(now, rules, rng);
        outcome
    }

    /// Puts a tired pet to bed. Any other status ignores the request.
    pub(crate) fn sleep<R: Rng + ?Sized>(
        &mut self,
        now: DateTime<Utc>,
        rules: &Rules,
        rng: &mut R,
    ) -> ActionOutcome {
        if self.status != Status::Tired {
            return ActionOutcome::Ignored;
        }
        self.fall_asleep(now, rules);
        self.settle(now, rules, rng);
        ActionOutcome::Applied
    }

    /// Re-derives status and feelings, applying the side effects of any
    /// status change.
    pub(crate) fn settle<R: Rng + ?Sized>(
        &mut self,
        now: DateTime<Utc>,
        rules: &Rules,
        rng: &mut R,
    ) {
        if self.is_dead() {
            return;
        }

        if self.hunger == 0 {
            if self.death_time.is_none() {
                warn!(name = %self.name, "hunger reached zero, grace window started");
                self.death_time = Some(now);
            }
        } else if self.death_time.take().is_some() {
            info!(name = %self.name, "fed before the grace window ran out");
        }

        if self.sick_until.is_some_and(|t| now > t) {
            self.sick_until = None;
        }

        let next = derive(self, now, rules);
        if next.status != self.status {
            match next.status {
                Status::Dead => info!(name = %self.name, "pet died of hunger"),
                Status::Sleeping => self.fall_asleep(now, rules),
                Status::Refreshed => {
                    self.sleep_until = None;
                    self.happiness = rules.fresh_happiness.roll(rng).min(100) as u8;
                }
                Status::Overfed => self.happiness /= 2,
                _ => {}
            }
            debug!(from = %self.status, to = %next.status, "status changed");
        }
        self.status = next.status;
        self.feelings = next.feelings;
    }

    fn fall_asleep(&mut self, now: DateTime<Utc>, rules: &Rules) {
        self.status = Status::Sleeping;
        self.sleep_until = Some(now + ChronoDuration::seconds(rules.sleep_secs));
        self.tiredness = 0;
    }

    /// A sickness caught here lasts until the spam window closes.
    fn maybe_fall_ill<R: Rng + ?Sized>(
        &mut self,
        now: DateTime<Utc>,
        rules: &Rules,
        rng: &mut R,
    ) {
        if rng.gen_bool(rules.overuse_sick_chance.clamp(0.0, 1.0)) {
            self.sick_until = Some(now + ChronoDuration::seconds(rules.spam_window_secs));
            debug!(name = %self.name, "caught a sickness from overuse");
        }
    }

    fn wander<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.position = (
            rng.gen_range(0..=self.boundary.0),
            rng.gen_range(0..=self.boundary.1),
        );
    }

    pub(crate) fn info(&self, now: DateTime<Utc>) -> PetInfo<'_> {
        PetInfo {
            name: &self.name,
            born: self.birth_time,
            age_days: (now - self.birth_time).num_days().max(0),
            hunger: self.hunger,
            happiness: self.happiness,
            tiredness: self.tiredness,
            feelings: self.feelings,
            status: self.status,
            feed_count: self.feed_count,
            play_count: self.play_count,
            wakes_in: self.sleep_until.map(|t| (t - now).num_seconds().max(0)),
            starving_for: self.death_time.map(|t| (now - t).num_seconds().max(0)),
        }
    }
}

/// Everything the info screen shows about a pet.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PetInfo<'a> {
    pub(crate) name: &'a str,
    pub(crate) born: DateTime<Utc>,
    pub(crate) age_days: i64,
    pub(crate) hunger: u8,
    pub(crate) happiness: u8,
    pub(crate) tiredness: u8,
    pub(crate) feelings: Feelings,
    pub(crate) status: Status,
    pub(crate) feed_count: u32,
    pub(crate) play_count: u32,
    pub(crate) wakes_in: Option<i64>,
    pub(crate) starving_for: Option<i64>,
}

impl fmt::Display for PetInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Date of Birth: {}", self.born.format("%Y-%m-%d"))?;
        writeln!(f, "Age: {} days", self.age_days)?;
        writeln!(f, "Hunger: {}", self.hunger)?;
        writeln!(f, "Happiness: {}", self.happiness)?;
        writeln!(f, "Tiredness: {}", self.tiredness)?;
        writeln!(f, "Feelings: {}", self.feelings)?;
        writeln!(f, "Status: {}", self.status)?;
        write!(f, "Fed {}x / played {}x recently", self.feed_count, self.play_count)?;
        if let Some(secs) = self.wakes_in {
            write!(f, "\nWakes in {secs}s")?;
        }
        if let Some(secs) = self.starving_for {
            write!(f, "\nStarving for {secs}s")?;
        }
        Ok(())
    }
}

/// Applies the hunger lost while the game was closed.
///
/// Returns the amount lost, or `None` when the absence was too short to
/// matter or the pet is already dead.
pub(crate) fn catch_up<R: Rng + ?Sized>(
    pet: &mut PetState,
    saved_at: DateTime<Utc>,
    now: DateTime<Utc>,
    rules: &Rules,
    rng: &mut R,
) -> Option<u32> {
    if pet.is_dead() || now - saved_at <= ChronoDuration::seconds(rules.offline_after_secs) {
        return None;
    }

    let loss = rules.offline_hunger.roll(rng);
    pet.hunger = nudge(pet.hunger, -i64::from(loss));
    pet.last_activity_time = now;
    pet.settle(now, rules, rng);
    info!(
        away_mins = (now - saved_at).num_minutes(),
        loss,
        hunger = pet.hunger,
        "caught up after absence"
    );
    Some(loss)
}
