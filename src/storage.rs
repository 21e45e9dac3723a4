use crate::config::write_atomic;
use crate::error::StoreError;
use crate::model::{
    centre, draw_decay_interval, Feelings, PetState, Point, Rules, SaveFile, Status, SAVE_VERSION,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Deserialize;
use std::{fs, io, path::Path};
use tracing::info;

pub(crate) struct Loaded {
    pub(crate) pet: PetState,
    pub(crate) saved_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default = "first_version")]
    version: u32,
    saved_at: DateTime<Utc>,
    pet: serde_json::Value,
}

fn first_version() -> u32 {
    1
}

/// The record written before happiness, tiredness and the spam counters
/// existed. Early builds of v1 also lacked the pen fields.
#[derive(Deserialize)]
struct PetRecordV1 {
    name: String,
    hunger: i64,
    birth_time: DateTime<Utc>,
    feelings: Feelings,
    status: Status,
    last_activity_time: DateTime<Utc>,
    #[serde(default)]
    death_time: Option<DateTime<Utc>>,
    #[serde(default)]
    position: Option<Point>,
    #[serde(default)]
    boundary: Option<Point>,
}

fn migrate_v1<R: Rng + ?Sized>(
    old: PetRecordV1,
    default_boundary: Point,
    rules: &Rules,
    rng: &mut R,
) -> PetState {
    let boundary = old.boundary.unwrap_or(default_boundary);
    let mut pet = PetState {
        name: old.name,
        birth_time: old.birth_time,
        hunger: old.hunger.clamp(0, 100) as u8,
        happiness: rules.fresh_happiness.roll(rng).min(100) as u8,
        tiredness: 0,
        feelings: old.feelings,
        status: old.status,
        last_activity_time: old.last_activity_time,
        decay_interval_secs: draw_decay_interval(rules, rng),
        last_feed_time: None,
        last_play_time: None,
        feed_count: 0,
        play_count: 0,
        death_time: old.death_time,
        sleep_until: None,
        sick_until: None,
        position: old.position.unwrap_or_else(|| centre(boundary)),
        boundary,
    };
    pet.fit_to(boundary);
    pet
}

/// Reads the save file, upgrading older records to the current layout.
///
/// `Ok(None)` means there is no save yet. `default_boundary` fills in the pen
/// for records written before the pen was stored.
pub(crate) fn load<R: Rng + ?Sized>(
    path: &Path,
    default_boundary: Point,
    rules: &Rules,
    rng: &mut R,
) -> Result<Option<Loaded>, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let corrupt = |source: serde_json::Error| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    };

    let env: Envelope = serde_json::from_str(&raw).map_err(corrupt)?;
    let pet = match env.version {
        1 => {
            let old: PetRecordV1 = serde_json::from_value(env.pet).map_err(corrupt)?;
            info!(name = %old.name, "migrating v1 save");
            migrate_v1(old, default_boundary, rules, rng)
        }
        SAVE_VERSION => serde_json::from_value(env.pet).map_err(corrupt)?,
        version => {
            return Err(StoreError::UnsupportedVersion {
                path: path.to_path_buf(),
                version,
            })
        }
    };

    Ok(Some(Loaded {
        pet,
        saved_at: env.saved_at,
    }))
}

pub(crate) fn save_atomic(path: &Path, pet: &PetState, now: DateTime<Utc>) -> Result<()> {
    let save = SaveFile {
        version: SAVE_VERSION,
        saved_at: now,
        pet,
    };
    let data = serde_json::to_vec_pretty(&save)?;
    write_atomic(path, &data)
}
