use crate::config::{data_paths, load_settings, save_settings_atomic, Paths, Settings};
use crate::input::{map_key, Key, KeySource, MenuChoice, TerminalKeys};
use crate::logging;
use crate::model::{PetState, Status};
use crate::render::{draw_frame, CellBuffer, Layout, Panel, Screen, Terminal, View, NAME_MAX};
use crate::sim::{catch_up, ActionOutcome, Command};
use crate::storage::{load, save_atomic};
use anyhow::Result;
use chrono::Utc;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

enum NameEntry {
    Named(String),
    Cancelled,
    Interrupted,
}

pub(crate) struct App<K, S, R> {
    settings: Settings,
    paths: Paths,
    keys: K,
    screen: S,
    rng: R,
    frame: CellBuffer,
    panel: Panel,
    message: Option<String>,
    autosave_at: Instant,
}

impl<K: KeySource, S: Screen, R: Rng> App<K, S, R> {
    pub(crate) fn new(settings: Settings, paths: Paths, keys: K, screen: S, rng: R) -> Self {
        let autosave_at = Instant::now() + Duration::from_secs(settings.autosave_secs);
        Self {
            settings,
            paths,
            keys,
            screen,
            rng,
            frame: CellBuffer::new(0, 0),
            panel: Panel::None,
            message: None,
            autosave_at,
        }
    }

    pub(crate) fn run(&mut self) -> Result<()> {
        let Some(pet) = self.open_pet()? else {
            info!("left before naming a pet");
            return Ok(());
        };
        self.session(pet)
    }

    /// Writes settings back so new keys show up in the file.
    pub(crate) fn finish(self) -> Result<()> {
        save_settings_atomic(&self.paths.settings_path, &self.settings)
    }

    fn tick(&self) -> Duration {
        Duration::from_millis(self.settings.tick_ms)
    }

    fn layout(&mut self) -> Result<Layout> {
        let (cols, rows) = self.screen.size()?;
        if cols != self.frame.w || rows != self.frame.h {
            debug!(cols, rows, "terminal resized");
            self.frame = CellBuffer::new(cols, rows);
        }
        Ok(Layout::new(cols, rows))
    }

    fn draw(&mut self, pet: Option<&PetState>) -> Result<()> {
        draw_frame(
            &mut self.frame,
            &View {
                pet,
                panel: &self.panel,
                message: self.message.as_deref(),
                color: self.settings.enable_color,
            },
        );
        self.screen.present(&self.frame)
    }

    fn save(&mut self, pet: &PetState) -> Result<()> {
        save_atomic(&self.paths.save_path, pet, Utc::now())?;
        self.autosave_at = Instant::now() + Duration::from_secs(self.settings.autosave_secs);
        Ok(())
    }

    fn open_pet(&mut self) -> Result<Option<PetState>> {
        let boundary = self.layout()?.boundary();
        match load(
            &self.paths.save_path,
            boundary,
            &self.settings.rules,
            &mut self.rng,
        ) {
            Ok(Some(loaded)) => {
                let mut pet = loaded.pet;
                pet.fit_to(boundary);
                info!(name = %pet.name, saved_at = %loaded.saved_at, "loaded pet");
                let now = Utc::now();
                let lost = catch_up(
                    &mut pet,
                    loaded.saved_at,
                    now,
                    &self.settings.rules,
                    &mut self.rng,
                );
                self.message = Some(match lost {
                    Some(loss) => format!(
                        "{} got hungry while you were away (-{loss} hunger).",
                        pet.name
                    ),
                    None => format!("Welcome back, {}!", pet.name),
                });
                return Ok(Some(pet));
            }
            Ok(None) => info!("no saved pet yet"),
            Err(e) => {
                warn!(error = %e, "discarding unreadable save");
                self.message = Some("Your saved pet could not be read; starting over.".into());
            }
        }

        match self.prompt_name("What do you want to name your DigiPal?", None)? {
            NameEntry::Named(name) => Ok(Some(self.hatch(&name)?)),
            NameEntry::Cancelled | NameEntry::Interrupted => Ok(None),
        }
    }

    fn hatch(&mut self, name: &str) -> Result<PetState> {
        let boundary = self.layout()?.boundary();
        let pet = PetState::new(
            name,
            Utc::now(),
            boundary,
            &self.settings.rules,
            &mut self.rng,
        );
        info!(name = %pet.name, happiness = pet.happiness, "new pet");
        self.save(&pet)?;
        Ok(pet)
    }

    /// Esc only cancels when there is a current pet to fall back to.
    fn prompt_name(
        &mut self,
        title: &'static str,
        current: Option<&PetState>,
    ) -> Result<NameEntry> {
        let mut name = String::new();
        let entry = loop {
            self.layout()?;
            self.panel = Panel::NamePrompt {
                title,
                name: name.clone(),
            };
            self.draw(current)?;

            let tick = self.tick();
            let Some(key) = self.keys.read_key(tick)? else {
                continue;
            };
            match key {
                Key::Interrupt => break NameEntry::Interrupted,
                Key::Esc if current.is_some() => break NameEntry::Cancelled,
                Key::Enter => {
                    let trimmed = name.trim();
                    if !trimmed.is_empty() {
                        break NameEntry::Named(trimmed.to_string());
                    }
                }
                Key::Backspace => {
                    name.pop();
                }
                Key::Char(ch) if !ch.is_control() && name.chars().count() < NAME_MAX => {
                    name.push(ch);
                }
                _ => {}
            }
        };
        self.panel = Panel::None;
        Ok(entry)
    }

    fn session(&mut self, mut pet: PetState) -> Result<()> {
        loop {
            let boundary = self.layout()?.boundary();
            if boundary != pet.boundary {
                pet.fit_to(boundary);
            }

            let before = (pet.hunger, pet.status);
            pet.advance(Utc::now(), &self.settings.rules, &mut self.rng);
            self.draw(Some(&pet))?;

            if before != (pet.hunger, pet.status) || Instant::now() >= self.autosave_at {
                self.save(&pet)?;
            }

            let tick = self.tick();
            let Some(key) = self.keys.read_key(tick)? else {
                continue;
            };

            // any key closes the info panel
            if self.panel != Panel::None && key != Key::Interrupt {
                self.panel = Panel::None;
                continue;
            }

            let now = Utc::now();
            match map_key(key) {
                MenuChoice::Info => self.panel = Panel::Info(pet.info(now).to_string()),
                MenuChoice::Act(cmd) => {
                    let outcome = pet.apply(cmd, now, &self.settings.rules, &mut self.rng);
                    self.message = Some(describe(cmd, outcome, &pet));
                }
                MenuChoice::NewPet => {
                    let title = "What do you want to name your new DigiPal?";
                    match self.prompt_name(title, Some(&pet))? {
                        NameEntry::Named(name) => {
                            info!(old = %pet.name, new = %name, "replacing pet");
                            pet = self.hatch(&name)?;
                            self.message = Some(format!("Say hello to {}!", pet.name));
                        }
                        NameEntry::Cancelled => {}
                        NameEntry::Interrupted => break,
                    }
                }
                MenuChoice::Quit => break,
                MenuChoice::Invalid => {
                    self.message = Some("Invalid option. Please choose a valid option.".into());
                }
            }

            self.save(&pet)?;
        }

        self.save(&pet)?;
        info!(name = %pet.name, "game saved and exited");
        Ok(())
    }
}

fn describe(cmd: Command, outcome: ActionOutcome, pet: &PetState) -> String {
    let name = &pet.name;
    match (cmd, outcome) {
        (_, ActionOutcome::Ignored) if pet.status == Status::Dead => {
            format!("{name} is no longer with us. Press 5 for a new pet.")
        }
        (_, ActionOutcome::Ignored) if pet.status == Status::Sleeping => {
            format!("{name} is sleeping. Shh!")
        }
        (Command::Sleep, ActionOutcome::Ignored) => format!("{name} isn't tired yet."),
        (_, ActionOutcome::Ignored) => format!("{name} ignores you."),
        (Command::Feed, ActionOutcome::Applied) => format!("{name} munches happily."),
        (Command::Feed, ActionOutcome::Overdone) => format!("{name} is stuffed! Too much food."),
        (Command::Play, ActionOutcome::Applied) => format!("{name} bounces around."),
        (Command::Play, ActionOutcome::Overdone) => format!("{name} is overexcited and worn out."),
        (Command::Sleep, _) => format!("{name} curls up for a nap."),
    }
}

pub(crate) fn run() -> Result<()> {
    let paths = data_paths()?;
    let settings = load_settings(&paths.settings_path);
    logging::init(&paths.log_path, &settings.log_filter)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting");

    let screen = Terminal::begin()?;
    let mut app = App::new(settings, paths, TerminalKeys, screen, StdRng::from_entropy());
    app.run()?;
    app.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Rules;
    use std::{collections::VecDeque, fs, path::PathBuf};
    use tempfile::TempDir;

    /// Replays keys, then interrupts once the script runs out.
    struct ScriptedKeys(VecDeque<Key>);

    impl ScriptedKeys {
        fn new(keys: &[Key]) -> Self {
            Self(keys.iter().copied().collect())
        }
    }

    impl KeySource for ScriptedKeys {
        fn read_key(&mut self, _timeout: Duration) -> Result<Option<Key>> {
            Ok(Some(self.0.pop_front().unwrap_or(Key::Interrupt)))
        }
    }

    #[derive(Default)]
    struct MemScreen {
        frames: Vec<String>,
    }

    impl MemScreen {
        fn saw(&self, needle: &str) -> bool {
            self.frames.iter().any(|f| f.contains(needle))
        }
    }

    impl Screen for MemScreen {
        fn size(&mut self) -> Result<(u16, u16)> {
            Ok((80, 24))
        }

        fn present(&mut self, frame: &CellBuffer) -> Result<()> {
            let text = (0..frame.h)
                .map(|y| frame.row_text(y))
                .collect::<Vec<_>>()
                .join("\n");
            self.frames.push(text);
            Ok(())
        }
    }

    fn typed(s: &str) -> Vec<Key> {
        s.chars().map(Key::Char).collect()
    }

    fn app_in(temp: &TempDir, keys: Vec<Key>) -> App<ScriptedKeys, MemScreen, StdRng> {
        App::new(
            Settings::default(),
            Paths::in_dir(temp.path()),
            ScriptedKeys::new(&keys),
            MemScreen::default(),
            StdRng::seed_from_u64(99),
        )
    }

    fn saved_pet(temp: &TempDir) -> PetState {
        let mut rng = StdRng::seed_from_u64(0);
        load(
            &Paths::in_dir(temp.path()).save_path,
            (1, 1),
            &Settings::default().rules,
            &mut rng,
        )
        .unwrap()
        .unwrap()
        .pet
    }

    fn seed_save(temp: &TempDir, name: &str) {
        let mut rng = StdRng::seed_from_u64(5);
        let pet = PetState::new(
            name,
            Utc::now(),
            (10, 5),
            &Settings::default().rules,
            &mut rng,
        );
        save_atomic(&Paths::in_dir(temp.path()).save_path, &pet, Utc::now()).unwrap();
    }

    #[test]
    fn first_run_names_feeds_and_saves() {
        let temp = TempDir::new().unwrap();
        let mut keys = typed("Rex");
        keys.extend([Key::Enter, Key::Char('2'), Key::Interrupt]);

        let mut app = app_in(&temp, keys);
        app.run().unwrap();

        let pet = saved_pet(&temp);
        assert_eq!(pet.name, "Rex");
        assert_eq!(pet.feed_count, 1);
        assert!((55..=70).contains(&pet.hunger));
        assert!(app.screen.saw("What do you want to name your DigiPal?"));
        assert!(app.screen.saw("Rex munches happily."));
    }

    #[test]
    fn invalid_key_shows_error_and_keeps_going() {
        let temp = TempDir::new().unwrap();
        let mut keys = typed("Ace");
        keys.extend([Key::Enter, Key::Char('9'), Key::Char('3'), Key::Char('6')]);

        let mut app = app_in(&temp, keys);
        app.run().unwrap();

        assert!(app.screen.saw("Invalid option. Please choose a valid option."));
        assert_eq!(saved_pet(&temp).play_count, 1);
    }

    #[test]
    fn corrupt_save_starts_over() {
        let temp = TempDir::new().unwrap();
        fs::write(Paths::in_dir(temp.path()).save_path, b"not a pet").unwrap();
        let mut keys = typed("Bo");
        keys.extend([Key::Enter, Key::Char('6')]);

        let mut app = app_in(&temp, keys);
        app.run().unwrap();

        assert!(app.screen.saw("could not be read"));
        assert_eq!(saved_pet(&temp).name, "Bo");
    }

    #[test]
    fn existing_pet_loads_and_shows_info() {
        let temp = TempDir::new().unwrap();
        seed_save(&temp, "Rex");

        let mut app = app_in(&temp, vec![Key::Char('1'), Key::Char('x'), Key::Char('6')]);
        app.run().unwrap();

        assert!(app.screen.saw("Welcome back, Rex!"));
        assert!(app.screen.saw("Pet info"));
        assert!(app.screen.saw("Name: Rex"));
        assert!(!app.screen.saw("Invalid option"));
    }

    #[test]
    fn new_pet_replaces_old_one() {
        let temp = TempDir::new().unwrap();
        seed_save(&temp, "Rex");
        let mut keys = vec![Key::Char('5')];
        keys.extend(typed("Mo"));
        keys.extend([Key::Enter, Key::Char('6')]);

        let mut app = app_in(&temp, keys);
        app.run().unwrap();

        assert_eq!(saved_pet(&temp).name, "Mo");
    }

    #[test]
    fn escape_keeps_current_pet() {
        let temp = TempDir::new().unwrap();
        seed_save(&temp, "Rex");

        let keys = vec![Key::Char('5'), Key::Char('Z'), Key::Esc, Key::Char('6')];
        let mut app = app_in(&temp, keys);
        app.run().unwrap();

        assert_eq!(saved_pet(&temp).name, "Rex");
    }

    #[test]
    fn interrupt_before_naming_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let mut app = app_in(&temp, vec![Key::Char('Q'), Key::Interrupt]);
        app.run().unwrap();

        assert!(!Paths::in_dir(temp.path()).save_path.exists());
    }

    /// Reads the save file at the first key request, then quits.
    struct DiskCheckKeys {
        save_path: PathBuf,
        on_disk: Option<PetState>,
    }

    impl KeySource for DiskCheckKeys {
        fn read_key(&mut self, _timeout: Duration) -> Result<Option<Key>> {
            let mut rng = StdRng::seed_from_u64(0);
            let loaded = load(&self.save_path, (1, 1), &Rules::default(), &mut rng)?;
            self.on_disk = loaded.map(|l| l.pet);
            Ok(Some(Key::Interrupt))
        }
    }

    #[test]
    fn status_change_on_a_tick_is_saved_straight_away() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::in_dir(temp.path());
        let mut rng = StdRng::seed_from_u64(5);
        let mut pet = PetState::new("Rex", Utc::now(), (10, 5), &Rules::default(), &mut rng);
        pet.tiredness = 100;
        save_atomic(&paths.save_path, &pet, Utc::now()).unwrap();

        let keys = DiskCheckKeys {
            save_path: paths.save_path.clone(),
            on_disk: None,
        };
        let mut app = App::new(
            Settings::default(),
            paths,
            keys,
            MemScreen::default(),
            StdRng::seed_from_u64(99),
        );
        app.run().unwrap();

        let on_disk = app.keys.on_disk.unwrap();
        assert_eq!(on_disk.status, Status::Sleeping);
        assert_eq!(on_disk.tiredness, 0);
    }

    #[test]
    fn finish_writes_settings() {
        let temp = TempDir::new().unwrap();
        let app = app_in(&temp, vec![]);
        app.finish().unwrap();
        assert!(Paths::in_dir(temp.path()).settings_path.exists());
    }

    #[test]
    fn describe_explains_ignored_commands() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut pet = PetState::new(
            "Rex",
            Utc::now(),
            (10, 5),
            &Settings::default().rules,
            &mut rng,
        );
        assert_eq!(
            describe(Command::Sleep, ActionOutcome::Ignored, &pet),
            "Rex isn't tired yet."
        );
        pet.status = Status::Sleeping;
        assert_eq!(
            describe(Command::Feed, ActionOutcome::Ignored, &pet),
            "Rex is sleeping. Shh!"
        );
        pet.status = Status::Dead;
        assert!(describe(Command::Play, ActionOutcome::Ignored, &pet).contains("no longer"));
    }
}
