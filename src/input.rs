use crate::sim::Command;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Key {
    Char(char),
    Enter,
    Backspace,
    Esc,
    /// Ctrl-C. Raw mode swallows SIGINT, so the interrupt arrives as a key.
    Interrupt,
}

/// Where single key presses come from.
pub(crate) trait KeySource {
    /// Waits up to `timeout` for one key press.
    fn read_key(&mut self, timeout: Duration) -> anyhow::Result<Option<Key>>;
}

/// Reads keys from the raw-mode terminal.
pub(crate) struct TerminalKeys;

impl KeySource for TerminalKeys {
    fn read_key(&mut self, timeout: Duration) -> anyhow::Result<Option<Key>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        let Event::Key(k) = event::read()? else {
            return Ok(None);
        };
        if k.kind != KeyEventKind::Press {
            return Ok(None);
        }
        let key = match k.code {
            KeyCode::Char('c') | KeyCode::Char('C')
                if k.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                Key::Interrupt
            }
            KeyCode::Char(ch) => Key::Char(ch),
            KeyCode::Enter => Key::Enter,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Esc => Key::Esc,
            _ => return Ok(None),
        };
        Ok(Some(key))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MenuChoice {
    Info,
    Act(Command),
    NewPet,
    Quit,
    Invalid,
}

pub(crate) const MENU: &str = "1 info | 2 feed | 3 play | 4 sleep | 5 new pet | 6 save & exit";

pub(crate) fn map_key(key: Key) -> MenuChoice {
    match key {
        Key::Char('1') => MenuChoice::Info,
        Key::Char('2') => MenuChoice::Act(Command::Feed),
        Key::Char('3') => MenuChoice::Act(Command::Play),
        Key::Char('4') => MenuChoice::Act(Command::Sleep),
        Key::Char('5') => MenuChoice::NewPet,
        Key::Char('6') | Key::Interrupt => MenuChoice::Quit,
        _ => MenuChoice::Invalid,
    }
}
