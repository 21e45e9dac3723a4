use crate::input::MENU;
use crate::model::{PetState, Point, Status};
use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::io::{self, Write};

const DOG: [&str; 5] = [
    r" / \__",
    r"(    @\__",
    r" /         O",
    r"/   (_____/",
    r"/_____/ U",
];

const GRAVE: [&str; 6] = [
    "_______",
    "| RIP |",
    "|     |",
    "|     |",
    "|     |",
    "|_____|",
];

// Room every sprite needs inside the pen.
const ART_W: u16 = 15;
const ART_H: u16 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    #[cfg(test)]
    pub(crate) fn row_text(&self, y: u16) -> String {
        (0..self.w).map(|x| self.cells[self.idx(x, y)].ch).collect()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, needle: &str) -> bool {
        (0..self.h).any(|y| self.row_text(y).contains(needle))
    }
}

/// Anything a finished frame can be shown on.
pub(crate) trait Screen {
    fn size(&mut self) -> anyhow::Result<(u16, u16)>;
    fn present(&mut self, frame: &CellBuffer) -> anyhow::Result<()>;
}

pub(crate) struct Terminal {
    out: io::Stdout,
    prev: CellBuffer,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;
        Ok(Self {
            out,
            prev: CellBuffer::new(0, 0),
        })
    }
}

impl Screen for Terminal {
    fn size(&mut self) -> anyhow::Result<(u16, u16)> {
        Ok(terminal::size()?)
    }

    fn present(&mut self, frame: &CellBuffer) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let full = frame.w != self.prev.w || frame.h != self.prev.h;
        if full {
            queue!(self.out, ResetColor, Clear(ClearType::All))?;
            self.prev = CellBuffer::new(frame.w, frame.h);
        }

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..frame.h {
            for x in 0..frame.w {
                let i = frame.idx(x, y);
                let c = frame.cells[i];
                if !full && c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&frame.cells);
        Ok(())
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = queue!(
            self.out,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            LeaveAlternateScreen
        );
        let _ = self.out.flush();
        let _ = terminal::disable_raw_mode();
    }
}

/* -----------------------------
   Layout
------------------------------ */

/// Title on row 0, the pen below it, four rows of text under the pen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Layout {
    pub(crate) cols: u16,
    pub(crate) rows: u16,
}

impl Layout {
    pub(crate) fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    fn pen_bottom(&self) -> u16 {
        self.rows.saturating_sub(5).max(2)
    }

    fn pen_inner(&self) -> (u16, u16) {
        (self.cols.saturating_sub(2), self.pen_bottom().saturating_sub(2))
    }

    /// The range of top-left cells a sprite can occupy without leaving the pen.
    pub(crate) fn boundary(&self) -> Point {
        let (w, h) = self.pen_inner();
        (w.saturating_sub(ART_W), h.saturating_sub(ART_H))
    }
}

/* -----------------------------
   Frame drawing
------------------------------ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Panel {
    None,
    Info(String),
    NamePrompt { title: &'static str, name: String },
}

pub(crate) struct View<'a> {
    pub(crate) pet: Option<&'a PetState>,
    pub(crate) panel: &'a Panel,
    pub(crate) message: Option<&'a str>,
    pub(crate) color: bool,
}

pub(crate) const NAME_MAX: usize = 18;

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(
            xx,
            y,
            Cell {
                ch,
                fg,
                bg: Color::Black,
            },
        );
    }
}

fn bar(value: u8, width: usize) -> String {
    let fill = (usize::from(value.min(100)) * width + 50) / 100;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < fill { '█' } else { ' ' });
    }
    s.push(']');
    s
}

pub(crate) fn draw_frame(buf: &mut CellBuffer, view: &View<'_>) {
    buf.clear();
    let layout = Layout::new(buf.w, buf.h);
    let tint = |c: Color| if view.color { c } else { Color::White };

    draw_text(buf, 1, 0, "DigiPal", tint(Color::Cyan));
    draw_pen(buf, &layout, view.color);

    if let Some(pet) = view.pet {
        draw_pet(buf, pet, view.color);
        draw_stats(buf, &layout, pet);
    }

    let base = layout.pen_bottom() + 1;
    draw_text(buf, 1, base + 2, MENU, Color::White);
    if let Some(msg) = view.message {
        draw_text(buf, 1, base + 3, msg, tint(Color::Yellow));
    }

    match view.panel {
        Panel::None => {}
        Panel::Info(text) => {
            let body = format!("{text}\n\nPress any key");
            draw_center_box(buf, "Pet info", &body);
        }
        Panel::NamePrompt { title, name } => {
            let mut preview = name.clone();
            if preview.chars().count() < NAME_MAX {
                preview.push('_');
            }
            let body = format!("Name: {preview}\n\nEnter confirm | Backspace delete");
            draw_center_box(buf, title, &body);
        }
    }
}

fn draw_pen(buf: &mut CellBuffer, layout: &Layout, color: bool) {
    let (x1, y0, y1) = (layout.cols.saturating_sub(1), 1, layout.pen_bottom());
    let edge = |ch| {
        if color {
            Cell {
                ch: ' ',
                fg: Color::White,
                bg: Color::White,
            }
        } else {
            Cell {
                ch,
                ..Cell::default()
            }
        }
    };
    for x in 0..=x1 {
        buf.set(x, y0, edge('-'));
        buf.set(x, y1, edge('-'));
    }
    for y in y0 + 1..y1 {
        buf.set(0, y, edge('|'));
        buf.set(x1, y, edge('|'));
    }
}

fn draw_pet(buf: &mut CellBuffer, pet: &PetState, color: bool) {
    let x0 = 1 + pet.position.0;
    let y0 = 2 + pet.position.1;

    let (art, fg): (&[&str], Color) = match pet.status {
        Status::Dead => (&GRAVE[..], Color::DarkGrey),
        _ => (&DOG[..], Color::Yellow),
    };
    let fg = if color { fg } else { Color::White };

    for (dy, line) in art.iter().enumerate() {
        draw_text(buf, x0, y0 + dy as u16, line, fg);
    }
    if pet.status == Status::Sleeping {
        let zz = if color { Color::Cyan } else { Color::White };
        draw_text(buf, x0 + 12, y0, "Zzz", zz);
    }
}

fn draw_stats(buf: &mut CellBuffer, layout: &Layout, pet: &PetState) {
    let y = layout.pen_bottom() + 1;
    let head = format!(
        "{} | Feelings: {} | Status: {}",
        pet.name, pet.feelings, pet.status
    );
    draw_text(buf, 1, y, &head, Color::White);

    let vitals = format!(
        "Hunger {} {:>3}  Happy {} {:>3}  Tired {} {:>3}",
        bar(pet.hunger, 10),
        pet.hunger,
        bar(pet.happiness, 10),
        pet.happiness,
        bar(pet.tiredness, 10),
        pet.tiredness
    );
    draw_text(buf, 1, y + 1, &vitals, Color::White);
}

fn draw_center_box(buf: &mut CellBuffer, title: &str, body: &str) {
    let w = buf.w;
    let h = buf.h;

    let bw = w.saturating_sub(4).min(50).max(2);
    let bh = (body.lines().count() as u16 + 4).min(h.saturating_sub(2)).max(2);

    let x0 = w.saturating_sub(bw) / 2;
    let y0 = h.saturating_sub(bh) / 2;

    let border = |ch| Cell {
        ch,
        ..Cell::default()
    };

    for y in y0..y0 + bh {
        for x in x0..x0 + bw {
            buf.set(x, y, Cell::default());
        }
    }
    for x in x0..x0 + bw {
        buf.set(x, y0, border('─'));
        buf.set(x, y0 + bh - 1, border('─'));
    }
    for y in y0..y0 + bh {
        buf.set(x0, y, border('│'));
        buf.set(x0 + bw - 1, y, border('│'));
    }
    buf.set(x0, y0, border('┌'));
    buf.set(x0 + bw - 1, y0, border('┐'));
    buf.set(x0, y0 + bh - 1, border('└'));
    buf.set(x0 + bw - 1, y0 + bh - 1, border('┘'));

    draw_text(buf, x0 + 2, y0 + 1, title, Color::White);

    let mut yy = y0 + 3;
    for line in body.lines() {
        if yy >= y0 + bh - 1 {
            break;
        }
        draw_text(buf, x0 + 2, yy, line, Color::White);
        yy += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Rules;
    use chrono::Utc;
    use rand::{rngs::StdRng, SeedableRng};

    fn pet_in(layout: &Layout) -> PetState {
        let mut rng = StdRng::seed_from_u64(1);
        PetState::new("Rex", Utc::now(), layout.boundary(), &Rules::default(), &mut rng)
    }

    #[test]
    fn boundary_leaves_room_for_the_sprite() {
        let layout = Layout::new(80, 24);
        assert_eq!(layout.boundary(), (78 - ART_W, 17 - ART_H));
        assert_eq!(Layout::new(5, 5).boundary(), (0, 0));
    }

    #[test]
    fn frame_shows_pet_stats_and_menu() {
        let layout = Layout::new(80, 24);
        let pet = pet_in(&layout);
        let mut buf = CellBuffer::new(80, 24);
        draw_frame(
            &mut buf,
            &View {
                pet: Some(&pet),
                panel: &Panel::None,
                message: Some("Rex munches happily."),
                color: false,
            },
        );

        assert!(buf.row_text(0).contains("DigiPal"));
        assert!(buf.contains("(    @\\__"));
        assert!(buf.contains("/_____/ U"));
        assert!(buf.row_text(20).contains("Rex | Feelings: Happy | Status: Healthy"));
        assert!(buf.row_text(21).contains("Hunger [█████     ]  50"));
        assert!(buf.row_text(22).contains("1 info"));
        assert!(buf.row_text(23).contains("munches"));
        assert_eq!(buf.row_text(1).trim_end(), "-".repeat(80));
    }

    #[test]
    fn dead_pet_gets_a_grave() {
        let layout = Layout::new(60, 20);
        let mut pet = pet_in(&layout);
        pet.status = Status::Dead;
        let mut buf = CellBuffer::new(60, 20);
        draw_frame(
            &mut buf,
            &View {
                pet: Some(&pet),
                panel: &Panel::None,
                message: None,
                color: true,
            },
        );
        assert!(buf.contains("| RIP |"));
        assert!(!buf.contains("@\\__"));
    }

    #[test]
    fn sleeping_pet_snores() {
        let layout = Layout::new(60, 20);
        let mut pet = pet_in(&layout);
        pet.status = Status::Sleeping;
        let mut buf = CellBuffer::new(60, 20);
        draw_frame(
            &mut buf,
            &View {
                pet: Some(&pet),
                panel: &Panel::None,
                message: None,
                color: true,
            },
        );
        assert!(buf.contains("Zzz"));
    }

    #[test]
    fn name_prompt_shows_cursor() {
        let mut buf = CellBuffer::new(60, 20);
        draw_frame(
            &mut buf,
            &View {
                pet: None,
                panel: &Panel::NamePrompt {
                    title: "Name your DigiPal",
                    name: "Re".to_string(),
                },
                message: None,
                color: true,
            },
        );
        assert!(buf.contains("Name your DigiPal"));
        assert!(buf.contains("Name: Re_"));
    }

    #[test]
    fn tiny_terminal_does_not_panic() {
        let layout = Layout::new(3, 2);
        let pet = pet_in(&layout);
        let mut buf = CellBuffer::new(3, 2);
        draw_frame(
            &mut buf,
            &View {
                pet: Some(&pet),
                panel: &Panel::Info("Name: Rex".to_string()),
                message: Some("hello"),
                color: false,
            },
        );
    }
}
