use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::trace;

/// Single line editor used for the "add place" input.
#[derive(Default)]
pub struct Inputter {
    buffer: String,
    cursor: usize, // in chars
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub cursor: usize,
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.enter(),
            (KeyCode::Esc, _) => self.escape(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.left(),
            (KeyCode::Right, _) => self.right(),
            (KeyCode::Home, _) => self.home(),
            (KeyCode::End, _) => self.end(),
            (kc, km) => self.key(kc, km),
        }
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            input: self.buffer.clone(),
            finished: self.finished,
            canceled: self.canceled,
            cursor: self.cursor,
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.finished = false;
        self.canceled = false;
    }

    /// The part of the input that fits into `width` cells, scrolled so the
    /// cursor stays visible, and the cursor column inside it.
    pub fn visible(&self, width: usize) -> (String, usize) {
        if width == 0 {
            return (String::new(), 0);
        }
        let start = (self.cursor + 1).saturating_sub(width);
        let text = self.buffer.chars().skip(start).take(width).collect();
        (text, self.cursor - start)
    }

    fn enter(&mut self) -> InputResult {
        self.finished = true;
        trace!("Input finished: {:?}", self.buffer);
        self.get()
    }

    fn escape(&mut self) -> InputResult {
        self.clear();
        self.canceled = true;
        self.finished = true;
        self.get()
    }

    fn backspace(&mut self) -> InputResult {
        if self.cursor > 0 {
            self.cursor -= 1;
            let pos = self.byte_pos();
            self.buffer.remove(pos);
        }
        self.get()
    }

    fn delete(&mut self) -> InputResult {
        if self.cursor < self.len() {
            let pos = self.byte_pos();
            self.buffer.remove(pos);
        }
        self.get()
    }

    fn left(&mut self) -> InputResult {
        self.cursor = self.cursor.saturating_sub(1);
        self.get()
    }

    fn right(&mut self) -> InputResult {
        if self.cursor < self.len() {
            self.cursor += 1;
        }
        self.get()
    }

    fn home(&mut self) -> InputResult {
        self.cursor = 0;
        self.get()
    }

    fn end(&mut self) -> InputResult {
        self.cursor = self.len();
        self.get()
    }

    fn key(&mut self, code: KeyCode, modifier: KeyModifiers) -> InputResult {
        if modifier.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            return self.get();
        }
        if let Some(chr) = code.as_char() {
            let pos = self.byte_pos();
            self.buffer.insert(pos, chr);
            self.cursor += 1;
        }
        self.get()
    }

    fn len(&self) -> usize {
        self.buffer.chars().count()
    }

    fn byte_pos(&self) -> usize {
        self.buffer
            .char_indices()
            .nth(self.cursor)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.buffer.len())
    }
}
