use std::time::{Duration, Instant};
use tracing::trace;

use crate::domain::{LFConfig, LFError, Message};
use crate::model::Model;
use crate::timing::Throttle;
use ratatui::crossterm::event::{
    self, Event, KeyCode, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

pub struct Controller {
    event_poll_time: u64,
    drag_throttle: Throttle,
    resize_throttle: Throttle,
    scroll_throttle: Throttle,
}

impl Controller {
    pub fn new(cfg: &LFConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
            drag_throttle: Throttle::new(cfg.timing.drag_throttle),
            resize_throttle: Throttle::new(cfg.timing.resize_throttle),
            scroll_throttle: Throttle::new(cfg.timing.scroll_throttle),
        }
    }

    pub fn handle_event(&mut self, model: &Model) -> Result<Option<Message>, LFError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        let message = match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Some(Message::RawKey(key))
                } else {
                    self.handle_key(key)
                }
            }
            Event::Mouse(mouse) => self.handle_mouse(mouse, Instant::now()),
            Event::Resize(width, height) => self
                .resize_throttle
                .ready(Instant::now())
                .then_some(Message::Resize(width, height)),
            _ => None,
        };
        Ok(message)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Up, _) | (KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down, _) | (KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::Home, _) | (KeyCode::Char('g'), _) => Some(Message::MoveBeginning),
            (KeyCode::End, _) | (KeyCode::Char('G'), _) => Some(Message::MoveEnd),
            (KeyCode::Tab, _) => Some(Message::NextTable),
            (KeyCode::BackTab, _) => Some(Message::PreviousTable),
            (KeyCode::Char('f'), _) => Some(Message::ToggleFilter),
            (KeyCode::Char('p'), _) => Some(Message::TogglePanel),
            (KeyCode::Char('t'), _) => Some(Message::ToggleTitleBar),
            (KeyCode::Char('a'), _) => Some(Message::AddPlace),
            (KeyCode::Char('['), _) => Some(Message::SelectPreviousPlace),
            (KeyCode::Char(']'), _) => Some(Message::SelectNextPlace),
            (KeyCode::Char('x'), _) | (KeyCode::Delete, _) => Some(Message::RemoveSelectedPlace),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }

    fn handle_mouse(&mut self, mouse: MouseEvent, now: Instant) -> Option<Message> {
        let (x, y) = (mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(button) => {
                Some(Message::PointerDown(x, y, button == MouseButton::Left))
            }
            MouseEventKind::Drag(_) => self
                .drag_throttle
                .ready(now)
                .then_some(Message::PointerMove(x, y)),
            MouseEventKind::Up(_) => Some(Message::PointerUp(x, y)),
            MouseEventKind::ScrollDown => self.scroll_throttle.ready(now).then_some(Message::Scroll(3)),
            MouseEventKind::ScrollUp => self.scroll_throttle.ready(now).then_some(Message::Scroll(-3)),
            _ => None,
        }
    }
}
