use std::time::Duration;
use tracing::trace;

use crate::domain::{LensError, Message};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(event_poll_time: u64) -> Self {
        Self { event_poll_time }
    }

    pub fn handle_event(&self, _model: &Model) -> Result<Option<Message>, LensError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    return Ok(Self::handle_key(key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    pub fn handle_key(key: KeyEvent) -> Option<Message> {
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('n') | KeyCode::Right | KeyCode::PageDown => Some(Message::NextPage),
            KeyCode::Char('p') | KeyCode::Left | KeyCode::PageUp => Some(Message::PreviousPage),
            KeyCode::Char('g') | KeyCode::Home => Some(Message::FirstPage),
            KeyCode::Char('G') | KeyCode::End => Some(Message::LastPage),
            KeyCode::Char('e') => Some(Message::Export),
            KeyCode::Char('c') => Some(Message::Close),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
