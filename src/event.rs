//! Event interface
//!
//! Everything the engine cannot decide on its own is reported to the
//! embedding application through a single [`EventHandler`] supplied at
//! construction. Handlers run synchronously while input is processed.

use serde::{Deserialize, Serialize};

use crate::core::WinMode;

/// Notification from the engine to the embedding application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Window title changed; `None` restores the default title
    Title(Option<String>),
    /// Icon title changed
    IconTitle(String),
    /// Application-owned mode bits were set
    Set(WinMode),
    /// Application-owned mode bits were cleared
    Unset(WinMode),
    /// BEL outside a string sequence
    Bell,
    /// RIS: the terminal was reset to its initial state
    Reset,
    /// The child side of the PTY closed
    Eof,
    /// Whether pointer motion without buttons should be reported
    PointerMotion(bool),
    /// DECSCUSR cursor style (0-6 as sent by the application)
    CursorStyle(i64),
    /// OSC 52 clipboard payload (already base64-decoded)
    Copy(Vec<u8>),
    /// OSC 4 / OSC 104: set or reset palette entry `index`.
    ///
    /// `name` is `None` for a reset; `index` is `None` when every entry
    /// should be reset. Return [`EventResult::Unsupported`] for names that
    /// cannot be resolved.
    ColorName {
        index: Option<i64>,
        name: Option<String>,
    },
    /// A control sequence was not understood (payload is a printable dump)
    CsiError(String),
    /// A string sequence was not understood (payload is a printable dump)
    StrError(String),
}

/// Handler verdict, consulted for [`Event::ColorName`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventResult {
    Handled,
    Unsupported,
}

/// Receiver for engine events
pub trait EventHandler {
    fn handle(&mut self, event: Event) -> EventResult;
}

impl<F> EventHandler for F
where
    F: FnMut(Event) -> EventResult,
{
    fn handle(&mut self, event: Event) -> EventResult {
        self(event)
    }
}

/// Handler that accepts everything and does nothing with it
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHandler;

impl EventHandler for NullHandler {
    fn handle(&mut self, event: Event) -> EventResult {
        match event {
            Event::ColorName { .. } => EventResult::Unsupported,
            _ => EventResult::Handled,
        }
    }
}

/// Handler that records every event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    pub events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the recorded events
    pub fn take(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Last title set, if any
    pub fn title(&self) -> Option<&str> {
        self.events.iter().rev().find_map(|e| match e {
            Event::Title(title) => Some(title.as_deref()),
            _ => None,
        })?
    }
}

impl EventHandler for EventLog {
    fn handle(&mut self, event: Event) -> EventResult {
        self.events.push(event);
        EventResult::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_handler() {
        let mut count = 0;
        let mut handler = |_event: Event| {
            count += 1;
            EventResult::Handled
        };
        handler.handle(Event::Bell);
        handler.handle(Event::Reset);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_null_handler_rejects_colors() {
        let mut handler = NullHandler;
        assert_eq!(handler.handle(Event::Bell), EventResult::Handled);
        let color = Event::ColorName {
            index: Some(1),
            name: Some("red".into()),
        };
        assert_eq!(handler.handle(color), EventResult::Unsupported);
    }

    #[test]
    fn test_event_log_title() {
        let mut log = EventLog::new();
        assert_eq!(log.title(), None);
        log.handle(Event::Title(Some("one".into())));
        log.handle(Event::Bell);
        assert_eq!(log.title(), Some("one"));
        log.handle(Event::Title(None));
        assert_eq!(log.title(), None);
        assert_eq!(log.take().len(), 3);
        assert!(log.events.is_empty());
    }

    #[test]
    fn test_event_serializes() {
        let json = serde_json::to_string(&Event::Set(WinMode::APPCURSOR)).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Event::Set(WinMode::APPCURSOR));
    }
}
