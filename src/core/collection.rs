use chrono::{DateTime, Utc};

use crate::core::event::Event;

/// Distinct events in first-seen order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventCollection {
    events: Vec<Event>,
}

/// Events split around the reference instant, each side in ascending order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Started at or before `now`.
    pub ongoing: Vec<Event>,
    /// Starting strictly after `now`.
    pub today: Vec<Event>,
}

impl EventCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `event` unless an equal one is already present. Returns whether it was added.
    pub fn insert(&mut self, event: Event) -> bool {
        if self.events.contains(&event) {
            return false;
        }
        self.events.push(event);
        true
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sorts by timestamp and splits around `now`. Equal timestamps keep insertion order.
    pub fn finalize(self, now: DateTime<Utc>) -> Partition {
        let mut events = self.events;
        events.sort_by_key(Event::timestamp);

        let (today, ongoing) = events.into_iter().partition(|event| event.is_after(now));

        Partition { ongoing, today }
    }
}

impl Extend<Event> for EventCollection {
    fn extend<I: IntoIterator<Item = Event>>(&mut self, iter: I) {
        for event in iter {
            self.insert(event);
        }
    }
}

impl FromIterator<Event> for EventCollection {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        let mut collection = Self::new();
        collection.extend(iter);
        collection
    }
}
