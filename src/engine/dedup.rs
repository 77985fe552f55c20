//! Deduplication and counting of detection events.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::last_seen::LastSeen;
use crate::models::{Category, DetectionEvent};

/// Per-category detection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Counted persons.
    pub person: u64,
    /// Counted cars.
    pub car: u64,
    /// Counted plates.
    pub plate: u64,
    /// Counted traffic lights.
    pub traffic_light: u64,
}

impl Counters {
    /// Returns the counter for `category`.
    pub fn get(&self, category: Category) -> u64 {
        match category {
            Category::Person => self.person,
            Category::Car => self.car,
            Category::Plate => self.plate,
            Category::TrafficLight => self.traffic_light,
        }
    }

    fn increment(&mut self, category: Category) -> u64 {
        let counter = match category {
            Category::Person => &mut self.person,
            Category::Car => &mut self.car,
            Category::Plate => &mut self.plate,
            Category::TrafficLight => &mut self.traffic_light,
        };
        *counter = counter.saturating_add(1);
        *counter
    }
}

/// The result of evaluating one detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionOutcome {
    /// Whether the detection was counted.
    pub is_new: bool,
    /// The category counter after the evaluation.
    pub count_after: u64,
}

/// Decides which detections are new and keeps the counters.
///
/// Cars, plates and traffic lights are deduplicated per identifier. Persons
/// carry no stable identifier, so all person detections share a single
/// last-counted timestamp: two persons seen within one cooldown window are
/// counted once.
///
/// Timestamps of objects not seen for longer than the longest cooldown ever
/// set are pruned as the table grows.
#[derive(Debug)]
pub struct DedupEngine {
    cooldown: Duration,
    last_counted: LastSeen,
    last_person: Option<DateTime<Utc>>,
    counters: Counters,
}

impl DedupEngine {
    /// Creates an engine with empty state.
    pub fn new(cooldown: Duration) -> Self {
        let mut last_counted = LastSeen::new();
        last_counted.widen(cooldown);
        Self { cooldown, last_counted, last_person: None, counters: Counters::default() }
    }

    /// Evaluates a detection observed at `now`.
    pub fn record_detection(&mut self, event: &DetectionEvent, now: DateTime<Utc>) -> DetectionOutcome {
        let category = event.category;
        let last = if category.has_stable_identifier() {
            self.last_counted.get(category, &event.identifier)
        } else {
            self.last_person
        };

        let is_new = match last {
            None => true,
            Some(last) => self.cooldown_elapsed(last, now),
        };

        if !is_new {
            return DetectionOutcome { is_new, count_after: self.counters.get(category) };
        }

        if category.has_stable_identifier() {
            self.last_counted.record(category, &event.identifier, now);
        } else {
            self.last_person = Some(now);
        }
        let count_after = self.counters.increment(category);
        tracing::debug!(
            category = %category,
            identifier = %event.identifier,
            count = count_after,
            "Detection counted."
        );
        DetectionOutcome { is_new, count_after }
    }

    fn cooldown_elapsed(&self, last: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        // A clock that moved backwards never re-counts early.
        match (now - last).to_std() {
            Ok(elapsed) => elapsed >= self.cooldown,
            Err(_) => false,
        }
    }

    /// Changes the cooldown window. Takes effect on the next evaluation.
    pub fn set_cooldown(&mut self, cooldown: Duration) {
        self.cooldown = cooldown;
        self.last_counted.widen(cooldown);
    }

    /// The current cooldown window.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// The current counters.
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Zeroes the counters and forgets every previously seen object.
    pub fn reset_counters(&mut self) {
        self.counters = Counters::default();
        self.last_counted.clear();
        self.last_person = None;
    }
}
