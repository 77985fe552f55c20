//! Detection events as reported by the external recognition pipeline.

use std::{fmt, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// The kind of object a detection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A person. The pipeline provides no identifier that is stable across
    /// frames.
    Person,
    /// A car, identified by the pipeline's tracker id.
    Car,
    /// A license plate, identified by its recognized text.
    Plate,
    /// A traffic light.
    #[serde(alias = "traffic light")]
    TrafficLight,
}

impl Category {
    /// Every category, in counter order.
    pub const ALL: [Category; 4] =
        [Category::Person, Category::Car, Category::Plate, Category::TrafficLight];

    /// The snake_case name used on the wire and on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Person => "person",
            Category::Car => "car",
            Category::Plate => "plate",
            Category::TrafficLight => "traffic_light",
        }
    }

    /// A capitalized, human readable name.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Person => "Person",
            Category::Car => "Car",
            Category::Plate => "Plate",
            Category::TrafficLight => "Traffic light",
        }
    }

    /// Whether detections of this category carry an identifier that can be
    /// used for deduplication.
    pub fn has_stable_identifier(&self) -> bool {
        !matches!(self, Category::Person)
    }

    /// The preview group this category is shown in, if any.
    pub fn display_group(&self) -> Option<DisplayGroup> {
        match self {
            Category::Car | Category::Plate => Some(DisplayGroup::CarPlate),
            Category::Person => Some(DisplayGroup::Person),
            Category::TrafficLight => None,
        }
    }

    fn index(&self) -> usize {
        match self {
            Category::Person => 0,
            Category::Car => 1,
            Category::Plate => 2,
            Category::TrafficLight => 3,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A group of preview slots sharing one history buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayGroup {
    /// Cars and plates share one set of slots.
    CarPlate,
    /// Persons have their own slots.
    Person,
}

/// One reported occurrence of an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct DetectionEvent {
    /// What was detected.
    #[serde(alias = "type")]
    pub category: Category,

    /// The pipeline's identifier for the object (plate text, tracker id).
    /// Persons usually have none.
    #[serde(default)]
    pub identifier: String,

    /// Path of the image crop written by the pipeline.
    #[serde(alias = "path")]
    pub image: PathBuf,

    /// When the pipeline observed the object.
    #[serde(alias = "timestamp")]
    pub observed_at: DateTime<Utc>,
}

impl DetectionEvent {
    /// Creates a new detection event.
    pub fn new(
        category: Category,
        identifier: impl Into<String>,
        image: impl Into<PathBuf>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self { category, identifier: identifier.into(), image: image.into(), observed_at }
    }

    /// The event as a flat JSON object, used as template and script context.
    pub fn to_context(&self) -> Value {
        json!({
            "category": self.category.as_str(),
            "label": self.category.label(),
            "identifier": self.identifier,
            "image": self.image.to_string_lossy(),
            "observed_at": self.observed_at.to_rfc3339(),
        })
    }
}

/// The set of categories present in one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Presence {
    present: [bool; 4],
}

impl Presence {
    /// Marks a category as present.
    pub fn insert(&mut self, category: Category) {
        self.present[category.index()] = true;
    }

    /// Whether the category is present.
    pub fn contains(&self, category: Category) -> bool {
        self.present[category.index()]
    }

    /// True if no category is present.
    pub fn is_empty(&self) -> bool {
        !self.present.iter().any(|p| *p)
    }

    /// Iterates over the present categories in counter order.
    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl FromIterator<Category> for Presence {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        let mut presence = Presence::default();
        for category in iter {
            presence.insert(category);
        }
        presence
    }
}
