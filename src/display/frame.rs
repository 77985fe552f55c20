//! The per-cycle view handed to the display sink.

use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::elements::Element;
use crate::{
    engine::dedup::Counters,
    models::{Category, DetectionEvent},
    providers::Frame,
};

/// Placeholder shown instead of counter values in privacy mode.
pub const COUNTER_PLACEHOLDER: &str = "***";

/// Placeholder shown instead of identifiers in privacy mode.
pub const IDENTIFIER_PLACEHOLDER: &str = "******";

/// One preview slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SlotView {
    pub category: Option<Category>,
    pub image: Option<PathBuf>,
    pub caption: String,
    pub observed_at: Option<DateTime<Utc>>,
}

impl SlotView {
    fn from_event(event: &DetectionEvent, privacy: bool) -> Self {
        let caption = match (event.category, privacy) {
            (Category::Person, _) => event.category.label().to_string(),
            (category, true) => format!("{}: {IDENTIFIER_PLACEHOLDER}", category.label()),
            (category, false) => format!("{}: {}", category.label(), event.identifier),
        };
        Self {
            category: Some(event.category),
            image: (!privacy).then(|| event.image.clone()),
            caption,
            observed_at: Some(event.observed_at),
        }
    }
}

/// Counter values as displayed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterView {
    pub person: String,
    pub car: String,
    pub plate: String,
    pub traffic_light: String,
}

impl CounterView {
    fn new(counters: &Counters, privacy: bool) -> Self {
        let show = |category| {
            if privacy {
                COUNTER_PLACEHOLDER.to_string()
            } else {
                counters.get(category).to_string()
            }
        };
        Self {
            person: show(Category::Person),
            car: show(Category::Car),
            plate: show(Category::Plate),
            traffic_light: show(Category::TrafficLight),
        }
    }
}

/// The video area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoView {
    pub running: bool,
    /// The latest frame image. Never set in privacy mode.
    pub image: Option<PathBuf>,
    pub captured_at: Option<DateTime<Utc>>,
    pub hidden: bool,
}

/// Everything the display shows for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayFrame {
    pub car_plate_slots: Vec<SlotView>,
    pub person_slots: Vec<SlotView>,
    pub counters: CounterView,
    /// Most recently counted plates, newest first.
    pub plate_ticker: Vec<String>,
    pub video: VideoView,
    pub elements: BTreeMap<String, Element>,
}

/// Inputs to [`DisplayFrame::render`].
#[derive(Debug)]
pub struct FrameInputs<'a> {
    pub car_plate_history: &'a [DetectionEvent],
    pub car_plate_slots: usize,
    pub person_history: &'a [DetectionEvent],
    pub person_slots: usize,
    pub counters: &'a Counters,
    pub plate_ticker: &'a [String],
    pub running: bool,
    pub frame: Option<&'a Frame>,
    pub elements: BTreeMap<String, Element>,
    pub privacy_mode: bool,
}

impl DisplayFrame {
    /// Builds the view, newest history entry in the first slot.
    pub fn render(inputs: FrameInputs<'_>) -> Self {
        let privacy = inputs.privacy_mode;
        Self {
            car_plate_slots: slots(inputs.car_plate_history, inputs.car_plate_slots, privacy),
            person_slots: slots(inputs.person_history, inputs.person_slots, privacy),
            counters: CounterView::new(inputs.counters, privacy),
            plate_ticker: inputs
                .plate_ticker
                .iter()
                .map(|plate| if privacy { IDENTIFIER_PLACEHOLDER.to_string() } else { plate.clone() })
                .collect(),
            video: VideoView {
                running: inputs.running,
                image: inputs.frame.and_then(|f| f.image.clone()).filter(|_| !privacy),
                captured_at: inputs.frame.map(|f| f.captured_at),
                hidden: privacy,
            },
            elements: inputs.elements,
        }
    }
}

fn slots(history: &[DetectionEvent], count: usize, privacy: bool) -> Vec<SlotView> {
    let mut views: Vec<SlotView> =
        history.iter().rev().take(count).map(|e| SlotView::from_event(e, privacy)).collect();
    views.resize(count, SlotView::default());
    views
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn plate(id: &str, secs: i64) -> DetectionEvent {
        DetectionEvent::new(
            Category::Plate,
            id,
            format!("/tmp/{id}.jpg"),
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        )
    }

    fn inputs<'a>(
        history: &'a [DetectionEvent],
        counters: &'a Counters,
        ticker: &'a [String],
        privacy_mode: bool,
    ) -> FrameInputs<'a> {
        FrameInputs {
            car_plate_history: history,
            car_plate_slots: 3,
            person_history: &[],
            person_slots: 2,
            counters,
            plate_ticker: ticker,
            running: true,
            frame: None,
            elements: BTreeMap::new(),
            privacy_mode,
        }
    }

    #[test]
    fn test_render_newest_first_and_pads_empty_slots() {
        let history = vec![plate("AAA111", 0), plate("BBB222", 1)];
        let counters = Counters { plate: 2, ..Default::default() };
        let ticker = vec!["BBB222".to_string(), "AAA111".to_string()];

        let frame = DisplayFrame::render(inputs(&history, &counters, &ticker, false));

        assert_eq!(frame.car_plate_slots.len(), 3);
        assert_eq!(frame.car_plate_slots[0].caption, "Plate: BBB222");
        assert_eq!(frame.car_plate_slots[1].image, Some(PathBuf::from("/tmp/AAA111.jpg")));
        assert_eq!(frame.car_plate_slots[2], SlotView::default());
        assert_eq!(frame.person_slots, vec![SlotView::default(), SlotView::default()]);
        assert_eq!(frame.counters.plate, "2");
        assert_eq!(frame.plate_ticker, ticker);
    }

    #[test]
    fn test_privacy_mode_redacts_everything() {
        let history = vec![plate("AAA111", 0)];
        let counters = Counters { plate: 1, person: 4, ..Default::default() };
        let ticker = vec!["AAA111".to_string()];
        let video = Frame { captured_at: Utc::now(), image: Some("/tmp/frame.jpg".into()) };
        let mut inputs = inputs(&history, &counters, &ticker, true);
        inputs.frame = Some(&video);

        let frame = DisplayFrame::render(inputs);

        assert_eq!(frame.car_plate_slots[0].caption, "Plate: ******");
        assert_eq!(frame.car_plate_slots[0].image, None);
        assert_eq!(frame.counters.plate, COUNTER_PLACEHOLDER);
        assert_eq!(frame.counters.person, COUNTER_PLACEHOLDER);
        assert_eq!(frame.plate_ticker, vec![IDENTIFIER_PLACEHOLDER.to_string()]);
        assert!(frame.video.hidden);
        assert_eq!(frame.video.image, None);
    }
}
