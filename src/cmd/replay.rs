use std::{path::PathBuf, time::Duration};

use clap::Parser;
use serde::Serialize;
use thiserror::Error;

use crate::{
    engine::{Counters, DedupEngine},
    models::DetectionEvent,
    providers::parse_detection_lines,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid cooldown: {0}")]
    Cooldown(String),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// Path to a JSON-lines file of detection events.
    #[arg(short, long)]
    events: PathBuf,
    /// The cooldown window in seconds.
    #[arg(short, long, default_value_t = 3.0)]
    cooldown: f64,
}

/// The outcome of replaying a batch of detections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    /// Number of events read from the file.
    pub events: usize,
    /// Number of events counted as new.
    pub counted: usize,
    /// Counters after the last event.
    pub counters: Counters,
}

/// Runs `events` through the dedup engine in timestamp order, using each
/// event's own timestamp as the current time.
pub fn replay_events(mut events: Vec<DetectionEvent>, cooldown: Duration) -> ReplayReport {
    events.sort_by_key(|event| event.observed_at);

    let mut engine = DedupEngine::new(cooldown);
    let counted = events
        .iter()
        .filter(|event| engine.record_detection(event, event.observed_at).is_new)
        .count();

    ReplayReport { events: events.len(), counted, counters: engine.counters() }
}

pub async fn execute(args: ReplayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let cooldown = Duration::try_from_secs_f64(args.cooldown)
        .map_err(|e| Error::Cooldown(e.to_string()))?;

    let text = tokio::fs::read_to_string(&args.events).await.map_err(Error::from)?;
    let events = parse_detection_lines(&text);
    tracing::info!(path = %args.events.display(), events = events.len(), "Replaying detections...");

    let report = replay_events(events, cooldown);
    println!("{}", serde_json::to_string_pretty(&report).map_err(Error::from)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::Category;

    fn event(category: Category, identifier: &str, secs: i64) -> DetectionEvent {
        DetectionEvent::new(
            category,
            identifier,
            "frame.jpg",
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        )
    }

    #[test]
    fn test_replay_counts_with_cooldown() {
        let events = vec![
            event(Category::Plate, "ABC123", 0),
            event(Category::Plate, "ABC123", 1),
            event(Category::Plate, "ABC123", 5),
            event(Category::Car, "car-1", 0),
            event(Category::Person, "", 2),
        ];
        let report = replay_events(events, Duration::from_secs(3));

        assert_eq!(report.events, 5);
        assert_eq!(report.counted, 4);
        assert_eq!(report.counters.plate, 2);
        assert_eq!(report.counters.car, 1);
        assert_eq!(report.counters.person, 1);
        assert_eq!(report.counters.traffic_light, 0);
    }

    #[test]
    fn test_replay_sorts_by_timestamp() {
        let events = vec![event(Category::Car, "car-1", 10), event(Category::Car, "car-1", 0)];
        let report = replay_events(events, Duration::from_secs(3));
        assert_eq!(report.counters.car, 2);
    }

    #[tokio::test]
    async fn test_execute_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(
            &path,
            r#"{"category":"car","identifier":"car-1","image":"a.jpg","observed_at":"2024-01-01T00:00:00Z"}
not json
"#,
        )
        .unwrap();

        let args = ReplayArgs { events: path, cooldown: 3.0 };
        assert!(execute(args).await.is_ok());

        let args = ReplayArgs { events: dir.path().join("missing.jsonl"), cooldown: 3.0 };
        assert!(execute(args).await.is_err());

        let args = ReplayArgs { events: dir.path().join("events.jsonl"), cooldown: -1.0 };
        assert!(execute(args).await.is_err());
    }
}
