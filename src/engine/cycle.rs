//! The cooperative detection cycle.
//!
//! One task owns the dedup engine, the history buffers, the live settings and
//! every per-channel suppression state. It ticks on a fixed interval: each
//! tick first handles queued control requests, then (while detection runs)
//! pulls a frame and the recent detections from the recognition source and
//! fans them out to the display, audio and alert channels.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use super::{
    control::{ControlRequest, Mutation, MutationError, StatusSnapshot},
    dedup::DedupEngine,
    history::HistoryBuffer,
    rhai::FunctionRegistry,
};
use crate::{
    config::AppConfig,
    display::{DisplayFrame, DisplaySink, ElementRegistry, FrameInputs},
    models::{Category, DetectionEvent, DisplayGroup, Presence, Settings},
    notification::{
        Alert, AudioChannel, AudioSink, MessengerThrottle, RemoteTarget, TemplateService,
    },
    providers::{Frame, RecognitionSource, SourceError},
};

/// Name of the installed function called for every newly counted detection.
pub const DETECTION_HOOK: &str = "on_new_detection";

/// Number of counted plates kept in the plate ticker.
const PLATE_TICKER_LEN: usize = 3;

/// Timing and sizing of the cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOptions {
    pub polling_interval: Duration,
    pub error_backoff: Duration,
    pub car_plate_slots: usize,
    pub person_slots: usize,
}

impl From<&AppConfig> for CycleOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            polling_interval: config.polling_interval_ms,
            error_backoff: config.error_backoff_ms,
            car_plate_slots: config.display.car_plate_slots,
            person_slots: config.display.person_slots,
        }
    }
}

/// The channels connecting the cycle to the rest of the system.
pub struct CycleChannels {
    pub display: Arc<dyn DisplaySink>,
    pub audio: Arc<dyn AudioSink>,
    pub alerts: mpsc::Sender<Alert>,
    pub control: mpsc::Receiver<ControlRequest>,
    /// Publishes the archive retention whenever settings change.
    pub retention: watch::Sender<Duration>,
}

/// What one batch produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Detections accepted as new.
    pub counted: usize,
    /// Alerts handed to the dispatcher.
    pub alerts: usize,
}

/// The single owner of all detection state.
pub struct DetectionCycle {
    options: CycleOptions,
    source: Box<dyn RecognitionSource>,
    channels: CycleChannels,
    settings: Settings,
    dedup: DedupEngine,
    car_plate_history: HistoryBuffer<DetectionEvent>,
    person_history: HistoryBuffer<DetectionEvent>,
    plate_ticker: VecDeque<String>,
    audio: AudioChannel,
    throttle: MessengerThrottle,
    elements: ElementRegistry,
    functions: FunctionRegistry,
    templates: TemplateService,
    running: bool,
    last_frame: Option<Frame>,
}

impl DetectionCycle {
    pub fn new(
        options: CycleOptions,
        settings: Settings,
        source: Box<dyn RecognitionSource>,
        functions: FunctionRegistry,
        channels: CycleChannels,
    ) -> Self {
        channels.retention.send_replace(settings.archive.retention());
        Self {
            dedup: DedupEngine::new(settings.detection.cooldown()),
            car_plate_history: HistoryBuffer::new(options.car_plate_slots),
            person_history: HistoryBuffer::new(options.person_slots),
            plate_ticker: VecDeque::with_capacity(PLATE_TICKER_LEN),
            audio: AudioChannel::default(),
            throttle: MessengerThrottle::default(),
            elements: ElementRegistry::with_defaults(options.car_plate_slots, options.person_slots),
            functions,
            templates: TemplateService::new(),
            running: false,
            last_frame: None,
            options,
            source,
            channels,
            settings,
        }
    }

    /// Runs until cancelled. Detection stays stopped until a
    /// [`Mutation::StartDetection`] arrives.
    pub async fn run(mut self, cancellation_token: CancellationToken) {
        tracing::info!(
            polling_interval_ms = self.options.polling_interval.as_millis() as u64,
            "Detection cycle started."
        );
        let mut next_tick = Instant::now() + self.options.polling_interval;

        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => break,
                Some(request) = self.channels.control.recv() => {
                    self.handle_request(request).await;
                    continue;
                }
                _ = tokio::time::sleep_until(next_tick) => {}
            }

            self.drain_control().await;

            let delay = if !self.running {
                self.options.polling_interval
            } else {
                match self.tick().await {
                    Ok(_) => self.options.polling_interval,
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            backoff_ms = self.options.error_backoff.as_millis() as u64,
                            "Detection cycle failed, backing off."
                        );
                        self.options.error_backoff
                    }
                }
            };
            next_tick = Instant::now() + delay;
        }

        if self.running {
            self.source.stop().await;
        }
        tracing::info!("Detection cycle stopped.");
    }

    async fn drain_control(&mut self) {
        while let Ok(request) = self.channels.control.try_recv() {
            self.handle_request(request).await;
        }
    }

    async fn handle_request(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::Apply { mutation, reply } => {
                let outcome = self.apply(mutation).await;
                self.render();
                send_reply(reply, outcome);
            }
            ControlRequest::Snapshot { reply } => send_reply(reply, self.snapshot()),
        }
    }

    /// Applies one mutation to the cycle's state.
    pub async fn apply(&mut self, mutation: Mutation) -> Result<(), MutationError> {
        match mutation {
            Mutation::ModifyElement { element_id, properties } => {
                self.elements.modify(&element_id, &properties)?;
            }
            Mutation::UpdateSettings(patch) => {
                let updated = self.settings.merged(&patch)?;
                self.apply_settings(updated);
            }
            Mutation::DefineFunction { name, code } => {
                self.functions.install(&name, &code)?;
            }
            Mutation::StartDetection => {
                if !self.running {
                    self.source.set_detection_interval(self.dedup.cooldown());
                    self.source.start().await?;
                    self.running = true;
                    tracing::info!("Detection started.");
                }
            }
            Mutation::StopDetection => {
                if self.running {
                    self.source.stop().await;
                    self.running = false;
                    self.last_frame = None;
                    self.full_reset();
                    tracing::info!("Detection stopped.");
                }
            }
            Mutation::ResetCounters => self.full_reset(),
        }
        Ok(())
    }

    fn apply_settings(&mut self, updated: Settings) {
        let cooldown = updated.detection.cooldown();
        if cooldown != self.dedup.cooldown() {
            self.dedup.set_cooldown(cooldown);
            self.source.set_detection_interval(cooldown);
            tracing::info!(cooldown_ms = cooldown.as_millis() as u64, "Cooldown updated.");
        }
        self.channels.retention.send_replace(updated.archive.retention());
        self.settings = updated;
    }

    /// Resets counters, dedup state, history, plate ticker and every channel's
    /// suppression state in one step.
    pub fn full_reset(&mut self) {
        self.dedup.reset_counters();
        self.car_plate_history.clear();
        self.person_history.clear();
        self.plate_ticker.clear();
        self.audio.reset();
        self.throttle.reset();
        tracing::info!("Detection state reset.");
    }

    /// Returns a read-only view of the current state.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            running: self.running,
            counters: self.dedup.counters(),
            settings: self.settings.clone(),
            functions: self.functions.names(),
            elements: self.elements.snapshot(),
            plate_ticker: self.plate_ticker.iter().cloned().collect(),
        }
    }

    /// Runs one refresh cycle against the recognition source.
    pub async fn tick(&mut self) -> Result<BatchSummary, SourceError> {
        let Some(frame) = self.source.next_frame().await? else {
            return Ok(BatchSummary::default());
        };

        let mut batch = Vec::new();
        for event in self.source.recent_detections() {
            match tokio::fs::try_exists(&event.image).await {
                Ok(true) => batch.push(event),
                Ok(false) | Err(_) => tracing::debug!(
                    category = %event.category,
                    identifier = %event.identifier,
                    image = %event.image.display(),
                    "Skipping detection, image is not readable."
                ),
            }
        }

        self.last_frame = Some(frame);
        let summary = self.process_batch(batch, Utc::now());
        self.render();
        Ok(summary)
    }

    /// Counts, buffers and fans out one cycle's detections.
    pub fn process_batch(&mut self, batch: Vec<DetectionEvent>, now: DateTime<Utc>) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let mut presence = Presence::default();

        for event in batch {
            let category = event.category;
            if !self.settings.detection.is_enabled(category) {
                continue;
            }
            presence.insert(category);

            match category.display_group() {
                Some(DisplayGroup::CarPlate) => {
                    self.car_plate_history.append(event.clone());
                }
                Some(DisplayGroup::Person) => {
                    self.person_history.append(event.clone());
                }
                None => {}
            }

            if !self.dedup.record_detection(&event, now).is_new {
                continue;
            }
            summary.counted += 1;

            if category == Category::Plate {
                self.plate_ticker.push_front(event.identifier.clone());
                self.plate_ticker.truncate(PLATE_TICKER_LEN);
            }

            if self.dispatch_new(event, now) {
                summary.alerts += 1;
            }
        }

        for category in self.audio.update(presence, &self.settings.audio) {
            self.channels.audio.play(category);
        }

        summary
    }

    /// Builds the alert for a newly counted detection. Returns true if one was
    /// queued.
    fn dispatch_new(&mut self, event: DetectionEvent, now: DateTime<Utc>) -> bool {
        let telegram = &self.settings.telegram;
        let context = event.to_context();

        let mut caption = self.templates.caption(&telegram.caption_template, &event, &context);
        let mut remote_allowed = true;

        match self.functions.call(DETECTION_HOOK, &[context]) {
            Ok(Some(result)) => {
                if result.is_string() {
                    caption = result.into_string().unwrap_or(caption);
                } else if result.as_bool() == Ok(false) {
                    remote_allowed = false;
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Detection hook failed."),
        }

        let remote = (remote_allowed
            && telegram.is_deliverable()
            && self.throttle.allow(&event, now, telegram.notification_delay()))
        .then(|| RemoteTarget {
            bot_token: telegram.bot_token.clone(),
            chat_id: telegram.chat_id.clone(),
        });
        let archive = self.settings.archive.enabled;

        if remote.is_none() && !archive {
            return false;
        }

        match self.channels.alerts.try_send(Alert { event, caption, remote, archive }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(alert)) => {
                tracing::warn!(
                    category = %alert.event.category,
                    identifier = %alert.event.identifier,
                    "Alert queue full, dropping alert."
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Alert dispatcher is gone, dropping alert.");
                false
            }
        }
    }

    fn render(&self) {
        let car_plate_history = self.car_plate_history.snapshot();
        let person_history = self.person_history.snapshot();
        let counters = self.dedup.counters();
        let plate_ticker: Vec<String> = self.plate_ticker.iter().cloned().collect();

        let frame = DisplayFrame::render(FrameInputs {
            car_plate_history: &car_plate_history,
            car_plate_slots: self.options.car_plate_slots,
            person_history: &person_history,
            person_slots: self.options.person_slots,
            counters: &counters,
            plate_ticker: &plate_ticker,
            running: self.running,
            frame: self.last_frame.as_ref(),
            elements: self.elements.snapshot(),
            privacy_mode: self.settings.privacy_mode,
        });
        self.channels.display.show(frame);
    }
}

fn send_reply<T>(reply: oneshot::Sender<T>, value: T) {
    if reply.send(value).is_err() {
        tracing::debug!("Control requester went away before the reply.");
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::{
        config::RhaiConfig,
        display::WatchDisplaySink,
        engine::{control::ControlHandle, rhai::RhaiCompiler},
        notification::MockAudioSink,
        providers::MockRecognitionSource,
    };

    struct Harness {
        cycle: DetectionCycle,
        alerts: mpsc::Receiver<Alert>,
        display: watch::Receiver<Option<DisplayFrame>>,
        retention: watch::Receiver<Duration>,
    }

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + millis).unwrap()
    }

    fn event(category: Category, identifier: &str) -> DetectionEvent {
        DetectionEvent::new(category, identifier, format!("/tmp/{identifier}.jpg"), at(0))
    }

    fn remote_settings() -> Settings {
        Settings::default()
            .merged(&json!({
                "telegram": {
                    "enabled": true,
                    "bot_token": "1:x",
                    "chat_id": "42",
                    "notification_delay_secs": 0.0
                },
                "archive": { "enabled": false }
            }))
            .unwrap()
    }

    fn harness_with(
        settings: Settings,
        source: MockRecognitionSource,
        audio: MockAudioSink,
    ) -> Harness {
        let (display, display_rx) = WatchDisplaySink::new();
        let (alerts_tx, alerts) = mpsc::channel(16);
        let (_handle, control) = ControlHandle::channel(4);
        let (retention_tx, retention) = watch::channel(Duration::ZERO);
        let functions =
            FunctionRegistry::new(Arc::new(RhaiCompiler::new(&RhaiConfig::default())), true);
        let options = CycleOptions {
            polling_interval: Duration::from_millis(10),
            error_backoff: Duration::from_millis(1000),
            car_plate_slots: 3,
            person_slots: 3,
        };
        let channels = CycleChannels {
            display: Arc::new(display),
            audio: Arc::new(audio),
            alerts: alerts_tx,
            control,
            retention: retention_tx,
        };
        Harness {
            cycle: DetectionCycle::new(options, settings, Box::new(source), functions, channels),
            alerts,
            display: display_rx,
            retention,
        }
    }

    fn quiet_audio() -> MockAudioSink {
        let mut audio = MockAudioSink::new();
        audio.expect_play().returning(|_| ());
        audio
    }

    fn harness(settings: Settings) -> Harness {
        harness_with(settings, MockRecognitionSource::new(), quiet_audio())
    }

    fn drain(alerts: &mut mpsc::Receiver<Alert>) -> Vec<Alert> {
        let mut out = Vec::new();
        while let Ok(alert) = alerts.try_recv() {
            out.push(alert);
        }
        out
    }

    #[test]
    fn test_cooldown_gates_counting_and_dispatch() {
        let mut h = harness(remote_settings());
        let plate = event(Category::Plate, "ABC123");

        h.cycle.process_batch(vec![plate.clone()], at(0));
        assert_eq!(h.cycle.snapshot().counters.plate, 1);
        let sent = drain(&mut h.alerts);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].caption, "Plate: ABC123");
        assert_eq!(sent[0].remote.as_ref().unwrap().chat_id, "42");

        h.cycle.process_batch(vec![plate.clone()], at(1_500));
        assert_eq!(h.cycle.snapshot().counters.plate, 1);
        assert!(drain(&mut h.alerts).is_empty());

        h.cycle.process_batch(vec![plate], at(3_500));
        assert_eq!(h.cycle.snapshot().counters.plate, 2);
        assert_eq!(drain(&mut h.alerts).len(), 1);
    }

    #[test]
    fn test_persons_collapse_within_cooldown() {
        let mut h = harness(remote_settings());
        h.cycle.process_batch(vec![event(Category::Person, "p1")], at(0));
        h.cycle.process_batch(vec![event(Category::Person, "p2")], at(1_000));

        assert_eq!(h.cycle.snapshot().counters.person, 1);
        assert_eq!(drain(&mut h.alerts).len(), 1);
        assert_eq!(h.cycle.person_history.len(), 2);
    }

    #[tokio::test]
    async fn test_disabling_remote_messaging_stops_messages_only() {
        let mut h = harness(remote_settings());
        h.cycle
            .apply(Mutation::UpdateSettings(json!({ "telegram": { "enabled": false } })))
            .await
            .unwrap();

        let summary = h.cycle.process_batch(vec![event(Category::Car, "7")], at(0));

        assert_eq!(summary, BatchSummary { counted: 1, alerts: 0 });
        assert!(drain(&mut h.alerts).is_empty());
        assert_eq!(h.cycle.snapshot().counters.car, 1);
        assert_eq!(h.cycle.car_plate_history.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_makes_seen_objects_new_again() {
        let mut h = harness(remote_settings());
        h.cycle.process_batch(vec![event(Category::Plate, "ABC123")], at(0));
        h.cycle.apply(Mutation::ResetCounters).await.unwrap();

        let snapshot = h.cycle.snapshot();
        assert_eq!(snapshot.counters, Default::default());
        assert!(snapshot.plate_ticker.is_empty());
        assert!(h.cycle.car_plate_history.is_empty());

        let summary = h.cycle.process_batch(vec![event(Category::Plate, "ABC123")], at(100));
        assert_eq!(summary.counted, 1);
    }

    #[test]
    fn test_disabled_category_is_ignored() {
        let settings = Settings::default()
            .merged(&json!({ "detection": { "car_enabled": false } }))
            .unwrap();
        let mut h = harness(settings);
        let summary = h.cycle.process_batch(vec![event(Category::Car, "7")], at(0));
        assert_eq!(summary.counted, 0);
        assert!(h.cycle.car_plate_history.is_empty());
    }

    #[test]
    fn test_traffic_lights_are_counted_but_not_buffered() {
        let mut h = harness(Settings::default());
        h.cycle.process_batch(vec![event(Category::TrafficLight, "tl-1")], at(0));
        assert_eq!(h.cycle.snapshot().counters.traffic_light, 1);
        assert!(h.cycle.car_plate_history.is_empty());
        assert!(h.cycle.person_history.is_empty());
        // Archive is enabled by default, so the dispatcher still gets an alert.
        let sent = drain(&mut h.alerts);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].archive);
        assert!(sent[0].remote.is_none());
    }

    #[test]
    fn test_plate_ticker_keeps_three_newest_counted() {
        let mut h = harness(Settings::default());
        for (i, plate) in ["A", "B", "C", "D"].into_iter().enumerate() {
            h.cycle.process_batch(vec![event(Category::Plate, plate)], at(i as i64));
        }
        assert_eq!(h.cycle.snapshot().plate_ticker, vec!["D", "C", "B"]);
    }

    #[test]
    fn test_audio_plays_on_appearance() {
        let mut audio = MockAudioSink::new();
        audio.expect_play().withf(|c| *c == Category::Car).times(1).returning(|_| ());
        let mut h = harness_with(Settings::default(), MockRecognitionSource::new(), audio);

        h.cycle.process_batch(vec![event(Category::Car, "7")], at(0));
        h.cycle.process_batch(vec![event(Category::Car, "7")], at(10));
    }

    #[tokio::test]
    async fn test_hook_can_rewrite_caption_or_suppress() {
        let mut h = harness(remote_settings());
        h.cycle
            .apply(Mutation::DefineFunction {
                name: DETECTION_HOOK.into(),
                code: r#"
                    fn on_new_detection(event) {
                        if event.category == "person" { return false; }
                        `Seen ${event.identifier}`
                    }
                "#
                .into(),
            })
            .await
            .unwrap();

        h.cycle.process_batch(vec![event(Category::Plate, "ABC123")], at(0));
        h.cycle.process_batch(vec![event(Category::Person, "p1")], at(0));

        let sent = drain(&mut h.alerts);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].caption, "Seen ABC123");
        assert_eq!(h.cycle.snapshot().counters.person, 1);
    }

    #[tokio::test]
    async fn test_failed_mutations_leave_state_untouched() {
        let mut h = harness(Settings::default());

        let err = h
            .cycle
            .apply(Mutation::UpdateSettings(json!({ "detection": { "unknown": 1 } })))
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::Settings(_)));

        let err = h
            .cycle
            .apply(Mutation::ModifyElement {
                element_id: "nope".into(),
                properties: Default::default(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::Element(_)));

        assert_eq!(h.cycle.snapshot().settings, Settings::default());
    }

    #[tokio::test]
    async fn test_settings_propagate_cooldown_and_retention() {
        let mut source = MockRecognitionSource::new();
        source
            .expect_set_detection_interval()
            .withf(|d| *d == Duration::from_secs(1))
            .times(1)
            .returning(|_| ());
        let mut h = harness_with(Settings::default(), source, quiet_audio());
        assert_eq!(*h.retention.borrow(), Duration::from_secs(24 * 3600));

        h.cycle
            .apply(Mutation::UpdateSettings(json!({
                "detection": { "cooldown_secs": 1.0 },
                "archive": { "retention_hours": 2 }
            })))
            .await
            .unwrap();

        assert_eq!(*h.retention.borrow(), Duration::from_secs(2 * 3600));
        assert_eq!(h.cycle.dedup.cooldown(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_tick_skips_missing_images_and_renders() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.jpg");
        std::fs::write(&present, b"jpg").unwrap();
        let detections = vec![
            DetectionEvent::new(Category::Plate, "HAS", &present, at(0)),
            DetectionEvent::new(Category::Plate, "MISSING", dir.path().join("gone.jpg"), at(0)),
        ];

        let mut source = MockRecognitionSource::new();
        source.expect_set_detection_interval().returning(|_| ());
        source.expect_start().times(1).returning(|| Ok(()));
        source
            .expect_next_frame()
            .returning(|| Ok(Some(Frame { captured_at: Utc::now(), image: None })));
        source.expect_recent_detections().times(1).return_once(move || detections);

        let mut h = harness_with(Settings::default(), source, quiet_audio());
        h.cycle.apply(Mutation::StartDetection).await.unwrap();
        let summary = h.cycle.tick().await.unwrap();

        assert_eq!(summary.counted, 1);
        let frame = h.display.borrow().clone().unwrap();
        assert_eq!(frame.car_plate_slots[0].caption, "Plate: HAS");
        assert_eq!(frame.counters.plate, "1");
        assert!(frame.video.running);
    }

    #[tokio::test]
    async fn test_stop_detection_resets_state() {
        let mut source = MockRecognitionSource::new();
        source.expect_set_detection_interval().returning(|_| ());
        source.expect_start().times(1).returning(|| Ok(()));
        source.expect_stop().times(1).returning(|| ());

        let mut h = harness_with(Settings::default(), source, quiet_audio());
        h.cycle.apply(Mutation::StartDetection).await.unwrap();
        h.cycle.process_batch(vec![event(Category::Car, "7")], at(0));
        h.cycle.apply(Mutation::StopDetection).await.unwrap();

        let snapshot = h.cycle.snapshot();
        assert!(!snapshot.running);
        assert_eq!(snapshot.counters.car, 0);
    }
}
