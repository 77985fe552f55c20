//! The level-triggered audio channel.

#[cfg(test)]
use mockall::automock;

use crate::models::{AudioTrigger, Category, Presence, settings::AudioSettings};

/// Plays the alert sound. Playback itself lives outside this crate.
#[cfg_attr(test, automock)]
pub trait AudioSink: Send + Sync {
    /// Plays the alert for `category`. Must not block.
    fn play(&self, category: Category);
}

/// An audio sink that only logs.
#[derive(Debug, Default)]
pub struct LogAudioSink;

impl AudioSink for LogAudioSink {
    fn play(&self, category: Category) {
        tracing::info!(category = %category, "Alert sound.");
    }
}

/// Decides when the audio alert plays from the per-cycle presence set.
#[derive(Debug, Default)]
pub struct AudioChannel {
    previous: Presence,
}

impl AudioChannel {
    /// Records this cycle's presence and returns the categories to play for.
    pub fn update(&mut self, presence: Presence, settings: &AudioSettings) -> Vec<Category> {
        let previous = std::mem::replace(&mut self.previous, presence);
        if !settings.enabled {
            return Vec::new();
        }
        match settings.trigger {
            AudioTrigger::EveryCycle => presence.iter().collect(),
            AudioTrigger::OnAppearance => {
                presence.iter().filter(|category| !previous.contains(*category)).collect()
            }
        }
    }

    /// Forgets the previous presence set.
    pub fn reset(&mut self) {
        self.previous = Presence::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence(categories: &[Category]) -> Presence {
        categories.iter().copied().collect()
    }

    #[test]
    fn test_on_appearance_plays_on_transition_only() {
        let settings = AudioSettings::default();
        let mut channel = AudioChannel::default();

        assert_eq!(channel.update(presence(&[Category::Car]), &settings), vec![Category::Car]);
        assert!(channel.update(presence(&[Category::Car]), &settings).is_empty());
        assert_eq!(
            channel.update(presence(&[Category::Car, Category::Person]), &settings),
            vec![Category::Person]
        );
        assert!(channel.update(presence(&[]), &settings).is_empty());
        assert_eq!(channel.update(presence(&[Category::Car]), &settings), vec![Category::Car]);
    }

    #[test]
    fn test_every_cycle_plays_for_all_present() {
        let settings = AudioSettings { trigger: AudioTrigger::EveryCycle, ..Default::default() };
        let mut channel = AudioChannel::default();

        for _ in 0..2 {
            assert_eq!(
                channel.update(presence(&[Category::Plate, Category::Person]), &settings),
                vec![Category::Person, Category::Plate]
            );
        }
    }

    #[test]
    fn test_disabled_plays_nothing() {
        let settings = AudioSettings { enabled: false, ..Default::default() };
        let mut channel = AudioChannel::default();
        assert!(channel.update(presence(&[Category::Car]), &settings).is_empty());
    }

    #[test]
    fn test_reset_makes_present_categories_appear_again() {
        let settings = AudioSettings::default();
        let mut channel = AudioChannel::default();
        channel.update(presence(&[Category::Car]), &settings);
        channel.reset();
        assert_eq!(channel.update(presence(&[Category::Car]), &settings), vec![Category::Car]);
    }
}
