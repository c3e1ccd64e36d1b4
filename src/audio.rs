//! Audio Playback Controller
//!
//! Owns the one audio output shared by every message and the live reply.
//! Switching sources always stops the previous clip (pause, rewind) before
//! the new source is bound, and at most one message index is ever marked as
//! playing.

use crate::voice::AudioOutput;

/// Coordinates play/pause/replace across messages on a single output
pub struct PlaybackController {
    output: Box<dyn AudioOutput>,
    bound: Option<String>,
    playing: Option<usize>,
}

impl PlaybackController {
    /// Take ownership of the output
    #[must_use]
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self {
            output,
            bound: None,
            playing: None,
        }
    }

    /// Play message `index` from the start, stopping anything else
    ///
    /// A live reply is appended before it is spoken, so it plays through here
    /// bound to its own index. Returns whether playback started.
    pub async fn play_message(&mut self, index: usize, url: &str) -> bool {
        self.playing = None;
        let started = self.start(url).await;
        if started {
            self.playing = Some(index);
        }
        started
    }

    /// Pause message `index` if it is playing, otherwise switch to it
    ///
    /// Returns whether `index` is playing afterwards.
    pub async fn toggle(&mut self, index: usize, url: &str) -> bool {
        self.refresh();
        if self.playing == Some(index) {
            self.output.pause();
            self.playing = None;
            tracing::debug!(index, "paused message audio");
            return false;
        }

        self.play_message(index, url).await
    }

    /// Stop whatever is playing
    pub fn stop(&mut self) {
        self.output.pause();
        self.output.rewind();
        self.playing = None;
    }

    /// Clear the playing flag once the output has run off the end of its clip
    ///
    /// Returns whether the flag changed.
    pub fn refresh(&mut self) -> bool {
        if self.playing.is_some() && !self.output.is_playing() {
            tracing::debug!(index = ?self.playing, "message audio finished");
            self.playing = None;
            return true;
        }
        false
    }

    /// Whether message `index` is marked as playing
    #[must_use]
    pub fn is_playing(&self, index: usize) -> bool {
        self.playing == Some(index)
    }

    /// The message currently marked as playing
    #[must_use]
    pub const fn playing_index(&self) -> Option<usize> {
        self.playing
    }

    /// Source currently bound to the output
    #[must_use]
    pub fn bound_source(&self) -> Option<&str> {
        self.bound.as_deref()
    }

    async fn start(&mut self, url: &str) -> bool {
        self.output.pause();
        self.output.rewind();
        self.output.load(url);
        self.bound = Some(url.to_string());

        match self.output.play().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, source = url, "audio playback error");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::{Error, Result};

    /// Records every command sent to the output
    #[derive(Clone, Default)]
    struct RecordingOutput {
        log: Arc<Mutex<Vec<String>>>,
        sounding: Arc<AtomicBool>,
        fail: bool,
    }

    #[async_trait]
    impl AudioOutput for RecordingOutput {
        fn load(&mut self, source: &str) {
            self.log.lock().unwrap().push(format!("load {source}"));
        }

        async fn play(&mut self) -> Result<()> {
            self.log.lock().unwrap().push("play".to_string());
            if self.fail {
                return Err(Error::Audio("device busy".to_string()));
            }
            self.sounding.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn pause(&mut self) {
            self.log.lock().unwrap().push("pause".to_string());
            self.sounding.store(false, Ordering::SeqCst);
        }

        fn rewind(&mut self) {
            self.log.lock().unwrap().push("rewind".to_string());
        }

        fn is_playing(&self) -> bool {
            self.sounding.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn switching_stops_previous_before_binding() {
        let output = RecordingOutput::default();
        let log = Arc::clone(&output.log);
        let mut player = PlaybackController::new(Box::new(output));

        assert!(player.toggle(1, "b.mp3").await);
        log.lock().unwrap().clear();

        assert!(player.toggle(3, "a.mp3").await);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["pause", "rewind", "load a.mp3", "play"]
        );
        assert!(player.is_playing(3));
        assert!(!player.is_playing(1));
        assert_eq!(player.bound_source(), Some("a.mp3"));
    }

    #[tokio::test]
    async fn toggling_playing_message_pauses_it() {
        let output = RecordingOutput::default();
        let log = Arc::clone(&output.log);
        let mut player = PlaybackController::new(Box::new(output));

        player.toggle(1, "b.mp3").await;
        log.lock().unwrap().clear();

        assert!(!player.toggle(1, "b.mp3").await);
        assert_eq!(*log.lock().unwrap(), vec!["pause"]);
        assert_eq!(player.playing_index(), None);
    }

    #[tokio::test]
    async fn playback_error_clears_flag() {
        let output = RecordingOutput {
            fail: true,
            ..RecordingOutput::default()
        };
        let mut player = PlaybackController::new(Box::new(output));

        assert!(!player.toggle(2, "c.mp3").await);
        assert_eq!(player.playing_index(), None);
    }

    #[tokio::test]
    async fn finished_clip_plays_again_on_first_toggle() {
        let output = RecordingOutput::default();
        let log = Arc::clone(&output.log);
        let sounding = Arc::clone(&output.sounding);
        let mut player = PlaybackController::new(Box::new(output));

        assert!(player.toggle(1, "b.mp3").await);
        sounding.store(false, Ordering::SeqCst);
        log.lock().unwrap().clear();

        assert!(player.toggle(1, "b.mp3").await);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["pause", "rewind", "load b.mp3", "play"]
        );
        assert!(player.is_playing(1));
    }

    #[tokio::test]
    async fn refresh_clears_finished_flag() {
        let output = RecordingOutput::default();
        let sounding = Arc::clone(&output.sounding);
        let mut player = PlaybackController::new(Box::new(output));

        player.play_message(0, "a.mp3").await;
        assert!(!player.refresh());
        assert_eq!(player.playing_index(), Some(0));

        sounding.store(false, Ordering::SeqCst);
        assert!(player.refresh());
        assert_eq!(player.playing_index(), None);
    }
}
