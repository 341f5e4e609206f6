use tracing::info;

use crate::command::{ConversationRequest, MimicRequest, PhraseRequest, TrackRequest};
use crate::dispatch::CommandHandler;
use crate::state::PlaybackState;

/// Handler set that tracks playback state and logs, without producing audio.
#[derive(Debug, Default)]
pub struct SimulatedPlayer {
    state: PlaybackState,
}

impl SimulatedPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }
}

impl CommandHandler for SimulatedPlayer {
    async fn play_track(&mut self, track: TrackRequest) {
        self.state.start_track(&track);
        info!(
            "Play track: title={:?} artist={:?} url={}",
            track.title, track.artist, track.url
        );
        info!("[simulated] playback started");
    }

    fn stop(&mut self) {
        self.state.stop();
        info!("[simulated] playback stopped");
    }

    fn pause(&mut self) {
        info!("[simulated] playback paused");
    }

    fn resume(&mut self) {
        info!("[simulated] playback resumed");
    }

    fn set_volume(&mut self, volume: i64) {
        let volume = self.state.set_volume(volume);
        info!("[simulated] volume set to {}%", volume);
    }

    fn seek(&mut self, position_ms: i64) {
        info!("[simulated] seek to {} s", position_ms / 1000);
    }

    async fn play_phrase(&mut self, phrase: PhraseRequest) {
        info!(
            "[simulated] phrase {:?} (audio_id={})",
            phrase.name, phrase.audio_id
        );
    }

    async fn play_conversation(&mut self, conversation: ConversationRequest) {
        info!(
            "[simulated] conversation: user said {:?}, robot answers {:?} (audio_id={})",
            conversation.user_text, conversation.robot_text, conversation.audio_id
        );
    }

    async fn play_mimic(&mut self, mimic: MimicRequest) {
        info!(
            "[simulated] mimic {:?} with effect {:?} (audio_id={})",
            mimic.text, mimic.effect, mimic.audio_id
        );
    }
}
