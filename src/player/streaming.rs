use std::fs::OpenOptions;
use std::io::{self, Write};
use std::time::Duration;

use futures::{Stream, StreamExt, stream};
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::{error, info, warn};

use crate::command::{ConversationRequest, MimicRequest, PhraseRequest, TrackRequest};
use crate::config::PlaybackConfig;
use crate::dispatch::CommandHandler;
use crate::playback::{self, DacSink, PlaybackError, PlaybackOutcome, PlaybackStats};
use crate::server::{ServerClient, ServerError};
use crate::state::PlaybackState;

type DacOutput = Box<dyn Write + Send>;

/// Handler set that streams WAV audio from the server to the DAC output.
///
/// Playback is synchronous from the poll loop's point of view: a handler
/// returns only once its stream has ended, so at most one stream is ever
/// in flight.
pub struct StreamingPlayer {
    state: PlaybackState,
    server: ServerClient,
    config: PlaybackConfig,
}

impl StreamingPlayer {
    pub fn new(server: ServerClient, config: PlaybackConfig) -> Self {
        Self {
            state: PlaybackState::default(),
            server,
            config,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Fetch, decode and output the WAV stream at `url`.
    pub async fn stream(&self, url: &str) -> Result<PlaybackStats, PlaybackError> {
        let response = self.open_with_retries(url).await?;
        let sink = DacSink::new(self.open_output()?, self.effective_gain());

        let body = with_idle_timeout(
            Box::pin(response.bytes_stream()),
            self.config.stream_idle_timeout,
        );
        let source = SyncIoBridge::new(StreamReader::new(Box::pin(body)));

        info!("Streaming audio from {}", url);
        match tokio::task::spawn_blocking(move || playback::play(source, sink)).await {
            Ok(result) => result,
            Err(e) => Err(PlaybackError::Aborted(e.to_string())),
        }
    }

    /// Play a server-hosted resource and report the outcome.
    pub async fn play_resource(&self, resource_id: &str) -> PlaybackOutcome {
        let url = self.server.audio_url(resource_id);
        let result = self.stream(&url).await;
        log_result(&result);

        let outcome = PlaybackOutcome::of(&result);
        match self.server.confirm(resource_id, outcome).await {
            Ok(status) => info!("Confirm {} -> {}", outcome.as_str(), status),
            Err(e) => warn!("Confirm {} for {} failed: {}", outcome.as_str(), resource_id, e),
        }
        outcome
    }

    async fn play_if_present(&self, resource_id: &str) {
        if resource_id.is_empty() {
            warn!("Command has no audio_id, nothing to play");
            return;
        }
        self.play_resource(resource_id).await;
    }

    async fn open_with_retries(&self, url: &str) -> Result<reqwest::Response, ServerError> {
        let attempts = self.config.stream_open_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.server.open_audio(url).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < attempts => {
                    warn!(
                        "Opening stream failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempt, attempts, e, self.config.stream_retry_delay
                    );
                    tokio::time::sleep(self.config.stream_retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn open_output(&self) -> io::Result<DacOutput> {
        match &self.config.output {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Ok(Box::new(file))
            }
            None => Ok(Box::new(io::sink())),
        }
    }

    fn effective_gain(&self) -> f32 {
        self.config.gain * self.state.volume_factor()
    }
}

/// Fail the body with `TimedOut` when no chunk arrives for `idle`.
///
/// The decoder reads through a blocking bridge, so a server that stops
/// sending mid-stream would otherwise hold the poll loop forever.
fn with_idle_timeout<S, B, E>(body: S, idle: Duration) -> impl Stream<Item = io::Result<B>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + Unpin,
    B: Send,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + Send,
{
    stream::unfold(Some(body), move |state| async move {
        let mut body = state?;
        match tokio::time::timeout(idle, body.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
            Ok(Some(Err(e))) => Some((Err(io::Error::other(e)), None)),
            Ok(None) => None,
            Err(_) => {
                let err = io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no audio data for {idle:?}"),
                );
                Some((Err(err), None))
            }
        }
    })
}

fn log_result(result: &Result<PlaybackStats, PlaybackError>) {
    match result {
        Ok(stats) => info!(
            "End of stream: {} frames at {} Hz",
            stats.frames, stats.format.sample_rate
        ),
        Err(e) => error!("Playback failed: {}", e),
    }
}

impl CommandHandler for StreamingPlayer {
    async fn play_track(&mut self, track: TrackRequest) {
        self.state.start_track(&track);
        info!(
            "Play track: title={:?} artist={:?} url={}",
            track.title, track.artist, track.url
        );
        if track.url.is_empty() {
            warn!("Track has no url, nothing to play");
            self.state.is_playing = false;
            return;
        }
        let result = self.stream(&track.url).await;
        log_result(&result);
        self.state.is_playing = false;
    }

    fn stop(&mut self) {
        self.state.stop();
        info!("Playback stopped");
    }

    fn pause(&mut self) {
        info!("Pause requested; streams play to completion");
    }

    fn resume(&mut self) {
        info!("Resume requested; streams play to completion");
    }

    fn set_volume(&mut self, volume: i64) {
        let volume = self.state.set_volume(volume);
        info!("Volume set to {}%", volume);
    }

    fn seek(&mut self, position_ms: i64) {
        info!("Seek to {} s ignored for streamed audio", position_ms / 1000);
    }

    async fn play_phrase(&mut self, phrase: PhraseRequest) {
        info!("Phrase {:?} (audio_id={})", phrase.name, phrase.audio_id);
        self.play_if_present(&phrase.audio_id).await;
    }

    async fn play_conversation(&mut self, conversation: ConversationRequest) {
        info!(
            "Conversation: user said {:?}, robot answers {:?} (audio_id={})",
            conversation.user_text, conversation.robot_text, conversation.audio_id
        );
        self.play_if_present(&conversation.audio_id).await;
    }

    async fn play_mimic(&mut self, mimic: MimicRequest) {
        info!(
            "Mimic {:?} with effect {:?} (audio_id={})",
            mimic.text, mimic.effect, mimic.audio_id
        );
        self.play_if_present(&mimic.audio_id).await;
    }
}
