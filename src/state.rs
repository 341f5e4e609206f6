use crate::command::TrackRequest;

pub const DEFAULT_VOLUME: u8 = 80;
pub const MAX_VOLUME: u8 = 100;

/// What the device believes it is playing.
///
/// Owned by the active command handler and only changed by dispatched
/// commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackState {
    pub title: String,
    pub artist: String,
    pub stream_url: String,
    pub volume: u8,
    pub is_playing: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            title: String::new(),
            artist: String::new(),
            stream_url: String::new(),
            volume: DEFAULT_VOLUME,
            is_playing: false,
        }
    }
}

impl PlaybackState {
    pub fn start_track(&mut self, track: &TrackRequest) {
        self.title.clone_from(&track.title);
        self.artist.clone_from(&track.artist);
        self.stream_url.clone_from(&track.url);
        self.is_playing = true;
    }

    pub fn stop(&mut self) {
        self.is_playing = false;
        self.title.clear();
        self.artist.clear();
        self.stream_url.clear();
    }

    /// Store a volume, clamped to `0..=100`. Returns the stored value.
    pub fn set_volume(&mut self, volume: i64) -> u8 {
        self.volume = volume.clamp(0, i64::from(MAX_VOLUME)) as u8;
        self.volume
    }

    /// Volume as a linear factor in `0.0..=1.0`.
    pub fn volume_factor(&self) -> f32 {
        f32::from(self.volume) / f32::from(MAX_VOLUME)
    }
}
