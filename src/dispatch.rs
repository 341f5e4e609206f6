use tracing::{info, warn};

use crate::command::{Command, ConversationRequest, MimicRequest, PhraseRequest, TrackRequest};

/// The closed set of command handlers.
///
/// Adding a command kind means adding a [`Command`] variant and a method
/// here; there is no runtime registration.
#[allow(async_fn_in_trait)]
pub trait CommandHandler {
    async fn play_track(&mut self, track: TrackRequest);
    fn stop(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn set_volume(&mut self, volume: i64);
    fn seek(&mut self, position_ms: i64);
    async fn play_phrase(&mut self, phrase: PhraseRequest);
    async fn play_conversation(&mut self, conversation: ConversationRequest);
    async fn play_mimic(&mut self, mimic: MimicRequest);
}

/// Route one command to its handler. Unknown tags are logged and dropped.
pub async fn dispatch<H: CommandHandler>(handler: &mut H, command: Command) {
    if let Command::Unknown(tag) = &command {
        warn!("Unknown command type: {}", tag);
        return;
    }
    info!("Command type: {}", command.tag());

    match command {
        Command::PlayTrack(track) => handler.play_track(track).await,
        Command::Stop => handler.stop(),
        Command::Pause => handler.pause(),
        Command::Resume => handler.resume(),
        Command::SetVolume { volume } => handler.set_volume(volume),
        Command::Seek { position_ms } => handler.seek(position_ms),
        Command::PlayPhrase(phrase) => handler.play_phrase(phrase).await,
        Command::PlayConversation(conversation) => {
            handler.play_conversation(conversation).await
        }
        Command::PlayMimic(mimic) => handler.play_mimic(mimic).await,
        Command::Unknown(_) => {}
    }
}
