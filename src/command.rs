//! Poll body decoding.
//!
//! The server answers a poll with `{"comandos": [{"tipo": ..., ...}]}`.
//! Every element is turned into one [`Command`]; field access is lenient,
//! a missing text field reads as `""` and a missing number as `0`.

use serde_json::{Map, Value};
use thiserror::Error;

/// Array field holding the queued commands.
pub const COMMANDS_FIELD: &str = "comandos";
/// Field holding a command's type tag.
pub const TAG_FIELD: &str = "tipo";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("poll body exceeds {limit} bytes")]
    Oversized { limit: usize },

    #[error("malformed poll body: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackRequest {
    pub url: String,
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhraseRequest {
    pub audio_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationRequest {
    pub audio_id: String,
    pub user_text: String,
    pub robot_text: String,
}

/// Text repeated back in a modified voice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimicRequest {
    pub audio_id: String,
    pub text: String,
    pub effect: String,
}

/// One queued instruction for the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    PlayTrack(TrackRequest),
    Stop,
    Pause,
    Resume,
    SetVolume { volume: i64 },
    Seek { position_ms: i64 },
    PlayPhrase(PhraseRequest),
    PlayConversation(ConversationRequest),
    PlayMimic(MimicRequest),
    /// A tag this firmware does not know. Carries the tag for logging.
    Unknown(String),
}

impl Command {
    /// Build a command from one element of the `comandos` array.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let tag = text(fields, TAG_FIELD);
        match tag.as_str() {
            "reproducir_musica" => Self::PlayTrack(TrackRequest {
                url: text(fields, "url"),
                title: text(fields, "titulo"),
                artist: text(fields, "artista"),
            }),
            "musica_detener" => Self::Stop,
            "musica_pausa" => Self::Pause,
            "musica_continuar" => Self::Resume,
            "musica_volumen" => Self::SetVolume {
                volume: int(fields, "volume"),
            },
            "musica_seek" => Self::Seek {
                position_ms: int(fields, "position_ms"),
            },
            "reproducir_frase" => Self::PlayPhrase(PhraseRequest {
                audio_id: text(fields, "audio_id"),
                name: text(fields, "nombre"),
            }),
            "reproducir_conversacion" => Self::PlayConversation(ConversationRequest {
                audio_id: text(fields, "audio_id"),
                user_text: text(fields, "texto_usuario"),
                robot_text: text(fields, "texto_robot"),
            }),
            "reproducir_loro" => Self::PlayMimic(MimicRequest {
                audio_id: text(fields, "audio_id"),
                text: text(fields, "texto"),
                effect: text(fields, "efecto"),
            }),
            _ => Self::Unknown(tag),
        }
    }

    /// The wire tag this command was decoded from.
    pub fn tag(&self) -> &str {
        match self {
            Self::PlayTrack(_) => "reproducir_musica",
            Self::Stop => "musica_detener",
            Self::Pause => "musica_pausa",
            Self::Resume => "musica_continuar",
            Self::SetVolume { .. } => "musica_volumen",
            Self::Seek { .. } => "musica_seek",
            Self::PlayPhrase(_) => "reproducir_frase",
            Self::PlayConversation(_) => "reproducir_conversacion",
            Self::PlayMimic(_) => "reproducir_loro",
            Self::Unknown(tag) => tag,
        }
    }
}

/// Decode a complete poll body of at most `limit` bytes.
///
/// A body without a `comandos` array yields no commands, and elements that
/// are not objects are skipped.
pub fn decode_poll_body(body: &[u8], limit: usize) -> Result<Vec<Command>, DecodeError> {
    if body.len() > limit {
        return Err(DecodeError::Oversized { limit });
    }

    let document: Value = serde_json::from_slice(body)?;
    let Some(entries) = document.get(COMMANDS_FIELD).and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    Ok(entries
        .iter()
        .filter_map(Value::as_object)
        .map(Command::from_fields)
        .collect())
}

fn text(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn int(fields: &Map<String, Value>, key: &str) -> i64 {
    match fields.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 2048;

    fn decode(body: &str) -> Vec<Command> {
        decode_poll_body(body.as_bytes(), LIMIT).unwrap()
    }

    #[test]
    fn decodes_volume_command() {
        let commands = decode(r#"{"comandos":[{"tipo":"musica_volumen","volume":45}]}"#);
        assert_eq!(commands, vec![Command::SetVolume { volume: 45 }]);
    }

    #[test]
    fn unknown_tag_is_kept_for_logging() {
        let commands = decode(r#"{"comandos":[{"tipo":"desconocido"}]}"#);
        assert_eq!(commands, vec![Command::Unknown("desconocido".into())]);
        assert_eq!(commands[0].tag(), "desconocido");
    }

    #[test]
    fn decodes_every_known_tag_in_order() {
        let body = r#"{"comandos":[
            {"tipo":"reproducir_musica","url":"http://x/a.wav","titulo":"Song","artista":"Band"},
            {"tipo":"musica_detener"},
            {"tipo":"musica_pausa"},
            {"tipo":"musica_continuar"},
            {"tipo":"musica_volumen","volume":10},
            {"tipo":"musica_seek","position_ms":61500},
            {"tipo":"reproducir_frase","audio_id":"a1","nombre":"hola"},
            {"tipo":"reproducir_conversacion","audio_id":"a2","texto_usuario":"hi","texto_robot":"hello"},
            {"tipo":"reproducir_loro","audio_id":"a3","texto":"repeat","efecto":"robot"}
        ]}"#;
        let commands = decode(body);
        assert_eq!(
            commands,
            vec![
                Command::PlayTrack(TrackRequest {
                    url: "http://x/a.wav".into(),
                    title: "Song".into(),
                    artist: "Band".into(),
                }),
                Command::Stop,
                Command::Pause,
                Command::Resume,
                Command::SetVolume { volume: 10 },
                Command::Seek { position_ms: 61500 },
                Command::PlayPhrase(PhraseRequest {
                    audio_id: "a1".into(),
                    name: "hola".into(),
                }),
                Command::PlayConversation(ConversationRequest {
                    audio_id: "a2".into(),
                    user_text: "hi".into(),
                    robot_text: "hello".into(),
                }),
                Command::PlayMimic(MimicRequest {
                    audio_id: "a3".into(),
                    text: "repeat".into(),
                    effect: "robot".into(),
                }),
            ]
        );
        for command in &commands {
            assert_eq!(Command::from_fields(&tagged(command.tag())).tag(), command.tag());
        }
    }

    fn tagged(tag: &str) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(TAG_FIELD.into(), Value::String(tag.into()));
        fields
    }

    #[test]
    fn missing_fields_default_to_empty_and_zero() {
        let commands = decode(
            r#"{"comandos":[{"tipo":"reproducir_musica"},{"tipo":"musica_volumen"},{"tipo":"reproducir_frase","audio_id":17}]}"#,
        );
        assert_eq!(commands[0], Command::PlayTrack(TrackRequest::default()));
        assert_eq!(commands[1], Command::SetVolume { volume: 0 });
        assert_eq!(
            commands[2],
            Command::PlayPhrase(PhraseRequest {
                audio_id: "17".into(),
                name: String::new(),
            })
        );
    }

    #[test]
    fn numeric_fields_truncate_floats_and_ignore_text() {
        let commands = decode(
            r#"{"comandos":[{"tipo":"musica_seek","position_ms":1500.9},{"tipo":"musica_volumen","volume":"45"}]}"#,
        );
        assert_eq!(commands[0], Command::Seek { position_ms: 1500 });
        assert_eq!(commands[1], Command::SetVolume { volume: 0 });
    }

    #[test]
    fn missing_tag_is_unknown() {
        let commands = decode(r#"{"comandos":[{"volume":3}]}"#);
        assert_eq!(commands, vec![Command::Unknown(String::new())]);
    }

    #[test]
    fn absent_or_non_array_commands_yield_nothing() {
        assert!(decode("{}").is_empty());
        assert!(decode(r#"{"comandos":null}"#).is_empty());
        assert!(decode(r#"{"comandos":{"tipo":"musica_pausa"}}"#).is_empty());
        assert!(decode(r#"{"comandos":[]}"#).is_empty());
    }

    #[test]
    fn non_object_elements_are_skipped() {
        let commands = decode(r#"{"comandos":[1,"musica_pausa",{"tipo":"musica_pausa"}]}"#);
        assert_eq!(commands, vec![Command::Pause]);
    }

    #[test]
    fn malformed_body_is_an_error() {
        let err = decode_poll_body(br#"{"comandos":[{"tipo":"#, LIMIT).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn oversized_body_is_rejected() {
        let body = vec![b' '; LIMIT + 1];
        let err = decode_poll_body(&body, LIMIT).unwrap_err();
        assert!(matches!(err, DecodeError::Oversized { limit: LIMIT }));
    }
}
