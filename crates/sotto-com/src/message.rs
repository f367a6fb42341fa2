use serde::{Deserialize, Serialize};
use sotto_stt::SttEvent;

/// Frames a client may send on `/rtstt`. Raw binary frames (a bare PCM
/// chunk) are also accepted and bypass JSON entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "audio chunk")]
    AudioChunk {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
    /// Ends the session cleanly.
    #[serde(rename = "EOF")]
    Eof,
}

/// Frames the server sends back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "start speaking")]
    StartSpeaking,
    #[serde(rename = "stop speaking")]
    StopSpeaking,
    #[serde(rename = "text")]
    Text { text: String },
}

impl From<SttEvent> for ServerMessage {
    fn from(event: SttEvent) -> Self {
        match event {
            SttEvent::StartSpeaking => ServerMessage::StartSpeaking,
            SttEvent::StopSpeaking => ServerMessage::StopSpeaking,
            SttEvent::Text(text) => ServerMessage::Text { text },
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_messages_use_the_wire_names() {
        assert_eq!(
            serde_json::to_string(&ServerMessage::StartSpeaking).unwrap(),
            r#"{"type":"start speaking"}"#
        );
        assert_eq!(
            serde_json::to_string(&ServerMessage::StopSpeaking).unwrap(),
            r#"{"type":"stop speaking"}"#
        );
        assert_eq!(
            serde_json::to_string(&ServerMessage::Text { text: "hi".to_string() }).unwrap(),
            r#"{"type":"text","text":"hi"}"#
        );
    }

    #[test]
    fn audio_chunk_payload_is_base64() {
        let message = ClientMessage::AudioChunk {
            data: vec![0, 1, 2, 255],
        };
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(json, r#"{"type":"audio chunk","data":"AAEC/w=="}"#);

        let parsed: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn eof_is_a_bare_tag() {
        let parsed: ClientMessage = serde_json::from_str(r#"{"type":"EOF"}"#).unwrap();
        assert_eq!(parsed, ClientMessage::Eof);
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"video chunk"}"#).is_err());
    }

    #[test]
    fn events_map_onto_server_messages() {
        assert_eq!(
            ServerMessage::from(SttEvent::Text("ok".to_string())),
            ServerMessage::Text { text: "ok".to_string() }
        );
        assert_eq!(ServerMessage::from(SttEvent::StartSpeaking), ServerMessage::StartSpeaking);
    }
}
