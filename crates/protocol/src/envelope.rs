//! Umschlaege (Envelopes) des Chat-Protokolls
//!
//! Jede Nachricht ist ein JSON-Objekt mit einem `type`-Feld. Die einzige
//! Ausnahme ist der Handshake, der nur aus `{"nickname": ...}` besteht.
//!
//! ## Design
//! - Tagged Enums fuer typsichere Nachrichtentypen
//! - Getrennte Enums pro Richtung (Client -> Server, Server -> Client)
//! - Serialisierung erfolgt einmal pro Nachricht zu `Bytes`, damit ein
//!   Broadcast dieselben Bytes an alle Empfaenger verteilen kann

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Erste Nachricht jeder Verbindung
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    #[serde(default)]
    pub nickname: Option<String>,
}

impl Handshake {
    pub fn neu(nickname: impl Into<String>) -> Self {
        Self {
            nickname: Some(nickname.into()),
        }
    }

    /// Gibt den getrimmten Nickname zurueck, sofern er nicht leer ist
    pub fn gueltiger_nickname(&self) -> Option<&str> {
        self.nickname
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    pub fn to_bytes(&self) -> serde_json::Result<Bytes> {
        json_bytes(self)
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Alle Nachrichten, die ein Client nach dem Handshake senden darf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientNachricht {
    /// Oeffentliche Chat-Nachricht
    TextMessage { message: String },
    /// Private Nachricht an einen einzelnen Nickname
    Whisper { target: String, message: String },
    /// Ankuendigung eines Datei-Uploads, danach folgen `size` Rohbytes
    FileMetadata {
        filename: String,
        size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    /// Anforderung eines Downloads
    FileRequest { filename: String },
    /// Sauberes Trennen der Verbindung
    Disconnect,
}

impl ClientNachricht {
    /// Parst einen vom Framer gelieferten Umschlag
    pub fn aus_json(rohdaten: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(rohdaten)
    }

    pub fn to_bytes(&self) -> serde_json::Result<Bytes> {
        json_bytes(self)
    }

    /// Protokollname des Nachrichtentyps (fuer Logs und Metriken)
    pub fn typ_name(&self) -> &'static str {
        match self {
            Self::TextMessage { .. } => "TEXT_MESSAGE",
            Self::Whisper { .. } => "WHISPER",
            Self::FileMetadata { .. } => "FILE_METADATA",
            Self::FileRequest { .. } => "FILE_REQUEST",
            Self::Disconnect => "DISCONNECT",
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Status einer FILE_ACK-Antwort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ready,
    Error,
}

/// Alle Nachrichten, die der Server an Clients sendet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerNachricht {
    /// Antwort auf einen erfolgreichen Handshake
    ConnectionSuccess { message: String },
    /// Oeffentliche Nachricht mit Absender und Server-Zeitstempel
    TextMessage {
        sender: String,
        message: String,
        time: String,
    },
    /// Private Nachricht (nur an den Empfaenger)
    Whisper {
        sender: String,
        message: String,
        time: String,
    },
    /// Systemmeldung (Join, Leave)
    SystemMessage { message: String, time: String },
    /// Aktuelle Teilnehmerliste in Beitrittsreihenfolge
    UserList { users: Vec<String> },
    /// Antwort auf FILE_METADATA
    FileAck {
        status: AckStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Eine Datei steht zum Download bereit
    FileAvailable {
        filename: String,
        size: u64,
        sender: String,
        private: bool,
        time: String,
    },
    /// Beginn eines Downloads, danach folgen `size` Rohbytes
    FileStart { filename: String, size: u64 },
}

impl ServerNachricht {
    /// FILE_ACK mit Status `ready` und bereinigtem Dateinamen
    pub fn ack_bereit(filename: impl Into<String>) -> Self {
        Self::FileAck {
            status: AckStatus::Ready,
            filename: Some(filename.into()),
            message: None,
        }
    }

    /// FILE_ACK mit Status `error` und Fehlermeldung
    pub fn ack_fehler(message: impl Into<String>) -> Self {
        Self::FileAck {
            status: AckStatus::Error,
            filename: None,
            message: Some(message.into()),
        }
    }

    pub fn system(message: impl Into<String>, time: impl Into<String>) -> Self {
        Self::SystemMessage {
            message: message.into(),
            time: time.into(),
        }
    }

    /// Parst einen vom Framer gelieferten Umschlag
    pub fn aus_json(rohdaten: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(rohdaten)
    }

    pub fn to_bytes(&self) -> serde_json::Result<Bytes> {
        json_bytes(self)
    }

    /// Protokollname des Nachrichtentyps (fuer Logs und Metriken)
    pub fn typ_name(&self) -> &'static str {
        match self {
            Self::ConnectionSuccess { .. } => "CONNECTION_SUCCESS",
            Self::TextMessage { .. } => "TEXT_MESSAGE",
            Self::Whisper { .. } => "WHISPER",
            Self::SystemMessage { .. } => "SYSTEM_MESSAGE",
            Self::UserList { .. } => "USER_LIST",
            Self::FileAck { .. } => "FILE_ACK",
            Self::FileAvailable { .. } => "FILE_AVAILABLE",
            Self::FileStart { .. } => "FILE_START",
        }
    }
}

fn json_bytes<T: Serialize>(wert: &T) -> serde_json::Result<Bytes> {
    serde_json::to_vec(wert).map(Bytes::from)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn als_json(nachricht: &ServerNachricht) -> Value {
        serde_json::from_slice(&nachricht.to_bytes().unwrap()).unwrap()
    }

    #[test]
    fn handshake_nickname_wird_getrimmt() {
        let hs: Handshake = serde_json::from_str(r#"{"nickname":"  Alice "}"#).unwrap();
        assert_eq!(hs.gueltiger_nickname(), Some("Alice"));
    }

    #[test]
    fn handshake_ohne_nickname_ist_ungueltig() {
        let leer: Handshake = serde_json::from_str(r#"{"nickname":"   "}"#).unwrap();
        assert_eq!(leer.gueltiger_nickname(), None);

        let fehlend: Handshake = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(fehlend.gueltiger_nickname(), None);
    }

    #[test]
    fn client_text_message_parsen() {
        let msg = ClientNachricht::aus_json(br#"{"type":"TEXT_MESSAGE","message":"hallo"}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientNachricht::TextMessage {
                message: "hallo".into()
            }
        );
    }

    #[test]
    fn client_file_metadata_ohne_target() {
        let msg = ClientNachricht::aus_json(
            br#"{"type":"FILE_METADATA","filename":"a.txt","size":12}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientNachricht::FileMetadata {
                filename: "a.txt".into(),
                size: 12,
                target: None
            }
        );
    }

    #[test]
    fn client_unbekannter_typ_schlaegt_fehl() {
        assert!(ClientNachricht::aus_json(br#"{"type":"VOICE","data":"x"}"#).is_err());
        assert!(ClientNachricht::aus_json(br#"{"message":"ohne typ"}"#).is_err());
    }

    #[test]
    fn client_disconnect_ohne_felder() {
        let msg = ClientNachricht::aus_json(br#"{"type":"DISCONNECT"}"#).unwrap();
        assert_eq!(msg, ClientNachricht::Disconnect);
    }

    #[test]
    fn server_text_message_drahtformat() {
        let msg = ServerNachricht::TextMessage {
            sender: "Bob".into(),
            message: "hi".into(),
            time: "12:34".into(),
        };
        assert_eq!(
            als_json(&msg),
            json!({"type":"TEXT_MESSAGE","sender":"Bob","message":"hi","time":"12:34"})
        );
    }

    #[test]
    fn server_user_list_drahtformat() {
        let msg = ServerNachricht::UserList {
            users: vec!["Alice".into(), "Bob".into()],
        };
        assert_eq!(
            als_json(&msg),
            json!({"type":"USER_LIST","users":["Alice","Bob"]})
        );
    }

    #[test]
    fn file_ack_bereit_enthaelt_nur_dateinamen() {
        assert_eq!(
            als_json(&ServerNachricht::ack_bereit("bild.png")),
            json!({"type":"FILE_ACK","status":"ready","filename":"bild.png"})
        );
    }

    #[test]
    fn file_ack_fehler_enthaelt_nur_meldung() {
        assert_eq!(
            als_json(&ServerNachricht::ack_fehler("Transfer interrupted")),
            json!({"type":"FILE_ACK","status":"error","message":"Transfer interrupted"})
        );
    }

    #[test]
    fn file_available_drahtformat() {
        let msg = ServerNachricht::FileAvailable {
            filename: "notiz.txt".into(),
            size: 42,
            sender: "Cara".into(),
            private: true,
            time: "08:15".into(),
        };
        assert_eq!(
            als_json(&msg),
            json!({
                "type":"FILE_AVAILABLE","filename":"notiz.txt","size":42,
                "sender":"Cara","private":true,"time":"08:15"
            })
        );
    }

    #[test]
    fn typ_namen_entsprechen_dem_drahtformat() {
        let msg = ServerNachricht::FileStart {
            filename: "x".into(),
            size: 1,
        };
        assert_eq!(als_json(&msg)["type"], msg.typ_name());

        let client = ClientNachricht::FileRequest {
            filename: "x".into(),
        };
        let wert: Value = serde_json::from_slice(&client.to_bytes().unwrap()).unwrap();
        assert_eq!(wert["type"], client.typ_name());
    }
}
