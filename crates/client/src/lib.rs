//! flurfunk-client – Headless Client fuer das Flurfunk-Protokoll
//!
//! Netzwerk-Haelfte eines Chat-Clients: Handshake, Nachrichten senden und
//! empfangen, Dateien hoch- und herunterladen. Darstellung und lokales Echo
//! eigener Fluesternachrichten bleiben Sache der Oberflaeche.

pub mod connection;
pub mod error;

pub use connection::ChatClient;
pub use error::{ClientError, ClientResult};
