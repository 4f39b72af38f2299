//! flurfunk-relay – TCP-Chat-Relay
//!
//! Dieser Crate implementiert den eigentlichen Chat-Server: er nimmt
//! TCP-Verbindungen an, fuehrt den Nickname-Handshake durch, verteilt
//! Nachrichten an alle oder einzelne Teilnehmer und wickelt Datei-Uploads
//! und Downloads ueber denselben Stream ab.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (RelayServer)
//!     |
//!     v
//! ClientSession (pro Verbindung ein Task)
//!     |  State Machine: Handshake -> Aktiv -> Geschlossen
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- ChatHandler  (TEXT_MESSAGE, WHISPER)
//!     +-- FileHandler  (FILE_METADATA, FILE_REQUEST)
//!
//! Registry         – Wer ist verbunden (Beitrittsreihenfolge)
//! EventBroadcaster – Umschlaege an alle oder gezielt verteilen
//! ```

pub mod broadcast;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod server_state;
pub mod session;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use dispatcher::MessageDispatcher;
pub use error::{RelayError, RelayResult};
pub use registry::{Nachsicht, Registry, SendeQueue, SessionHandle};
pub use server_state::{RelayConfig, RelayState};
pub use session::{ClientSession, SessionEreignis, SessionZustand};
pub use tcp::RelayServer;
