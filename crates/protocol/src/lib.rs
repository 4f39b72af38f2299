//! flurfunk-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichten (Umschlaege), die zwischen
//! Client und Server ausgetauscht werden, sowie den Codec, der aus einem
//! rohen Byte-Strom einzelne JSON-Umschlaege schneidet.

pub mod envelope;
pub mod wire;

pub use envelope::{AckStatus, ClientNachricht, Handshake, ServerNachricht};
pub use wire::JsonFrameCodec;
