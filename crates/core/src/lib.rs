//! flurfunk-core – Gemeinsame Typen und Hilfsfunktionen
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! Flurfunk-Crates gemeinsam genutzt werden.

pub mod types;
pub mod zeit;

// Re-Exporte fuer bequemen Zugriff
pub use types::SessionId;
pub use zeit::uhrzeit_jetzt;
