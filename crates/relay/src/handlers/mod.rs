//! Handler fuer alle Client-Nachrichten
//!
//! Jeder Handler ist fuer eine Gruppe von Nachrichtentypen zustaendig
//! und hat Zugriff auf den gemeinsamen RelayState.

pub mod chat_handler;
pub mod file_handler;
