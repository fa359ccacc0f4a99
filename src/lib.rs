//! Backend for an AI-assisted visual HTML editor.
//!
//! The editor posts an element's markup and a natural-language instruction to
//! `POST /api/edit-with-ai`; the [`orchestrator::Orchestrator`] asks a chat
//! completion service for replacement markup, resolving an optional
//! `search_image` tool call through a stock-photo search on the way.

pub mod chat;
pub mod config;
pub mod error;
pub mod image_search;
pub mod orchestrator;
pub mod server;
pub mod types;

pub use error::{EditError, EditResult, ErrorKind};
pub use orchestrator::Orchestrator;
