//! # FinSight Core
//!
//! Domain types, traits, and error definitions for the FinSight financial
//! report pipeline. This crate performs no network I/O; it defines the
//! domain model that all other crates implement against.
//!
//! ## Contents
//!
//! - Documents as uploaded ([`SourceDocument`]) and as normalized
//!   ([`NormalizedDocument`])
//! - The [`Report`] produced by analysis and mutated by chat edits
//! - Chat history ([`ChatTurn`], [`ChatHistory`])
//! - The [`Provider`] trait every generation backend implements

pub mod chat;
pub mod document;
pub mod error;
pub mod language;
pub mod provider;
pub mod report;

// Re-export key types at crate root for ergonomics
pub use chat::{ChatHistory, ChatRole, ChatTurn};
pub use document::{DocumentKind, NormalizedDocument, SourceDocument};
pub use error::{Error, ProviderError, Result};
pub use language::Language;
pub use provider::{ApiKey, Part, Provider, ProviderRequest, ProviderResponse, ResponseFormat, Usage};
pub use report::Report;
