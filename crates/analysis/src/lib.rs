//! # FinSight Analysis
//!
//! Turns normalized documents into a validated [`Report`] and edits that
//! report through conversation.
//!
//! The pipeline, in order:
//!
//! 1. [`ContextAssembler`] builds one generation request from the documents,
//!    capping each tabular payload.
//! 2. [`AnalysisInvoker`] resolves a credential and sends the request.
//! 3. The [`validator`] reduces the reply to JSON and checks it against the
//!    [`SchemaContract`].
//! 4. [`PatchEngine`] builds chat requests and merges their results back
//!    into the report.
//!
//! [`Session`] ties the steps together and owns the resulting state.
//!
//! [`Report`]: finsight_core::Report

pub mod assembler;
pub mod credentials;
pub mod invoker;
pub mod patch;
pub mod schema;
pub mod session;
pub mod validator;

#[cfg(test)]
mod test_helpers;

pub use assembler::{ContextAssembler, GenerationRequest, Limits};
pub use credentials::{CredentialChain, CredentialSource};
pub use invoker::AnalysisInvoker;
pub use patch::{ChatSettings, PatchEngine, PatchResult};
pub use schema::{SCHEMA_VERSION, SchemaContract};
pub use session::{PatchOutcome, Session, SessionStatus};
