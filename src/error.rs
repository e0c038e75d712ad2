//! Typed error kinds for the engine's fatal and request-level failures.
//!
//! Most plumbing uses `anyhow::Result`; these variants exist so callers
//! (notably the HTTP surface) can distinguish failures that must not be
//! papered over: missing capability credentials, rejected request input,
//! and undecodable routing replies. Recoverable conditions (rejected SQL
//! synthesis, failed SQL execution, skipped files during indexing) never
//! surface through here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or invalid external-capability configuration (e.g. an API
    /// key environment variable that is not set). Fatal at construction.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request failed input validation before any work was done
    /// (e.g. an empty question). Maps to a client error at the HTTP
    /// boundary.
    #[error("{0}")]
    Validation(String),

    /// The routing classifier's reply could not be parsed as a valid
    /// route decision, even after best-effort extraction of an embedded
    /// JSON fragment. The router never substitutes a default route.
    #[error("routing reply could not be decoded: {0}")]
    RoutingDecode(String),
}
