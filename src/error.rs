//! # Errors
//!
//! Failure modes of definition evaluation. `NoCredentials` doubles as a
//! recoverable signal inside nested requirement evaluation: a branch skips a
//! child that returns it and only propagates it when every child failed.

use thiserror::Error;

/// Errors returned when evaluating a Presentation Definition against a set
/// of credentials.
#[derive(Error, Debug)]
pub enum Error {
    /// The definition does not conform to either version of the Presentation
    /// Definition JSON Schema. Carries the schema violation messages.
    #[error("invalid presentation definition: {0}")]
    InvalidDefinition(String),

    /// A submission requirement's `from` group matches no input descriptor.
    #[error("no input descriptors for group \"{0}\"")]
    NoGroupDescriptors(String),

    /// No combination of the held credentials satisfies the requirements.
    #[error("credentials do not satisfy requirements")]
    NoCredentials,

    /// A field constraint could not be evaluated. Carries the index of the
    /// offending field within the descriptor's `fields` array.
    #[error("filter field.{index}: {reason}")]
    FilterField {
        /// Position of the field in `constraints.fields`.
        index: usize,
        /// Underlying evaluation failure.
        reason: anyhow::Error,
    },

    /// A JSON-LD context document could not be loaded or parsed. Only raised
    /// under [`ContextErrorPolicy::Abort`](crate::context::ContextErrorPolicy).
    #[error("failed to load context \"{url}\": {reason}")]
    ContextLoad {
        /// The context URL that failed to resolve.
        url: String,
        /// Loader or parse failure.
        reason: anyhow::Error,
    },

    /// The BBS+ collaborator failed to derive a proof, or no collaborator
    /// was configured when one was needed.
    #[error("proof derivation failed: {0}")]
    DeriveProof(anyhow::Error),

    /// The credential names an SD-JWT hash algorithm this crate cannot
    /// compute.
    #[error("unsupported hash algorithm \"{0}\"")]
    UnsupportedHashAlg(String),

    /// Freshly produced JSON failed to serialize or re-parse as a
    /// credential. Input-side serialization failures are never surfaced;
    /// they reject the affected credential silently.
    #[error("credential encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}
