//! # Presentation Exchange
//!
//! Matching and filtering core for the DIF Presentation Exchange: evaluates
//! a Verifier's [Presentation Definition] against the Verifiable
//! Credentials a wallet holds, selects the credentials that satisfy it,
//! redacts each accepted credential to the minimum demanded fields
//! (selective disclosure), and emits a Verifiable Presentation with an
//! embedded Presentation Submission descriptor map.
//!
//! The two entry points live on [`Matcher`]:
//!
//! - [`Matcher::create_vp`] produces the presentation,
//! - [`Matcher::match_requirements`] reports which credentials satisfy
//!   which requirement, without committing to a presentation.
//!
//! Credential parsing, proof verification, JSON-LD document retrieval and
//! BBS+ proof derivation stay with the caller: the first two happen before
//! credentials enter this crate, the last two are borrowed for the duration
//! of an evaluation as the [`DocumentLoader`] and [`BbsDeriver`]
//! collaborators. Evaluation is synchronous and reentrant; nothing survives
//! a call.
//!
//! Selective disclosure runs in three regimes, chosen per credential:
//! plain JSON redaction, BBS+ reveal-document derivation (for credentials
//! carrying a `BbsBlsSignature2020` proof), and SD-JWT disclosure pruning.
//!
//! Specifications:
//! - [Presentation Definition]
//! - <https://identity.foundation/claim-format-registry>
//! - <https://www.w3.org/TR/vc-data-model>
//!
//! [Presentation Definition]: https://identity.foundation/presentation-exchange/spec/v2.0.0

pub mod context;
pub mod core;
pub mod definition;
pub mod disclosure;
pub mod error;
pub mod format;
pub mod matcher;
pub mod model;
pub mod submission;
pub mod validate;

mod constraints;

pub use crate::context::{ContextErrorPolicy, DocumentLoader};
pub use crate::core::{Kind, Quota};
pub use crate::definition::{
    Constraints, Field, Filter, Format, HolderConstraint, InputDescriptor, JwtType, LdpType,
    Preference, PresentationDefinition, Rule, SchemaEntry, SubmissionRequirement,
};
pub use crate::disclosure::{BbsDeriver, Disclosure, HashAlg, BBS_PROOF_TYPE};
pub use crate::error::Error;
pub use crate::format::FormatTag;
pub use crate::matcher::{MatchedDescriptor, MatchedRequirement, Matcher};
pub use crate::model::vc::{
    Credential, CredentialBuilder, CredentialSchema, CredentialSubject, Issuer, Proof,
};
pub use crate::model::vp::{
    VerifiablePresentation, VpBuilder, BASE_CONTEXT, SUBMISSION_CONTEXT_IRI, SUBMISSION_TYPE,
};
pub use crate::submission::{DescriptorMap, PresentationSubmission};
pub use crate::validate::{DEFINITION_SCHEMA_V1, DEFINITION_SCHEMA_V2};
