//! # Verifiable Presentations
//!
//! [Verifiable Presentations](https://www.w3.org/TR/vc-data-model/#presentations-0)
//!
//! Specifications:
//! - <https://identity.foundation/presentation-exchange/spec/v2.0.0>
//! - <https://identity.foundation/claim-format-registry>

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::core::{Kind, Quota};
use crate::model::vc::Proof;
use crate::submission::PresentationSubmission;

/// The base W3C credentials context, always the first `@context` entry.
pub const BASE_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

/// JSON-LD context appended to presentations that embed a Presentation
/// Submission.
pub const SUBMISSION_CONTEXT_IRI: &str =
    "https://identity.foundation/presentation-exchange/submission/v1";

/// JSON-LD type appended to presentations that embed a Presentation
/// Submission.
pub const SUBMISSION_TYPE: &str = "PresentationSubmission";

/// A Verifiable Presentation is used to combine and present credentials to a
/// Verifier.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifiablePresentation {
    /// The @context property is used to map property URIs into short-form
    /// aliases. It is an ordered set where the first item is
    /// `"https://www.w3.org/2018/credentials/v1"`.
    #[serde(rename = "@context")]
    pub context: Vec<Kind<Value>>,

    /// MAY be used to provide a unique identifier for the presentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The type property expresses the type of presentation, such as
    /// `VerifiablePresentation`, plus more specific presentation types.
    #[serde(rename = "type")]
    pub type_: Vec<String>,

    /// The verifiableCredential property is constructed from one or more
    /// verifiable credentials, or of data derived from verifiable
    /// credentials in a cryptographically verifiable format. JWT-secured
    /// credentials embed as compact-serialization strings, others as JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifiable_credential: Option<Vec<Value>>,

    /// Holder is a URI for the entity that is generating the presentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,

    /// Tells the Verifier which demanded input is satisfied where in this
    /// presentation.
    #[serde(rename = "presentation_submission", skip_serializing_if = "Option::is_none")]
    pub presentation_submission: Option<PresentationSubmission>,

    /// An embedded proof ensures that the presentation is verifiable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<Quota<Proof>>,
}

impl VerifiablePresentation {
    /// Returns a new [`VpBuilder`], which can be used to build a
    /// [`VerifiablePresentation`].
    #[must_use]
    pub fn builder() -> VpBuilder {
        VpBuilder::new()
    }
}

impl TryFrom<VpBuilder> for VerifiablePresentation {
    type Error = anyhow::Error;

    fn try_from(builder: VpBuilder) -> anyhow::Result<Self, Self::Error> {
        builder.build()
    }
}

/// [`VpBuilder`] is used to build a [`VerifiablePresentation`].
#[derive(Clone, Default)]
pub struct VpBuilder {
    vp: VerifiablePresentation,
}

impl VpBuilder {
    /// Returns a new [`VpBuilder`].
    #[must_use]
    pub fn new() -> Self {
        let mut builder = Self::default();
        builder.vp.id = Some(format!("urn:uuid:{}", Uuid::new_v4()));
        builder.vp.context.push(Kind::String(BASE_CONTEXT.into()));
        builder.vp.type_.push("VerifiablePresentation".into());
        builder
    }

    /// Adds a `@context` entry.
    #[must_use]
    pub fn add_context(mut self, context: Kind<Value>) -> Self {
        self.vp.context.push(context);
        self
    }

    /// Adds a term to the `type` property.
    #[must_use]
    pub fn add_type(mut self, type_: impl Into<String>) -> Self {
        self.vp.type_.push(type_.into());
        self
    }

    /// Adds a `verifiableCredential` entry.
    #[must_use]
    pub fn add_credential(mut self, vc: Value) -> Self {
        if let Some(verifiable_credential) = self.vp.verifiable_credential.as_mut() {
            verifiable_credential.push(vc);
        } else {
            self.vp.verifiable_credential = Some(vec![vc]);
        }
        self
    }

    /// Sets the `holder` property.
    #[must_use]
    pub fn holder(mut self, holder: impl Into<String>) -> Self {
        self.vp.holder = Some(holder.into());
        self
    }

    /// Embeds a Presentation Submission.
    #[must_use]
    pub fn presentation_submission(mut self, submission: PresentationSubmission) -> Self {
        self.vp.presentation_submission = Some(submission);
        self
    }

    /// Turns this builder into a [`VerifiablePresentation`].
    ///
    /// # Errors
    ///
    /// Fails if any of the presentation's mandatory fields are not set.
    pub fn build(self) -> anyhow::Result<VerifiablePresentation> {
        if self.vp.context.is_empty() {
            anyhow::bail!("context is required");
        }
        if self.vp.type_.is_empty() {
            anyhow::bail!("type is required");
        }

        Ok(self.vp)
    }
}
