//! # Verifiable Credentials
//!
//! A pragmatic implementation of the W3C [Verifiable Credentials Data Model
//! v1.1](https://www.w3.org/TR/vc-data-model) carrying exactly the state the
//! matching pipeline needs: the JSON body, any enveloping JWT form, and
//! SD-JWT disclosure material held by the wallet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::{Kind, Quota};
use crate::disclosure::Disclosure;

/// `Credential` represents a W3C Verifiable Credential as held by a wallet.
///
/// The `jwt`, `sd_jwt_hash_alg` and `sd_jwt_disclosures` fields are
/// holder-side state: they never serialize into the credential body, so
/// marshalling a credential always yields the JSON document, not its
/// enveloped form.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Credential {
    /// The @context property is used to map property URIs into short-form
    /// aliases. It is an ordered set where the first item is
    /// `"https://www.w3.org/2018/credentials/v1"`.
    #[serde(rename = "@context")]
    pub context: Vec<Kind<Value>>,

    /// A URL identifying this credential.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// The type property is an unordered set of terms or URIs, used to
    /// determine whether a credential is appropriate for the intended
    /// use-case.
    #[serde(rename = "type")]
    pub type_: Quota<String>,

    /// A URI or object with an id property identifying the credential
    /// issuer.
    pub issuer: Kind<Issuer>,

    /// A set of objects containing claims about credential subject(s).
    pub credential_subject: Quota<CredentialSubject>,

    /// An RFC3339 date-time the credential becomes valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuance_date: Option<DateTime<Utc>>,

    /// One or more schemas the credential data conforms to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_schema: Option<Quota<CredentialSchema>>,

    /// One or more cryptographic proofs over the credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<Quota<Proof>>,

    /// Top-level claims outside the core data model, e.g. `expirationDate`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// Compact JWS form of the credential, when it was issued as a JWT.
    #[serde(skip)]
    pub jwt: Option<String>,

    /// SD-JWT digest algorithm name (`sha-256`, `sha-384`, `sha-512`), when
    /// the credential uses selective disclosure JWTs.
    #[serde(skip)]
    pub sd_jwt_hash_alg: Option<String>,

    /// Disclosures accompanying an SD-JWT credential.
    #[serde(skip)]
    pub sd_jwt_disclosures: Vec<Disclosure>,
}

impl Credential {
    /// Returns a new [`CredentialBuilder`].
    #[must_use]
    pub fn builder() -> CredentialBuilder {
        CredentialBuilder::new()
    }

    /// The issuer identifier, whether the issuer is a URI or an object.
    pub fn issuer_id(&self) -> &str {
        match &self.issuer {
            Kind::String(id) => id,
            Kind::Object(issuer) => &issuer.id,
        }
    }

    /// Identifiers of all credential subjects that carry one.
    pub fn subject_ids(&self) -> Vec<&str> {
        self.credential_subject
            .as_slice()
            .iter()
            .filter_map(|subject| subject.id.as_deref())
            .collect()
    }

    /// The credential's type terms.
    pub fn types(&self) -> &[String] {
        self.type_.as_slice()
    }

    /// URL-form `@context` entries, in order. Object contexts are not
    /// dereferenceable and are skipped.
    pub fn context_urls(&self) -> impl Iterator<Item = &str> {
        self.context.iter().filter_map(Kind::as_str)
    }

    /// Returns `true` if any proof on the credential has the given type.
    pub fn has_proof_type(&self, proof_type: &str) -> bool {
        self.proof
            .as_ref()
            .is_some_and(|proofs| proofs.as_slice().iter().any(|p| p.type_ == proof_type))
    }
}

/// Issuer identifies the issuer of the credential.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Issuer {
    /// The issuer URI.
    pub id: String,

    /// Issuer-specific fields expressing additional information.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `CredentialSubject` holds claims about a subject referenced by the
/// credential.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialSubject {
    /// A URI that uniquely identifies the subject of the claims.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Claims about the subject.
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

/// `CredentialSchema` references a schema verifying credential data
/// conformance.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialSchema {
    /// A URI where the schema can be retrieved.
    pub id: String,

    /// Schema validator type, e.g. `JsonSchemaValidator2018`.
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub type_: String,
}

/// An embedded proof. Only the `type` matters to matching (claim format
/// selection and BBS+ detection); everything else passes through opaquely.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Proof {
    /// Proof suite identifier, e.g. `Ed25519Signature2018` or
    /// `BbsBlsSignature2020`.
    #[serde(rename = "type")]
    pub type_: String,

    /// Remaining proof properties.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// [`CredentialBuilder`] is used to build a [`Credential`].
#[derive(Clone, Default)]
pub struct CredentialBuilder {
    vc: Credential,
    subjects: Vec<CredentialSubject>,
}

impl CredentialBuilder {
    /// Returns a new [`CredentialBuilder`] seeded with the base context and
    /// type.
    #[must_use]
    pub fn new() -> Self {
        let mut builder = Self::default();
        builder
            .vc
            .context
            .push(Kind::String("https://www.w3.org/2018/credentials/v1".into()));
        builder.vc.type_ = Quota::Many(vec!["VerifiableCredential".into()]);
        builder
    }

    /// Adds a `@context` entry.
    #[must_use]
    pub fn add_context(mut self, context: Kind<Value>) -> Self {
        self.vc.context.push(context);
        self
    }

    /// Sets the `id` property.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.vc.id = id.into();
        self
    }

    /// Adds a term to the `type` property.
    #[must_use]
    pub fn add_type(mut self, type_: impl Into<String>) -> Self {
        if let Quota::Many(types) = &mut self.vc.type_ {
            types.push(type_.into());
        }
        self
    }

    /// Sets the `issuer` property to a URI.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.vc.issuer = Kind::String(issuer.into());
        self
    }

    /// Adds a credential subject.
    #[must_use]
    pub fn add_subject(mut self, subject: CredentialSubject) -> Self {
        self.subjects.push(subject);
        self
    }

    /// Sets the `issuanceDate` property.
    #[must_use]
    pub fn issuance_date(mut self, issued: DateTime<Utc>) -> Self {
        self.vc.issuance_date = Some(issued);
        self
    }

    /// Adds a proof.
    #[must_use]
    pub fn add_proof(mut self, proof: Proof) -> Self {
        let proofs = match self.vc.proof.take() {
            None => Quota::One(proof),
            Some(Quota::One(existing)) => Quota::Many(vec![existing, proof]),
            Some(Quota::Many(mut many)) => {
                many.push(proof);
                Quota::Many(many)
            }
        };
        self.vc.proof = Some(proofs);
        self
    }

    /// Adds a top-level claim outside the core data model.
    #[must_use]
    pub fn add_claim(mut self, name: impl Into<String>, value: Value) -> Self {
        self.vc.extra.insert(name.into(), value);
        self
    }

    /// Attaches the credential's compact JWT form.
    #[must_use]
    pub fn jwt(mut self, jwt: impl Into<String>) -> Self {
        self.vc.jwt = Some(jwt.into());
        self
    }

    /// Attaches SD-JWT disclosure material.
    #[must_use]
    pub fn sd_jwt(mut self, hash_alg: impl Into<String>, disclosures: Vec<Disclosure>) -> Self {
        self.vc.sd_jwt_hash_alg = Some(hash_alg.into());
        self.vc.sd_jwt_disclosures = disclosures;
        self
    }

    /// Turns this builder into a [`Credential`].
    ///
    /// # Errors
    ///
    /// Fails if any of the credential's mandatory fields are not set.
    pub fn build(mut self) -> anyhow::Result<Credential> {
        if self.vc.context.is_empty() {
            anyhow::bail!("context is required");
        }
        if self.vc.type_.is_empty() {
            anyhow::bail!("type is required");
        }
        if self.vc.issuer_id().is_empty() {
            anyhow::bail!("issuer is required");
        }

        self.vc.credential_subject = match self.subjects.len() {
            0 => anyhow::bail!("credential subject is required"),
            1 => Quota::One(self.subjects.remove(0)),
            _ => Quota::Many(self.subjects),
        };

        Ok(self.vc)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Credential {
        let mut subject = CredentialSubject {
            id: Some("did:example:ebfeb1f712ebc6f1c276e12ec21".into()),
            ..CredentialSubject::default()
        };
        subject.claims =
            json!({"employeeID": "1234567890"}).as_object().expect("should be object").clone();

        Credential::builder()
            .add_context(Kind::String("https://www.w3.org/2018/credentials/examples/v1".into()))
            .id("https://example.com/credentials/3732")
            .add_type("EmployeeIDCredential")
            .issuer("https://example.com/issuers/14")
            .add_subject(subject)
            .build()
            .expect("should build")
    }

    #[test]
    fn serialize_body() {
        let vc = sample();
        let body = serde_json::to_value(&vc).expect("should serialize");

        assert_eq!(
            *body.get("@context").expect("@context should be set"),
            json!([
                "https://www.w3.org/2018/credentials/v1",
                "https://www.w3.org/2018/credentials/examples/v1"
            ])
        );
        assert_eq!(
            *body.get("type").expect("type should be set"),
            json!(["VerifiableCredential", "EmployeeIDCredential"])
        );
        assert_eq!(
            *body.get("credentialSubject").expect("credentialSubject should be set"),
            json!({"id": "did:example:ebfeb1f712ebc6f1c276e12ec21", "employeeID": "1234567890"})
        );

        // round-trip
        let parsed: Credential = serde_json::from_value(body).expect("should deserialize");
        assert_eq!(parsed.id, vc.id);
        assert_eq!(parsed.credential_subject, vc.credential_subject);
    }

    #[test]
    fn jwt_form_never_serializes() {
        let mut vc = sample();
        vc.jwt = Some("eyJhbGciOiJFZERTQSJ9..".into());

        let body = serde_json::to_value(&vc).expect("should serialize");
        assert!(body.get("jwt").is_none());
    }

    #[test]
    fn subject_and_issuer_accessors() {
        let vc = sample();
        assert_eq!(vc.issuer_id(), "https://example.com/issuers/14");
        assert_eq!(vc.subject_ids(), vec!["did:example:ebfeb1f712ebc6f1c276e12ec21"]);
        assert!(!vc.has_proof_type("BbsBlsSignature2020"));
    }
}
