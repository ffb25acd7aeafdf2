//! # Claim Format Filter
//!
//! Partitions credentials by claim format against a `Format` constraint.
//! A credential lands in a linked-data bucket when one of its proofs has an
//! accepted proof type, and in a JWT bucket when its JOSE header algorithm
//! is accepted. The first non-empty bucket wins, JSON-LD buckets before JWT
//! ones: a definition accepting both consistently prefers linked-data
//! proofs.

use std::fmt::{self, Display};

use base64ct::{Base64UrlUnpadded, Encoding};
use serde_json::Value;
use tracing::warn;

use crate::definition::{Format, JwtType, LdpType};
use crate::matcher::Candidate;
use crate::model::vc::Credential;

/// Registered Claim Format Designations, in bucket preference order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatTag {
    /// Linked-data proof claims, `ldp`.
    Ldp,
    /// Linked-data proof Verifiable Credentials, `ldp_vc`.
    LdpVc,
    /// Linked-data proof Verifiable Presentations, `ldp_vp`.
    LdpVp,
    /// JWT claims, `jwt`.
    Jwt,
    /// JWT Verifiable Credentials, `jwt_vc`.
    JwtVc,
    /// JWT Verifiable Presentations, `jwt_vp`.
    JwtVp,
}

impl FormatTag {
    /// The registry string for this designation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ldp => "ldp",
            Self::LdpVc => "ldp_vc",
            Self::LdpVp => "ldp_vp",
            Self::Jwt => "jwt",
            Self::JwtVc => "jwt_vc",
            Self::JwtVp => "jwt_vp",
        }
    }
}

impl Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keep the candidates in the first non-empty format bucket, returning the
/// bucket's tag. Returns `(None, [])` when every bucket is empty.
pub(crate) fn filter_format(
    format: &Format, candidates: Vec<Candidate>,
) -> (Option<FormatTag>, Vec<Candidate>) {
    let memberships: Vec<[bool; 6]> =
        candidates.iter().map(|candidate| buckets(format, &candidate.vc)).collect();

    const ORDER: [FormatTag; 6] = [
        FormatTag::Ldp,
        FormatTag::LdpVc,
        FormatTag::LdpVp,
        FormatTag::Jwt,
        FormatTag::JwtVc,
        FormatTag::JwtVp,
    ];

    for (slot, tag) in ORDER.into_iter().enumerate() {
        if memberships.iter().any(|m| m[slot]) {
            let bucket = candidates
                .into_iter()
                .zip(&memberships)
                .filter(|(_, m)| m[slot])
                .map(|(candidate, _)| candidate)
                .collect();
            return (Some(tag), bucket);
        }
    }

    (None, Vec::new())
}

fn buckets(format: &Format, vc: &Credential) -> [bool; 6] {
    let mut membership = [false; 6];

    membership[0] = proof_match(vc, format.ldp.as_ref());
    membership[1] = proof_match(vc, format.ldp_vc.as_ref());
    membership[2] = proof_match(vc, format.ldp_vp.as_ref());

    if let Some(jwt) = &vc.jwt {
        if let Some(alg) = jwt_alg(jwt) {
            membership[3] = alg_match(&alg, format.jwt.as_ref());
            membership[4] = alg_match(&alg, format.jwt_vc.as_ref());
            membership[5] = alg_match(&alg, format.jwt_vp.as_ref());
        } else {
            warn!(credential = %vc.id, "skipping credential with unparseable JWT");
        }
    }

    membership
}

fn proof_match(vc: &Credential, ldp: Option<&LdpType>) -> bool {
    ldp.is_some_and(|ldp| ldp.proof_type.iter().any(|t| vc.has_proof_type(t)))
}

fn alg_match(alg: &str, jwt: Option<&JwtType>) -> bool {
    jwt.is_some_and(|jwt| jwt.alg.iter().any(|a| a.eq_ignore_ascii_case(alg)))
}

// JOSE header `alg` from a compact serialization, without verification.
fn jwt_alg(jwt: &str) -> Option<String> {
    let header = jwt.split('.').next()?;
    let decoded = Base64UrlUnpadded::decode_vec(header).ok()?;
    let header: Value = serde_json::from_slice(&decoded).ok()?;

    header.get("alg").and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::vc::{CredentialSubject, Proof};

    fn jwt_with_alg(alg: &str) -> String {
        let header = Base64UrlUnpadded::encode_string(json!({"alg": alg}).to_string().as_bytes());
        format!("{header}.e30.c2ln")
    }

    fn credential(proof_type: Option<&str>, jwt: Option<String>) -> Candidate {
        let mut builder = Credential::builder()
            .id("https://example.com/credentials/1")
            .add_type("EmployeeIDCredential")
            .issuer("https://example.com/issuers/14")
            .add_subject(CredentialSubject {
                id: Some("did:example:holder".into()),
                ..CredentialSubject::default()
            });
        if let Some(proof_type) = proof_type {
            builder = builder.add_proof(Proof { type_: proof_type.into(), ..Proof::default() });
        }
        if let Some(jwt) = jwt {
            builder = builder.jwt(jwt);
        }

        Candidate::new(&builder.build().expect("should build"))
    }

    fn format(value: serde_json::Value) -> Format {
        serde_json::from_value(value).expect("should deserialize")
    }

    #[test]
    fn prefers_linked_data_over_jwt() {
        let format = format(json!({
            "ldp_vc": {"proof_type": ["Ed25519Signature2018"]},
            "jwt_vc": {"alg": ["EdDSA"]}
        }));

        let both = credential(Some("Ed25519Signature2018"), Some(jwt_with_alg("EdDSA")));
        let (tag, bucket) = filter_format(&format, vec![both]);

        assert_eq!(tag, Some(FormatTag::LdpVc));
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn alg_comparison_is_case_insensitive() {
        let format = format(json!({"jwt_vc": {"alg": ["eddsa"]}}));

        let jwt_cred = credential(None, Some(jwt_with_alg("EdDSA")));
        let (tag, bucket) = filter_format(&format, vec![jwt_cred]);

        assert_eq!(tag, Some(FormatTag::JwtVc));
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn unparseable_jwt_is_skipped() {
        let format = format(json!({"jwt_vc": {"alg": ["EdDSA"]}}));

        let broken = credential(None, Some("not-a-jwt".into()));
        let (tag, bucket) = filter_format(&format, vec![broken]);

        assert_eq!(tag, None);
        assert!(bucket.is_empty());
    }

    #[test]
    fn unmatched_proof_type_yields_empty() {
        let format = format(json!({"ldp_vc": {"proof_type": ["BbsBlsSignature2020"]}}));

        let ed = credential(Some("Ed25519Signature2018"), None);
        let (tag, bucket) = filter_format(&format, vec![ed]);

        assert_eq!(tag, None);
        assert!(bucket.is_empty());
    }
}
