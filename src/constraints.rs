//! # Constraint Filtering
//!
//! Applies an input descriptor's `constraints` to candidate credentials.
//! Fields are evaluated in order against the credential projected to JSON
//! (for SD-JWT credentials, a display credential with every disclosure
//! resolved). A field is *applicable* when one of its JSONPath expressions
//! matches and the match satisfies the field's JSON Schema filter; a
//! credential with any non-applicable field is quietly dropped, while a
//! field that cannot be evaluated at all fails the whole operation.

use anyhow::anyhow;
use serde_json::Value;
use serde_json_path::JsonPath;

use crate::definition::{Constraints, Field, Preference};
use crate::disclosure::{self, BbsDeriver};
use crate::error::Error;
use crate::matcher::Candidate;
use crate::model::vc::Credential;

/// Outcome of evaluating one field against one credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FieldMatch {
    /// A path matched and passed the filter.
    Applicable,
    /// No path matched, or every match failed the filter.
    NotApplicable,
}

/// Evaluate a field against a credential's JSON projection.
///
/// Paths are tried in order, returning [`FieldMatch::Applicable`] on the
/// first match that satisfies the filter. An unparseable path or an
/// uncompilable filter is a hard error.
pub(crate) fn filter_field(field: &Field, credential: &Value) -> anyhow::Result<FieldMatch> {
    let validator = match &field.filter {
        Some(filter) => {
            let fragment = serde_json::to_value(filter)?;
            let validator = jsonschema::options()
                .with_draft(jsonschema::Draft::Draft7)
                .build(&fragment)
                .map_err(|e| anyhow!("compiling filter: {e}"))?;
            Some(validator)
        }
        None => None,
    };

    for expr in &field.path {
        let path =
            JsonPath::parse(expr).map_err(|e| anyhow!("invalid JSONPath \"{expr}\": {e}"))?;

        let nodes = path.query(credential).all();
        if nodes.is_empty() {
            continue;
        }

        let Some(validator) = &validator else {
            return Ok(FieldMatch::Applicable);
        };

        let instance = if let [node] = nodes.as_slice() {
            (*node).clone()
        } else {
            Value::Array(nodes.into_iter().cloned().collect())
        };

        if validator.is_valid(&instance) {
            return Ok(FieldMatch::Applicable);
        }
    }

    Ok(FieldMatch::NotApplicable)
}

/// Apply a descriptor's constraints to the candidates, reshaping accepted
/// credentials when disclosure is limited or a predicate applied.
pub(crate) fn filter_constraints(
    constraints: Option<&Constraints>,
    candidates: Vec<Candidate>,
    deriver: Option<&dyn BbsDeriver>,
) -> Result<Vec<Candidate>, Error> {
    let Some(constraints) = constraints else {
        return Ok(candidates);
    };

    let limit_required = constraints.limit_disclosure == Some(Preference::Required);
    let mut result = Vec::new();

    for mut candidate in candidates {
        if constraints.subject_is_issuer == Some(Preference::Required)
            && !subject_is_issuer(&candidate.vc)
        {
            continue;
        }

        let is_sd_jwt = candidate.vc.sd_jwt_hash_alg.is_some();

        // marshal once per credential; every field evaluates against this tree
        let credential_json = if is_sd_jwt {
            match disclosure::display_credential(&candidate.vc) {
                Ok(value) => value,
                Err(err @ Error::UnsupportedHashAlg(_)) => return Err(err),
                Err(_) => continue,
            }
        } else {
            match serde_json::to_value(&candidate.vc) {
                Ok(value) => value,
                Err(_) => continue,
            }
        };

        let mut applicable = false;
        let mut predicate = false;

        for (index, field) in constraints.fields.iter().enumerate() {
            match filter_field(field, &credential_json) {
                Ok(FieldMatch::Applicable) => {
                    if field.predicate == Some(Preference::Required) {
                        predicate = true;
                    }
                    applicable = true;
                }
                Ok(FieldMatch::NotApplicable) => {
                    applicable = false;
                    break;
                }
                Err(reason) => return Err(Error::FilterField { index, reason }),
            }
        }

        if !applicable {
            continue;
        }

        if (limit_required || predicate) && !is_sd_jwt {
            let reshaped = disclosure::create_new_credential(
                constraints,
                &credential_json,
                &candidate.vc,
                deriver,
            )?;
            candidate = candidate.reshaped(reshaped);
        }

        if limit_required && is_sd_jwt {
            let pruned =
                disclosure::limited_disclosures(constraints, &credential_json, &candidate.vc)?;
            candidate.vc.sd_jwt_disclosures = pruned;
        }

        result.push(candidate);
    }

    Ok(result)
}

fn subject_is_issuer(vc: &Credential) -> bool {
    let issuer = vc.issuer_id();
    vc.subject_ids().iter().any(|id| !id.is_empty() && *id == issuer)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::vc::CredentialSubject;

    fn field(value: serde_json::Value) -> Field {
        serde_json::from_value(value).expect("should deserialize")
    }

    fn degree_json() -> Value {
        json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "id": "http://example.edu/credentials/1872",
            "type": ["VerifiableCredential", "UniversityDegreeCredential"],
            "issuer": "did:example:issuer",
            "credentialSubject": {
                "id": "did:example:holder",
                "degree": {"type": "BachelorDegree"}
            }
        })
    }

    #[test]
    fn const_filter_matches() {
        let field = field(json!({
            "path": ["$.credentialSubject.degree.type"],
            "filter": {"type": "string", "const": "BachelorDegree"}
        }));

        let matched = filter_field(&field, &degree_json()).expect("should evaluate");
        assert_eq!(matched, FieldMatch::Applicable);
    }

    #[test]
    fn filter_mismatch_is_not_applicable() {
        let field = field(json!({
            "path": ["$.credentialSubject.degree.type"],
            "filter": {"type": "string", "const": "MasterDegree"}
        }));

        let matched = filter_field(&field, &degree_json()).expect("should evaluate");
        assert_eq!(matched, FieldMatch::NotApplicable);
    }

    #[test]
    fn later_path_recovers_earlier_miss() {
        let field = field(json!({
            "path": ["$.vc.credentialSubject.degree.type", "$.credentialSubject.degree.type"]
        }));

        let matched = filter_field(&field, &degree_json()).expect("should evaluate");
        assert_eq!(matched, FieldMatch::Applicable);
    }

    #[test]
    fn no_matching_path_is_not_applicable() {
        let field = field(json!({"path": ["$.credentialSubject.missing"]}));

        let matched = filter_field(&field, &degree_json()).expect("should evaluate");
        assert_eq!(matched, FieldMatch::NotApplicable);
    }

    #[test]
    fn invalid_path_is_a_hard_error() {
        let field = field(json!({"path": ["not a json path"]}));

        filter_field(&field, &degree_json()).expect_err("should fail to evaluate");
    }

    #[test]
    fn pattern_filter_uses_schema_semantics() {
        let field = field(json!({
            "path": ["$.type"],
            "filter": {"type": "array", "contains": {"const": "UniversityDegreeCredential"}}
        }));

        let matched = filter_field(&field, &degree_json()).expect("should evaluate");
        assert_eq!(matched, FieldMatch::Applicable);
    }

    #[test]
    fn subject_is_issuer_requires_equality() {
        let holder_issued = Credential::builder()
            .id("urn:credential:self")
            .add_type("SelfIssued")
            .issuer("did:example:holder")
            .add_subject(CredentialSubject {
                id: Some("did:example:holder".into()),
                ..CredentialSubject::default()
            })
            .build()
            .expect("should build");

        let third_party = Credential::builder()
            .id("urn:credential:issued")
            .add_type("ThirdParty")
            .issuer("did:example:issuer")
            .add_subject(CredentialSubject {
                id: Some("did:example:holder".into()),
                ..CredentialSubject::default()
            })
            .build()
            .expect("should build");

        assert!(subject_is_issuer(&holder_issued));
        assert!(!subject_is_issuer(&third_party));

        let constraints: Constraints = serde_json::from_value(json!({
            "subject_is_issuer": "required",
            "fields": [{"path": ["$.id"]}]
        }))
        .expect("should deserialize");

        let kept = filter_constraints(
            Some(&constraints),
            vec![Candidate::new(&holder_issued), Candidate::new(&third_party)],
            None,
        )
        .expect("should filter");

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].vc.id, "urn:credential:self");
    }

    #[test]
    fn field_error_carries_index() {
        let vc = Credential::builder()
            .id("urn:credential:1")
            .add_type("Any")
            .issuer("did:example:issuer")
            .add_subject(CredentialSubject::default())
            .build()
            .expect("should build");

        let constraints: Constraints = serde_json::from_value(json!({
            "fields": [
                {"path": ["$.id"]},
                {"path": ["not a json path"]}
            ]
        }))
        .expect("should deserialize");

        let err = filter_constraints(Some(&constraints), vec![Candidate::new(&vc)], None)
            .expect_err("should fail");
        assert!(matches!(err, Error::FilterField { index: 1, .. }));
    }
}
