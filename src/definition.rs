//! # Presentation Definition
//!
//! Data model for a Verifier's declarative proof demand.
//!
//! Specifications:
//! - <https://identity.foundation/presentation-exchange/spec/v2.0.0>
//! - <https://identity.foundation/claim-format-registry>

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A Presentation Definition is used by a Verifier to articulate proofs
/// required. The proofs help the Verifier decide how to interact with the
/// Holder providing the proofs.
///
/// <https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition>
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PresentationDefinition {
    /// A unique ID for the desired context. For example, a UUID is unique in
    /// a global context, while a simple string could be suitably unique in a
    /// local context.
    pub id: String,

    /// If present, a human-friendly, distinctive designation for the
    /// Presentation Definition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// If present, it MUST describe the purpose for which the Presentation
    /// Definition is being used for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Locale for the definition's human-readable strings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Registered Claim Format Designations (e.g., `jwt`, `jwt_vc`, `ldp_vp`)
    /// the Verifier can process, with the algorithms or proof types it
    /// supports for each.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,

    /// A JSON-LD frame. When present, every candidate credential is passed
    /// through BBS+ selective disclosure framing before matching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<Map<String, Value>>,

    /// Combination rules over the input descriptors. When absent, every
    /// input descriptor must be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_requirements: Option<Vec<SubmissionRequirement>>,

    /// Input Descriptors describe the information the Verifier requires from
    /// the Holder.
    #[serde(default)]
    pub input_descriptors: Vec<InputDescriptor>,
}

/// A Submission Requirement groups input descriptors (by `from` group label
/// or as nested requirements) and states how many of them must be satisfied.
///
/// Exactly one of `from` and `from_nested` must be set.
///
/// <https://identity.foundation/presentation-exchange/spec/v2.0.0/#submission-requirements>
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SubmissionRequirement {
    /// If present, it SHOULD be a human-friendly name for the requirement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// If present, it MUST describe the purpose for which the grouped inputs
    /// are being requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Selection rule applied to the requirement's children.
    pub rule: Rule,

    /// Exact number of children that must be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    /// Minimum number of children that must be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<usize>,

    /// Maximum number of children that may be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,

    /// Group label selecting the input descriptors whose `group` contains it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Child requirements evaluated in place of a descriptor group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_nested: Option<Vec<SubmissionRequirement>>,
}

/// Submission requirement selection rule.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Rule {
    /// Every child must be satisfied.
    #[default]
    All,

    /// A `count`, or between `min` and `max`, children must be satisfied.
    Pick,
}

/// Input Descriptors describe the information a Verifier requires from the
/// Holder. All Input Descriptors MUST be satisfied, unless otherwise
/// specified by a Submission Requirement.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct InputDescriptor {
    /// An identifier that does not conflict with the id of any other Input
    /// Descriptor in the same Presentation Definition.
    pub id: String,

    /// If set, it SHOULD be a human-friendly name that describes what the
    /// target schema represents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// If present, its value MUST describe the purpose for which the Claim's
    /// data is being requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// Group labels this descriptor belongs to, referenced by submission
    /// requirement `from` values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group: Vec<String>,

    /// Implementation-defined metadata about the descriptor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,

    /// JSON-LD type gate (version 1 of the specification only): at least one
    /// entry must resolve against the credential's expanded types, and every
    /// `required` entry must.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schema: Vec<SchemaEntry>,

    /// Constraints on data values, and an explanation why a certain item or
    /// set of data is being requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,

    /// Per-descriptor claim format constraint, overriding the definition
    /// level `format`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
}

/// One JSON-LD schema URI demanded by a v1 input descriptor.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SchemaEntry {
    /// The type IRI the credential must expand to.
    pub uri: String,

    /// When `true` the URI must be satisfied for the credential to be
    /// accepted.
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
}

/// Constraints specify constraints on data values, and an explanation why a
/// certain item or set of data is being requested.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Constraints {
    /// When `required`, submitted fields are limited to those listed in the
    /// `fields` array, reshaping the credential through selective
    /// disclosure. `preferred` is advisory and does not reshape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_disclosure: Option<Preference>,

    /// When `required`, only credentials whose subject id equals the issuer
    /// id are accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_is_issuer: Option<Preference>,

    /// Holder-binding assertions. Carried in the data model; not evaluated
    /// during matching.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub is_holder: Vec<HolderConstraint>,

    /// Attributes of credential data the Verifier requires. Fields are
    /// processed in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

/// A holder-binding assertion over a set of fields.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct HolderConstraint {
    /// Ids of the `fields` entries the assertion covers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_id: Vec<String>,

    /// Whether the binding is `required` or `preferred`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directive: Option<Preference>,
}

/// Fields are used to specify attributes of credential data the Verifier
/// requires.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Field {
    /// One or more JSONPath expressions that select a target value from the
    /// input. The array MUST be evaluated in order, breaking as soon as a
    /// Field Query Result is found.
    pub path: Vec<String>,

    /// If present, it MUST be unique from every other field object's id
    /// property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// If present, it MUST describe the purpose for which the field is being
    /// requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// If present, a JSON Schema descriptor used to filter against the
    /// values returned from evaluation of the JSONPath expressions in the
    /// `path` array.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,

    /// The predicate feature: when `required`, the disclosed value is
    /// replaced with boolean `true` rather than the matching claim value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Preference>,

    /// When `true`, the Verifier intends to retain the claim's data.
    #[serde(default, skip_serializing_if = "is_false")]
    pub intent_to_retain: bool,
}

/// A JSON Schema fragment used to filter candidate claim values. Serializes
/// with JSON Schema keyword names so it can be compiled directly.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Filter {
    /// Expected JSON type of the matched value.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// Semantic format, e.g. `date` or `date-time`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Regular expression the matched string must satisfy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Inclusive lower bound. A string or a number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Value>,

    /// Inclusive upper bound. A string or a number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Value>,

    /// Minimum string length.
    #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    /// Maximum string length.
    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,

    /// Exclusive lower bound. A string or a number.
    #[serde(rename = "exclusiveMinimum", skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<Value>,

    /// Exclusive upper bound. A string or a number.
    #[serde(rename = "exclusiveMaximum", skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<Value>,

    /// The matched value must equal this constant.
    #[serde(rename = "const", skip_serializing_if = "Option::is_none")]
    pub const_: Option<Value>,

    /// The matched value must equal one of these values.
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_: Option<Vec<Value>>,

    /// The matched value must not validate against this schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<Map<String, Value>>,

    /// At least one array element must validate against this schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains: Option<Map<String, Value>>,
}

/// Whether a directive is mandatory or advisory.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Preference {
    /// The directive must be honored.
    Required,

    /// The directive should be honored when possible.
    Preferred,
}

/// Claim format constraints: which serialization and proof families the
/// Verifier accepts, and with which algorithms or proof types.
///
/// ```json
/// "format": {
///   "ldp_vc": { "proof_type": ["Ed25519Signature2018"] },
///   "jwt_vc": { "alg": ["EdDSA", "ES256K"] }
/// }
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Format {
    /// Plain JWT claims.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<JwtType>,

    /// JWT-secured Verifiable Credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_vc: Option<JwtType>,

    /// JWT-secured Verifiable Presentations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_vp: Option<JwtType>,

    /// Linked-data proof claims.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ldp: Option<LdpType>,

    /// Linked-data proof Verifiable Credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ldp_vc: Option<LdpType>,

    /// Linked-data proof Verifiable Presentations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ldp_vp: Option<LdpType>,
}

impl Format {
    /// Returns `true` if no claim format designation is set.
    pub fn is_empty(&self) -> bool {
        self.jwt.is_none()
            && self.jwt_vc.is_none()
            && self.jwt_vp.is_none()
            && self.ldp.is_none()
            && self.ldp_vc.is_none()
            && self.ldp_vp.is_none()
    }
}

/// JOSE algorithms accepted for a JWT-family format.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct JwtType {
    /// One or more algorithm identifiers, e.g. `["EdDSA", "ES256K"]`.
    #[serde(default)]
    pub alg: Vec<String>,
}

/// Proof types accepted for a linked-data-proof-family format.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct LdpType {
    /// One or more proof type identifiers, e.g. `["Ed25519Signature2018"]`.
    #[serde(default)]
    pub proof_type: Vec<String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(b: &bool) -> bool {
    !*b
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn deserialize_definition() {
        let value = json!({
            "id": "vp token example",
            "input_descriptors": [
                {
                    "id": "id card credential",
                    "format": {
                        "ldp_vc": {
                            "proof_type": ["Ed25519Signature2018"]
                        }
                    },
                    "constraints": {
                        "fields": [
                            {
                                "path": ["$.type"],
                                "filter": {
                                    "type": "string",
                                    "pattern": "IDCardCredential"
                                }
                            }
                        ]
                    }
                }
            ]
        });

        let pd: PresentationDefinition =
            serde_json::from_value(value.clone()).expect("should deserialize");
        assert_eq!(pd.id, "vp token example");

        let descriptor = &pd.input_descriptors[0];
        let format = descriptor.format.as_ref().expect("format should be set");
        assert_eq!(
            format.ldp_vc.as_ref().expect("ldp_vc should be set").proof_type,
            vec!["Ed25519Signature2018"]
        );

        let constraints = descriptor.constraints.as_ref().expect("constraints should be set");
        assert_eq!(constraints.fields[0].path, vec!["$.type"]);
        assert_eq!(
            constraints.fields[0].filter.as_ref().expect("filter should be set").pattern,
            Some("IDCardCredential".into())
        );

        // round-trip drops nothing
        assert_eq!(serde_json::to_value(&pd).expect("should serialize"), value);
    }

    #[test]
    fn deserialize_requirements() {
        let value = json!([
            {
                "rule": "pick",
                "count": 1,
                "from_nested": [
                    { "rule": "all", "from": "A" },
                    { "rule": "all", "from": "B" }
                ]
            }
        ]);

        let reqs: Vec<SubmissionRequirement> =
            serde_json::from_value(value).expect("should deserialize");
        assert_eq!(reqs[0].rule, Rule::Pick);
        assert_eq!(reqs[0].count, Some(1));

        let nested = reqs[0].from_nested.as_ref().expect("from_nested should be set");
        assert_eq!(nested[0].from, Some("A".into()));
        assert_eq!(nested[1].rule, Rule::All);
    }

    #[test]
    fn filter_serializes_as_json_schema() {
        let filter = Filter {
            type_: Some("string".into()),
            const_: Some(json!("BachelorDegree")),
            min_length: Some(3),
            ..Filter::default()
        };

        assert_eq!(
            serde_json::to_value(&filter).expect("should serialize"),
            json!({"type": "string", "const": "BachelorDegree", "minLength": 3})
        );
    }
}
