//! # Definition Validation
//!
//! Checks an incoming Presentation Definition against the published JSON
//! Schemas before any matching starts. Version 1 is tried first; when it
//! rejects, version 2 (the newer, looser form without per-descriptor
//! `schema` gates) gets a turn. Accepting either prevents rejecting valid
//! v2 inputs. Both schemas are static assets; validation never touches the
//! network.

use serde_json::Value;

use crate::definition::PresentationDefinition;
use crate::error::Error;

/// JSON Schema (draft 7) for version 1 Presentation Definitions, wrapped in
/// a `presentation_definition` envelope.
pub const DEFINITION_SCHEMA_V1: &str = r##"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "title": "Presentation Definition Envelope v1",
  "definitions": {
    "schema": {
      "type": "object",
      "properties": {
        "uri": { "type": "string" },
        "required": { "type": "boolean" }
      },
      "required": ["uri"],
      "additionalProperties": false
    },
    "filter": {
      "type": "object",
      "properties": {
        "type": { "type": "string" },
        "format": { "type": "string" },
        "pattern": { "type": "string" },
        "minimum": { "type": ["number", "string"] },
        "maximum": { "type": ["number", "string"] },
        "minLength": { "type": "integer", "minimum": 0 },
        "maxLength": { "type": "integer", "minimum": 0 },
        "exclusiveMinimum": { "type": ["number", "string"] },
        "exclusiveMaximum": { "type": ["number", "string"] },
        "const": {},
        "enum": { "type": "array" },
        "not": { "type": "object" },
        "contains": { "type": "object" }
      },
      "additionalProperties": false
    },
    "field": {
      "type": "object",
      "properties": {
        "path": { "type": "array", "minItems": 1, "items": { "type": "string" } },
        "id": { "type": "string" },
        "purpose": { "type": "string" },
        "filter": { "$ref": "#/definitions/filter" },
        "predicate": { "type": "string", "enum": ["required", "preferred"] },
        "intent_to_retain": { "type": "boolean" }
      },
      "required": ["path"],
      "additionalProperties": false
    },
    "is_holder": {
      "type": "object",
      "properties": {
        "field_id": { "type": "array", "items": { "type": "string" } },
        "directive": { "type": "string", "enum": ["required", "preferred"] }
      },
      "additionalProperties": false
    },
    "constraints": {
      "type": "object",
      "properties": {
        "limit_disclosure": { "type": "string", "enum": ["required", "preferred"] },
        "subject_is_issuer": { "type": "string", "enum": ["required", "preferred"] },
        "is_holder": { "type": "array", "items": { "$ref": "#/definitions/is_holder" } },
        "fields": { "type": "array", "items": { "$ref": "#/definitions/field" } }
      },
      "additionalProperties": false
    },
    "jwt_type": {
      "type": "object",
      "properties": {
        "alg": { "type": "array", "minItems": 1, "items": { "type": "string" } }
      },
      "required": ["alg"],
      "additionalProperties": false
    },
    "ldp_type": {
      "type": "object",
      "properties": {
        "proof_type": { "type": "array", "minItems": 1, "items": { "type": "string" } }
      },
      "required": ["proof_type"],
      "additionalProperties": false
    },
    "format": {
      "type": "object",
      "properties": {
        "jwt": { "$ref": "#/definitions/jwt_type" },
        "jwt_vc": { "$ref": "#/definitions/jwt_type" },
        "jwt_vp": { "$ref": "#/definitions/jwt_type" },
        "ldp": { "$ref": "#/definitions/ldp_type" },
        "ldp_vc": { "$ref": "#/definitions/ldp_type" },
        "ldp_vp": { "$ref": "#/definitions/ldp_type" }
      },
      "additionalProperties": false
    },
    "input_descriptor": {
      "type": "object",
      "properties": {
        "id": { "type": "string" },
        "name": { "type": "string" },
        "purpose": { "type": "string" },
        "group": { "type": "array", "items": { "type": "string" } },
        "metadata": { "type": "object" },
        "schema": { "type": "array", "minItems": 1, "items": { "$ref": "#/definitions/schema" } },
        "constraints": { "$ref": "#/definitions/constraints" },
        "format": { "$ref": "#/definitions/format" }
      },
      "required": ["id", "schema"],
      "additionalProperties": false
    },
    "submission_requirement": {
      "type": "object",
      "oneOf": [
        {
          "properties": {
            "name": { "type": "string" },
            "purpose": { "type": "string" },
            "rule": { "type": "string", "enum": ["all", "pick"] },
            "count": { "type": "integer", "minimum": 1 },
            "min": { "type": "integer", "minimum": 0 },
            "max": { "type": "integer", "minimum": 0 },
            "from": { "type": "string" }
          },
          "required": ["rule", "from"],
          "additionalProperties": false
        },
        {
          "properties": {
            "name": { "type": "string" },
            "purpose": { "type": "string" },
            "rule": { "type": "string", "enum": ["all", "pick"] },
            "count": { "type": "integer", "minimum": 1 },
            "min": { "type": "integer", "minimum": 0 },
            "max": { "type": "integer", "minimum": 0 },
            "from_nested": {
              "type": "array",
              "minItems": 1,
              "items": { "$ref": "#/definitions/submission_requirement" }
            }
          },
          "required": ["rule", "from_nested"],
          "additionalProperties": false
        }
      ]
    }
  },
  "type": "object",
  "properties": {
    "presentation_definition": {
      "type": "object",
      "properties": {
        "id": { "type": "string" },
        "name": { "type": "string" },
        "purpose": { "type": "string" },
        "locale": { "type": "string" },
        "format": { "$ref": "#/definitions/format" },
        "frame": { "type": "object" },
        "submission_requirements": {
          "type": "array",
          "minItems": 1,
          "items": { "$ref": "#/definitions/submission_requirement" }
        },
        "input_descriptors": {
          "type": "array",
          "items": { "$ref": "#/definitions/input_descriptor" }
        }
      },
      "required": ["id", "input_descriptors"],
      "additionalProperties": false
    }
  },
  "required": ["presentation_definition"],
  "additionalProperties": false
}"##;

/// JSON Schema (draft 7) for version 2 Presentation Definitions. Identical
/// to v1 except the per-descriptor JSON-LD `schema` gate no longer exists.
pub const DEFINITION_SCHEMA_V2: &str = r##"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "title": "Presentation Definition Envelope v2",
  "definitions": {
    "filter": {
      "type": "object",
      "properties": {
        "type": { "type": "string" },
        "format": { "type": "string" },
        "pattern": { "type": "string" },
        "minimum": { "type": ["number", "string"] },
        "maximum": { "type": ["number", "string"] },
        "minLength": { "type": "integer", "minimum": 0 },
        "maxLength": { "type": "integer", "minimum": 0 },
        "exclusiveMinimum": { "type": ["number", "string"] },
        "exclusiveMaximum": { "type": ["number", "string"] },
        "const": {},
        "enum": { "type": "array" },
        "not": { "type": "object" },
        "contains": { "type": "object" }
      },
      "additionalProperties": false
    },
    "field": {
      "type": "object",
      "properties": {
        "path": { "type": "array", "minItems": 1, "items": { "type": "string" } },
        "id": { "type": "string" },
        "purpose": { "type": "string" },
        "filter": { "$ref": "#/definitions/filter" },
        "predicate": { "type": "string", "enum": ["required", "preferred"] },
        "intent_to_retain": { "type": "boolean" }
      },
      "required": ["path"],
      "additionalProperties": false
    },
    "is_holder": {
      "type": "object",
      "properties": {
        "field_id": { "type": "array", "items": { "type": "string" } },
        "directive": { "type": "string", "enum": ["required", "preferred"] }
      },
      "additionalProperties": false
    },
    "constraints": {
      "type": "object",
      "properties": {
        "limit_disclosure": { "type": "string", "enum": ["required", "preferred"] },
        "subject_is_issuer": { "type": "string", "enum": ["required", "preferred"] },
        "is_holder": { "type": "array", "items": { "$ref": "#/definitions/is_holder" } },
        "fields": { "type": "array", "items": { "$ref": "#/definitions/field" } }
      },
      "additionalProperties": false
    },
    "jwt_type": {
      "type": "object",
      "properties": {
        "alg": { "type": "array", "minItems": 1, "items": { "type": "string" } }
      },
      "required": ["alg"],
      "additionalProperties": false
    },
    "ldp_type": {
      "type": "object",
      "properties": {
        "proof_type": { "type": "array", "minItems": 1, "items": { "type": "string" } }
      },
      "required": ["proof_type"],
      "additionalProperties": false
    },
    "format": {
      "type": "object",
      "properties": {
        "jwt": { "$ref": "#/definitions/jwt_type" },
        "jwt_vc": { "$ref": "#/definitions/jwt_type" },
        "jwt_vp": { "$ref": "#/definitions/jwt_type" },
        "ldp": { "$ref": "#/definitions/ldp_type" },
        "ldp_vc": { "$ref": "#/definitions/ldp_type" },
        "ldp_vp": { "$ref": "#/definitions/ldp_type" }
      },
      "additionalProperties": false
    },
    "input_descriptor": {
      "type": "object",
      "properties": {
        "id": { "type": "string" },
        "name": { "type": "string" },
        "purpose": { "type": "string" },
        "group": { "type": "array", "items": { "type": "string" } },
        "metadata": { "type": "object" },
        "constraints": { "$ref": "#/definitions/constraints" },
        "format": { "$ref": "#/definitions/format" }
      },
      "required": ["id"],
      "additionalProperties": false
    },
    "submission_requirement": {
      "type": "object",
      "oneOf": [
        {
          "properties": {
            "name": { "type": "string" },
            "purpose": { "type": "string" },
            "rule": { "type": "string", "enum": ["all", "pick"] },
            "count": { "type": "integer", "minimum": 1 },
            "min": { "type": "integer", "minimum": 0 },
            "max": { "type": "integer", "minimum": 0 },
            "from": { "type": "string" }
          },
          "required": ["rule", "from"],
          "additionalProperties": false
        },
        {
          "properties": {
            "name": { "type": "string" },
            "purpose": { "type": "string" },
            "rule": { "type": "string", "enum": ["all", "pick"] },
            "count": { "type": "integer", "minimum": 1 },
            "min": { "type": "integer", "minimum": 0 },
            "max": { "type": "integer", "minimum": 0 },
            "from_nested": {
              "type": "array",
              "minItems": 1,
              "items": { "$ref": "#/definitions/submission_requirement" }
            }
          },
          "required": ["rule", "from_nested"],
          "additionalProperties": false
        }
      ]
    }
  },
  "type": "object",
  "properties": {
    "presentation_definition": {
      "type": "object",
      "properties": {
        "id": { "type": "string" },
        "name": { "type": "string" },
        "purpose": { "type": "string" },
        "locale": { "type": "string" },
        "format": { "$ref": "#/definitions/format" },
        "frame": { "type": "object" },
        "submission_requirements": {
          "type": "array",
          "minItems": 1,
          "items": { "$ref": "#/definitions/submission_requirement" }
        },
        "input_descriptors": {
          "type": "array",
          "items": { "$ref": "#/definitions/input_descriptor" }
        }
      },
      "required": ["id", "input_descriptors"],
      "additionalProperties": false
    }
  },
  "required": ["presentation_definition"],
  "additionalProperties": false
}"##;

impl PresentationDefinition {
    /// Validate this definition against the Presentation Definition JSON
    /// Schemas, v1 first with a v2 fallback.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDefinition`] with the v2 violation messages
    /// when neither version accepts the definition.
    pub fn validate(&self) -> Result<(), Error> {
        let instance = serde_json::json!({ "presentation_definition": self });

        if violations(DEFINITION_SCHEMA_V1, &instance)?.is_empty() {
            return Ok(());
        }

        let messages = violations(DEFINITION_SCHEMA_V2, &instance)?;
        if messages.is_empty() {
            return Ok(());
        }

        Err(Error::InvalidDefinition(messages.join(",")))
    }
}

fn violations(schema: &str, instance: &Value) -> Result<Vec<String>, Error> {
    let schema: Value = serde_json::from_str(schema)?;
    let validator = jsonschema::options()
        .with_draft(jsonschema::Draft::Draft7)
        .build(&schema)
        .map_err(|e| Error::InvalidDefinition(e.to_string()))?;

    Ok(validator.iter_errors(instance).map(|e| e.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn definition(value: serde_json::Value) -> PresentationDefinition {
        serde_json::from_value(value).expect("should deserialize")
    }

    #[test]
    fn v1_accepts_schema_gated_descriptor() {
        let pd = definition(json!({
            "id": "d",
            "input_descriptors": [{
                "id": "a",
                "schema": [{"uri": "https://example.org/examples#Degree", "required": true}]
            }]
        }));

        pd.validate().expect("v1 definition should validate");
    }

    #[test]
    fn v2_accepts_constraints_only_descriptor() {
        let pd = definition(json!({
            "id": "d",
            "input_descriptors": [{
                "id": "a",
                "constraints": {
                    "fields": [{"path": ["$.credentialSubject.degree.type"]}]
                }
            }]
        }));

        // fails v1 (no schema), passes v2
        pd.validate().expect("v2 definition should validate");
    }

    #[test]
    fn rejects_requirement_with_both_sources() {
        let pd = definition(json!({
            "id": "d",
            "submission_requirements": [{
                "rule": "all",
                "from": "A",
                "from_nested": [{"rule": "all", "from": "B"}]
            }],
            "input_descriptors": [{
                "id": "a",
                "group": ["A"],
                "constraints": {"fields": [{"path": ["$.type"]}]}
            }]
        }));

        let err = pd.validate().expect_err("should reject from XOR from_nested violation");
        assert!(matches!(err, Error::InvalidDefinition(_)));
    }

    #[test]
    fn rejects_unknown_rule() {
        // serde would refuse "rule": "some", so build the shape directly
        let instance = json!({
            "presentation_definition": {
                "id": "d",
                "submission_requirements": [{"rule": "some", "from": "A"}],
                "input_descriptors": [{"id": "a", "group": ["A"]}]
            }
        });

        let v1 = violations(DEFINITION_SCHEMA_V1, &instance).expect("should evaluate");
        let v2 = violations(DEFINITION_SCHEMA_V2, &instance).expect("should evaluate");
        assert!(!v1.is_empty());
        assert!(!v2.is_empty());
    }
}
