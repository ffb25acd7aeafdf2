//! # Presentation Submission
//!
//! The descriptor map a holder embeds in a Verifiable Presentation to tell
//! the Verifier which demanded input is satisfied where, and its assembly
//! from evaluated descriptor buckets.
//!
//! <https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission>

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;
use crate::format::FormatTag;
use crate::matcher::Candidate;
use crate::model::vc::Credential;

/// A Presentation Submission expresses how the presented proofs satisfy the
/// requirements specified in a Presentation Definition.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PresentationSubmission {
    /// A unique identifier, such as a UUID.
    pub id: String,

    /// The id of the Presentation Definition this submission fulfills.
    pub definition_id: String,

    /// An array of Input Descriptor Mapping Objects.
    pub descriptor_map: Vec<DescriptorMap>,
}

/// An Input Descriptor Mapping Object maps an Input Descriptor to the
/// location of the credential satisfying it.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DescriptorMap {
    /// The id of the Input Descriptor in the Presentation Definition this
    /// entry satisfies.
    pub id: String,

    /// The Claim Format Designation of the object the `path` locates.
    pub format: String,

    /// A JSONPath expression locating the satisfying object relative to the
    /// presentation.
    pub path: String,

    /// Locates the credential within the object `path` points at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_nested: Option<Box<DescriptorMap>>,
}

/// Assemble the presentation body: deduplicated credentials in
/// first-appearance order over the lexicographically sorted descriptor
/// walk, and a descriptor map entry for each first-seen credential.
pub(crate) fn assemble(
    vp_format: FormatTag, buckets: BTreeMap<String, Vec<Candidate>>,
) -> Result<(Vec<Value>, Vec<DescriptorMap>), Error> {
    let mut seen: HashMap<Uuid, usize> = HashMap::new();
    let mut credentials: Vec<Value> = Vec::new();
    let mut descriptor_map: Vec<DescriptorMap> = Vec::new();

    for (descriptor_id, bucket) in &buckets {
        for candidate in bucket {
            if seen.contains_key(&candidate.handle) {
                continue;
            }

            let index = credentials.len();
            credentials.push(embed_credential(&candidate.vc)?);
            seen.insert(candidate.handle, index);

            let vc_format =
                if candidate.vc.jwt.is_some() { FormatTag::JwtVc } else { FormatTag::LdpVc };

            descriptor_map.push(DescriptorMap {
                id: descriptor_id.clone(),
                format: vp_format.as_str().to_string(),
                path: "$".into(),
                path_nested: Some(Box::new(DescriptorMap {
                    id: descriptor_id.clone(),
                    format: vc_format.as_str().to_string(),
                    path: format!("$.verifiableCredential[{index}]"),
                    path_nested: None,
                })),
            });
        }
    }

    // deterministic output: keys were walked sorted, re-sort by entry id
    descriptor_map.sort_by(|a, b| a.id.cmp(&b.id));

    Ok((credentials, descriptor_map))
}

// JWT-secured credentials embed in their compact form; SD-JWT credentials
// additionally append their disclosures. Everything else embeds as the JSON
// body.
fn embed_credential(vc: &Credential) -> Result<Value, Error> {
    let Some(jwt) = &vc.jwt else {
        return serde_json::to_value(vc).map_err(Error::Encoding);
    };

    if vc.sd_jwt_hash_alg.is_some() {
        let mut combined = jwt.clone();
        for disclosure in &vc.sd_jwt_disclosures {
            combined.push('~');
            combined.push_str(disclosure.encoded());
        }
        combined.push('~');
        return Ok(Value::String(combined));
    }

    Ok(Value::String(jwt.clone()))
}
