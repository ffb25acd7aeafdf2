//! # Selective Disclosure
//!
//! Rebuilds an accepted credential so it contains only the demanded paths.
//! Three regimes share the same located-JSONPath projection machinery:
//!
//! - plain JSON redaction onto a minimal credential skeleton,
//! - BBS+ derivation, which builds a reveal document (`@explicit` markers
//!   over the demanded nodes) and hands it to the [`BbsDeriver`]
//!   collaborator,
//! - SD-JWT pruning, which narrows the disclosure list to the claims the
//!   demanded paths reference.
//!
//! Array indices are remapped per parent while projecting, so redacted
//! arrays come out dense rather than sparse.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::anyhow;
use base64ct::{Base64UrlUnpadded, Encoding};
use serde_json::{json, Map, Value};
use serde_json_path::JsonPath;
use sha2::{Digest as _, Sha256, Sha384, Sha512};
use uuid::Uuid;

use crate::definition::{Constraints, Preference};
use crate::error::Error;
use crate::model::vc::Credential;

/// Proof type marking a credential as capable of BBS+ selective disclosure.
pub const BBS_PROOF_TYPE: &str = "BbsBlsSignature2020";

/// Derives a credential with a proof over a revealed subset of claims.
///
/// The reveal document follows the JSON-LD framing convention: nodes to
/// disclose carry `"@explicit": true` together with their original `type`
/// and `@context` values.
pub trait BbsDeriver {
    /// Produce a new credential whose proof covers only the claims selected
    /// by `reveal`.
    ///
    /// # Errors
    ///
    /// Returns an error when derivation fails; the evaluation that requested
    /// it fails with it.
    fn derive(
        &self, credential: &Credential, reveal: &Value, nonce: Option<&[u8]>,
    ) -> anyhow::Result<Credential>;
}

/// SD-JWT digest algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlg {
    /// SHA-256, the `sha-256` registry name.
    Sha256,
    /// SHA-384, the `sha-384` registry name.
    Sha384,
    /// SHA-512, the `sha-512` registry name.
    Sha512,
}

impl HashAlg {
    /// Resolve an IANA hash algorithm name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedHashAlg`] for algorithms this crate
    /// cannot compute.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        match name.to_ascii_lowercase().as_str() {
            "sha-256" => Ok(Self::Sha256),
            "sha-384" => Ok(Self::Sha384),
            "sha-512" => Ok(Self::Sha512),
            _ => Err(Error::UnsupportedHashAlg(name.to_string())),
        }
    }

    /// Base64url-encoded digest of `data`.
    #[must_use]
    pub fn digest(self, data: &[u8]) -> String {
        match self {
            Self::Sha256 => Base64UrlUnpadded::encode_string(&Sha256::digest(data)),
            Self::Sha384 => Base64UrlUnpadded::encode_string(&Sha384::digest(data)),
            Self::Sha512 => Base64UrlUnpadded::encode_string(&Sha512::digest(data)),
        }
    }
}

/// A single SD-JWT disclosure: the base64url encoding of
/// `[salt, claim name, claim value]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Disclosure {
    salt: String,

    /// Name of the disclosed claim.
    pub name: String,

    /// Value of the disclosed claim.
    pub value: Value,

    encoded: String,
}

impl Disclosure {
    /// Build a disclosure from its parts, computing the encoded form.
    #[must_use]
    pub fn new(salt: impl Into<String>, name: impl Into<String>, value: Value) -> Self {
        let salt = salt.into();
        let name = name.into();
        let encoded =
            Base64UrlUnpadded::encode_string(json!([salt, name, value]).to_string().as_bytes());

        Self { salt, name, value, encoded }
    }

    /// Unpack a base64url-encoded disclosure.
    ///
    /// # Errors
    ///
    /// Fails when the encoding or the `[salt, name, value]` structure is
    /// invalid.
    pub fn from_encoded(encoded: &str) -> anyhow::Result<Self> {
        let decoded = Base64UrlUnpadded::decode_vec(encoded)
            .map_err(|e| anyhow!("invalid base64url disclosure: {e}"))?;
        let parts: Vec<Value> = serde_json::from_slice(&decoded)?;

        let [salt, name, value] = parts.as_slice() else {
            anyhow::bail!("disclosure must contain [salt, name, value]");
        };
        let (Some(salt), Some(name)) = (salt.as_str(), name.as_str()) else {
            anyhow::bail!("disclosure salt and name must be strings");
        };

        Ok(Self {
            salt: salt.to_string(),
            name: name.to_string(),
            value: value.clone(),
            encoded: encoded.to_string(),
        })
    }

    /// The base64url-encoded disclosure as transmitted.
    #[must_use]
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// The disclosure digest under `alg`, as found in `_sd` arrays.
    #[must_use]
    pub fn digest(&self, alg: HashAlg) -> String {
        alg.digest(self.encoded.as_bytes())
    }
}

/// One step of a concrete location within a JSON document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Seg {
    /// Object member name.
    Key(String),
    /// Array index.
    Index(usize),
}

/// Materialize an SD-JWT credential with every disclosure resolved into its
/// claim position, for field evaluation.
pub(crate) fn display_credential(credential: &Credential) -> Result<Value, Error> {
    let mut body = serde_json::to_value(credential)?;

    if let Some(alg_name) = &credential.sd_jwt_hash_alg {
        let alg = HashAlg::from_name(alg_name)?;
        let by_digest: HashMap<String, &Disclosure> =
            credential.sd_jwt_disclosures.iter().map(|d| (d.digest(alg), d)).collect();
        resolve_digests(&mut body, &by_digest);
    }

    Ok(body)
}

fn resolve_digests(node: &mut Value, by_digest: &HashMap<String, &Disclosure>) {
    match node {
        Value::Object(map) => {
            if let Some(Value::Array(digests)) = map.remove("_sd") {
                for digest in &digests {
                    if let Some(disclosure) = digest.as_str().and_then(|d| by_digest.get(d)) {
                        map.insert(disclosure.name.clone(), disclosure.value.clone());
                    }
                }
            }
            for value in map.values_mut() {
                resolve_digests(value, by_digest);
            }
        }
        Value::Array(values) => {
            for value in values {
                resolve_digests(value, by_digest);
            }
        }
        _ => {}
    }
}

/// Rebuild `credential` to contain only the constraint-demanded paths.
///
/// Plain projection unless the credential supports BBS+, disclosure is
/// limited, and no predicate substitution occurred; in that case a reveal
/// document is derived through the collaborator instead. Predicate
/// substitution always wins over BBS+ derivation.
pub(crate) fn create_new_credential(
    constraints: &Constraints,
    src: &Value,
    credential: &Credential,
    deriver: Option<&dyn BbsDeriver>,
) -> Result<Credential, Error> {
    let limit = constraints.limit_disclosure == Some(Preference::Required);
    let bbs_support = credential.has_proof_type(BBS_PROOF_TYPE);
    let mut modified_by_predicate = false;

    // dotted target-parent path -> (target segments, source segments)
    let mut explicit: BTreeMap<String, (Vec<Seg>, Vec<Seg>)> = BTreeMap::new();

    let mut template = if limit { limited_template(credential)? } else { src.clone() };

    for (index, field) in constraints.fields.iter().enumerate() {
        let paths = located_paths(&field.path, src)
            .map_err(|reason| Error::FilterField { index, reason })?;

        for (target, source) in paths {
            if references_credential_schema(&target) {
                continue;
            }

            let predicate_required = field.predicate == Some(Preference::Required);
            if predicate_required {
                modified_by_predicate = true;
            }

            let value = if predicate_required {
                Value::Bool(true)
            } else {
                get_path(src, &source).cloned().unwrap_or(Value::Null)
            };

            if limit && bbs_support && target.len() > 1 {
                let parent = target[..target.len() - 1].to_vec();
                explicit
                    .entry(dotted(&parent))
                    .or_insert_with(|| (parent, source[..source.len() - 1].to_vec()));
            }

            set_path(&mut template, &target, value);
        }
    }

    if !limit || !bbs_support || modified_by_predicate {
        return serde_json::from_value(template).map_err(Error::Encoding);
    }

    enhance_reveal_doc(&mut template, &explicit, src);

    let deriver =
        deriver.ok_or_else(|| Error::DeriveProof(anyhow!("no BBS+ deriver configured")))?;
    let nonce = Uuid::new_v4().to_string();

    deriver.derive(credential, &template, Some(nonce.as_bytes())).map_err(Error::DeriveProof)
}

/// Narrow an SD-JWT credential's disclosure list to the claims the
/// constraint fields reference.
///
/// Field paths are evaluated against the display credential; the `_sd`
/// digest arrays are read from the raw credential body.
pub(crate) fn limited_disclosures(
    constraints: &Constraints,
    display_src: &Value,
    credential: &Credential,
) -> Result<Vec<Disclosure>, Error> {
    let alg = HashAlg::from_name(credential.sd_jwt_hash_alg.as_deref().unwrap_or_default())?;
    let raw = serde_json::to_value(credential)?;

    let mut kept: Vec<Disclosure> = Vec::new();

    for (index, field) in constraints.fields.iter().enumerate() {
        let paths = located_paths(&field.path, display_src)
            .map_err(|reason| Error::FilterField { index, reason })?;

        for (target, source) in paths {
            if references_credential_schema(&target) {
                continue;
            }

            let Some((last, parent)) = source.split_last() else {
                continue;
            };
            let Seg::Key(leaf) = last else {
                continue;
            };

            // no selective disclosures at this level, nothing to keep
            let Some(parent_obj) = get_path(&raw, parent).and_then(Value::as_object) else {
                continue;
            };
            let Some(digests) = parent_obj.get("_sd").and_then(Value::as_array) else {
                continue;
            };
            let digests: HashSet<&str> = digests.iter().filter_map(Value::as_str).collect();

            for disclosure in &credential.sd_jwt_disclosures {
                if disclosure.name == *leaf
                    && digests.contains(disclosure.digest(alg).as_str())
                    && !kept.iter().any(|k| k.encoded() == disclosure.encoded())
                {
                    kept.push(disclosure.clone());
                }
            }
        }
    }

    Ok(kept)
}

/// The minimal credential skeleton plain projection starts from.
fn limited_template(credential: &Credential) -> Result<Value, Error> {
    let mut template = json!({
        "id": credential.id,
        "type": serde_json::to_value(&credential.type_)?,
        "@context": serde_json::to_value(&credential.context)?,
        "issuer": serde_json::to_value(&credential.issuer)?,
        "credentialSubject": collapsed_subject(credential),
    });

    if let Some(issued) = &credential.issuance_date {
        template["issuanceDate"] = serde_json::to_value(issued)?;
    }

    Ok(template)
}

// A single subject collapses to its bare id; multi-subject credentials keep
// their subjects as-is.
fn collapsed_subject(credential: &Credential) -> Value {
    let subjects = credential.credential_subject.as_slice();
    if let [subject] = subjects {
        return match &subject.id {
            Some(id) => json!({ "id": id }),
            None => json!({}),
        };
    }

    serde_json::to_value(&credential.credential_subject).unwrap_or(Value::Null)
}

/// Evaluate every path expression and return, per match, the remapped
/// target location and the source location.
pub(crate) fn located_paths(
    exprs: &[String], src: &Value,
) -> anyhow::Result<Vec<(Vec<Seg>, Vec<Seg>)>> {
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();

    for expr in exprs {
        let path =
            JsonPath::parse(expr).map_err(|e| anyhow!("invalid JSONPath \"{expr}\": {e}"))?;

        for located in path.query_located(src).iter() {
            let source = pointer_segments(src, &located.location().to_json_pointer());
            let target = remap_indices(&source, &mut counters);
            out.push((target, source));
        }
    }

    Ok(out)
}

// Resolve a JSON Pointer into typed segments by walking the document it was
// produced from.
fn pointer_segments(src: &Value, pointer: &str) -> Vec<Seg> {
    let mut segments = Vec::new();
    let mut current = src;

    for token in pointer.split('/').skip(1) {
        let token = token.replace("~1", "/").replace("~0", "~");
        match current {
            Value::Array(values) => {
                let index: usize = token.parse().unwrap_or(0);
                current = values.get(index).unwrap_or(&Value::Null);
                segments.push(Seg::Index(index));
            }
            Value::Object(map) => {
                current = map.get(&token).unwrap_or(&Value::Null);
                segments.push(Seg::Key(token));
            }
            _ => segments.push(Seg::Key(token)),
        }
    }

    segments
}

// Assign dense indices per parent, in first-seen order, so projection onto a
// reduced document leaves no null gaps. Counter state spans all matches of
// one field.
fn remap_indices(source: &[Seg], counters: &mut HashMap<String, usize>) -> Vec<Seg> {
    let mut target = Vec::with_capacity(source.len());
    let mut prefix: Vec<String> = Vec::new();

    for seg in source {
        match seg {
            Seg::Key(key) => {
                prefix.push(key.clone());
                target.push(Seg::Key(key.clone()));
            }
            Seg::Index(index) => {
                let counter_key = prefix.join(".");
                prefix.push(index.to_string());
                let mapper_key = prefix.join(".");

                if !counters.contains_key(&mapper_key) {
                    let next = counters.get(&counter_key).copied().unwrap_or(0);
                    counters.insert(mapper_key.clone(), next);
                    counters.insert(counter_key, next + 1);
                }

                target.push(Seg::Index(counters.get(&mapper_key).copied().unwrap_or(0)));
            }
        }
    }

    target
}

fn references_credential_schema(segments: &[Seg]) -> bool {
    matches!(segments.first(), Some(Seg::Key(key)) if key.contains("credentialSchema"))
}

fn dotted(segments: &[Seg]) -> String {
    let parts: Vec<String> = segments
        .iter()
        .map(|seg| match seg {
            Seg::Key(key) => key.clone(),
            Seg::Index(index) => index.to_string(),
        })
        .collect();

    parts.join(".")
}

pub(crate) fn get_path<'a>(doc: &'a Value, segments: &[Seg]) -> Option<&'a Value> {
    let mut current = doc;
    for seg in segments {
        current = match seg {
            Seg::Key(key) => current.as_object()?.get(key)?,
            Seg::Index(index) => current.as_array()?.get(*index)?,
        };
    }
    Some(current)
}

// Write `value` at `segments`, creating intermediate containers as needed
// and padding arrays with nulls.
pub(crate) fn set_path(doc: &mut Value, segments: &[Seg], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *doc = value;
        return;
    };

    match first {
        Seg::Key(key) => {
            if !matches!(doc, Value::Object(_)) {
                *doc = Value::Object(Map::new());
            }
            if let Value::Object(map) = doc {
                let entry = map.entry(key.clone()).or_insert(Value::Null);
                set_path(entry, rest, value);
            }
        }
        Seg::Index(index) => {
            if !matches!(doc, Value::Array(_)) {
                *doc = Value::Array(Vec::new());
            }
            if let Value::Array(values) = doc {
                while values.len() <= *index {
                    values.push(Value::Null);
                }
                set_path(&mut values[*index], rest, value);
            }
        }
    }
}

// Mark every projected parent and its ancestors for reveal, copying `type`
// and `@context` from the original credential alongside the marker.
fn enhance_reveal_doc(
    doc: &mut Value, explicit: &BTreeMap<String, (Vec<Seg>, Vec<Seg>)>, src: &Value,
) {
    set_path(doc, &[Seg::Key("@explicit".into())], Value::Bool(true));

    let mut intermediate: BTreeMap<String, (Vec<Seg>, Vec<Seg>)> = BTreeMap::new();

    for (target, source) in explicit.values() {
        enhance_reveal_field(doc, target, src, source);

        for depth in 1..target.len() {
            let ancestor = &target[..depth];
            let key = dotted(ancestor);
            if !explicit.contains_key(&key) {
                intermediate
                    .entry(key)
                    .or_insert_with(|| (ancestor.to_vec(), source[..depth].to_vec()));
            }
        }
    }

    for (target, source) in intermediate.values() {
        enhance_reveal_field(doc, target, src, source);
    }
}

fn enhance_reveal_field(doc: &mut Value, parent: &[Seg], src: &Value, parent_source: &[Seg]) {
    let mut marker = parent.to_vec();
    marker.push(Seg::Key("@explicit".into()));
    set_path(doc, &marker, Value::Bool(true));

    for special in ["type", "@context"] {
        let mut from = parent_source.to_vec();
        from.push(Seg::Key(special.into()));

        if let Some(value) = get_path(src, &from) {
            let mut to = parent.to_vec();
            to.push(Seg::Key(special.into()));
            set_path(doc, &to, value.clone());
        }
    }
}
