//! # JSON-LD Schema Gate
//!
//! Version 1 input descriptors carry `schema` entries naming type IRIs a
//! credential must expand to. The gate walks the credential's `@context`
//! URLs through the caller's [`DocumentLoader`], resolves each credential
//! type's term definition, and collects the term's `@id` together with its
//! expanded IRI through a one-level nested `@context`. Context documents are
//! memoized per invocation; the memo never outlives the call.

use std::collections::{HashMap, HashSet};

use anyhow::anyhow;
use serde_json::{Map, Value};
use tracing::error;

use crate::definition::SchemaEntry;
use crate::error::Error;
use crate::matcher::Candidate;

/// Loads JSON-LD context documents on behalf of the schema gate.
///
/// The gate calls the loader synchronously and never after the evaluation
/// that borrowed it returns. Concurrent evaluations sharing a loader rely on
/// the loader's own thread safety.
pub trait DocumentLoader {
    /// Fetch and parse the document at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be retrieved or parsed.
    fn load_document(&self, url: &str) -> anyhow::Result<Value>;
}

/// What to do when a context document fails to load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContextErrorPolicy {
    /// Log the failure and reject every candidate of the affected
    /// descriptor. This reproduces the historical behavior of the matcher.
    #[default]
    RejectAll,

    /// Fail the whole evaluation with [`Error::ContextLoad`].
    Abort,
}

/// Keep the candidates whose expanded types satisfy the descriptor's schema
/// entries: at least one entry matched, and every `required` entry matched.
pub(crate) fn filter_schema(
    schemas: &[SchemaEntry],
    candidates: Vec<Candidate>,
    loader: &dyn DocumentLoader,
    policy: ContextErrorPolicy,
) -> Result<Vec<Candidate>, Error> {
    let mut contexts: HashMap<String, Map<String, Value>> = HashMap::new();
    let mut result = Vec::new();

    for candidate in candidates {
        let mut satisfied: HashSet<String> = HashSet::new();

        for context_url in candidate.vc.context_urls() {
            let url = context_url.split('#').next().unwrap_or(context_url);

            if !contexts.contains_key(url) {
                match load_context(url, loader) {
                    Ok(terms) => {
                        contexts.insert(url.to_string(), terms);
                    }
                    Err(reason) => {
                        return match policy {
                            ContextErrorPolicy::RejectAll => {
                                error!(context = url, %reason, "failed to load context");
                                Ok(Vec::new())
                            }
                            ContextErrorPolicy::Abort => {
                                Err(Error::ContextLoad { url: url.to_string(), reason })
                            }
                        };
                    }
                }
            }
            let Some(terms) = contexts.get(url) else {
                continue;
            };

            for type_ in candidate.vc.types() {
                for id in type_ids(terms, type_) {
                    satisfied.insert(id);
                }
            }
        }

        let mut applicable = false;
        for schema in schemas {
            if satisfied.contains(&schema.uri) {
                applicable = true;
            } else if schema.required {
                applicable = false;
                break;
            }
        }

        if applicable {
            result.push(candidate);
        }
    }

    Ok(result)
}

fn load_context(url: &str, loader: &dyn DocumentLoader) -> anyhow::Result<Map<String, Value>> {
    let document = loader.load_document(url)?;

    let Some(document) = document.as_object() else {
        return Err(anyhow!("expected the context document to be a JSON object"));
    };
    let Some(context) = document.get("@context") else {
        return Err(anyhow!("@context field not found in context {url}"));
    };

    Ok(term_definitions(context))
}

// Merge term definitions out of an object or an array of objects. Remote
// string references inside the array are not chased.
fn term_definitions(context: &Value) -> Map<String, Value> {
    let mut terms = Map::new();

    match context {
        Value::Object(map) => terms.extend(map.clone()),
        Value::Array(entries) => {
            for entry in entries {
                if let Value::Object(map) = entry {
                    terms.extend(map.clone());
                }
            }
        }
        _ => {}
    }

    terms
}

// Resolve a credential type against the term definitions: the term's `@id`,
// plus its compact-IRI expansion through a one-level nested `@context`.
fn type_ids(terms: &Map<String, Value>, type_: &str) -> Vec<String> {
    let mut out = Vec::new();

    match terms.get(type_) {
        Some(Value::String(id)) => out.push(id.clone()),
        Some(Value::Object(definition)) => {
            let Some(id) = definition.get("@id").and_then(Value::as_str) else {
                return out;
            };
            out.push(id.to_string());

            if let Some(Value::Object(nested)) = definition.get("@context") {
                let mut scoped = terms.clone();
                scoped.extend(nested.clone());

                if let Some(iri) = expand_iri(&scoped, id) {
                    if !out.contains(&iri) {
                        out.push(iri);
                    }
                }
            }
        }
        _ => {}
    }

    out
}

// Expand a compact IRI (`prefix:suffix`) through known prefix definitions.
fn expand_iri(terms: &Map<String, Value>, id: &str) -> Option<String> {
    let (prefix, suffix) = id.split_once(':')?;
    if suffix.starts_with("//") {
        // already absolute
        return Some(id.to_string());
    }

    let base = match terms.get(prefix)? {
        Value::String(base) => base.clone(),
        Value::Object(definition) => definition.get("@id").and_then(Value::as_str)?.to_string(),
        _ => return None,
    };

    Some(format!("{base}{suffix}"))
}
