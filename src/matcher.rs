//! # Requirement Matching
//!
//! Builds the internal requirement tree from a Presentation Definition and
//! evaluates it against held credentials.
//!
//! A definition without `submission_requirements` becomes a single `all`
//! leaf over every input descriptor. Leaves run the per-descriptor filter
//! pipeline (framing, claim format, JSON-LD schema gate, constraints) and
//! check their cardinality against the number of satisfied descriptors.
//! Branches evaluate children, skipping any that found no credentials, and
//! exclude credentials whose satisfied-descriptor count violates the
//! branch's own cardinality.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::anyhow;
use serde_json::{Map, Value};
use tracing::instrument;
use uuid::Uuid;

use crate::constraints::filter_constraints;
use crate::context::{filter_schema, ContextErrorPolicy, DocumentLoader};
use crate::core::Kind;
use crate::definition::{InputDescriptor, PresentationDefinition, Rule, SubmissionRequirement};
use crate::disclosure::BbsDeriver;
use crate::error::Error;
use crate::format::{filter_format, FormatTag};
use crate::model::vc::Credential;
use crate::model::vp::{
    VerifiablePresentation, BASE_CONTEXT, SUBMISSION_CONTEXT_IRI, SUBMISSION_TYPE,
};
use crate::submission::{assemble, PresentationSubmission};

/// A credential moving through the filter pipeline, tracked by a handle
/// rather than by rewriting its id.
///
/// Reshaping produces a fresh handle while `origin_id` keeps naming the
/// input credential, so set arithmetic over nested requirements can both
/// distinguish reshaped copies and deduplicate by origin.
#[derive(Clone, Debug)]
pub(crate) struct Candidate {
    /// The (possibly reshaped) credential.
    pub vc: Credential,
    /// Id of the credential this candidate descends from.
    pub origin_id: String,
    /// Pipeline identity: stable for a given input credential, fresh for
    /// each reshape.
    pub handle: Uuid,
}

impl Candidate {
    pub(crate) fn new(vc: &Credential) -> Self {
        Self { vc: vc.clone(), origin_id: vc.id.clone(), handle: Uuid::new_v4() }
    }

    pub(crate) fn reshaped(self, vc: Credential) -> Self {
        Self { vc, origin_id: self.origin_id, handle: Uuid::new_v4() }
    }
}

/// Internal requirement tree node: either a leaf over input descriptors or
/// a branch over child requirements.
#[derive(Debug)]
struct Requirement<'a> {
    name: Option<String>,
    purpose: Option<String>,
    rule: Rule,
    count: Option<usize>,
    min: Option<usize>,
    max: Option<usize>,
    descriptors: Vec<&'a InputDescriptor>,
    nested: Vec<Requirement<'a>>,
}

impl Requirement<'_> {
    fn len_applicable(&self, n: usize) -> bool {
        if self.count.is_some_and(|count| n != count) {
            return false;
        }
        if self.min.is_some_and(|min| n < min) {
            return false;
        }
        if self.max.is_some_and(|max| n > max) {
            return false;
        }
        true
    }
}

fn to_requirement<'a>(
    sr: &'a SubmissionRequirement, descriptors: &'a [InputDescriptor],
) -> Result<Requirement<'a>, Error> {
    let mut selected = Vec::new();
    let mut nested = Vec::new();
    let total;

    if let Some(from) = &sr.from {
        for descriptor in descriptors {
            if descriptor.group.iter().any(|group| group == from) {
                selected.push(descriptor);
            }
        }
        total = selected.len();
        if total == 0 {
            return Err(Error::NoGroupDescriptors(from.clone()));
        }
    } else {
        for child in sr.from_nested.as_deref().unwrap_or_default() {
            nested.push(to_requirement(child, descriptors)?);
        }
        total = nested.len();
    }

    // `all` behaves as an equality cardinality over the resolved children
    let count = if sr.rule == Rule::All { Some(total) } else { sr.count };

    Ok(Requirement {
        name: sr.name.clone(),
        purpose: sr.purpose.clone(),
        rule: sr.rule,
        count,
        min: sr.min,
        max: sr.max,
        descriptors: selected,
        nested,
    })
}

fn make_requirement<'a>(
    requirements: &'a [SubmissionRequirement], descriptors: &'a [InputDescriptor],
) -> Result<Requirement<'a>, Error> {
    if requirements.is_empty() {
        return Ok(Requirement {
            name: None,
            purpose: None,
            rule: Rule::All,
            count: Some(descriptors.len()),
            min: None,
            max: None,
            descriptors: descriptors.iter().collect(),
            nested: Vec::new(),
        });
    }

    let mut nested = Vec::with_capacity(requirements.len());
    for requirement in requirements {
        nested.push(to_requirement(requirement, descriptors)?);
    }

    Ok(Requirement {
        name: None,
        purpose: None,
        rule: Rule::All,
        count: Some(requirements.len()),
        min: None,
        max: None,
        descriptors: Vec::new(),
        nested,
    })
}

/// How a definition's requirements were satisfied by the held credentials,
/// without committing to a presentation.
#[derive(Clone, Debug)]
pub struct MatchedRequirement {
    /// Requirement name, when the definition carries one.
    pub name: Option<String>,

    /// Requirement purpose, when the definition carries one.
    pub purpose: Option<String>,

    /// The requirement's selection rule.
    pub rule: Rule,

    /// Exact-cardinality demand, with `all` resolved to its child count.
    pub count: Option<usize>,

    /// Minimum-cardinality demand.
    pub min: Option<usize>,

    /// Maximum-cardinality demand.
    pub max: Option<usize>,

    /// Leaf results: one entry per grouped input descriptor.
    pub descriptors: Vec<MatchedDescriptor>,

    /// Branch results: one entry per child requirement.
    pub nested: Vec<MatchedRequirement>,
}

/// Credentials that satisfied one input descriptor.
#[derive(Clone, Debug)]
pub struct MatchedDescriptor {
    /// The input descriptor id.
    pub id: String,

    /// The input descriptor name, when present.
    pub name: Option<String>,

    /// The input descriptor purpose, when present.
    pub purpose: Option<String>,

    /// The credentials that satisfied the descriptor, reshaped where the
    /// descriptor limits disclosure.
    pub matched: Vec<Credential>,
}

/// Evaluates Presentation Definitions against held credentials.
///
/// `Matcher` borrows its collaborators for the duration of the evaluation:
/// a [`DocumentLoader`] for the JSON-LD schema gate and, optionally, a
/// [`BbsDeriver`] for BBS+ selective disclosure and framing. Each
/// evaluation is a pure function of its inputs; no state survives a call.
pub struct Matcher<'a> {
    loader: &'a dyn DocumentLoader,
    deriver: Option<&'a dyn BbsDeriver>,
    context_errors: ContextErrorPolicy,
}

impl<'a> Matcher<'a> {
    /// Returns a new [`Matcher`] using `loader` to resolve JSON-LD contexts.
    #[must_use]
    pub fn new(loader: &'a dyn DocumentLoader) -> Self {
        Self { loader, deriver: None, context_errors: ContextErrorPolicy::default() }
    }

    /// Configures a BBS+ derivation collaborator, enabling reveal-document
    /// derivation and definition-level framing.
    #[must_use]
    pub fn with_deriver(mut self, deriver: &'a dyn BbsDeriver) -> Self {
        self.deriver = Some(deriver);
        self
    }

    /// Configures how context-document load failures are treated.
    #[must_use]
    pub const fn on_context_error(mut self, policy: ContextErrorPolicy) -> Self {
        self.context_errors = policy;
        self
    }

    /// Create a Verifiable Presentation satisfying `definition` from the
    /// held `credentials`, with an embedded Presentation Submission mapping
    /// each satisfied input descriptor to its credential.
    ///
    /// Credentials are reshaped to the demanded fields where a descriptor
    /// requires limited disclosure. A field with `predicate: required`
    /// replaces the disclosed value with `true` and always wins over BBS+
    /// derivation: the reshaped credential falls back to plain projection.
    ///
    /// # Errors
    ///
    /// Fails when the definition is invalid, when a requirement group
    /// matches no descriptor, when a field cannot be evaluated, when proof
    /// derivation fails, or with [`Error::NoCredentials`] when the held
    /// credentials cannot satisfy the requirements.
    #[instrument(skip_all, fields(definition = %definition.id))]
    pub fn create_vp(
        &self, definition: &PresentationDefinition, credentials: &[Credential],
    ) -> Result<VerifiablePresentation, Error> {
        definition.validate()?;

        let requirement = make_requirement(
            definition.submission_requirements.as_deref().unwrap_or_default(),
            &definition.input_descriptors,
        )?;

        let pool: Vec<Candidate> = credentials.iter().map(Candidate::new).collect();
        let (format, result) = self.apply_requirement(definition, &requirement, &pool)?;
        let (applicable, descriptor_map) = assemble(format, result)?;

        Ok(VerifiablePresentation {
            context: vec![
                Kind::String(BASE_CONTEXT.into()),
                Kind::String(SUBMISSION_CONTEXT_IRI.into()),
            ],
            id: Some(format!("urn:uuid:{}", Uuid::new_v4())),
            type_: vec!["VerifiablePresentation".into(), SUBMISSION_TYPE.into()],
            verifiable_credential: Some(applicable),
            holder: None,
            presentation_submission: Some(PresentationSubmission {
                id: Uuid::new_v4().to_string(),
                definition_id: definition.id.clone(),
                descriptor_map,
            }),
            proof: None,
        })
    }

    /// Report which credentials match each requirement of `definition`,
    /// without assembling a presentation.
    ///
    /// # Errors
    ///
    /// Fails when the definition is invalid, when a requirement group
    /// matches no descriptor, or when a field cannot be evaluated.
    #[instrument(skip_all, fields(definition = %definition.id))]
    pub fn match_requirements(
        &self, definition: &PresentationDefinition, credentials: &[Credential],
    ) -> Result<Vec<MatchedRequirement>, Error> {
        definition.validate()?;

        let requirements = definition.submission_requirements.as_deref().unwrap_or_default();
        let pool: Vec<Candidate> = credentials.iter().map(Candidate::new).collect();

        let trees = if requirements.is_empty() {
            vec![make_requirement(&[], &definition.input_descriptors)?]
        } else {
            let mut trees = Vec::with_capacity(requirements.len());
            for requirement in requirements {
                trees.push(to_requirement(requirement, &definition.input_descriptors)?);
            }
            trees
        };

        let mut matched = Vec::with_capacity(trees.len());
        for tree in &trees {
            matched.push(self.match_requirement(definition, tree, &pool)?);
        }

        Ok(matched)
    }

    fn match_requirement(
        &self, definition: &PresentationDefinition, requirement: &Requirement<'_>,
        pool: &[Candidate],
    ) -> Result<MatchedRequirement, Error> {
        let mut descriptors = Vec::with_capacity(requirement.descriptors.len());
        for descriptor in &requirement.descriptors {
            let (_, filtered) = self.filter_descriptor(definition, descriptor, pool)?;
            descriptors.push(MatchedDescriptor {
                id: descriptor.id.clone(),
                name: descriptor.name.clone(),
                purpose: descriptor.purpose.clone(),
                matched: filtered.into_iter().map(|candidate| candidate.vc).collect(),
            });
        }

        let mut nested = Vec::with_capacity(requirement.nested.len());
        for child in &requirement.nested {
            nested.push(self.match_requirement(definition, child, pool)?);
        }

        Ok(MatchedRequirement {
            name: requirement.name.clone(),
            purpose: requirement.purpose.clone(),
            rule: requirement.rule,
            count: requirement.count,
            min: requirement.min,
            max: requirement.max,
            descriptors,
            nested,
        })
    }

    fn apply_requirement(
        &self, definition: &PresentationDefinition, requirement: &Requirement<'_>,
        pool: &[Candidate],
    ) -> Result<(FormatTag, BTreeMap<String, Vec<Candidate>>), Error> {
        // assume ldp_vp unless a descriptor's format filter says otherwise
        let mut vp_format = FormatTag::LdpVp;
        let mut result: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();

        if !requirement.descriptors.is_empty() {
            for descriptor in &requirement.descriptors {
                let (tag, filtered) = self.filter_descriptor(definition, descriptor, pool)?;
                if let Some(tag) = tag {
                    vp_format = tag;
                }
                if !filtered.is_empty() {
                    result.insert(descriptor.id.clone(), filtered);
                }
            }

            if requirement.len_applicable(result.len()) {
                return Ok((vp_format, result));
            }
            return Err(Error::NoCredentials);
        }

        let mut nested_results: Vec<BTreeMap<String, Vec<Candidate>>> = Vec::new();
        let mut any_child_succeeded = false;

        // origin credential -> descriptor -> handles satisfying it
        let mut satisfied: HashMap<String, HashMap<String, Vec<Uuid>>> = HashMap::new();

        for child in &requirement.nested {
            let (child_format, child_result) =
                match self.apply_requirement(definition, child, pool) {
                    Err(Error::NoCredentials) => continue,
                    Err(err) => return Err(err),
                    Ok(evaluated) => evaluated,
                };

            any_child_succeeded = true;

            for (descriptor_id, candidates) in &child_result {
                for candidate in candidates {
                    satisfied
                        .entry(candidate.origin_id.clone())
                        .or_default()
                        .entry(descriptor_id.clone())
                        .or_default()
                        .push(candidate.handle);
                }
            }

            if !child_result.is_empty() {
                nested_results.push(child_result);
                vp_format = child_format;
            }
        }

        if !requirement.nested.is_empty() && !any_child_succeeded {
            return Err(Error::NoCredentials);
        }

        let mut exclude: HashSet<(String, Uuid)> = HashSet::new();
        for by_descriptor in satisfied.values() {
            if !requirement.len_applicable(by_descriptor.len()) {
                for (descriptor_id, handles) in by_descriptor {
                    for handle in handles {
                        exclude.insert((descriptor_id.clone(), *handle));
                    }
                }
            }
        }

        Ok((vp_format, merge_nested(nested_results, &exclude)))
    }

    fn filter_descriptor(
        &self, definition: &PresentationDefinition, descriptor: &InputDescriptor,
        pool: &[Candidate],
    ) -> Result<(Option<FormatTag>, Vec<Candidate>), Error> {
        let format = descriptor
            .format
            .as_ref()
            .filter(|format| !format.is_empty())
            .or(definition.format.as_ref());

        let mut filtered: Vec<Candidate> = pool.to_vec();
        let mut tag = None;

        if let Some(frame) = &definition.frame {
            filtered = self.frame_credentials(frame, filtered)?;
        }

        if let Some(format) = format.filter(|format| !format.is_empty()) {
            (tag, filtered) = filter_format(format, filtered);
        }

        // schema gate applies to v1 definitions only
        if !descriptor.schema.is_empty() {
            filtered =
                filter_schema(&descriptor.schema, filtered, self.loader, self.context_errors)?;
        }

        filtered = filter_constraints(descriptor.constraints.as_ref(), filtered, self.deriver)?;

        Ok((tag, filtered))
    }

    fn frame_credentials(
        &self, frame: &Map<String, Value>, candidates: Vec<Candidate>,
    ) -> Result<Vec<Candidate>, Error> {
        let Some(deriver) = self.deriver else {
            return Err(Error::DeriveProof(anyhow!("no BBS+ deriver configured")));
        };

        let reveal = Value::Object(frame.clone());
        let mut framed = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let vc = deriver.derive(&candidate.vc, &reveal, None).map_err(Error::DeriveProof)?;
            framed.push(Candidate {
                vc,
                origin_id: candidate.origin_id,
                handle: candidate.handle,
            });
        }

        Ok(framed)
    }
}

fn merge_nested(
    nested_results: Vec<BTreeMap<String, Vec<Candidate>>>, exclude: &HashSet<(String, Uuid)>,
) -> BTreeMap<String, Vec<Candidate>> {
    let mut merged: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();

    for result in nested_results {
        for (descriptor_id, candidates) in result {
            let bucket = merged.entry(descriptor_id.clone()).or_default();

            for candidate in candidates {
                if exclude.contains(&(descriptor_id.clone(), candidate.handle)) {
                    continue;
                }
                if bucket.iter().any(|kept| kept.origin_id == candidate.origin_id) {
                    continue;
                }
                bucket.push(candidate);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn descriptors(value: serde_json::Value) -> Vec<InputDescriptor> {
        serde_json::from_value(value).expect("should deserialize")
    }

    fn requirements(value: serde_json::Value) -> Vec<SubmissionRequirement> {
        serde_json::from_value(value).expect("should deserialize")
    }

    #[test]
    fn default_tree_is_a_single_all_leaf() {
        let descriptors = descriptors(json!([{"id": "a"}, {"id": "b"}]));

        let tree = make_requirement(&[], &descriptors).expect("should build");

        assert_eq!(tree.rule, Rule::All);
        assert_eq!(tree.count, Some(2));
        assert_eq!(tree.descriptors.len(), 2);
        assert!(tree.nested.is_empty());
    }

    #[test]
    fn from_resolves_groups() {
        let descriptors = descriptors(json!([
            {"id": "a", "group": ["A"]},
            {"id": "b", "group": ["A", "B"]},
            {"id": "c", "group": ["B"]}
        ]));
        let requirements = requirements(json!([{"rule": "all", "from": "A"}]));

        let tree = make_requirement(&requirements, &descriptors).expect("should build");

        assert_eq!(tree.nested.len(), 1);
        let child = &tree.nested[0];
        assert_eq!(child.descriptors.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), ["a", "b"]);
        // rule `all` overwrites count with the resolved child count
        assert_eq!(child.count, Some(2));
    }

    #[test]
    fn unknown_group_fails() {
        let descriptors = descriptors(json!([{"id": "a", "group": ["A"]}]));
        let requirements = requirements(json!([{"rule": "all", "from": "Z"}]));

        let err = make_requirement(&requirements, &descriptors).expect_err("should fail");
        assert!(matches!(err, Error::NoGroupDescriptors(group) if group == "Z"));
    }

    #[test]
    fn pick_keeps_explicit_cardinalities() {
        let descriptors = descriptors(json!([
            {"id": "a", "group": ["A"]},
            {"id": "b", "group": ["A"]}
        ]));
        let requirements = requirements(json!([
            {"rule": "pick", "min": 1, "max": 2, "from": "A"}
        ]));

        let tree = make_requirement(&requirements, &descriptors).expect("should build");
        let child = &tree.nested[0];

        assert_eq!(child.count, None);
        assert_eq!(child.min, Some(1));
        assert_eq!(child.max, Some(2));
        assert!(child.len_applicable(1));
        assert!(child.len_applicable(2));
        assert!(!child.len_applicable(0));
    }

    #[test]
    fn cardinality_bounds() {
        let exact = Requirement {
            name: None,
            purpose: None,
            rule: Rule::Pick,
            count: Some(2),
            min: None,
            max: None,
            descriptors: Vec::new(),
            nested: Vec::new(),
        };

        assert!(exact.len_applicable(2));
        assert!(!exact.len_applicable(1));
        assert!(!exact.len_applicable(3));
    }
}
