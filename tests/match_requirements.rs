//! Introspection: reporting which credentials satisfy which requirement
//! without committing to a presentation, and its consistency with
//! presentation creation.

use anyhow::anyhow;
use serde_json::{json, Value};

use presexch::{
    Credential, CredentialSubject, DocumentLoader, Kind, Matcher, PresentationDefinition, Rule,
};

struct NoopLoader;

impl DocumentLoader for NoopLoader {
    fn load_document(&self, url: &str) -> anyhow::Result<Value> {
        Err(anyhow!("unexpected context load: {url}"))
    }
}

fn definition(value: Value) -> PresentationDefinition {
    serde_json::from_value(value).expect("should deserialize")
}

fn degree_credential() -> Credential {
    let mut subject = CredentialSubject {
        id: Some("did:example:holder".into()),
        ..CredentialSubject::default()
    };
    subject.claims = json!({
        "degree": {"type": "BachelorDegree", "name": "Bachelor of Science and Arts"}
    })
    .as_object()
    .expect("should be object")
    .clone();

    Credential::builder()
        .add_context(Kind::String("https://www.w3.org/2018/credentials/examples/v1".into()))
        .id("http://example.edu/credentials/1872")
        .add_type("UniversityDegreeCredential")
        .issuer("did:example:issuer")
        .add_subject(subject)
        .build()
        .expect("should build")
}

#[test]
fn no_requirements_match_as_one_all_group() {
    let pd = definition(json!({
        "id": "d",
        "input_descriptors": [
            {
                "id": "degree",
                "name": "Degree",
                "purpose": "We need your degree",
                "constraints": {"fields": [{
                    "path": ["$.credentialSubject.degree.type"],
                    "filter": {"type": "string", "const": "BachelorDegree"}
                }]}
            },
            {
                "id": "salary",
                "constraints": {"fields": [{"path": ["$.credentialSubject.salary"]}]}
            }
        ]
    }));

    let matched = Matcher::new(&NoopLoader)
        .match_requirements(&pd, &[degree_credential()])
        .expect("should match");

    assert_eq!(matched.len(), 1);
    let requirement = &matched[0];
    assert_eq!(requirement.rule, Rule::All);
    assert_eq!(requirement.count, Some(2));
    assert!(requirement.nested.is_empty());

    // every descriptor reports, matched or not
    assert_eq!(requirement.descriptors.len(), 2);
    assert_eq!(requirement.descriptors[0].id, "degree");
    assert_eq!(requirement.descriptors[0].name.as_deref(), Some("Degree"));
    assert_eq!(requirement.descriptors[0].matched.len(), 1);
    assert_eq!(requirement.descriptors[1].id, "salary");
    assert!(requirement.descriptors[1].matched.is_empty());
}

#[test]
fn nested_requirements_report_per_group() {
    let pd = definition(json!({
        "id": "d",
        "submission_requirements": [{
            "name": "Citizenship",
            "rule": "pick",
            "count": 1,
            "from_nested": [
                {"rule": "all", "from": "A"},
                {"rule": "all", "from": "B"}
            ]
        }],
        "input_descriptors": [
            {
                "id": "degree",
                "group": ["A"],
                "constraints": {"fields": [{"path": ["$.credentialSubject.degree.type"]}]}
            },
            {
                "id": "salary",
                "group": ["B"],
                "constraints": {"fields": [{"path": ["$.credentialSubject.salary"]}]}
            }
        ]
    }));

    let matched = Matcher::new(&NoopLoader)
        .match_requirements(&pd, &[degree_credential()])
        .expect("should match");

    assert_eq!(matched.len(), 1);
    let requirement = &matched[0];
    assert_eq!(requirement.name.as_deref(), Some("Citizenship"));
    assert_eq!(requirement.rule, Rule::Pick);
    assert_eq!(requirement.count, Some(1));
    assert!(requirement.descriptors.is_empty());

    assert_eq!(requirement.nested.len(), 2);
    assert_eq!(requirement.nested[0].descriptors[0].id, "degree");
    assert_eq!(requirement.nested[0].descriptors[0].matched.len(), 1);
    assert_eq!(requirement.nested[1].descriptors[0].id, "salary");
    assert!(requirement.nested[1].descriptors[0].matched.is_empty());
}

#[test]
fn reshaped_matches_keep_their_original_id() {
    let pd = definition(json!({
        "id": "d",
        "input_descriptors": [{
            "id": "degree",
            "constraints": {
                "limit_disclosure": "required",
                "fields": [{"path": ["$.credentialSubject.degree.type"]}]
            }
        }]
    }));

    let matched = Matcher::new(&NoopLoader)
        .match_requirements(&pd, &[degree_credential()])
        .expect("should match");

    let vc = &matched[0].descriptors[0].matched[0];
    assert_eq!(vc.id, "http://example.edu/credentials/1872");
    // reshaped to the demanded fields
    let body = serde_json::to_value(vc).expect("should serialize");
    assert_eq!(
        body["credentialSubject"],
        json!({"id": "did:example:holder", "degree": {"type": "BachelorDegree"}})
    );
}

#[test]
fn match_then_create_are_consistent() {
    let pd = definition(json!({
        "id": "d",
        "input_descriptors": [{
            "id": "degree",
            "constraints": {"fields": [{
                "path": ["$.credentialSubject.degree.type"],
                "filter": {"type": "string", "const": "BachelorDegree"}
            }]}
        }]
    }));

    let matcher = Matcher::new(&NoopLoader);
    let held = [degree_credential()];

    let matched = matcher.match_requirements(&pd, &held).expect("should match");
    let matched_ids: Vec<&str> = matched[0].descriptors[0]
        .matched
        .iter()
        .map(|vc| vc.id.as_str())
        .collect();

    let vp = matcher.create_vp(&pd, &held).expect("should create vp");
    let presented_ids: Vec<String> = vp
        .verifiable_credential
        .expect("credentials should be set")
        .iter()
        .map(|vc| vc["id"].as_str().unwrap_or_default().to_string())
        .collect();

    assert_eq!(matched_ids, presented_ids);
}
