// Unit tests for intent and audience-profile labeling.
//
// Covers the cue taxonomy on realistic recruiting keywords, configured
// profile lists, and the central-keyword vote over a real similarity index.

use keyplot::db::models::Intent;
use keyplot::embeddings::local::LocalFallbackProvider;
use keyplot::error::EngineError;
use keyplot::intent::{
    central_members, keyword_intent, AudienceProfile, IntentClassifier, DEFAULT_PROFILE,
};
use keyplot::similarity::{SimilarityConfig, SimilarityIndex};

// ============================================================
// keyword_intent — one keyword, one label
// ============================================================

#[test]
fn recruiting_keywords_get_expected_intents() {
    let cases = [
        ("buy job board credits", Some(Intent::Transactional)),
        ("ats free trial", Some(Intent::Transactional)),
        ("greenhouse vs lever", Some(Intent::Commercial)),
        ("applicant tracking system pricing", Some(Intent::Commercial)),
        ("workday login", Some(Intent::Navigational)),
        ("how to write a job description", Some(Intent::Informational)),
        ("what is talent acquisition", Some(Intent::Informational)),
        ("applicant tracking system", None),
    ];
    for (keyword, expected) in cases {
        assert_eq!(keyword_intent(keyword), expected, "{keyword}");
    }
}

#[test]
fn more_cues_beat_priority() {
    // Two informational cues against one transactional cue
    assert_eq!(
        keyword_intent("how and why to buy"),
        Some(Intent::Informational)
    );
}

// ============================================================
// IntentClassifier — cluster labels
// ============================================================

#[test]
fn classifier_picks_majority_intent_and_profile() {
    let classifier = IntentClassifier::default();
    let label = classifier.classify(&[
        "best recruiting software",
        "recruiting software reviews",
        "recruiter tools",
    ]);
    assert_eq!(label.intent, Intent::Commercial);
    assert_eq!(label.profile, "recruiter");
}

#[test]
fn classifier_defaults_when_nothing_matches() {
    let label = IntentClassifier::default().classify(&["marathon shoes", "trail shoes"]);
    assert_eq!(label.intent, Intent::Informational);
    assert_eq!(label.profile, DEFAULT_PROFILE);
}

#[test]
fn classifier_with_no_profiles_always_says_general() {
    let label = IntentClassifier::new(vec![]).classify(&["recruiter salary"]);
    assert_eq!(label.profile, DEFAULT_PROFILE);
}

#[test]
fn classifier_is_deterministic() {
    let classifier = IntentClassifier::default();
    let keywords = ["hr onboarding checklist", "employee onboarding guide"];
    let first = classifier.classify(&keywords);
    for _ in 0..10 {
        assert_eq!(classifier.classify(&keywords), first);
    }
    assert_eq!(first.profile, "hr_manager");
}

// ============================================================
// AudienceProfile::parse_list — configured personas
// ============================================================

#[test]
fn parse_profile_list() {
    let profiles =
        AudienceProfile::parse_list("founder=startup|seed round, hiring_manager=hiring manager|team")
            .unwrap();
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[0].name, "founder");
    assert_eq!(profiles[0].cues, vec!["startup", "seed round"]);
    assert_eq!(profiles[1].name, "hiring_manager");

    let classifier = IntentClassifier::new(profiles);
    let label = classifier.classify(&["how a hiring manager builds a team"]);
    assert_eq!(label.profile, "hiring_manager");
    assert_eq!(label.intent, Intent::Informational);
}

#[test]
fn parse_profile_list_rejects_malformed_entries() {
    for bad in ["founder", "=startup", "founder=", "founder=|"] {
        assert!(
            matches!(AudienceProfile::parse_list(bad), Err(EngineError::InvalidConfig(_))),
            "{bad}"
        );
    }
    assert!(AudienceProfile::parse_list("  ").unwrap().is_empty());
}

// ============================================================
// central_members — who votes
// ============================================================

#[test]
fn central_members_prefers_keywords_near_the_centroid() {
    let vectors = vec![
        vec![1.0, 0.0, 0.0],
        vec![0.9, 0.1, 0.0],
        vec![0.95, 0.05, 0.0],
        vec![0.0, 0.0, 1.0],
    ];
    let index = SimilarityIndex::build(&vectors, &SimilarityConfig::default()).unwrap();
    let central = central_members(&index, &[0, 1, 2, 3], 2);
    assert_eq!(central.len(), 2);
    assert!(!central.contains(&3), "outlier should not vote: {central:?}");
}

#[test]
fn central_members_with_real_embeddings() {
    let texts = [
        "ats software pricing",
        "ats software",
        "best ats software",
        "how to bake bread",
    ];
    let embedder = LocalFallbackProvider::default();
    let vectors: Vec<Vec<f64>> = texts.iter().map(|t| embedder.vectorize(t)).collect();
    let index = SimilarityIndex::build(&vectors, &SimilarityConfig::default()).unwrap();

    let central = central_members(&index, &[0, 1, 2, 3], 3);
    assert!(!central.contains(&3));

    let voters: Vec<&str> = central.iter().map(|&i| texts[i]).collect();
    let label = IntentClassifier::default().classify(&voters);
    assert_eq!(label.intent, Intent::Commercial);
}
