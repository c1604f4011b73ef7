// Intent classifier — lexical cue matching over a cluster's central keywords.
//
// Each cluster gets one intent from the fixed taxonomy and one audience
// profile from a configurable list. Only the keywords nearest the centroid
// vote, so a stray member at the edge of a cluster can't flip its label.
// Pure and deterministic: the same keywords always yield the same label.

use serde::{Deserialize, Serialize};

use crate::db::models::Intent;
use crate::error::{EngineError, EngineResult};
use crate::keywords::normalize_keyword;
use crate::similarity::{cosine_similarity, mean_vector, SimilarityIndex};

/// Profile assigned when no profile cue matches.
pub const DEFAULT_PROFILE: &str = "general";

/// How many central keywords vote on a cluster's label.
pub const DEFAULT_CENTRAL_KEYWORDS: usize = 3;

const TRANSACTIONAL_CUES: &[&str] = &[
    "buy", "purchase", "order", "coupon", "discount", "deal", "deals", "cheap", "download",
    "subscribe", "sign up", "free trial", "hire", "book", "for sale",
];

const COMMERCIAL_CUES: &[&str] = &[
    "best", "top", "vs", "versus", "review", "reviews", "compare", "comparison", "pricing",
    "price", "alternative", "alternatives",
];

const NAVIGATIONAL_CUES: &[&str] = &[
    "login", "log in", "sign in", "website", "official", "app", "dashboard", "account", ".com",
];

const INFORMATIONAL_CUES: &[&str] = &[
    "how", "what", "why", "when", "where", "who", "guide", "tutorial", "tips", "examples",
    "definition", "meaning", "learn", "ideas", "is", "does", "can",
];

fn cues_for(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::Transactional => TRANSACTIONAL_CUES,
        Intent::Commercial => COMMERCIAL_CUES,
        Intent::Navigational => NAVIGATIONAL_CUES,
        Intent::Informational => INFORMATIONAL_CUES,
    }
}

/// A target persona and the phrases that signal it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudienceProfile {
    pub name: String,
    pub cues: Vec<String>,
}

impl AudienceProfile {
    pub fn new(name: &str, cues: &[&str]) -> Self {
        Self {
            name: name.trim().to_string(),
            cues: cues
                .iter()
                .map(|c| normalize_keyword(c))
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    /// The recruiting-focused personas the tool ships with.
    pub fn defaults() -> Vec<AudienceProfile> {
        vec![
            AudienceProfile::new(
                "recruiter",
                &["recruiter", "recruiters", "recruiting", "recruitment", "sourcing", "headhunter", "staffing"],
            ),
            AudienceProfile::new(
                "talent_acquisition",
                &["talent acquisition", "talent", "employer brand", "employer branding", "hiring strategy", "workforce planning"],
            ),
            AudienceProfile::new(
                "hr_manager",
                &["hr", "human resources", "onboarding", "payroll", "employee", "employees", "hris", "performance review"],
            ),
            AudienceProfile::new(
                "candidate",
                &["job", "jobs", "resume", "cv", "interview", "career", "salary", "cover letter", "job search"],
            ),
        ]
    }

    /// Parse `name=cue|cue,name=cue`. Empty input yields an empty list.
    pub fn parse_list(raw: &str) -> EngineResult<Vec<AudienceProfile>> {
        let mut profiles = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, cues) = entry.split_once('=').ok_or_else(|| {
                EngineError::invalid_config(format!(
                    "profile entry '{entry}' must look like name=cue|cue"
                ))
            })?;
            let cues: Vec<&str> = cues.split('|').collect();
            let profile = AudienceProfile::new(name, &cues);
            if profile.name.is_empty() || profile.cues.is_empty() {
                return Err(EngineError::invalid_config(format!(
                    "profile entry '{entry}' needs a name and at least one cue"
                )));
            }
            profiles.push(profile);
        }
        Ok(profiles)
    }
}

/// The (intent, profile) pair assigned to a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentLabel {
    pub intent: Intent,
    pub profile: String,
}

/// Assigns intent and audience-profile labels.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    profiles: Vec<AudienceProfile>,
    central_keywords: usize,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(AudienceProfile::defaults())
    }
}

impl IntentClassifier {
    pub fn new(profiles: Vec<AudienceProfile>) -> Self {
        Self {
            profiles,
            central_keywords: DEFAULT_CENTRAL_KEYWORDS,
        }
    }

    pub fn with_central_keywords(mut self, n: usize) -> Self {
        self.central_keywords = n.max(1);
        self
    }

    pub fn central_keywords(&self) -> usize {
        self.central_keywords
    }

    pub fn profiles(&self) -> &[AudienceProfile] {
        &self.profiles
    }

    /// Label a cluster from its central keywords (most central first).
    /// Falls back to `informational` / `general` when nothing matches.
    pub fn classify<S: AsRef<str>>(&self, central: &[S]) -> IntentLabel {
        let voters: Vec<&str> = central
            .iter()
            .take(self.central_keywords)
            .map(|k| k.as_ref())
            .collect();

        let intent = best_intent(|intent| {
            voters
                .iter()
                .map(|kw| count_hits(kw, cues_for(intent).iter().copied()))
                .sum()
        })
        .unwrap_or_default();

        let mut profile: Option<(&str, usize)> = None;
        for p in &self.profiles {
            let hits: usize = voters
                .iter()
                .map(|kw| count_hits(kw, p.cues.iter().map(String::as_str)))
                .sum();
            if hits > 0 && profile.map_or(true, |(_, best)| hits > best) {
                profile = Some((&p.name, hits));
            }
        }

        IntentLabel {
            intent,
            profile: profile
                .map(|(name, _)| name.to_string())
                .unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
        }
    }
}

/// Intent of a single keyword, or `None` when no cue matches.
pub fn keyword_intent(keyword: &str) -> Option<Intent> {
    best_intent(|intent| count_hits(keyword, cues_for(intent).iter().copied()))
}

/// Highest-scoring intent; ties go to the earlier entry in
/// `Intent::PRIORITY`. `None` when every score is zero.
fn best_intent(score: impl Fn(Intent) -> usize) -> Option<Intent> {
    let mut best: Option<(Intent, usize)> = None;
    for intent in Intent::PRIORITY {
        let hits = score(intent);
        if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
            best = Some((intent, hits));
        }
    }
    best.map(|(intent, _)| intent)
}

/// Number of distinct cues present in a keyword. Single-word cues match
/// whole tokens, multi-word cues match a token sequence, and cues starting
/// with `.` match a token suffix (".com").
fn count_hits<'a>(keyword: &str, cues: impl Iterator<Item = &'a str>) -> usize {
    let tokens: Vec<&str> = keyword.split_whitespace().collect();
    cues.filter(|cue| cue_matches(&tokens, cue)).count()
}

fn cue_matches(tokens: &[&str], cue: &str) -> bool {
    if cue.starts_with('.') {
        return tokens.iter().any(|t| t.len() > cue.len() && t.ends_with(cue));
    }
    let parts: Vec<&str> = cue.split_whitespace().collect();
    match parts.len() {
        0 => false,
        1 => tokens.contains(&parts[0]),
        n => tokens.windows(n).any(|w| w == parts.as_slice()),
    }
}

/// Members of a group ordered by closeness to the group centroid (ties by
/// index), truncated to `n`. `members` index into `index`.
pub fn central_members(index: &SimilarityIndex, members: &[usize], n: usize) -> Vec<usize> {
    let vectors = index.vectors();
    let refs: Vec<&[f64]> = members.iter().map(|&m| vectors[m].as_slice()).collect();
    let centroid = mean_vector(&refs);

    let mut scored: Vec<(usize, f64)> = members
        .iter()
        .map(|&m| (m, cosine_similarity(&vectors[m], &centroid)))
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.into_iter().take(n).map(|(m, _)| m).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_intent_cues() {
        assert_eq!(keyword_intent("buy running shoes"), Some(Intent::Transactional));
        assert_eq!(keyword_intent("best running shoes 2024"), Some(Intent::Commercial));
        assert_eq!(keyword_intent("how to train for a marathon"), Some(Intent::Informational));
        assert_eq!(keyword_intent("linkedin login"), Some(Intent::Navigational));
        assert_eq!(keyword_intent("running shoes"), None);
    }

    #[test]
    fn test_cues_match_whole_tokens_only() {
        // "shower" contains "how" but is not an informational cue
        assert_eq!(keyword_intent("shower heads"), None);
        assert_eq!(keyword_intent("indeed.com jobs"), Some(Intent::Navigational));
        assert_eq!(keyword_intent("free trial ats"), Some(Intent::Transactional));
    }

    #[test]
    fn test_ties_follow_priority() {
        // One transactional and one informational hit: transactional wins
        assert_eq!(keyword_intent("how to buy"), Some(Intent::Transactional));
        // One commercial and one informational hit: commercial wins
        assert_eq!(keyword_intent("best guide"), Some(Intent::Commercial));
        assert_eq!(keyword_intent("ats pricing tips"), Some(Intent::Commercial));
        // One navigational and one informational hit: navigational wins
        assert_eq!(keyword_intent("how login works"), Some(Intent::Navigational));
    }

    #[test]
    fn test_more_hits_beat_priority() {
        // "what" and "is" outscore the single commercial "best"
        assert_eq!(keyword_intent("what is the best ats"), Some(Intent::Informational));
    }

    #[test]
    fn test_classify_falls_back_to_defaults() {
        let classifier = IntentClassifier::default();
        let label = classifier.classify(&["marathon shoes"]);
        assert_eq!(label.intent, Intent::Informational);
        assert_eq!(label.profile, DEFAULT_PROFILE);
    }

    #[test]
    fn test_classify_uses_only_central_keywords() {
        let classifier = IntentClassifier::default().with_central_keywords(2);
        let label = classifier.classify(&[
            "recruiting software pricing",
            "recruiter software reviews",
            "how recruiting software works",
        ]);
        assert_eq!(label.intent, Intent::Commercial);
        assert_eq!(label.profile, "recruiter");
    }

    #[test]
    fn test_profile_ties_keep_configured_order() {
        let profiles = vec![
            AudienceProfile::new("first", &["ats"]),
            AudienceProfile::new("second", &["software"]),
        ];
        let label = IntentClassifier::new(profiles).classify(&["ats software"]);
        assert_eq!(label.profile, "first");
    }

    #[test]
    fn test_parse_profile_list() {
        let profiles =
            AudienceProfile::parse_list("founder=startup|seed round, sales = crm|Pipeline").unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].name, "founder");
        assert_eq!(profiles[0].cues, vec!["startup", "seed round"]);
        assert_eq!(profiles[1].name, "sales");
        assert_eq!(profiles[1].cues, vec!["crm", "pipeline"]);

        assert!(AudienceProfile::parse_list("").unwrap().is_empty());
        assert!(AudienceProfile::parse_list("nocues").is_err());
        assert!(AudienceProfile::parse_list("empty=").is_err());
    }

    #[test]
    fn test_central_members_orders_by_centroid_distance() {
        use crate::similarity::SimilarityConfig;
        let index = SimilarityIndex::build(
            &[vec![1.0, 0.0], vec![0.8, 0.6], vec![0.6, 0.8]],
            &SimilarityConfig::default(),
        )
        .unwrap();
        let central = central_members(&index, &[0, 1, 2], 2);
        assert_eq!(central[0], 1);
        assert_eq!(central.len(), 2);
    }
}
