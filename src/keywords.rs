// Keyword input handling — normalization, deduplication, and file parsing.
//
// Every keyword is reduced to a canonical lowercase form before anything else
// touches it. Two raw strings that normalize to the same text are the same
// keyword for the rest of the run; their metadata is merged.

use serde::{Deserialize, Serialize};

/// A candidate keyword plus whatever metadata the data source supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Keyword {
    /// Normalized keyword text (unique within a run)
    pub text: String,
    /// Monthly search volume, if known
    pub volume: Option<u64>,
    /// Cost per click, if known
    pub cpc: Option<f64>,
    /// Competition index from 0.0 to 1.0, if known
    pub competition: Option<f64>,
    /// Where the keyword came from (seed list, file, provider name)
    pub source: Option<String>,
}

impl Keyword {
    /// Build a keyword from raw text with no metadata.
    pub fn new(text: &str) -> Self {
        Self {
            text: normalize_keyword(text),
            ..Default::default()
        }
    }

    pub fn with_volume(mut self, volume: u64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }
}

/// Metric used to rank keywords inside a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankMetric {
    Volume,
    Cpc,
    Competition,
    Interest,
}

impl RankMetric {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "volume" => Some(RankMetric::Volume),
            "cpc" => Some(RankMetric::Cpc),
            "competition" => Some(RankMetric::Competition),
            "interest" => Some(RankMetric::Interest),
            _ => None,
        }
    }
}

/// Canonicalize a keyword: lowercase, drop URLs and punctuation, collapse
/// whitespace. Keeps `-`, `'`, `.`, `+` and `#` inside tokens so terms like
/// "node.js", "c++" and "e-commerce" survive.
pub fn normalize_keyword(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let mut tokens: Vec<String> = Vec::new();

    for chunk in lower.split_whitespace() {
        if chunk.starts_with("http://") || chunk.starts_with("https://") || chunk.starts_with("www.")
        {
            continue;
        }

        let cleaned: String = chunk
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '-' | '\'' | '.' | '+' | '#') {
                    c
                } else {
                    ' '
                }
            })
            .collect();

        for piece in cleaned.split_whitespace() {
            // Edge punctuation carries no meaning ("shoes." / "-sale")
            let trimmed = piece.trim_matches(|c: char| matches!(c, '-' | '\'' | '.'));
            if !trimmed.is_empty() {
                tokens.push(trimmed.to_string());
            }
        }
    }

    tokens.join(" ")
}

/// Merge duplicate keywords (after normalization), preserving first-seen order.
///
/// Metadata is merged by taking the maximum of each numeric field and the first
/// source seen. Keywords that normalize to an empty string are dropped.
pub fn dedup_keywords(keywords: Vec<Keyword>) -> Vec<Keyword> {
    let mut merged: Vec<Keyword> = Vec::with_capacity(keywords.len());
    let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for mut kw in keywords {
        kw.text = normalize_keyword(&kw.text);
        if kw.text.is_empty() {
            continue;
        }

        match index.get(&kw.text) {
            Some(&pos) => {
                let existing = &mut merged[pos];
                existing.volume = max_opt(existing.volume, kw.volume);
                existing.cpc = max_opt_f64(existing.cpc, kw.cpc);
                existing.competition = max_opt_f64(existing.competition, kw.competition);
                if existing.source.is_none() {
                    existing.source = kw.source;
                }
            }
            None => {
                index.insert(kw.text.clone(), merged.len());
                merged.push(kw);
            }
        }
    }

    merged
}

/// Parse one line of a keyword file: `keyword[,volume[,cpc[,competition]]]`.
///
/// Blank lines and `#` comments yield `None`. Unparseable numeric columns are
/// ignored rather than rejecting the keyword.
pub fn parse_keyword_line(line: &str) -> Option<Keyword> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut cols = line.split(',').map(str::trim);
    let text = normalize_keyword(cols.next()?);
    if text.is_empty() {
        return None;
    }

    let volume = cols.next().and_then(|v| v.parse::<u64>().ok());
    let cpc = cols.next().and_then(|v| v.parse::<f64>().ok()).filter(|v| v.is_finite());
    let competition = cols
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite());

    Some(Keyword {
        text,
        volume,
        cpc,
        competition,
        source: Some("file".to_string()),
    })
}

fn max_opt(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

fn max_opt_f64(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize_keyword("  Buy Running   Shoes! "), "buy running shoes");
        assert_eq!(normalize_keyword("What is SEO?"), "what is seo");
    }

    #[test]
    fn test_normalize_keeps_inner_punctuation() {
        assert_eq!(normalize_keyword("Node.js vs C++"), "node.js vs c++");
        assert_eq!(normalize_keyword("e-commerce platforms."), "e-commerce platforms");
    }

    #[test]
    fn test_normalize_strips_urls() {
        assert_eq!(
            normalize_keyword("recruiting tools https://example.com/page www.foo.com"),
            "recruiting tools"
        );
    }

    #[test]
    fn test_dedup_merges_metadata() {
        let kws = vec![
            Keyword::new("Hiring Software").with_volume(100),
            Keyword::new("hiring software!").with_volume(300).with_source("seed"),
            Keyword::new("ats"),
        ];
        let merged = dedup_keywords(kws);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].text, "hiring software");
        assert_eq!(merged[0].volume, Some(300));
        assert_eq!(merged[0].source.as_deref(), Some("seed"));
        assert_eq!(merged[1].text, "ats");
    }

    #[test]
    fn test_dedup_drops_empty() {
        let kws = vec![Keyword::new("???"), Keyword::new("ok")];
        let merged = dedup_keywords(kws);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_parse_keyword_line() {
        let kw = parse_keyword_line("Recruitment CRM, 500, 1.5, 0.5").unwrap();
        assert_eq!(kw.text, "recruitment crm");
        assert_eq!(kw.volume, Some(500));
        assert_eq!(kw.cpc, Some(1.5));
        assert_eq!(kw.competition, Some(0.5));

        let bare = parse_keyword_line("hiring process").unwrap();
        assert_eq!(bare.volume, None);

        assert!(parse_keyword_line("# comment").is_none());
        assert!(parse_keyword_line("   ").is_none());
    }

    #[test]
    fn test_parse_ignores_bad_numbers() {
        let kw = parse_keyword_line("ats software, lots, x").unwrap();
        assert_eq!(kw.text, "ats software");
        assert_eq!(kw.volume, None);
        assert_eq!(kw.cpc, None);
    }

    #[test]
    fn test_rank_metric_parse() {
        assert_eq!(RankMetric::parse("Volume"), Some(RankMetric::Volume));
        assert_eq!(RankMetric::parse("interest"), Some(RankMetric::Interest));
        assert_eq!(RankMetric::parse("ctr"), None);
    }
}
