// Interest from a fixed table: an exported keyword,value file or the volume
// metadata attached to the input keywords.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use super::traits::InterestProvider;
use crate::keywords::Keyword;

/// In-memory interest lookup keyed by normalized keyword text.
///
/// Backs `--interest-file` tables. It never fails, so runs using it are
/// never degraded.
#[derive(Debug, Clone, Default)]
pub struct VolumeInterest {
    values: HashMap<String, f64>,
}

impl VolumeInterest {
    /// Build from explicit keyword → value pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (crate::keywords::normalize_keyword(k.as_ref()), v))
            .collect();
        Self { values }
    }

    /// Build from the volume metadata of a keyword list. Keywords without a
    /// volume are left out (and therefore read as zero).
    pub fn from_keywords(keywords: &[Keyword]) -> Self {
        let values = keywords
            .iter()
            .filter_map(|k| k.volume.map(|v| (k.text.clone(), v as f64)))
            .collect();
        Self { values }
    }

    /// Parse a `keyword,value` table. Blank lines, `#` comments and rows
    /// whose value isn't a number are skipped.
    pub fn from_table(contents: &str) -> Self {
        Self::from_pairs(contents.lines().filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (keyword, value) = line.rsplit_once(',')?;
            let value = value.trim().parse::<f64>().ok()?;
            Some((keyword.trim().to_string(), value))
        }))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl InterestProvider for VolumeInterest {
    fn provider_id(&self) -> &str {
        "volume"
    }

    async fn interest(&self, keyword: &str) -> Result<Option<f64>> {
        Ok(self.values.get(keyword).copied())
    }
}
