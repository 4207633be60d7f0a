use std::collections::HashMap;

use crate::config::ExtractionConfig;
use crate::extractor::{DomainStats, LanguageStats, TextRecord};
use crate::pipeline::GroupReducer;
use crate::pipeline::codec;
use crate::pipeline::fingerprint::FingerprintSet;

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    count: u64,
    length: u64,
}

/// Accumulates the statistics of one domain group.
#[derive(Debug)]
pub struct DomainStatsBuilder {
    domain: String,
    seen_uris: FingerprintSet,
    seen_texts: FingerprintSet,
    unique_uri_count: u64,
    totals: HashMap<String, Totals>,
}

impl DomainStatsBuilder {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            seen_uris: FingerprintSet::new(),
            seen_texts: FingerprintSet::new(),
            unique_uri_count: 0,
            totals: HashMap::new(),
        }
    }

    pub fn add(&mut self, record: &TextRecord) {
        if self.seen_uris.insert(&record.uri) {
            self.unique_uri_count += 1;
        }
        if self.seen_texts.insert(&record.text) {
            let language = record.language().unwrap_or_default().to_string();
            let totals = self.totals.entry(language).or_default();
            totals.count += 1;
            totals.length += record.text_length();
        }
    }

    /// Freezes the group, reporting the configured languages in order.
    pub fn finish(self, languages: &[String]) -> DomainStats {
        DomainStats {
            domain: self.domain,
            unique_uri_count: self.unique_uri_count,
            languages: languages
                .iter()
                .map(|language| {
                    let totals = self.totals.get(language).copied().unwrap_or_default();
                    LanguageStats {
                        language: language.clone(),
                        unique_text_count: totals.count,
                        total_text_length: totals.length,
                    }
                })
                .collect(),
        }
    }
}

/// Phase-1 reducer: per-domain statistics with the acceptance rule.
#[derive(Debug, Clone)]
pub struct DomainAggregator {
    languages: Vec<String>,
    min_text_count: u64,
}

impl DomainAggregator {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            languages: config.languages.clone(),
            min_text_count: config.min_text_count,
        }
    }

    /// Statistics of `domain`, or `None` when it misses the text count of
    /// any configured language.
    pub fn aggregate<'a>(
        &self,
        domain: &str,
        records: impl IntoIterator<Item = &'a TextRecord>,
    ) -> Option<DomainStats> {
        let mut builder = DomainStatsBuilder::new(domain);
        for record in records {
            builder.add(record);
        }
        let stats = builder.finish(&self.languages);
        self.accepts(&stats).then_some(stats)
    }

    pub fn accepts(&self, stats: &DomainStats) -> bool {
        self.languages
            .iter()
            .all(|language| stats.text_count(language) >= self.min_text_count)
    }
}

impl GroupReducer for DomainAggregator {
    fn name(&self) -> &'static str {
        "domains"
    }

    fn reduce(&mut self, domain: &str, records: &[TextRecord]) -> Vec<String> {
        self.aggregate(domain, records)
            .map(|stats| vec![codec::encode_domain_stats(&stats)])
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Classification;

    fn text(uri: &str, language: &str, text: &str) -> TextRecord {
        TextRecord {
            domain: "example.com".to_string(),
            uri: uri.to_string(),
            classification: Some(Classification {
                language: language.to_string(),
                confidence: 0.999,
            }),
            text: text.to_string(),
        }
    }

    fn aggregator(languages: &[&str], min_text_count: u64) -> DomainAggregator {
        DomainAggregator::new(&ExtractionConfig {
            languages: languages.iter().map(|l| l.to_string()).collect(),
            min_text_count,
            ..ExtractionConfig::default()
        })
    }

    #[test]
    fn duplicate_text_counts_once_but_uris_count_independently() {
        let records = vec![
            text("https://example.com/1", "en", "same passage"),
            text("https://example.com/2", "en", "same passage"),
        ];

        let stats = aggregator(&["en"], 1).aggregate("example.com", &records).unwrap();
        assert_eq!(stats.unique_uri_count, 2);
        assert_eq!(stats.text_count("en"), 1);
        assert_eq!(stats.language("en").unwrap().total_text_length, 12);

        assert!(aggregator(&["en"], 2).aggregate("example.com", &records).is_none());
    }

    #[test]
    fn every_configured_language_must_reach_the_threshold() {
        let records = vec![
            text("https://example.com/1", "en", "english one"),
            text("https://example.com/1", "cs", "česky jedna"),
            text("https://example.com/2", "en", "english two"),
        ];

        let stats = aggregator(&["en", "cs"], 1).aggregate("example.com", &records).unwrap();
        assert_eq!(stats.unique_uri_count, 2);
        assert_eq!(stats.text_count("en"), 2);
        assert_eq!(stats.text_count("cs"), 1);
        // Lengths are in characters, not bytes
        assert_eq!(stats.language("cs").unwrap().total_text_length, 11);

        assert!(aggregator(&["en", "cs"], 2).aggregate("example.com", &records).is_none());
        assert!(aggregator(&["en", "de"], 1).aggregate("example.com", &records).is_none());
    }

    #[test]
    fn zero_threshold_accepts_everything() {
        let stats = aggregator(&["en", "cs"], 0).aggregate("example.com", std::iter::empty()).unwrap();
        assert_eq!(stats.unique_uri_count, 0);
        assert_eq!(stats.languages.len(), 2);
    }

    #[test]
    fn result_is_order_independent() {
        let mut records = vec![
            text("https://example.com/1", "en", "alpha"),
            text("https://example.com/2", "en", "beta"),
            text("https://example.com/2", "cs", "gama"),
            text("https://example.com/3", "en", "alpha"),
        ];
        let aggregator = aggregator(&["en", "cs"], 1);
        let forward = aggregator.aggregate("example.com", &records);
        records.reverse();
        assert_eq!(aggregator.aggregate("example.com", &records), forward);
    }

    #[test]
    fn reducer_emits_encoded_rows() {
        let records = vec![text("https://example.com/1", "en", "alpha")];
        let mut aggregator = aggregator(&["en"], 1);
        assert_eq!(
            aggregator.reduce("example.com", &records),
            vec!["example.com\t1\t1\t5".to_string()]
        );
        assert!(aggregator.reduce("example.com", &[]).is_empty());
    }
}
