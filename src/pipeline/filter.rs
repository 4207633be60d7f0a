use std::sync::Arc;

use tracing::trace;

use crate::extractor::TextRecord;
use crate::pipeline::GroupReducer;
use crate::pipeline::allow_set::DomainGate;
use crate::pipeline::codec;
use crate::pipeline::fingerprint::FingerprintSet;

/// Phase-2 reducer: drops domains outside the gate and duplicate passages.
#[derive(Debug, Clone)]
pub struct TextFilter {
    gate: Arc<DomainGate>,
    emitted: u64,
}

impl TextFilter {
    pub fn new(gate: Arc<DomainGate>) -> Self {
        Self { gate, emitted: 0 }
    }

    /// First-seen record of every distinct passage of `domain`, unchanged.
    pub fn filter<'a>(
        &mut self,
        domain: &str,
        records: impl IntoIterator<Item = &'a TextRecord>,
    ) -> Vec<&'a TextRecord> {
        if !self.gate.admits(domain) {
            trace!(domain, "domain not in allow-set");
            return Vec::new();
        }

        let mut seen = FingerprintSet::new();
        let survivors: Vec<&TextRecord> = records
            .into_iter()
            .filter(|record| record.classification.is_some())
            .filter(|record| seen.insert(&record.text))
            .collect();
        self.emitted += survivors.len() as u64;
        survivors
    }

    /// Records emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl GroupReducer for TextFilter {
    fn name(&self) -> &'static str {
        "texts"
    }

    fn reduce(&mut self, domain: &str, records: &[TextRecord]) -> Vec<String> {
        self.filter(domain, records)
            .into_iter()
            .map(codec::encode_text_record)
            .collect()
    }
}
