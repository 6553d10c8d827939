//! In-memory data extractor

use async_trait::async_trait;

use crate::domain::retrain::{DataExtractor, RawRecordSet, RetrainError};

/// Extractor returning a fixed record set, for local runs and tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryExtractor {
    records: RawRecordSet,
}

impl InMemoryExtractor {
    pub fn new(records: RawRecordSet) -> Self {
        Self { records }
    }
}

#[async_trait]
impl DataExtractor for InMemoryExtractor {
    async fn query(&self) -> Result<RawRecordSet, RetrainError> {
        Ok(self.records.clone())
    }
}
