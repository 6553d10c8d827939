//! In-memory training pipeline

use std::io;

use crate::domain::retrain::{Example, ExampleIter, TrainingPipeline};

/// Training pipeline over examples held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryPipeline {
    feature_width: usize,
    examples: Vec<Example>,
}

impl InMemoryPipeline {
    pub fn new(feature_width: usize, examples: Vec<Example>) -> Self {
        Self {
            feature_width,
            examples,
        }
    }
}

impl TrainingPipeline for InMemoryPipeline {
    fn len(&self) -> usize {
        self.examples.len()
    }

    fn feature_width(&self) -> usize {
        self.feature_width
    }

    fn examples(&self) -> io::Result<ExampleIter<'_>> {
        Ok(Box::new(self.examples.iter().cloned().map(Ok)))
    }
}
