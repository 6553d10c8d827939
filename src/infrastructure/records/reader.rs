//! Record file backed training pipeline

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use super::format::{RecordError, RecordHeader, RecordReader};
use crate::domain::retrain::{ExampleIter, PipelineBuilder, RetrainError, TrainingPipeline};

/// Training pipeline reading examples lazily from a validated record file
///
/// `open` makes one full validation pass; each call to `examples` reopens the
/// file and streams records again, so memory stays bounded by one record.
#[derive(Debug, Clone)]
pub struct RecordFilePipeline {
    path: PathBuf,
    header: RecordHeader,
}

impl RecordFilePipeline {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref().to_path_buf();
        let mut reader = RecordReader::new(BufReader::new(File::open(&path)?))?;
        let header = reader.header();

        for record in &mut reader {
            record?;
        }

        debug!(path = %path.display(), examples = header.count, "Record file validated");
        Ok(Self { path, header })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TrainingPipeline for RecordFilePipeline {
    fn len(&self) -> usize {
        self.header.count as usize
    }

    fn feature_width(&self) -> usize {
        self.header.feature_width as usize
    }

    fn examples(&self) -> io::Result<ExampleIter<'_>> {
        let file = File::open(&self.path)?;
        let reader = RecordReader::new(BufReader::new(file))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        Ok(Box::new(reader.map(|r| {
            r.map_err(|e| match e {
                RecordError::Io(io) => io,
                other => io::Error::new(io::ErrorKind::InvalidData, other),
            })
        })))
    }
}

/// Opens [`RecordFilePipeline`]s
#[derive(Debug, Default, Clone)]
pub struct RecordFilePipelineBuilder;

impl RecordFilePipelineBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineBuilder for RecordFilePipelineBuilder {
    #[instrument(skip_all, fields(path = %path.display()))]
    fn open(&self, path: &Path) -> Result<Box<dyn TrainingPipeline>, RetrainError> {
        let pipeline = RecordFilePipeline::open(path)
            .map_err(|e| RetrainError::pipeline_init(format!("{}: {}", path.display(), e)))?;
        Ok(Box::new(pipeline))
    }
}
