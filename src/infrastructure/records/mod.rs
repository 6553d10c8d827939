//! Record file serialization and training pipelines

mod format;
mod in_memory;
mod reader;
mod writer;

pub use format::{
    RecordError, RecordHeader, RecordReader, HEADER_LEN, MAGIC, MAX_FEATURE_WIDTH, VERSION,
};
pub use in_memory::InMemoryPipeline;
pub use reader::{RecordFilePipeline, RecordFilePipelineBuilder};
pub use writer::RecordFileWriter;
