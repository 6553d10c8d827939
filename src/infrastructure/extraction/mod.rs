//! Data extractors

mod in_memory;
mod postgres;

pub use in_memory::InMemoryExtractor;
pub use postgres::PostgresExtractor;
