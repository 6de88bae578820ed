pub mod memory;
pub mod test;

pub use memory::{DEFAULT_MAPPING_LIMIT, MemoryDomainList, MemoryRewriteTable};
pub use test::{Injected, RecordingTransport};
