//! Release recording: version numbers, log entries, manifests, and the
//! store that commits them.

pub mod entry;
pub mod lock;
pub mod manifest;
pub mod store;
pub mod version;

pub use entry::{CountsDescriber, EntryBuilder, EntryDescriber, EntryTemplate, ReleaseLogEntry};
pub use store::{
    FileReleaseStore, FlushOutcome, InMemoryReleaseStore, PersistOutcome, ReleaseConfig,
    ReleaseRecord, ReleaseStore,
};
pub use version::Version;
