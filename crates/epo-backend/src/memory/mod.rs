//! In-memory reference implementations of the capability traits
//!
//! Deterministic and test-friendly. Each backend carries a
//! [`FaultInjector`] for simulating outages and latency, and exposes counters
//! so callers can assert how many remote resources were actually created.

mod faults;
mod git;
mod notebook;
mod storage;

pub use faults::FaultInjector;
pub use git::InMemoryRepositoryBackend;
pub use notebook::InMemoryNotebookBackend;
pub use storage::InMemoryStorageBackend;
