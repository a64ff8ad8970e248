//! Service implementations
//!
//! Real implementations that perform OS and filesystem I/O: the worker
//! process wrapper and the directory-backed version store.

pub mod version_store;
pub mod worker;
pub mod worker_output;


pub use version_store::DirectoryVersionStore;
pub use worker::{GenerationInfo, ProcessKiller, WorkerProcess, WorkerStatus};
