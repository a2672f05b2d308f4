//! LMDB storage backend for docket.
//!
//! Implements all storage traits from `docket-store` using the `heed`
//! LMDB bindings. Each logical store maps to one or more LMDB databases
//! within a single environment.

pub mod environment;
pub mod error;
pub mod meta;
pub mod record;
pub mod sla;
pub mod write_batch;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use write_batch::WriteBatch;
