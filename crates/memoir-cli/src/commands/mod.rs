//! Command implementations.

pub mod forget;
pub mod ingest;
pub mod profile;

pub use self::forget::execute_forget;
pub use self::ingest::execute_ingest;
pub use self::profile::execute_profile;
