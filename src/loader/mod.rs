//! Resolution pipeline stages
//!
//! Stages run in this order against one [`Store`](crate::store::Store):
//! 1. [`binder`] - flags and environment variables
//! 2. [`file`] - base configuration file (fatal on failure)
//! 3. [`remote`] - remote providers (logged on failure)
//! 4. [`mode`] - mode resolution and overlay (policy chosen by the caller)

pub mod binder;
pub mod file;
pub mod mode;
pub mod remote;

pub use binder::bind_sources;
pub use file::load_base;
pub use mode::{ModeResolution, ModeResolver, ModeState};
pub use remote::{HttpFetcher, RemoteError, RemoteFetcher, RemoteReport, load_remote};
