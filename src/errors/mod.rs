//! Error handling for the upload router.
//!
//! Every fallible operation in this crate returns [`UploadError`]. The
//! variants map onto the error taxonomy the wire protocol exposes: a
//! `.code()` for machine-readable matching and a `.http_status()` for the
//! router to pick the right response status without each call site having
//! to know HTTP at all.
//!
//! # Usage
//!
//! ```rust
//! use upload_router::errors::{UploadError, UploadResult};
//!
//! fn find_route(name: &str) -> UploadResult<()> {
//!     if name.is_empty() {
//!         return Err(UploadError::NotFound(format!("no such route: {name}")));
//!     }
//!     Ok(())
//! }
//! ```

mod upload;

pub use upload::{UploadError, UploadResult};
