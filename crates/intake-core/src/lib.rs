//! Manifest-first archive intake.
//!
//! A client registers a [`Manifest`](manifest::Manifest) describing an archive (whole-stream
//! digest plus per-entry path, size and digest), then streams the archive bytes once.
//! [`UploadService::stream`] stages and digests the stream in a single pass, authenticates
//! it against the declared archive hash, walks the zip under incremental safety bounds,
//! checks every entry against the declaration, and only then promotes the file to an
//! [`ArchiveStore`](store::ArchiveStore).

pub mod config;
pub mod error;
pub mod manifest;
pub mod service;
pub mod store;
pub mod verify;

pub use config::{ConfigError, IntakeConfig, ReplayPolicy};
pub use error::{ErrorKind, FailureBody, UploadError, UploadResult};
pub use manifest::{HashAlgo, Manifest, ManifestError, ManifestRequest};
pub use service::{PromotionReceipt, PromotionStatus, RegisterAck, UploadService};
pub use verify::{ErrorClass, ErrorCode, VerifyError, VerifyLimits};
