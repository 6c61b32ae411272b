//! Bucket listing backends.
//!
//! The [`lister::ObjectLister`] trait abstracts over where the listing
//! comes from.  Implementations include an S3-compatible provider and an
//! in-memory list used for fixtures and local runs.

pub mod aws;
pub mod lister;
pub mod memory;
