//! Content digests for geostore.
//!
//! A cell's content hash binds the membership and order of its items by
//! digesting their keys with domain-separated BLAKE3. Item payloads are not
//! part of the digest.

pub mod hasher;

pub use hasher::{Digest, KeyDigest};
