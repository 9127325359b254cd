//! DKIM "relaxed" canonicalization (RFC 6376 §3.4.2) of header blocks and message bodies.
//!
//! ```
//! use dkim_canon::{canonicalize_body, canonicalize_header};
//!
//! assert_eq!(
//!     canonicalize_header("Subject:   Hello\r\n World  \r\nFrom: a@b.com\r\n"),
//!     "subject:Hello World\r\nfrom:a@b.com\r\n"
//! );
//! assert_eq!(canonicalize_body("a  b \t\r\nc\r\n\r\n\r\n"), "a b\r\nc\r\n");
//! ```
//!
//! Both functions are total: every input gives an output, and malformed header lines are dropped.
//! With the `server` feature, [server] exposes them over HTTP.

pub mod canonicalization;
pub mod email;
pub mod hash;
#[cfg(feature = "server")]
pub mod server;

pub use canonicalization::{canonicalize_body, canonicalize_header, canonicalize_signed_headers, CanonicalField};
pub use email::{canonicalize_message, split_message, CanonicalMessage};
pub use hash::{body_hash, HashAlgorithm};
