//! Bridge message protocol.
//!
//! # Data Flow
//! ```text
//! Front end                                   Backend
//!     Request ── codec::encode_request ──▶ text ──▶ codec::decode_request
//!                                                       │
//!                                               application logic
//!                                                       │
//!     Response ◀── codec::decode_response ◀── text ◀── codec::encode_response
//!                  (decompress, then JSON)             (JSON, then compress)
//! ```
//!
//! # Design Decisions
//! - JSON with stable camelCase field names and sorted map keys
//! - Only responses are compressed; rendered bodies dominate their size
//! - Every decode failure maps to the same fixed 500 response

pub mod codec;
pub mod compression;
pub mod message;

pub use codec::{decode_request, decode_response, encode_request, encode_response, CodecError};
pub use message::{PostedFile, Request, Response};
