//! Request input handling
//!
//! 1. **Decoder** - strict JSON body decoding with a classified error for
//!    every malformed-input case, and the `StrictJson<T>` extractor
//! 2. **Query** - typed query-string readers that record problems on a
//!    `shared::Validator`
//!
//! Domain rules (movie fields, listing filters) live in `shared` and run on
//! the decoded values.

pub mod decoder;
pub mod query;

pub use decoder::{decode_body, decode_strict, DecodeError, StrictJson, MAX_BODY_BYTES};
pub use query::{read_csv, read_int, read_string, QueryParams};
