//! raw-pano common library
//!
//! Photo records, the sequence grouping pass and panorama naming. Everything
//! here is pure; filesystem and process work lives in the `raw-pano` crate.

pub mod error;
pub mod grouping;
pub mod identity;
pub mod types;

pub use error::{Error, Result};
pub use grouping::{first_duplicate, group};
pub use identity::sequence_identity;
pub use types::{
    parse_capture_time, CaptureAttributes, PhotoRecord, DATE_KEY, DEFAULT_CAPTURE_KEYS, NAME_KEY,
    TIMEGROUP_KEY,
};
