mod error;
mod extractor;
mod handler;
mod router;

pub use error::{ApiError, ApiErrorCode, recover_error};
pub use extractor::{Extractor, MAX_BODY_BYTES, RequestParts, credential};
pub use router::routes;
