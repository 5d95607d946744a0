//! Request and response value objects

pub mod types;

pub use types::{Attempt, MultipartPart, MultipartValue, Request, RequestBody, Response};
