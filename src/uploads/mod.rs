//! Upload handling (multipart)

pub mod multipart;

pub use multipart::{build_multipart_form, build_multipart_form_async};
