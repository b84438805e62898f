//! HTTP routing layer

pub mod error;
pub mod tokenize;
pub mod validated;

pub use validated::ValidatedJson;
