// Request and response types of the tokenization API

pub mod chat;
pub mod error;
pub mod tokenize;

/// Requests that may name the model (or adapter) they target
pub trait ModelRequest {
    /// `None` or an empty name selects the default model
    fn model(&self) -> Option<&str>;
}
