//! Serving layer for the tokenization endpoints

pub mod adapters;
pub mod engine;
pub mod error;
pub mod models;
pub mod preprocess;
pub mod request_logger;
pub mod tokenization;
pub mod tokenizer_info;

pub use adapters::{AdapterRegistry, LoraRequest, PromptAdapterRequest};
pub use engine::{EngineClient, LocalEngineClient};
pub use error::{PreprocessError, ServingError, ServingResult};
pub use models::ServingModels;
pub use preprocess::{DefaultPromptPreprocessor, PromptPreprocessor};
pub use request_logger::{RequestLogger, TracingRequestLogger};
pub use tokenization::TokenizationService;
pub use tokenizer_info::TokenizerInfo;
