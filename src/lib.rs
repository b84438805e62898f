pub mod app_context;
pub mod config;
pub mod observability;
pub mod protocols;
pub mod routers;
pub mod server;
pub mod serving;
pub mod tokenizer;
pub mod version;
