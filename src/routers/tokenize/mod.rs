//! HTTP handlers for tokenization, detokenization and tokenizer introspection

mod handlers;

pub use handlers::{detokenize, get_tokenizer_info, request_id_from_headers, tokenize};
