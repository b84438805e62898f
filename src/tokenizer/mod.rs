pub mod chat_template;
pub mod factory;
pub mod huggingface;
pub mod init_config;
pub mod mock;
pub mod traits;

pub use factory::create_tokenizer;
pub use huggingface::HuggingFaceTokenizer;
pub use init_config::{AddedToken, ConfigValue, InitConfig};
pub use traits::{Decoder, Encoder, Encoding, SpecialTokens, TokenIdType, Tokenizer, TokenizerFamily};
