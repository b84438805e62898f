use std::fmt;

use anyhow::Result;

use super::init_config::InitConfig;

/// Type alias for token IDs
pub type TokenIdType = u32;

/// Core encoding trait - separate from decoding for modularity
pub trait Encoder: Send + Sync + 'static {
    fn encode(&self, input: &str, add_special_tokens: bool) -> Result<Encoding>;
}

/// Core decoding trait - can be implemented independently
pub trait Decoder: Send + Sync {
    fn decode(&self, token_ids: &[TokenIdType], skip_special_tokens: bool) -> Result<String>;
}

/// Combined tokenizer trait
pub trait Tokenizer: Encoder + Decoder {
    fn vocab_size(&self) -> usize;
    fn get_special_tokens(&self) -> &SpecialTokens;
    fn token_to_id(&self, token: &str) -> Option<TokenIdType>;
    fn id_to_token(&self, id: TokenIdType) -> Option<String>;

    /// Library-level family this tokenizer belongs to, independent of any
    /// model-specific subclass recorded in its configuration.
    fn family(&self) -> TokenizerFamily;

    /// Initialization parameters the tokenizer was loaded with, if it keeps them.
    fn init_config(&self) -> Option<&InitConfig> {
        None
    }

    /// The tokenizer's own chat template
    fn chat_template(&self) -> Option<&str> {
        None
    }

    /// Convert ids to their token strings, one per id.
    ///
    /// Ids outside the vocabulary map to an empty string.
    fn convert_ids_to_tokens(&self, ids: &[TokenIdType]) -> Vec<String> {
        ids.iter()
            .map(|&id| self.id_to_token(id).unwrap_or_default())
            .collect()
    }
}

/// Closed set of tokenizer families known at the provider boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenizerFamily {
    /// Rust `tokenizers` backed (tokenizer.json)
    PreTrainedTokenizerFast,
    /// Pure vocabulary / sentencepiece style tokenizers
    PreTrainedTokenizer,
}

impl TokenizerFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenizerFamily::PreTrainedTokenizerFast => "PreTrainedTokenizerFast",
            TokenizerFamily::PreTrainedTokenizer => "PreTrainedTokenizer",
        }
    }
}

impl fmt::Display for TokenizerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contains the results of tokenizing text: token IDs, string tokens, and their spans
#[derive(Debug, Clone)]
pub enum Encoding {
    /// Hugging Face
    Hf(Box<tokenizers::tokenizer::Encoding>),
    /// Plain id sequence
    Sp(Vec<TokenIdType>),
}

impl Encoding {
    /// Returns a reference to token IDs - zero-copy operation
    #[inline]
    pub fn token_ids(&self) -> &[TokenIdType] {
        match self {
            Encoding::Hf(inner) => inner.get_ids(),
            Encoding::Sp(inner) => inner,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpecialTokens {
    pub bos_token: Option<String>,
    pub eos_token: Option<String>,
    pub unk_token: Option<String>,
    pub sep_token: Option<String>,
    pub pad_token: Option<String>,
    pub cls_token: Option<String>,
    pub mask_token: Option<String>,
    pub additional_special_tokens: Vec<String>,
}
