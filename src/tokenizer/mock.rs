//! Mock tokenizer implementation for testing

use std::collections::HashMap;

use anyhow::Result;

use super::{
    init_config::InitConfig,
    traits::{
        Decoder, Encoder, Encoding, SpecialTokens, TokenIdType, Tokenizer as TokenizerTrait,
        TokenizerFamily,
    },
};

pub const MOCK_BOS_ID: TokenIdType = 1000;

/// Mock tokenizer for testing purposes
pub struct MockTokenizer {
    vocab: HashMap<String, TokenIdType>,
    reverse_vocab: HashMap<TokenIdType, String>,
    special_tokens: SpecialTokens,
    chat_template: Option<String>,
    family: TokenizerFamily,
    init_config: Option<InitConfig>,
}

impl Default for MockTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTokenizer {
    pub fn new() -> Self {
        let mut vocab = HashMap::new();
        let mut reverse_vocab = HashMap::new();

        let tokens = [
            ("hello", 1),
            ("world", 2),
            ("test", 3),
            ("token", 4),
            (".", 6),
            ("system", 7),
            ("user", 8),
            ("assistant", 9),
            ("<eos>", 999),
            ("<bos>", MOCK_BOS_ID),
            ("<|im_start|>", 1001),
            ("<|im_end|>", 1002),
        ];

        for (token, id) in tokens {
            vocab.insert(token.to_string(), id);
            reverse_vocab.insert(id, token.to_string());
        }

        let special_tokens = SpecialTokens {
            bos_token: Some("<bos>".to_string()),
            eos_token: Some("<eos>".to_string()),
            unk_token: Some("<unk>".to_string()),
            additional_special_tokens: vec!["<|im_start|>".to_string(), "<|im_end|>".to_string()],
            ..Default::default()
        };

        Self {
            vocab,
            reverse_vocab,
            special_tokens,
            chat_template: None,
            family: TokenizerFamily::PreTrainedTokenizerFast,
            init_config: None,
        }
    }

    pub fn with_chat_template(mut self, template: impl Into<String>) -> Self {
        self.chat_template = Some(template.into());
        self
    }

    pub fn with_family(mut self, family: TokenizerFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_init_config(mut self, init_config: InitConfig) -> Self {
        self.init_config = Some(init_config);
        self
    }

    fn is_special(token: &str) -> bool {
        matches!(token, "<eos>" | "<bos>" | "<|im_start|>" | "<|im_end|>")
    }
}

impl Encoder for MockTokenizer {
    /// Whitespace split with vocabulary lookup; unknown words are dropped.
    fn encode(&self, input: &str, add_special_tokens: bool) -> Result<Encoding> {
        let bos = add_special_tokens.then_some(MOCK_BOS_ID);
        let tokens: Vec<TokenIdType> = bos
            .into_iter()
            .chain(
                input
                    .split_whitespace()
                    .filter_map(|word| self.vocab.get(word).copied()),
            )
            .collect();

        Ok(Encoding::Sp(tokens))
    }
}

impl Decoder for MockTokenizer {
    fn decode(&self, token_ids: &[TokenIdType], skip_special_tokens: bool) -> Result<String> {
        let tokens: Vec<&str> = token_ids
            .iter()
            .filter_map(|id| self.reverse_vocab.get(id))
            .map(String::as_str)
            .filter(|token| !(skip_special_tokens && Self::is_special(token)))
            .collect();

        Ok(tokens.join(" "))
    }
}

impl TokenizerTrait for MockTokenizer {
    fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    fn get_special_tokens(&self) -> &SpecialTokens {
        &self.special_tokens
    }

    fn token_to_id(&self, token: &str) -> Option<TokenIdType> {
        self.vocab.get(token).copied()
    }

    fn id_to_token(&self, id: TokenIdType) -> Option<String> {
        self.reverse_vocab.get(&id).cloned()
    }

    fn family(&self) -> TokenizerFamily {
        self.family
    }

    fn init_config(&self) -> Option<&InitConfig> {
        self.init_config.as_ref()
    }

    fn chat_template(&self) -> Option<&str> {
        self.chat_template.as_deref()
    }
}
