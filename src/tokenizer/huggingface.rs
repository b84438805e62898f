use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::{Error, Result};
use tokenizers::{processors::template::TemplateProcessing, tokenizer::Tokenizer as HfTokenizer};
use tracing::debug;

use super::{
    chat_template::{chat_template_from_config, load_chat_template_from_file},
    init_config::{init_config_from_json, ConfigValue, InitConfig},
    traits::{
        Decoder, Encoder, Encoding, SpecialTokens, TokenIdType, Tokenizer as TokenizerTrait,
        TokenizerFamily,
    },
};

/// HuggingFace tokenizer wrapper
pub struct HuggingFaceTokenizer {
    tokenizer: HfTokenizer,
    special_tokens: SpecialTokens,
    vocab: HashMap<String, TokenIdType>,
    reverse_vocab: HashMap<TokenIdType, String>,
    chat_template: Option<String>,
    /// Contents of tokenizer_config.json plus the file locations it was loaded from
    init_config: InitConfig,
}

impl HuggingFaceTokenizer {
    /// Create a tokenizer from a HuggingFace tokenizer JSON file
    pub fn from_file(file_path: &str) -> Result<Self> {
        let chat_template_path = Path::new(file_path)
            .parent()
            .and_then(super::factory::discover_chat_template_in_dir);
        Self::from_file_with_chat_template(file_path, chat_template_path.as_deref())
    }

    /// Create a tokenizer from a HuggingFace tokenizer JSON file with an optional chat template
    pub fn from_file_with_chat_template(
        file_path: &str,
        chat_template_path: Option<&str>,
    ) -> Result<Self> {
        let mut tokenizer = HfTokenizer::from_file(file_path)
            .map_err(|e| Error::msg(format!("Failed to load tokenizer: {}", e)))?;

        let config_json = Self::read_tokenizer_config(file_path)?;
        let mut init_config = config_json
            .clone()
            .map(init_config_from_json)
            .unwrap_or_default();
        Self::record_file_locations(&mut init_config, file_path);

        let special_tokens = Self::extract_special_tokens(&tokenizer, &init_config);

        // Include added tokens such as <|im_start|>
        let vocab = tokenizer.get_vocab(true);
        let reverse_vocab: HashMap<TokenIdType, String> = vocab
            .iter()
            .map(|(token, &id)| (id, token.clone()))
            .collect();

        let chat_template = match chat_template_path {
            Some(template_path) => Some(load_chat_template_from_file(template_path)?),
            None => config_json.as_ref().and_then(chat_template_from_config),
        };

        // Only touch the post_processor when the config asks for BOS/EOS explicitly
        let add_bos_token = init_config.get("add_bos_token").and_then(ConfigValue::as_bool);
        let add_eos_token = init_config.get("add_eos_token").and_then(ConfigValue::as_bool);
        let needs_eos = add_eos_token == Some(true);
        let needs_bos = match add_bos_token {
            Some(flag) => flag,
            None => needs_eos && Self::tokenizer_adds_special_tokens(&tokenizer),
        };

        if needs_bos || needs_eos {
            if let Some(post_processor) =
                Self::build_post_processor(needs_bos, needs_eos, &special_tokens, &vocab)
            {
                debug!(needs_bos, needs_eos, "Configured post_processor");
                tokenizer.with_post_processor(Some(post_processor));
            }
        }

        Ok(HuggingFaceTokenizer {
            tokenizer,
            special_tokens,
            vocab,
            reverse_vocab,
            chat_template,
            init_config,
        })
    }

    /// Create from an existing HuggingFace tokenizer
    pub fn from_tokenizer(tokenizer: HfTokenizer) -> Self {
        let init_config = InitConfig::new();
        let special_tokens = Self::extract_special_tokens(&tokenizer, &init_config);
        let vocab = tokenizer.get_vocab(true);
        let reverse_vocab: HashMap<TokenIdType, String> = vocab
            .iter()
            .map(|(token, &id)| (id, token.clone()))
            .collect();

        HuggingFaceTokenizer {
            tokenizer,
            special_tokens,
            vocab,
            reverse_vocab,
            chat_template: None,
            init_config,
        }
    }

    fn read_tokenizer_config(tokenizer_path: &str) -> Result<Option<serde_json::Value>> {
        let Some(config_path) = Path::new(tokenizer_path)
            .parent()
            .map(|dir| dir.join("tokenizer_config.json"))
            .filter(|p| p.is_file())
        else {
            return Ok(None);
        };

        let content = std::fs::read_to_string(&config_path)?;
        let config = serde_json::from_str(&content).map_err(|e| {
            Error::msg(format!(
                "Failed to parse {}: {}",
                config_path.display(),
                e
            ))
        })?;
        Ok(Some(config))
    }

    fn record_file_locations(init_config: &mut InitConfig, tokenizer_path: &str) {
        let path = Path::new(tokenizer_path);
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        init_config.insert("vocab_file".to_string(), ConfigValue::from(tokenizer_path));
        let merges = dir.join("merges.txt");
        if merges.is_file() {
            init_config.insert(
                "merges_file".to_string(),
                ConfigValue::from(merges.to_string_lossy().into_owned()),
            );
        }
        init_config
            .entry("name_or_path".to_string())
            .or_insert_with(|| ConfigValue::from(display_dir(&dir)));
    }

    /// Check if the tokenizer's post_processor adds special tokens (e.g., BOS)
    fn tokenizer_adds_special_tokens(tokenizer: &HfTokenizer) -> bool {
        tokenizer
            .encode("", true)
            .map(|enc| !enc.get_ids().is_empty())
            .unwrap_or(false)
    }

    /// Build a TemplateProcessing post_processor
    /// Template format: "{bos}:0 $A:0 {eos}:0" with optional BOS/EOS based on config
    fn build_post_processor(
        add_bos_token: bool,
        add_eos_token: bool,
        special_tokens: &SpecialTokens,
        vocab: &HashMap<String, TokenIdType>,
    ) -> Option<TemplateProcessing> {
        let mut template = String::with_capacity(32);
        let mut tokens = Vec::with_capacity(2);

        if add_bos_token {
            let bos = special_tokens.bos_token.as_ref()?;
            let bos_id = vocab.get(bos).copied()?;
            template.push_str(bos);
            template.push_str(":0 ");
            tokens.push((bos.clone(), bos_id));
        }

        template.push_str("$A:0");

        if add_eos_token {
            let eos = special_tokens.eos_token.as_ref()?;
            let eos_id = vocab.get(eos).copied()?;
            template.push(' ');
            template.push_str(eos);
            template.push_str(":0");
            tokens.push((eos.clone(), eos_id));
        }

        TemplateProcessing::builder()
            .try_single(template.as_str())
            .ok()?
            .special_tokens(tokens)
            .build()
            .ok()
    }

    /// Special tokens named in tokenizer_config.json win over well-known spellings
    fn extract_special_tokens(tokenizer: &HfTokenizer, init_config: &InitConfig) -> SpecialTokens {
        let vocab = tokenizer.get_vocab(true);

        let configured = |key: &str| -> Option<String> {
            match init_config.get(key)? {
                ConfigValue::String(s) => Some(s.clone()),
                ConfigValue::AddedToken(token) => Some(token.content.clone()),
                _ => None,
            }
        };

        let find_token = |key: &str, patterns: &[&str]| -> Option<String> {
            configured(key).or_else(|| {
                patterns
                    .iter()
                    .find(|pattern| vocab.contains_key(**pattern))
                    .map(|pattern| pattern.to_string())
            })
        };

        let additional_special_tokens: Vec<String> = tokenizer
            .get_added_tokens_decoder()
            .iter()
            .filter(|(_id, token)| token.special)
            .map(|(_id, token)| token.content.clone())
            .collect();

        SpecialTokens {
            bos_token: find_token("bos_token", &["<s>", "<|startoftext|>", "<BOS>", "[CLS]"]),
            eos_token: find_token("eos_token", &["</s>", "<|endoftext|>", "<EOS>", "[SEP]"]),
            unk_token: find_token("unk_token", &["<unk>", "<UNK>", "[UNK]"]),
            sep_token: find_token("sep_token", &["[SEP]", "<sep>", "<SEP>"]),
            pad_token: find_token("pad_token", &["<pad>", "<PAD>", "[PAD]"]),
            cls_token: find_token("cls_token", &["[CLS]", "<cls>", "<CLS>"]),
            mask_token: find_token("mask_token", &["[MASK]", "<mask>", "<MASK>"]),
            additional_special_tokens,
        }
    }
}

fn display_dir(dir: &Path) -> String {
    if dir.as_os_str().is_empty() {
        PathBuf::from(".").display().to_string()
    } else {
        dir.display().to_string()
    }
}

impl Encoder for HuggingFaceTokenizer {
    fn encode(&self, input: &str, add_special_tokens: bool) -> Result<Encoding> {
        self.tokenizer
            .encode(input, add_special_tokens)
            .map_err(|e| Error::msg(format!("Encoding failed: {}", e)))
            .map(|encoding| Encoding::Hf(Box::new(encoding)))
    }
}

impl Decoder for HuggingFaceTokenizer {
    fn decode(&self, token_ids: &[TokenIdType], skip_special_tokens: bool) -> Result<String> {
        self.tokenizer
            .decode(token_ids, skip_special_tokens)
            .map_err(|e| Error::msg(format!("Decoding failed: {}", e)))
    }
}

impl TokenizerTrait for HuggingFaceTokenizer {
    fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(false)
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
        TokenizerFamily::PreTrainedTokenizerFast
    }

    fn init_config(&self) -> Option<&InitConfig> {
        Some(&self.init_config)
    }

    fn chat_template(&self) -> Option<&str> {
        self.chat_template.as_deref()
    }
}
