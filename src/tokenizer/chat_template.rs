//! Chat template support for tokenizers using Jinja2 templates
//!
//! This module provides functionality to apply chat templates to messages,
//! similar to HuggingFace transformers' apply_chat_template method.

use std::{collections::HashMap, fmt, path::Path, str::FromStr};

use minijinja::{Environment, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Characters that only appear in inline templates, never in plain paths
const JINJA_CHARS: [char; 3] = ['{', '}', '\n'];

#[derive(Debug, Error)]
pub enum ChatTemplateError {
    #[error("Cannot use chat template functions because tokenizer.chat_template is not set and no template argument was passed!")]
    MissingTemplate,

    #[error("The supplied chat template ({template}) appears path-like, but doesn't exist!")]
    PathLike { template: String },

    #[error("Failed to read chat template file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Chat template file {path} does not contain a valid template")]
    InvalidFile { path: String },

    #[error("Failed to render chat template")]
    Render(#[from] minijinja::Error),

    #[error("continue_final_message is set but the final message does not appear in the chat after applying the chat template")]
    FinalMessageNotFound,

    #[error("continue_final_message is set but there is no final message with text content")]
    NoFinalMessage,
}

/// How a chat template expects message `content` to be shaped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatTemplateContentFormat {
    /// Content is a plain string
    String,
    /// Content is a list of typed parts
    OpenAI,
}

impl fmt::Display for ChatTemplateContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatTemplateContentFormat::String => f.write_str("string"),
            ChatTemplateContentFormat::OpenAI => f.write_str("openai"),
        }
    }
}

/// Configured content format; `Auto` defers to detection on the template text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatTemplateContentFormatOption {
    #[default]
    Auto,
    String,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ChatTemplateContentFormatOption {
    pub fn resolve(self, template: &str) -> ChatTemplateContentFormat {
        match self {
            ChatTemplateContentFormatOption::Auto => detect_chat_template_content_format(template),
            ChatTemplateContentFormatOption::String => ChatTemplateContentFormat::String,
            ChatTemplateContentFormatOption::OpenAi => ChatTemplateContentFormat::OpenAI,
        }
    }
}

impl FromStr for ChatTemplateContentFormatOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ChatTemplateContentFormatOption::Auto),
            "string" => Ok(ChatTemplateContentFormatOption::String),
            "openai" => Ok(ChatTemplateContentFormatOption::OpenAi),
            other => Err(format!(
                "unknown chat template content format '{}', expected auto, string or openai",
                other
            )),
        }
    }
}

/// Detect whether a template iterates over message content parts.
///
/// A `{% for ... in <expr> %}` whose iterable ends in a `content` member
/// access marks the template as expecting OpenAI-style part lists.
pub fn detect_chat_template_content_format(template: &str) -> ChatTemplateContentFormat {
    let mut rest = template;
    while let Some(start) = rest.find("{%") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("%}") else {
            break;
        };
        let statement = after[..end].trim_matches(|c: char| c == '-' || c == '+').trim();
        if let Some(iterable) = for_loop_iterable(statement) {
            if iterates_content(iterable) {
                return ChatTemplateContentFormat::OpenAI;
            }
        }
        rest = &after[end + 2..];
    }
    ChatTemplateContentFormat::String
}

fn for_loop_iterable(statement: &str) -> Option<&str> {
    let body = statement.strip_prefix("for")?;
    if !body.starts_with(char::is_whitespace) {
        return None;
    }
    let (_, iterable) = body.split_once(" in ")?;
    // Drop loop filters such as `if ...` and `recursive`
    let iterable = iterable
        .split(" if ")
        .next()
        .unwrap_or(iterable)
        .trim_end_matches("recursive")
        .trim();
    Some(iterable)
}

fn iterates_content(iterable: &str) -> bool {
    let compact: String = iterable.chars().filter(|c| !c.is_whitespace()).collect();
    compact.ends_with(".content")
        || compact.ends_with("['content']")
        || compact.ends_with("[\"content\"]")
}

/// Rendering options for [`ChatTemplateProcessor::apply_chat_template`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ChatTemplateParams<'a> {
    pub add_generation_prompt: bool,
    pub continue_final_message: bool,
    pub tools: Option<&'a [Value]>,
    pub template_kwargs: Option<&'a HashMap<String, Value>>,
    pub bos_token: Option<&'a str>,
    pub eos_token: Option<&'a str>,
}

/// Chat template processor using Jinja2
pub struct ChatTemplateProcessor {
    template: String,
}

impl ChatTemplateProcessor {
    pub fn new(template: String) -> Self {
        ChatTemplateProcessor { template }
    }

    /// Apply the chat template to a list of messages.
    ///
    /// Messages are JSON values already shaped for the template's content
    /// format. With `continue_final_message` the output is cut right after the
    /// final message's content so generation continues that message.
    pub fn apply_chat_template(
        &self,
        messages: &[Value],
        params: ChatTemplateParams,
    ) -> Result<String, ChatTemplateError> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_function("raise_exception", raise_exception);
        env.add_template("chat", &self.template)?;
        let tmpl = env.get_template("chat")?;

        let mut ctx = Map::new();
        if let Some(kwargs) = params.template_kwargs {
            for (key, value) in kwargs {
                ctx.insert(key.clone(), value.clone());
            }
        }
        ctx.insert("messages".to_string(), Value::Array(messages.to_vec()));
        ctx.insert(
            "tools".to_string(),
            params
                .tools
                .map(|t| Value::Array(t.to_vec()))
                .unwrap_or(Value::Null),
        );
        ctx.insert(
            "add_generation_prompt".to_string(),
            Value::Bool(params.add_generation_prompt),
        );
        for (key, token) in [("bos_token", params.bos_token), ("eos_token", params.eos_token)] {
            if !ctx.contains_key(key) {
                ctx.insert(
                    key.to_string(),
                    Value::String(token.unwrap_or_default().to_string()),
                );
            }
        }

        let rendered = tmpl.render(minijinja::Value::from_serialize(&ctx))?;

        if params.continue_final_message {
            let final_content = messages
                .last()
                .and_then(final_text)
                .ok_or(ChatTemplateError::NoFinalMessage)?;
            return truncate_after_final_message(rendered, final_content.trim());
        }

        Ok(rendered)
    }
}

fn raise_exception(message: String) -> Result<String, minijinja::Error> {
    Err(minijinja::Error::new(ErrorKind::InvalidOperation, message))
}

/// Text of a message's content: the string itself, or the last text part
fn final_text(message: &Value) -> Option<&str> {
    match message.get("content")? {
        Value::String(s) => Some(s),
        Value::Array(parts) => parts
            .iter()
            .rev()
            .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
            .find_map(|p| p.get("text").and_then(Value::as_str)),
        _ => None,
    }
}

fn truncate_after_final_message(
    mut rendered: String,
    final_content: &str,
) -> Result<String, ChatTemplateError> {
    let idx = rendered
        .rfind(final_content)
        .ok_or(ChatTemplateError::FinalMessageNotFound)?;
    rendered.truncate(idx + final_content.len());
    Ok(rendered)
}

/// Resolve a configured chat template to its text.
///
/// An existing file is read; a value containing Jinja syntax or a newline is
/// taken as the template itself; anything else is reported as a missing path.
pub fn load_chat_template(template: &str) -> Result<String, ChatTemplateError> {
    let path = Path::new(template);
    if path.is_file() {
        return load_chat_template_from_file(template);
    }

    if !template.contains(JINJA_CHARS) {
        return Err(ChatTemplateError::PathLike {
            template: template.to_string(),
        });
    }

    Ok(unescape_template(template))
}

/// Load chat template from a file (.jinja or .json containing Jinja)
pub fn load_chat_template_from_file(template_path: &str) -> Result<String, ChatTemplateError> {
    let content =
        std::fs::read_to_string(template_path).map_err(|source| ChatTemplateError::Read {
            path: template_path.to_string(),
            source,
        })?;

    if template_path.ends_with(".json") {
        let invalid = || ChatTemplateError::InvalidFile {
            path: template_path.to_string(),
        };
        let json_value: Value = serde_json::from_str(&content).map_err(|_| invalid())?;
        return match &json_value {
            Value::String(s) => Ok(s.clone()),
            Value::Object(obj) => obj
                .get("chat_template")
                .and_then(Value::as_str)
                .map(String::from)
                .ok_or_else(invalid),
            _ => Err(invalid()),
        };
    }

    Ok(content)
}

/// Interpret escape sequences typed on a command line
fn unescape_template(template: &str) -> String {
    template.replace("\\n", "\n").replace("\\t", "\t")
}

/// Pick the chat template out of a `tokenizer_config.json` value.
///
/// HuggingFace stores it either as a string or as a list of
/// `{"name": ..., "template": ...}` entries where `default` is the chat one.
pub fn chat_template_from_config(config: &Value) -> Option<String> {
    match config.get("chat_template")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(entries) => {
            let named = |name: &str| {
                entries.iter().find_map(|entry| {
                    (entry.get("name")?.as_str()? == name)
                        .then(|| entry.get("template")?.as_str().map(String::from))
                        .flatten()
                })
            };
            named("default").or_else(|| {
                entries
                    .first()
                    .and_then(|e| e.get("template")?.as_str().map(String::from))
            })
        }
        _ => None,
    }
}
