use clap::{ArgAction, Parser};
use sgl_tokenizer_service::{
    config::{ConfigResult, LoraModulePath, PromptAdapterPath, TokenizationConfig},
    server::{self, ServerConfig},
    tokenizer::chat_template::ChatTemplateContentFormatOption,
    version,
};

#[derive(Parser, Debug)]
#[command(name = "sgl-tokenizer-service")]
#[command(about = "Tokenize, detokenize and tokenizer-info endpoints for an LLM tokenizer")]
#[command(long_about = r#"
Serves the tokenizer of a model over HTTP.

Examples:
  # Tokenizer directory with tokenizer.json and tokenizer_config.json
  sgl-tokenizer-service --tokenizer-path /models/llama --served-model-name llama

  # Custom chat template and a LoRA adapter shipping its own tokenizer
  sgl-tokenizer-service --tokenizer-path /models/llama --served-model-name llama \
    --chat-template /templates/llama.jinja --lora-modules sql=/adapters/sql
"#)]
struct CliArgs {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// tokenizer.json file or a directory containing one
    #[arg(long)]
    tokenizer_path: String,

    /// Model names the tokenizer is served under; the first one is the default
    #[arg(long = "served-model-name", num_args = 1..)]
    served_model_names: Vec<String>,

    /// Defaults to model_max_length from tokenizer_config.json
    #[arg(long)]
    max_model_len: Option<usize>,

    /// Inline Jinja template or a path to a template file
    #[arg(long)]
    chat_template: Option<String>,

    #[arg(long, default_value = "auto", value_parser = ["auto", "string", "openai"])]
    chat_template_content_format: String,

    /// LoRA adapters as name=path
    #[arg(long, num_args = 0..)]
    lora_modules: Vec<LoraModulePath>,

    /// Prompt adapters as name=path[:num_virtual_tokens]
    #[arg(long, num_args = 0..)]
    prompt_adapters: Vec<PromptAdapterPath>,

    #[arg(long, default_value_t = false)]
    disable_log_requests: bool,

    /// Maximum number of prompt characters or token ids printed per request
    #[arg(long)]
    max_log_len: Option<usize>,

    #[arg(long, default_value_t = 32 * 1024 * 1024)]
    max_payload_size: usize,

    #[arg(long, default_value = "info", value_parser = ["debug", "info", "warn", "error"])]
    log_level: String,

    #[arg(long)]
    log_dir: Option<String>,

    #[arg(long, action = ArgAction::SetTrue)]
    log_json: bool,

    #[arg(long, default_value_t = 30)]
    shutdown_grace_period_secs: u64,
}

impl CliArgs {
    fn to_config(&self) -> ConfigResult<TokenizationConfig> {
        let content_format = self
            .chat_template_content_format
            .parse::<ChatTemplateContentFormatOption>()
            .unwrap_or_default();

        // Without explicit names the tokenizer path doubles as the model name
        let served_model_names = if self.served_model_names.is_empty() {
            vec![self.tokenizer_path.clone()]
        } else {
            self.served_model_names.clone()
        };

        TokenizationConfig::builder()
            .host(&self.host)
            .port(self.port)
            .tokenizer_path(&self.tokenizer_path)
            .served_model_names(served_model_names)
            .maybe_max_model_len(self.max_model_len)
            .maybe_chat_template(self.chat_template.as_ref())
            .chat_template_content_format(content_format)
            .lora_modules(self.lora_modules.clone())
            .prompt_adapters(self.prompt_adapters.clone())
            .enable_request_logging(!self.disable_log_requests)
            .max_log_len(self.max_log_len)
            .max_payload_size(self.max_payload_size)
            .shutdown_grace_period_secs(self.shutdown_grace_period_secs)
            .log_level(&self.log_level)
            .log_dir(self.log_dir.as_ref())
            .log_json(self.log_json)
            .build()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("{}", version::get_version_string());
        return Ok(());
    }

    let cli_args = CliArgs::parse();

    println!("{} starting...", version::get_version_string());
    println!("Host: {}:{}", cli_args.host, cli_args.port);
    println!("Tokenizer: {}", cli_args.tokenizer_path);

    let config = cli_args.to_config()?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move { server::startup(ServerConfig { config }).await })?;
    Ok(())
}
