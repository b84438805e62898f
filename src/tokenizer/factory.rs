use std::{fs::File, io::Read, path::Path, sync::Arc};

use anyhow::{Error, Result};
use tracing::{debug, info};

use super::{huggingface::HuggingFaceTokenizer, mock::MockTokenizer, traits};

/// Create a tokenizer from a path to a tokenizer file or a model directory.
///
/// - a directory must contain `tokenizer.json`; a chat template file next to it
///   is picked up automatically
/// - `.json` files are loaded as HuggingFace tokenizers
/// - `mock` returns the in-memory test tokenizer
pub fn create_tokenizer(path: &str) -> Result<Arc<dyn traits::Tokenizer>> {
    if path == "mock" {
        return Ok(Arc::new(MockTokenizer::new()));
    }

    let file_path = Path::new(path);

    if !file_path.exists() {
        return Err(Error::msg(format!("File not found: {}", path)));
    }

    if file_path.is_dir() {
        let tokenizer_json = file_path.join("tokenizer.json");
        if !tokenizer_json.exists() {
            return Err(Error::msg(format!(
                "Directory '{}' does not contain a tokenizer.json file",
                path
            )));
        }

        let chat_template = discover_chat_template_in_dir(file_path);
        match &chat_template {
            Some(template_path) => info!(
                "Using chat template '{}' for tokenizer at {}",
                template_path, path
            ),
            None => debug!("No chat template file found in {}", path),
        }

        let tokenizer_path = tokenizer_json.to_str().ok_or_else(|| {
            Error::msg(format!(
                "Tokenizer path is not valid UTF-8: {:?}",
                tokenizer_json
            ))
        })?;
        let tokenizer = HuggingFaceTokenizer::from_file_with_chat_template(
            tokenizer_path,
            chat_template.as_deref(),
        )?;
        return Ok(Arc::new(tokenizer));
    }

    let extension = file_path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(|s| s.to_lowercase());

    match extension.as_deref() {
        Some("json") => Ok(Arc::new(HuggingFaceTokenizer::from_file(path)?)),
        _ => auto_detect_tokenizer(path),
    }
}

/// Auto-detect tokenizer type by examining file content
fn auto_detect_tokenizer(file_path: &str) -> Result<Arc<dyn traits::Tokenizer>> {
    let mut file = File::open(file_path)?;
    let mut buffer = vec![0u8; 512];
    let bytes_read = file.read(&mut buffer)?;
    buffer.truncate(bytes_read);

    if is_likely_json(&buffer) {
        let tokenizer = HuggingFaceTokenizer::from_file(file_path)?;
        return Ok(Arc::new(tokenizer));
    }

    Err(Error::msg(format!(
        "Unable to determine tokenizer type for file: {}",
        file_path
    )))
}

/// Check if the buffer likely contains JSON data
fn is_likely_json(buffer: &[u8]) -> bool {
    // Skip UTF-8 BOM if present
    let content = if buffer.len() >= 3 && buffer[0..3] == [0xEF, 0xBB, 0xBF] {
        &buffer[3..]
    } else {
        buffer
    };

    content
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .map(|&b| b == b'{' || b == b'[')
        .unwrap_or(false)
}

/// Helper function to discover chat template files in a directory
pub fn discover_chat_template_in_dir(dir: &Path) -> Option<String> {
    let json_template_path = dir.join("chat_template.json");
    if json_template_path.exists() {
        return json_template_path.to_str().map(|s| s.to_string());
    }

    let jinja_path = dir.join("chat_template.jinja");
    if jinja_path.exists() {
        return jinja_path.to_str().map(|s| s.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_detection() {
        assert!(is_likely_json(b"{\"test\": \"value\"}"));
        assert!(is_likely_json(b"  \n\t{\"test\": \"value\"}"));
        assert!(is_likely_json(b"[1, 2, 3]"));
        assert!(!is_likely_json(b"not json"));
        assert!(!is_likely_json(b""));
    }

    #[test]
    fn test_mock_tokenizer_creation() {
        let tokenizer = create_tokenizer("mock").unwrap();
        assert_eq!(tokenizer.vocab_size(), 12);
    }

    #[test]
    fn test_file_not_found() {
        let result = create_tokenizer("/nonexistent/file.json");
        let err = result.err().unwrap();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_directory_without_tokenizer() {
        let dir = tempfile::tempdir().unwrap();
        let err = create_tokenizer(dir.path().to_str().unwrap())
            .err()
            .unwrap();
        assert!(err.to_string().contains("does not contain a tokenizer.json"));
    }

    #[test]
    fn test_discover_chat_template() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_chat_template_in_dir(dir.path()).is_none());

        std::fs::write(dir.path().join("chat_template.jinja"), "{{ x }}").unwrap();
        assert!(discover_chat_template_in_dir(dir.path())
            .unwrap()
            .ends_with("chat_template.jinja"));

        std::fs::write(dir.path().join("chat_template.json"), "\"{{ x }}\"").unwrap();
        assert!(discover_chat_template_in_dir(dir.path())
            .unwrap()
            .ends_with("chat_template.json"));
    }
}
