//! Chat formatting for raw-mode generation.
//!
//! The model receives one flat string: a system turn, a user turn and an
//! open assistant header. Decoded output may echo that prompt back and may
//! carry special tokens; [`ChatTemplate::extract_reply`] reduces it to the
//! assistant text only.

use qna_core::{AppError, AppResult};

/// Supported chat formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatTemplate {
    /// Llama 3 header/eot format
    Llama3,
    /// `<|im_start|>` / `<|im_end|>` format
    ChatMl,
}

impl ChatTemplate {
    /// Parse a template name from configuration.
    pub fn parse(name: &str) -> AppResult<Self> {
        match name.to_lowercase().as_str() {
            "llama3" => Ok(Self::Llama3),
            "chatml" => Ok(Self::ChatMl),
            other => Err(AppError::Config(format!(
                "Unknown chat template: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llama3 => "llama3",
            Self::ChatMl => "chatml",
        }
    }

    /// Format a system and a user turn, ending with the assistant
    /// generation prompt.
    pub fn apply(&self, system: &str, user: &str) -> String {
        match self {
            Self::Llama3 => format!(
                "<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n\n{}<|eot_id|>\
                 <|start_header_id|>user<|end_header_id|>\n\n{}<|eot_id|>\
                 <|start_header_id|>assistant<|end_header_id|>\n\n",
                system, user
            ),
            Self::ChatMl => format!(
                "<|im_start|>system\n{}<|im_end|>\n<|im_start|>user\n{}<|im_end|>\n<|im_start|>assistant\n",
                system, user
            ),
        }
    }

    fn special_tokens(&self) -> &'static [&'static str] {
        match self {
            Self::Llama3 => &[
                "<|begin_of_text|>",
                "<|end_of_text|>",
                "<|start_header_id|>",
                "<|end_header_id|>",
                "<|eot_id|>",
            ],
            Self::ChatMl => &["<|im_start|>", "<|im_end|>", "<|endoftext|>"],
        }
    }

    /// Reduce raw model output to the assistant reply.
    ///
    /// Drops an echoed prompt prefix, everything up to the last assistant
    /// header, every special token and surrounding whitespace.
    pub fn extract_reply(&self, prompt: &str, output: &str) -> String {
        let mut text = output.strip_prefix(prompt).unwrap_or(output);

        let header = match self {
            Self::Llama3 => "<|start_header_id|>assistant<|end_header_id|>",
            Self::ChatMl => "<|im_start|>assistant",
        };
        if let Some(pos) = text.rfind(header) {
            text = &text[pos + header.len()..];
        }

        // Anything after the end-of-turn marker is not part of the reply
        let end = match self {
            Self::Llama3 => "<|eot_id|>",
            Self::ChatMl => "<|im_end|>",
        };
        if let Some(pos) = text.find(end) {
            text = &text[..pos];
        }

        let mut reply = text.to_string();
        for token in self.special_tokens() {
            reply = reply.replace(token, "");
        }

        reply.trim().to_string()
    }
}
