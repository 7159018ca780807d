//! Span tokenizer capability.
//!
//! The span matcher needs tokens annotated with character offsets so the
//! chosen span can be reported as exact character positions inside a
//! paragraph. Offsets are optional: a tokenizer that cannot provide them
//! still supports matching, with offsets reported as unavailable.
//!
//! Two implementations are provided:
//!
//! - [`WhitespaceTokenizer`] - splits on whitespace with exact char offsets;
//!   the default when no trained tokenizer is available.
//! - [`HfTokenizer`] - wraps a HuggingFace `tokenizers::Tokenizer` loaded
//!   from a `tokenizer.json`, for corpora where subword or rule-based
//!   segmentation matters.

use crate::error::TokenizeError;
use std::path::Path;
use tokenizers::Tokenizer;

/// A token with optional `[start, end)` character offsets into its source
/// text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanToken {
    /// Token text as it appears in the source.
    pub text: String,
    /// Character offsets into the source text, when the tokenizer provides
    /// them.
    pub offsets: Option<(usize, usize)>,
}

/// Capability interface for offset-aware tokenization.
pub trait SpanTokenizer {
    /// Tokenizes `text` into span tokens.
    fn span_tokens(&self, text: &str) -> Result<Vec<SpanToken>, TokenizeError>;
}

/// Whitespace tokenizer with exact character offsets.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl SpanTokenizer for WhitespaceTokenizer {
    fn span_tokens(&self, text: &str) -> Result<Vec<SpanToken>, TokenizeError> {
        let mut tokens = Vec::new();
        let mut start: Option<usize> = None;
        let mut buf = String::new();

        let mut char_count = 0;
        for (idx, ch) in text.chars().enumerate() {
            char_count = idx + 1;
            if ch.is_whitespace() {
                if let Some(s) = start.take() {
                    tokens.push(SpanToken {
                        text: std::mem::take(&mut buf),
                        offsets: Some((s, idx)),
                    });
                }
            } else {
                if start.is_none() {
                    start = Some(idx);
                }
                buf.push(ch);
            }
        }
        if let Some(s) = start {
            tokens.push(SpanToken {
                text: buf,
                offsets: Some((s, char_count)),
            });
        }
        Ok(tokens)
    }
}

/// HuggingFace tokenizer adapter.
///
/// Token texts are sliced back out of the original input by character range,
/// so downstream comparisons see the source text rather than vocabulary
/// artifacts (subword markers, unknown-token placeholders).
pub struct HfTokenizer {
    tokenizer: Tokenizer,
}

impl HfTokenizer {
    /// Loads a tokenizer from a `tokenizer.json` file.
    ///
    /// # Errors
    ///
    /// Returns [`TokenizeError::Unavailable`] if the file cannot be read or
    /// deserialized.
    pub fn from_file(path: &Path) -> Result<Self, TokenizeError> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| TokenizeError::Unavailable(format!("{}: {}", path.display(), e)))?;
        Ok(Self { tokenizer })
    }

    /// Wraps an already-constructed tokenizer.
    pub fn from_tokenizer(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }
}

impl SpanTokenizer for HfTokenizer {
    fn span_tokens(&self, text: &str) -> Result<Vec<SpanToken>, TokenizeError> {
        let encoding = self
            .tokenizer
            .encode_char_offsets(text, false)
            .map_err(|e| TokenizeError::Failed(e.to_string()))?;

        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        for &(start, end) in encoding.get_offsets() {
            let end = end.min(chars.len());
            if start >= end {
                continue;
            }
            tokens.push(SpanToken {
                text: chars[start..end].iter().collect(),
                offsets: Some((start, end)),
            });
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokenizers::models::wordlevel::WordLevel;
    use tokenizers::pre_tokenizers::whitespace::Whitespace;

    #[test]
    fn test_whitespace_offsets() {
        let tokens = WhitespaceTokenizer.span_tokens("  New York\tCity ").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].text, "New");
        assert_eq!(tokens[0].offsets, Some((2, 5)));
        assert_eq!(tokens[1].text, "York");
        assert_eq!(tokens[1].offsets, Some((6, 10)));
        assert_eq!(tokens[2].text, "City");
        assert_eq!(tokens[2].offsets, Some((11, 15)));
    }

    #[test]
    fn test_whitespace_trailing_token() {
        let tokens = WhitespaceTokenizer.span_tokens("one two").unwrap();
        assert_eq!(tokens[1].text, "two");
        assert_eq!(tokens[1].offsets, Some((4, 7)));
    }

    #[test]
    fn test_whitespace_empty_input() {
        assert!(WhitespaceTokenizer.span_tokens("").unwrap().is_empty());
        assert!(WhitespaceTokenizer.span_tokens("   ").unwrap().is_empty());
    }

    #[test]
    fn test_whitespace_char_offsets_not_bytes() {
        // 'é' is two bytes but one char; offsets must count chars.
        let tokens = WhitespaceTokenizer.span_tokens("café au lait").unwrap();
        assert_eq!(tokens[0].offsets, Some((0, 4)));
        assert_eq!(tokens[1].offsets, Some((5, 7)));
    }

    fn word_level_tokenizer(words: &[&str]) -> HfTokenizer {
        let mut vocab: HashMap<String, u32> = HashMap::new();
        vocab.insert("[UNK]".to_string(), 0);
        for (i, word) in words.iter().enumerate() {
            vocab.insert((*word).to_string(), (i + 1) as u32);
        }
        let model = WordLevel::builder()
            .vocab(vocab)
            .unk_token("[UNK]".to_string())
            .build()
            .expect("word-level model");
        let mut tokenizer = Tokenizer::new(model);
        tokenizer.with_pre_tokenizer(Whitespace {});
        HfTokenizer::from_tokenizer(tokenizer)
    }

    #[test]
    fn test_hf_adapter_source_text_and_offsets() {
        let tokenizer = word_level_tokenizer(&["located", "in", "Berlin"]);
        let tokens = tokenizer.span_tokens("located in Berlin").unwrap();

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].text, "located");
        assert_eq!(tokens[0].offsets, Some((0, 7)));
        assert_eq!(tokens[2].text, "Berlin");
        assert_eq!(tokens[2].offsets, Some((11, 17)));
    }

    #[test]
    fn test_hf_adapter_unknown_words_keep_source_text() {
        let tokenizer = word_level_tokenizer(&["known"]);
        let tokens = tokenizer.span_tokens("known unknown").unwrap();

        // "unknown" maps to [UNK] in the vocabulary, but the span token
        // carries the original surface form.
        assert_eq!(tokens[1].text, "unknown");
        assert_eq!(tokens[1].offsets, Some((6, 13)));
    }
}
