use std::collections::BTreeSet;
use std::ops::Deref;
use std::sync::Arc;

/// Splits text into the words a full-text index stores.
pub trait TokenizerProvider: Send + Sync {
    fn tokenize(&self, text: &str) -> BTreeSet<String>;
}

#[derive(Clone)]
pub struct Tokenizer {
    inner: Arc<dyn TokenizerProvider>,
}

impl Tokenizer {
    pub fn new<T: TokenizerProvider + 'static>(inner: T) -> Self {
        Tokenizer { inner: Arc::new(inner) }
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Tokenizer::new(WordTokenizer)
    }
}

impl Deref for Tokenizer {
    type Target = Arc<dyn TokenizerProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Lower-cased runs of alphanumeric characters.
///
/// Language specific stemming and stop words are not applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl TokenizerProvider for WordTokenizer {
    fn tokenize(&self, text: &str) -> BTreeSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(|word| word.to_lowercase())
            .collect()
    }
}
