use crate::collection::RecordId;
use crate::errors::{EmberError, EmberResult, ErrorKind};
use crate::index::{IndexLookup, IndexMap, IndexType, IndexerProvider, Tokenizer};
use crate::Value;
use std::collections::BTreeSet;

/// Full-text indexer. Every word of a string value is a key of the index
/// map, so a search resolves to the union of the buckets of matching words.
///
/// Search terms are a single word (`fox`), a prefix (`fox*`), a suffix
/// (`*fox`) or an infix (`*fox*`). A term of several words without any
/// wildcard matches documents containing any of the words.
#[derive(Clone, Default)]
pub struct TextIndexer {
    tokenizer: Tokenizer,
}

enum TermMatch {
    Words(BTreeSet<String>),
    Prefix(String),
    Suffix(String),
    Contains(String),
}

impl TextIndexer {
    pub fn new(tokenizer: Tokenizer) -> Self {
        TextIndexer { tokenizer }
    }

    fn words(&self, value: &Value) -> BTreeSet<String> {
        match value {
            Value::String(text) => self.tokenizer.tokenize(text),
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_string())
                .flat_map(|text| self.tokenizer.tokenize(text))
                .collect(),
            _ => BTreeSet::new(),
        }
    }

    fn parse_term(&self, field: &str, term: &str) -> EmberResult<TermMatch> {
        let term = term.trim();
        if term.is_empty() || term.chars().all(|c| c == '*') {
            log::error!("Invalid text search term '{}' on {}", term, field);
            return Err(EmberError::new(
                &format!("Invalid text search term '{}' on {}", term, field),
                ErrorKind::FilterError,
            ));
        }

        let has_wildcard = term.contains('*');
        if term.contains(char::is_whitespace) {
            if has_wildcard {
                log::error!("Wildcard search on {} accepts a single word, found '{}'", field, term);
                return Err(EmberError::new(
                    &format!("Wildcard search on {} accepts a single word, found '{}'", field, term),
                    ErrorKind::FilterError,
                ));
            }
            return Ok(TermMatch::Words(self.tokenizer.tokenize(term)));
        }

        if !has_wildcard {
            return Ok(TermMatch::Words(self.tokenizer.tokenize(term)));
        }

        let leading = term.starts_with('*');
        let trailing = term.ends_with('*');
        let word = term.trim_matches('*').to_lowercase();
        if word.contains('*') {
            log::error!("Wildcard is only allowed at the start or end of '{}'", term);
            return Err(EmberError::new(
                &format!("Wildcard is only allowed at the start or end of '{}'", term),
                ErrorKind::FilterError,
            ));
        }

        Ok(match (leading, trailing) {
            (true, true) => TermMatch::Contains(word),
            (true, false) => TermMatch::Suffix(word),
            _ => TermMatch::Prefix(word),
        })
    }
}

impl IndexerProvider for TextIndexer {
    fn index_type(&self) -> IndexType {
        IndexType::Fulltext
    }

    fn validate_value(&self, field: &str, value: &Value) -> EmberResult<()> {
        let valid = match value {
            Value::String(_) => true,
            Value::Array(items) => items.iter().all(|item| item.is_string()),
            _ => false,
        };

        if !valid {
            log::error!("Full-text index on {} only accepts strings, found {}", field, value);
            return Err(EmberError::new(
                &format!("Full-text index on {} only accepts strings, found {}", field, value),
                ErrorKind::ValidationError,
            ));
        }
        Ok(())
    }

    fn write_index(&self, index_map: &IndexMap, id: RecordId, field: &str, value: &Value) -> EmberResult<()> {
        self.validate_value(field, value)?;
        for word in self.words(value) {
            index_map.add(Value::String(word), id);
        }
        Ok(())
    }

    fn remove_index(&self, index_map: &IndexMap, id: RecordId, field: &str, value: &Value) -> EmberResult<()> {
        self.validate_value(field, value)?;
        for word in self.words(value) {
            index_map.remove(&Value::String(word), &id);
        }
        Ok(())
    }

    fn drop_index(&self, index_map: &IndexMap, _field: &str) -> EmberResult<()> {
        index_map.clear();
        Ok(())
    }

    fn supports(&self, lookup: &IndexLookup) -> bool {
        matches!(lookup, IndexLookup::Text(_))
    }

    fn find_by_filter(
        &self,
        index_map: &IndexMap,
        field: &str,
        lookup: &IndexLookup,
    ) -> EmberResult<BTreeSet<RecordId>> {
        let IndexLookup::Text(term) = lookup else {
            log::error!("Full-text index on {} cannot answer {}", field, lookup);
            return Err(EmberError::new(
                &format!("Full-text index on {} cannot answer {}", field, lookup),
                ErrorKind::FilterError,
            ));
        };

        let word_of = |key: &Value| key.as_string().cloned().unwrap_or_default();
        let ids = match self.parse_term(field, term)? {
            TermMatch::Words(words) => words
                .into_iter()
                .filter_map(|word| index_map.get(&Value::String(word)))
                .flatten()
                .collect(),
            TermMatch::Prefix(prefix) => index_map.ids_matching(|k| word_of(k).starts_with(&prefix)),
            TermMatch::Suffix(suffix) => index_map.ids_matching(|k| word_of(k).ends_with(&suffix)),
            TermMatch::Contains(infix) => index_map.ids_matching(|k| word_of(k).contains(&infix)),
        };
        Ok(ids)
    }
}
