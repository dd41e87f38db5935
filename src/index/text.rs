//! In-memory word index with a small boolean query syntax.
//!
//! Text is split into lowercase words with Unicode word boundaries. Queries
//! combine words with `AND` (also implied by juxtaposition), `OR`, double
//! quoted phrases and parentheses:
//!
//! ```text
//! quick fox
//! quick OR slow
//! "brown fox" AND (lazy OR sleepy)
//! ```
//!
//! The syntax is a pest grammar (`text_query.pest`). Input it rejects, and
//! queries left with no searchable words, are reported as
//! [`QueryError::QueryParse`].

use std::collections::BTreeSet;

use ahash::AHashMap;
use parking_lot::RwLock;
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{QueryError, Result};
use crate::idset::{self, IdSet};
use crate::index::{Index, TextIndex};

fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

#[derive(Debug, Default)]
struct TextData {
    postings: AHashMap<String, BTreeSet<u64>>,
    docs: AHashMap<u64, Vec<String>>,
}

/// An in-memory full-text index.
#[derive(Debug)]
pub struct MemoryTextIndex {
    name: String,
    data: RwLock<TextData>,
}

impl MemoryTextIndex {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryTextIndex {
            name: name.into(),
            data: RwLock::new(TextData::default()),
        }
    }

    /// Index `text` for `doc_id`, replacing any previous text.
    pub fn index_doc(&self, doc_id: u64, text: &str) {
        let words = tokenize(text);
        let mut data = self.data.write();
        Self::remove_locked(&mut data, doc_id);
        if words.is_empty() {
            return;
        }
        for word in &words {
            data.postings.entry(word.clone()).or_default().insert(doc_id);
        }
        data.docs.insert(doc_id, words);
    }

    /// Remove `doc_id` from the index.
    pub fn unindex_doc(&self, doc_id: u64) {
        let mut data = self.data.write();
        Self::remove_locked(&mut data, doc_id);
    }

    fn remove_locked(data: &mut TextData, doc_id: u64) {
        let Some(words) = data.docs.remove(&doc_id) else {
            return;
        };
        for word in words {
            if let Some(ids) = data.postings.get_mut(&word) {
                ids.remove(&doc_id);
                if ids.is_empty() {
                    data.postings.remove(&word);
                }
            }
        }
    }

    /// Number of indexed documents.
    pub fn doc_count(&self) -> usize {
        self.data.read().docs.len()
    }
}

impl TextIndex for MemoryTextIndex {
    fn apply_text(&self, query: &str) -> Result<IdSet> {
        let expr = parse_query(query)?;
        let data = self.data.read();
        Ok(expr.evaluate(&data))
    }
}

impl Index for MemoryTextIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_text(&self) -> Option<&dyn TextIndex> {
        Some(self)
    }
}

/// Pest grammar parser for the word query syntax.
#[derive(Parser)]
#[grammar = "index/text_query.pest"]
struct TextQueryParser;

#[derive(Debug)]
enum Expr {
    Word(String),
    Phrase(Vec<String>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

fn parse_query(query: &str) -> Result<Expr> {
    let pairs = TextQueryParser::parse(Rule::query, query)
        .map_err(|e| QueryError::query_parse(format!("Failed to parse text query: {e}")))?;

    let expr = pairs
        .flat_map(|pair| pair.into_inner())
        .find(|pair| pair.as_rule() == Rule::or_expr)
        .and_then(build_or);
    expr.ok_or_else(|| QueryError::query_parse("text query has no searchable words"))
}

/// Operands that tokenize to no words (bare punctuation, `""`) drop out, so
/// each builder returns `None` when nothing searchable is left.
fn build_or(pair: Pair<Rule>) -> Option<Expr> {
    let items = pair
        .into_inner()
        .filter(|inner| inner.as_rule() == Rule::and_expr)
        .filter_map(build_and)
        .collect();
    combine(items, Expr::Or)
}

fn build_and(pair: Pair<Rule>) -> Option<Expr> {
    let items = pair.into_inner().filter_map(build_operand).collect();
    combine(items, Expr::And)
}

fn build_operand(pair: Pair<Rule>) -> Option<Expr> {
    match pair.as_rule() {
        Rule::group => pair.into_inner().next().and_then(build_or),
        Rule::phrase => {
            let text = pair.into_inner().next().map_or("", |inner| inner.as_str());
            let mut words = tokenize(text);
            match words.len() {
                0 => None,
                1 => words.pop().map(Expr::Word),
                _ => Some(Expr::Phrase(words)),
            }
        }
        // "brown-fox" is two words; both must be present
        Rule::word => combine(
            tokenize(pair.as_str()).into_iter().map(Expr::Word).collect(),
            Expr::And,
        ),
        _ => None,
    }
}

fn combine(mut items: Vec<Expr>, join: fn(Vec<Expr>) -> Expr) -> Option<Expr> {
    match items.len() {
        0 => None,
        1 => items.pop(),
        _ => Some(join(items)),
    }
}

impl Expr {
    fn evaluate(&self, data: &TextData) -> IdSet {
        match self {
            Expr::Word(w) => postings(data, w),
            Expr::Phrase(words) => {
                let mut candidates = postings(data, &words[0]);
                for w in &words[1..] {
                    candidates = idset::intersection(&candidates, &postings(data, w));
                }
                candidates
                    .iter()
                    .filter(|id| {
                        data.docs.get(id).is_some_and(|doc| {
                            doc.windows(words.len()).any(|win| win == &words[..])
                        })
                    })
                    .collect()
            }
            Expr::And(items) => {
                let mut result = items[0].evaluate(data);
                for item in &items[1..] {
                    if result.is_empty() {
                        break;
                    }
                    result = idset::intersection(&result, &item.evaluate(data));
                }
                result
            }
            Expr::Or(items) => {
                let sets: Vec<IdSet> = items.iter().map(|e| e.evaluate(data)).collect();
                idset::multiunion(&sets)
            }
        }
    }
}

fn postings(data: &TextData, word: &str) -> IdSet {
    data.postings
        .get(word)
        .map(|ids| IdSet::from_sorted(ids.iter().copied().collect()))
        .unwrap_or_default()
}
