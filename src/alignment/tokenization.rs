use unicode_normalization::UnicodeNormalization;

use crate::pipeline::traits::RenderSurface;
use crate::types::{DocumentLeaf, RenderRef, TextToken};

/// Lowercase, NFKC-compose, then keep letters, digits and apostrophes.
///
/// Both the document and the transcript go through this so that equal words
/// compare equal regardless of case, compatibility forms or punctuation.
pub fn normalize_word(raw: &str) -> String {
    raw.to_lowercase()
        .nfkc()
        .filter(|c| c.is_alphanumeric() || *c == '\'' || *c == '\u{2019}')
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Token(usize),
    Space(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeafLayout {
    pub block: usize,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenizedDocument {
    pub tokens: Vec<TextToken>,
    pub leaves: Vec<LeafLayout>,
}

impl TokenizedDocument {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.tokens.iter().filter(|t| !t.is_skip()).count()
    }

    /// Rebuild the original text: every leaf, whitespace kept verbatim.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for leaf in &self.leaves {
            for segment in &leaf.segments {
                match segment {
                    Segment::Token(i) => out.push_str(&self.tokens[*i].raw_text),
                    Segment::Space(s) => out.push_str(s),
                }
            }
        }
        out
    }
}

pub fn tokenize_leaves(leaves: &[DocumentLeaf], generation: u64) -> TokenizedDocument {
    let mut tokens = Vec::new();
    let mut layouts = Vec::with_capacity(leaves.len());

    for leaf in leaves {
        let mut segments = Vec::new();
        for (is_space, run) in whitespace_runs(&leaf.text) {
            if is_space {
                segments.push(Segment::Space(run.to_string()));
                continue;
            }
            let index = tokens.len();
            let normalized = normalize_word(run);
            tokens.push(TextToken {
                index,
                normalized_word: (!normalized.is_empty()).then_some(normalized),
                raw_text: run.to_string(),
                block: leaf.block,
                render_ref: RenderRef {
                    ordinal: index,
                    generation,
                },
            });
            segments.push(Segment::Token(index));
        }
        layouts.push(LeafLayout {
            block: leaf.block,
            segments,
        });
    }

    debug_assert!(
        tokens.iter().enumerate().all(|(i, t)| t.index == i),
        "token indices must be contiguous in document order"
    );

    tracing::info!(
        leaves = leaves.len(),
        tokens = tokens.len(),
        skipped = tokens.iter().filter(|t| t.is_skip()).count(),
        "tokenization: document tokenized"
    );

    TokenizedDocument {
        tokens,
        leaves: layouts,
    }
}

/// Re-resolve every stale render ref by its ordinal. Returns how many were replaced.
///
/// Running it again on a fully live document changes nothing.
pub fn remap_render_refs(document: &mut TokenizedDocument, surface: &dyn RenderSurface) -> usize {
    let mut remapped = 0;
    for token in &mut document.tokens {
        if surface.is_live(&token.render_ref) {
            continue;
        }
        if let Some(fresh) = surface.resolve(token.index) {
            token.render_ref = fresh;
            remapped += 1;
        }
    }
    remapped
}

fn whitespace_runs(text: &str) -> Vec<(bool, &str)> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;
    for (pos, c) in text.char_indices() {
        let is_space = c.is_whitespace();
        match current {
            Some(kind) if kind == is_space => {}
            Some(kind) => {
                runs.push((kind, &text[start..pos]));
                start = pos;
                current = Some(is_space);
            }
            None => current = Some(is_space),
        }
    }
    if let Some(kind) = current {
        runs.push((kind, &text[start..]));
    }
    runs
}
