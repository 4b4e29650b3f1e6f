//! Topical context over the statements seen so far.
//!
//! Keeps a TF-IDF vector per attributed statement and rebuilds the
//! index in full on every insertion, so weights always reflect the
//! whole session.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// A single attributed statement.
#[derive(Debug, Clone)]
pub struct Statement {
    pub text: String,
    pub speaker: String,
}

/// TF-IDF index used to score new claims against earlier statements.
pub struct TopicIndex {
    statements: Vec<Statement>,
    terms: Vec<String>,
    term_ids: HashMap<String, usize>,
    idf: Vec<f32>,
    rows: Vec<Vec<f32>>,
    max_context_size: usize,
    topic_threshold: f32,
}

impl TopicIndex {
    pub fn new(max_context_size: usize, topic_threshold: f32) -> Self {
        Self {
            statements: Vec::new(),
            terms: Vec::new(),
            term_ids: HashMap::new(),
            idf: Vec::new(),
            rows: Vec::new(),
            max_context_size,
            topic_threshold,
        }
    }

    /// Record a statement and rebuild the index over all statements.
    pub fn add_statement(&mut self, text: &str, speaker: &str) {
        self.statements.push(Statement {
            text: text.to_string(),
            speaker: speaker.to_string(),
        });
        self.rebuild();
    }

    /// Most similar earlier statement, when its cosine similarity
    /// clears the topic threshold. Empty string otherwise.
    pub fn get_relevant_context(&self, text: &str) -> String {
        if self.statements.is_empty() {
            return String::new();
        }

        let query = self.vectorize(&tokenize(text));

        let mut best: Option<(usize, f32)> = None;
        for (index, row) in self.rows.iter().enumerate() {
            let score = dot(&query, row);
            if best.map_or(true, |(_, top)| score >= top) {
                best = Some((index, score));
            }
        }

        // Top match only; the window bounds the joined result.
        let mut context: Vec<&str> = Vec::new();
        if let Some((index, score)) = best {
            if score > self.topic_threshold {
                context.push(&self.statements[index].text);
            }
        }
        let window_start = context.len().saturating_sub(self.max_context_size);
        context[window_start..].join(" ")
    }

    /// Highest-weight terms across all statements, strongest first.
    /// Ties break toward the lexically smaller term.
    pub fn get_current_topics(&self, top_n: usize) -> Vec<String> {
        if self.statements.is_empty() {
            return Vec::new();
        }

        let mut totals = vec![0.0f32; self.terms.len()];
        for row in &self.rows {
            for (id, weight) in row.iter().enumerate() {
                totals[id] += weight;
            }
        }

        let mut ranked: Vec<(usize, f32)> = totals.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        ranked
            .into_iter()
            .take(top_n)
            .map(|(id, _)| self.terms[id].clone())
            .collect()
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    fn rebuild(&mut self) {
        let docs: Vec<Vec<String>> = self
            .statements
            .iter()
            .map(|statement| tokenize(&statement.text))
            .collect();

        let unique: BTreeSet<String> = docs.iter().flatten().cloned().collect();
        self.terms = unique.into_iter().collect();
        self.term_ids = self
            .terms
            .iter()
            .enumerate()
            .map(|(id, term)| (term.clone(), id))
            .collect();

        let mut df = vec![0u32; self.terms.len()];
        for tokens in &docs {
            let seen: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in seen {
                if let Some(&id) = self.term_ids.get(term) {
                    df[id] += 1;
                }
            }
        }

        let n_docs = docs.len() as f32;
        self.idf = df
            .iter()
            .map(|&count| ((1.0 + n_docs) / (1.0 + count as f32)).ln() + 1.0)
            .collect();

        let rows: Vec<Vec<f32>> = docs.iter().map(|tokens| self.vectorize(tokens)).collect();
        self.rows = rows;
    }

    /// L2-normalized TF-IDF row; unknown tokens contribute nothing.
    fn vectorize(&self, tokens: &[String]) -> Vec<f32> {
        let mut row = vec![0.0f32; self.terms.len()];
        for token in tokens {
            if let Some(&id) = self.term_ids.get(token.as_str()) {
                row[id] += 1.0;
            }
        }
        for (id, weight) in row.iter_mut().enumerate() {
            *weight *= self.idf[id];
        }
        normalize(&mut row);
        row
    }
}

impl Default for TopicIndex {
    fn default() -> Self {
        Self::new(5, 0.8)
    }
}

/// Lowercase word tokens of at least two characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2)
        .map(|token| token.to_lowercase())
        .collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn normalize(row: &mut [f32]) {
    let norm = row.iter().map(|w| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        for weight in row.iter_mut() {
            *weight /= norm;
        }
    }
}
