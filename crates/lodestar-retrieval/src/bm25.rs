use std::collections::HashMap;

/// BM25 parameters.
const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Tokenize text for keyword scoring.
///
/// Splits camelCase and snake_case identifiers into words, lowercases,
/// and drops tokens of two characters or fewer.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut spaced = String::with_capacity(text.len() + 8);
    let mut prev_lower = false;
    for c in text.chars() {
        if c.is_uppercase() && prev_lower {
            spaced.push(' ');
        }
        prev_lower = c.is_lowercase();
        spaced.push(c);
    }

    spaced
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 2)
        .collect()
}

/// A BM25 inverted index over a snapshot of the chunk corpus.
///
/// The index may be empty (never built, or built from an empty corpus); all
/// queries against an empty index return no hits rather than failing.
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    /// term -> (doc_id -> term_frequency)
    inverted_index: HashMap<String, HashMap<String, f32>>,
    /// doc_id -> document length (token count)
    doc_lengths: HashMap<String, f32>,
    avg_doc_length: f32,
}

impl Bm25Index {
    /// Create a new, empty BM25 index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh index from `(id, text)` pairs, replacing nothing in place.
    /// The average document length is computed once, after every document is in.
    pub fn build<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut index = Self::new();
        for (id, text) in documents {
            index.index_document(id, text);
        }
        index.recompute_avg_doc_length();
        index
    }

    /// Add a document to the index. Re-adding an id replaces its postings.
    pub fn add_document(&mut self, id: &str, text: &str) {
        self.index_document(id, text);
        self.recompute_avg_doc_length();
    }

    fn index_document(&mut self, id: &str, text: &str) {
        if self.doc_lengths.contains_key(id) {
            self.drop_postings(id);
        }

        let tokens = tokenize(text);
        let mut term_freq: HashMap<String, f32> = HashMap::new();
        for token in &tokens {
            *term_freq.entry(token.clone()).or_insert(0.0) += 1.0;
        }

        for (term, freq) in term_freq {
            self.inverted_index
                .entry(term)
                .or_default()
                .insert(id.to_string(), freq);
        }

        self.doc_lengths.insert(id.to_string(), tokens.len() as f32);
    }

    /// Remove a document from the index.
    pub fn remove_document(&mut self, id: &str) {
        if self.drop_postings(id) {
            self.recompute_avg_doc_length();
        }
    }

    fn drop_postings(&mut self, id: &str) -> bool {
        if self.doc_lengths.remove(id).is_none() {
            return false;
        }
        self.inverted_index.retain(|_, postings| {
            postings.remove(id);
            !postings.is_empty()
        });
        true
    }

    /// Raw BM25 scores for pre-tokenized query terms, unsorted.
    ///
    /// ```text
    /// score = sum over query terms of:
    ///   IDF(t) * (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * dl / avgdl))
    /// IDF(t) = ln((N - df + 0.5) / (df + 0.5) + 1.0)
    /// ```
    pub fn score(&self, tokens: &[String]) -> Vec<(String, f32)> {
        if self.is_empty() || tokens.is_empty() {
            return Vec::new();
        }

        let n = self.doc_lengths.len() as f32;
        let avgdl = if self.avg_doc_length > 0.0 {
            self.avg_doc_length
        } else {
            1.0
        };
        let mut scores: HashMap<&str, f32> = HashMap::new();

        for token in tokens {
            let Some(postings) = self.inverted_index.get(token) else {
                continue;
            };
            let df = postings.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for (doc_id, &tf) in postings {
                let dl = self.doc_lengths.get(doc_id).copied().unwrap_or(0.0);
                let numerator = tf * (K1 + 1.0);
                let denominator = tf + K1 * (1.0 - B + B * dl / avgdl);
                *scores.entry(doc_id.as_str()).or_insert(0.0) += idf * numerator / denominator;
            }
        }

        scores
            .into_iter()
            .filter(|(_, s)| *s > 0.0)
            .map(|(id, s)| (id.to_string(), s))
            .collect()
    }

    /// Search the index, returning up to `top_k` hits sorted by descending
    /// score, normalized so the best hit scores 1.0. Ties order by id.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(String, f32)> {
        let mut results = self.score(&tokenize(query));
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results.truncate(top_k);

        if let Some(max) = results.first().map(|(_, s)| *s) {
            if max > 0.0 {
                for (_, score) in &mut results {
                    *score /= max;
                }
            }
        }
        results
    }

    /// Return the number of documents currently in the index.
    pub fn document_count(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    fn recompute_avg_doc_length(&mut self) {
        if self.doc_lengths.is_empty() {
            self.avg_doc_length = 0.0;
        } else {
            let total: f32 = self.doc_lengths.values().sum();
            self.avg_doc_length = total / self.doc_lengths.len() as f32;
        }
    }
}
