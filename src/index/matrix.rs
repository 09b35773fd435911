use std::collections::BTreeMap;

use super::tokenizer::tokenize;

/// Sparse term-count matrix: one row per document, one column per vocabulary term
#[derive(Debug, Clone)]
pub struct DocumentTermMatrix {
    vocabulary: BTreeMap<String, usize>,
    /// Each row holds (column, count) pairs sorted by column
    rows: Vec<Vec<(usize, u32)>>,
}

impl DocumentTermMatrix {
    /// Builds the vocabulary from every document, then counts terms per row.
    ///
    /// Columns are assigned in lexical term order so the layout does not depend
    /// on hash iteration order.
    pub fn build<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let tokenized: Vec<Vec<String>> = documents.into_iter().map(tokenize).collect();

        let mut vocabulary: BTreeMap<String, usize> = tokenized
            .iter()
            .flatten()
            .map(|term| (term.clone(), 0))
            .collect();
        for (column, slot) in vocabulary.values_mut().enumerate() {
            *slot = column;
        }

        let rows = tokenized
            .iter()
            .map(|tokens| {
                let mut counts: BTreeMap<usize, u32> = BTreeMap::new();
                for token in tokens {
                    if let Some(&column) = vocabulary.get(token) {
                        *counts.entry(column).or_insert(0) += 1;
                    }
                }
                counts.into_iter().collect()
            })
            .collect();

        Self { vocabulary, rows }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Count of `term` in row `row`
    pub fn count(&self, row: usize, term: &str) -> u32 {
        let Some(&column) = self.vocabulary.get(term) else {
            return 0;
        };
        self.rows
            .get(row)
            .and_then(|cells| {
                cells
                    .binary_search_by_key(&column, |&(c, _)| c)
                    .ok()
                    .map(|i| cells[i].1)
            })
            .unwrap_or(0)
    }

    fn norm(&self, row: usize) -> f64 {
        self.rows[row]
            .iter()
            .map(|&(_, count)| (count as f64) * (count as f64))
            .sum::<f64>()
            .sqrt()
    }

    /// Per-column postings list: (row, count) for every row containing the term
    fn postings(&self) -> Vec<Vec<(usize, u32)>> {
        let mut postings = vec![Vec::new(); self.vocabulary.len()];
        for (row, cells) in self.rows.iter().enumerate() {
            for &(column, count) in cells {
                postings[column].push((row, count));
            }
        }
        postings
    }
}

/// Dense symmetric N×N matrix of cosine similarity scores
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    size: usize,
    scores: Vec<f64>,
}

impl SimilarityMatrix {
    /// Pairwise cosine similarity of every row pair.
    ///
    /// Dot products are accumulated through the postings lists, so each row only
    /// visits the rows it shares at least one term with. Rows with no terms score
    /// 0 against everything else; the diagonal is always 1.
    pub fn cosine(matrix: &DocumentTermMatrix) -> Self {
        let size = matrix.num_rows();
        let mut scores = vec![0f64; size * size];
        let norms: Vec<f64> = (0..size).map(|row| matrix.norm(row)).collect();
        let postings = matrix.postings();

        let mut dots = vec![0u64; size];
        for i in 0..size {
            scores[i * size + i] = 1.0;
            if norms[i] == 0.0 {
                continue;
            }

            for &(column, count) in &matrix.rows[i] {
                for &(j, other) in &postings[column] {
                    if j > i {
                        dots[j] += u64::from(count) * u64::from(other);
                    }
                }
            }

            for j in (i + 1)..size {
                let dot = std::mem::take(&mut dots[j]);
                if dot == 0 || norms[j] == 0.0 {
                    continue;
                }
                let score = ((dot as f64) / (norms[i] * norms[j])).min(1.0);
                scores[i * size + j] = score;
                scores[j * size + i] = score;
            }
        }

        Self { size, scores }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.scores[i * self.size + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.scores[i * self.size..(i + 1) * self.size]
    }
}
