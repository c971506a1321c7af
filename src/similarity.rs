//! TF-IDF similarity between an author name and email local-parts.
//!
//! The vector space is fitted on `[name, local_part_1, ..., local_part_n]`:
//!
//! - tokens are lowercased runs of two or more word characters
//! - weights are raw term counts times a smoothed IDF,
//!   `ln((1 + n) / (1 + df)) + 1`
//! - each row is L2-normalised, so cosine similarity is a dot product
//!
//! A text without any token gets the zero vector and a similarity of 0.

use crate::error::{Result, ScholarMailError};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Default token pattern: two or more word characters
const TOKEN_PATTERN: &str = r"\b\w\w+\b";

/// Best-matching email and the scores of every candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosestEmail {
    pub email: String,
    pub score: f64,
    /// One score per input email, in input order
    pub similarities: Vec<f64>,
}

/// Substring before the first `@` (the whole string if there is none).
pub fn local_part(email: &str) -> &str {
    email.split_once('@').map(|(local, _)| local).unwrap_or(email)
}

/// Sparse, L2-normalised TF-IDF rows over a fitted vocabulary.
struct TfidfSpace {
    rows: Vec<HashMap<usize, f64>>,
}

impl TfidfSpace {
    fn fit_transform(texts: &[&str]) -> Result<Self> {
        let token_re = Regex::new(TOKEN_PATTERN).map_err(|e| ScholarMailError::Parse(e.to_string()))?;

        let tokenized: Vec<Vec<String>> = texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                token_re
                    .find_iter(&lower)
                    .map(|m| m.as_str().to_string())
                    .collect()
            })
            .collect();

        // Sorted vocabulary keeps term indices deterministic
        let mut vocabulary: BTreeMap<&str, usize> = BTreeMap::new();
        for tokens in &tokenized {
            for token in tokens {
                vocabulary.entry(token.as_str()).or_insert(0);
            }
        }
        if vocabulary.is_empty() {
            return Err(ScholarMailError::EmptyVocabulary);
        }
        for (index, slot) in vocabulary.values_mut().enumerate() {
            *slot = index;
        }

        let mut document_frequency = vec![0usize; vocabulary.len()];
        let mut counts: Vec<HashMap<usize, f64>> = Vec::with_capacity(tokenized.len());
        for tokens in &tokenized {
            let mut row: HashMap<usize, f64> = HashMap::new();
            for token in tokens {
                if let Some(&term) = vocabulary.get(token.as_str()) {
                    *row.entry(term).or_insert(0.0) += 1.0;
                }
            }
            for &term in row.keys() {
                document_frequency[term] += 1;
            }
            counts.push(row);
        }

        let n = texts.len() as f64;
        let idf: Vec<f64> = document_frequency
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let rows = counts
            .into_iter()
            .map(|mut row| {
                for (term, weight) in row.iter_mut() {
                    *weight *= idf[*term];
                }
                let norm = row.values().map(|w| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for weight in row.values_mut() {
                        *weight /= norm;
                    }
                }
                row
            })
            .collect();

        Ok(Self { rows })
    }

    fn cosine(&self, a: usize, b: usize) -> f64 {
        let (left, right) = (&self.rows[a], &self.rows[b]);
        let (small, large) = if left.len() <= right.len() { (left, right) } else { (right, left) };
        small
            .iter()
            .filter_map(|(term, w)| large.get(term).map(|v| w * v))
            .sum()
    }
}

/// Cosine similarity of `name` against each email's local-part.
pub fn similarity_scores(emails: &[String], name: &str) -> Result<Vec<f64>> {
    if emails.is_empty() {
        return Err(ScholarMailError::EmptyInput);
    }

    let mut texts: Vec<&str> = Vec::with_capacity(emails.len() + 1);
    texts.push(name);
    texts.extend(emails.iter().map(|e| local_part(e)));

    let space = TfidfSpace::fit_transform(&texts)?;
    Ok((1..texts.len()).map(|i| space.cosine(0, i)).collect())
}

/// Email whose local-part is most similar to `name`; the first one wins ties.
///
/// # Errors
///
/// `EmptyInput` for an empty email list, `EmptyVocabulary` when neither the
/// name nor any local-part contains a token.
pub fn find_closest_email(emails: &[String], name: &str) -> Result<ClosestEmail> {
    let similarities = similarity_scores(emails, name)?;

    let mut best = 0;
    for (i, &score) in similarities.iter().enumerate() {
        if score > similarities[best] {
            best = i;
        }
    }

    Ok(ClosestEmail {
        email: emails[best].clone(),
        score: similarities[best],
        similarities,
    })
}
