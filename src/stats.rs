//! Email frequency statistics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One distinct email and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailCount {
    pub email: String,
    pub count: usize,
}

/// Count exact-string occurrences and rank by count, highest first.
///
/// Ties keep the order in which the emails first appeared.
pub fn rank_by_frequency(emails: &[String]) -> Vec<EmailCount> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<EmailCount> = Vec::new();

    for email in emails {
        match position.get(email.as_str()) {
            Some(&i) => counts[i].count += 1,
            None => {
                position.insert(email.as_str(), counts.len());
                counts.push(EmailCount {
                    email: email.clone(),
                    count: 1,
                });
            }
        }
    }

    // Stable: first-appearance order survives among equal counts
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

/// Frequency ranking plus its top entry (`None` for empty input).
pub fn email_statistics(emails: &[String]) -> (Option<EmailCount>, Vec<EmailCount>) {
    let ranked = rank_by_frequency(emails);
    let most_frequent = ranked.first().cloned();
    (most_frequent, ranked)
}
