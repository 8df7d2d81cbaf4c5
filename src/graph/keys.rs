use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

use crate::model::Work;

/// Assigns short, deterministic display keys to works.
///
/// Keys are order-dependent: the first work to claim a base key gets it
/// bare, later collisions get a lowercase bijective base-26 suffix
/// ("Smith2020", "Smith2020a", "Smith2020b", ..., "Smith2020z",
/// "Smith2020aa").
#[derive(Debug, Default)]
pub struct GraphKeyGenerator;

impl GraphKeyGenerator {
    /// Map each work's id to its key, following input iteration order.
    pub fn assign_keys<'a, I>(&self, works: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = &'a Work>,
    {
        let mut keys: HashMap<String, String> = HashMap::new();
        let mut counts: HashMap<String, u32> = HashMap::new();

        for work in works {
            let base = base_key(work);
            let count = counts.entry(base.clone()).or_insert(0);
            let key = if *count == 0 {
                base.clone()
            } else {
                format!("{}{}", base, suffix(*count))
            };
            *count += 1;
            keys.insert(work.openalex_id.clone(), key);
        }
        keys
    }
}

fn base_key(work: &Work) -> String {
    if let Some(surname) = surname_from_authors(&work.authors) {
        let year = work
            .publication_year
            .map(|year| year.to_string())
            .unwrap_or_else(|| "0000".to_string());
        return format!("{}{}", surname, year);
    }

    let sanitized: String = work
        .openalex_id
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .collect();
    if sanitized.is_empty() {
        "Work".to_string()
    } else {
        sanitized
    }
}

/// First author's final name segment, folded to ASCII letters with the
/// first letter capitalized. None when no usable name exists.
fn surname_from_authors(authors: &[String]) -> Option<String> {
    let first_author = authors.first()?.trim();
    let last_segment = first_author.split_whitespace().last()?;
    let folded: String = last_segment
        .nfkd()
        .filter(|ch| ch.is_ascii_alphabetic())
        .collect();

    let mut chars = folded.chars();
    let head = chars.next()?;
    Some(head.to_ascii_uppercase().to_string() + chars.as_str())
}

/// Bijective base-26 counter: 1 = "a", 26 = "z", 27 = "aa".
fn suffix(mut value: u32) -> String {
    let mut letters: Vec<char> = Vec::new();
    while value > 0 {
        value -= 1;
        letters.push(char::from(b'a' + (value % 26) as u8));
        value /= 26;
    }
    letters.into_iter().rev().collect()
}
