//! Categorical and text encoders

use serde::{Deserialize, Serialize};

/// One-hot encoding over the categories seen during fit.
/// Unseen or missing values encode as all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoding {
    pub column: String,
    pub categories: Vec<String>,
}

impl OneHotEncoding {
    /// Build from observed values; categories are sorted for a stable layout
    pub fn fit<'a>(column: &str, values: impl Iterator<Item = Option<&'a str>>) -> Self {
        let mut categories: Vec<String> = values.flatten().map(str::to_string).collect();
        categories.sort_unstable();
        categories.dedup();
        Self {
            column: column.to_string(),
            categories,
        }
    }

    pub fn width(&self) -> usize {
        self.categories.len()
    }

    /// Write the encoding of `value` into `out` (length `width()`)
    pub fn encode_into(&self, value: Option<&str>, out: &mut [f64]) {
        out.iter_mut().for_each(|v| *v = 0.0);
        if let Some(value) = value {
            if let Ok(idx) = self.categories.binary_search_by(|c| c.as_str().cmp(value)) {
                out[idx] = 1.0;
            }
        }
    }

    pub fn feature_names(&self) -> impl Iterator<Item = String> + '_ {
        self.categories
            .iter()
            .map(move |c| format!("{}={}", self.column, c))
    }
}

/// Hashed bag of lower-cased word tokens, L2-normalized per row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextHashing {
    pub column: String,
    pub n_buckets: usize,
}

impl TextHashing {
    pub fn new(column: &str, n_buckets: usize) -> Self {
        Self {
            column: column.to_string(),
            n_buckets: n_buckets.max(1),
        }
    }

    pub fn width(&self) -> usize {
        self.n_buckets
    }

    pub fn encode_into(&self, value: Option<&str>, out: &mut [f64]) {
        out.iter_mut().for_each(|v| *v = 0.0);
        let Some(text) = value else { return };

        for token in tokenize(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.n_buckets as u64) as usize;
            out[bucket] += 1.0;
        }

        let norm = out.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            out.iter_mut().for_each(|v| *v /= norm);
        }
    }

    pub fn feature_names(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.n_buckets).map(move |i| format!("{}#{}", self.column, i))
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// FNV-1a; stable across builds so saved models hash identically
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hot_known_and_unknown() {
        let enc = OneHotEncoding::fit("Sex", ["male", "female", "male"].iter().map(|s| Some(*s)));
        assert_eq!(enc.categories, vec!["female", "male"]);

        let mut out = vec![0.0; enc.width()];
        enc.encode_into(Some("male"), &mut out);
        assert_eq!(out, vec![0.0, 1.0]);

        enc.encode_into(Some("other"), &mut out);
        assert_eq!(out, vec![0.0, 0.0]);

        enc.encode_into(None, &mut out);
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn test_text_hashing_normalized() {
        let enc = TextHashing::new("Name", 16);
        let mut out = vec![0.0; 16];
        enc.encode_into(Some("Braund, Mr. Owen Harris"), &mut out);
        let norm: f64 = out.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_text_hashing_case_insensitive() {
        let enc = TextHashing::new("Name", 32);
        let mut a = vec![0.0; 32];
        let mut b = vec![0.0; 32];
        enc.encode_into(Some("MISS Laina"), &mut a);
        enc.encode_into(Some("miss, laina"), &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fnv_is_stable() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }
}
