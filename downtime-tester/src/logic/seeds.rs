use anyhow::{Result, bail};
use std::hash::Hasher;
use twox_hash::XxHash64;

const DEFAULT_SEED: u64 = 1337;

/// A resolved seed and the token it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub seed: u64,
    pub label: String,
}

impl SeedInfo {
    #[must_use]
    pub fn from_numeric(seed: u64) -> Self {
        Self {
            seed,
            label: seed.to_string(),
        }
    }

    /// Hash a word token so campaign names make stable seeds.
    #[must_use]
    pub fn from_word(word: &str) -> Self {
        let normalized = word.trim().to_lowercase();
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(normalized.as_bytes());
        Self {
            seed: hasher.finish(),
            label: normalized,
        }
    }
}

/// Resolve CLI seed tokens: integers are used as-is, words are hashed.
///
/// Duplicate seeds are dropped; an empty list falls back to the default seed.
///
/// # Errors
/// Rejects tokens that are neither integers nor plain words.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut resolved: Vec<SeedInfo> = Vec::new();

    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        let info = if let Ok(value) = token.parse::<i64>() {
            SeedInfo::from_numeric(value.unsigned_abs())
        } else if let Ok(value) = token.parse::<u64>() {
            SeedInfo::from_numeric(value)
        } else if token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            SeedInfo::from_word(token)
        } else {
            bail!("Unrecognized seed token: {token}");
        };

        if !resolved.iter().any(|existing| existing.seed == info.seed) {
            resolved.push(info);
        }
    }

    if resolved.is_empty() {
        resolved.push(SeedInfo::from_numeric(DEFAULT_SEED));
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn numeric_and_negative_tokens() {
        let seeds = resolve_seed_inputs(&tokens(&["42", "-7"])).unwrap();
        assert_eq!(seeds[0].seed, 42);
        assert_eq!(seeds[1].seed, 7);
    }

    #[test]
    fn words_hash_stably_and_ignore_case() {
        let a = SeedInfo::from_word("Waterdeep");
        let b = SeedInfo::from_word("waterdeep ");
        assert_eq!(a, b);
        assert_ne!(a.seed, SeedInfo::from_word("neverwinter").seed);
    }

    #[test]
    fn duplicates_collapse_and_empty_defaults() {
        let seeds = resolve_seed_inputs(&tokens(&["5", "5", ""])).unwrap();
        assert_eq!(seeds.len(), 1);
        let seeds = resolve_seed_inputs(&[]).unwrap();
        assert_eq!(seeds, vec![SeedInfo::from_numeric(DEFAULT_SEED)]);
    }

    #[test]
    fn punctuation_is_rejected() {
        assert!(resolve_seed_inputs(&tokens(&["a/b"])).is_err());
    }
}
