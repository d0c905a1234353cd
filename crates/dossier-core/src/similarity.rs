//! Pluggable similarity strategies over normalized values.
//!
//! A strategy that cannot judge a pair returns `None` ("not applicable")
//! rather than 0.0, so inapplicability is never counted as a negative
//! signal by the matching engine.

use crate::kinds::FieldKind;

/// A bounded similarity comparator for two normalized values of the same
/// kind.
pub trait SimilarityStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Similarity in [0, 1], or `None` when the strategy does not apply
    /// to this pair.
    fn score(&self, a: &str, b: &str) -> Option<f64>;
}

/// 1.0 on equality, otherwise not applicable.
pub struct Exact;

impl SimilarityStrategy for Exact {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn score(&self, a: &str, b: &str) -> Option<f64> {
        if a.is_empty() || b.is_empty() {
            return None;
        }
        (a == b).then_some(1.0)
    }
}

/// 1.0 on content-hash equality. Only valid for binary kinds.
pub struct HashExact;

impl SimilarityStrategy for HashExact {
    fn name(&self) -> &'static str {
        "hash_exact"
    }

    fn score(&self, a: &str, b: &str) -> Option<f64> {
        if a.is_empty() || b.is_empty() {
            return None;
        }
        (a == b).then_some(1.0)
    }
}

/// Levenshtein ratio: `1 − distance / max(len(a), len(b))`.
pub struct EditDistance;

impl SimilarityStrategy for EditDistance {
    fn name(&self) -> &'static str {
        "edit_distance"
    }

    fn score(&self, a: &str, b: &str) -> Option<f64> {
        if a.is_empty() || b.is_empty() {
            return None;
        }
        Some(strsim::normalized_levenshtein(a, b))
    }
}

/// Phonetic code equality. Name fields only.
pub struct Phonetic;

impl SimilarityStrategy for Phonetic {
    fn name(&self) -> &'static str {
        "phonetic"
    }

    fn score(&self, a: &str, b: &str) -> Option<f64> {
        let code_a = phonetic_code(a);
        let code_b = phonetic_code(b);
        if code_a.is_empty() || code_b.is_empty() {
            return None;
        }
        (code_a == code_b).then_some(1.0)
    }
}

/// Order-insensitive comparison: tokens are sorted before an edit-ratio
/// pass, so word reordering does not penalize the score. Addresses and
/// multi-word names.
pub struct TokenSet;

impl SimilarityStrategy for TokenSet {
    fn name(&self) -> &'static str {
        "token_set"
    }

    fn score(&self, a: &str, b: &str) -> Option<f64> {
        let mut tokens_a: Vec<&str> = a.split_whitespace().collect();
        let mut tokens_b: Vec<&str> = b.split_whitespace().collect();
        if tokens_a.is_empty() || tokens_b.is_empty() {
            return None;
        }
        // Single-token pairs degenerate to plain edit distance; let that
        // strategy own them.
        if tokens_a.len() < 2 && tokens_b.len() < 2 {
            return None;
        }
        tokens_a.sort_unstable();
        tokens_b.sort_unstable();
        Some(strsim::normalized_levenshtein(
            &tokens_a.join(" "),
            &tokens_b.join(" "),
        ))
    }
}

/// Per-token Soundex-style codes joined in order. Empty when the input
/// has no codable letters.
pub fn phonetic_code(s: &str) -> String {
    s.split_whitespace()
        .map(soundex)
        .filter(|code| !code.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn soundex(token: &str) -> String {
    let letters: Vec<char> = token
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if letters.is_empty() {
        return String::new();
    }

    fn digit(c: char) -> Option<char> {
        match c {
            'B' | 'F' | 'P' | 'V' => Some('1'),
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
            'D' | 'T' => Some('3'),
            'L' => Some('4'),
            'M' | 'N' => Some('5'),
            'R' => Some('6'),
            _ => None,
        }
    }

    let mut code = String::with_capacity(4);
    code.push(letters[0]);
    let mut last = digit(letters[0]);
    for &c in &letters[1..] {
        if code.len() == 4 {
            break;
        }
        // H and W are transparent: they neither code nor break a run.
        if c == 'H' || c == 'W' {
            continue;
        }
        let d = digit(c);
        if let Some(d) = d {
            if Some(d) != last {
                code.push(d);
            }
        }
        last = d;
    }
    while code.len() < 4 {
        code.push('0');
    }
    code
}

static EXACT: Exact = Exact;
static HASH_EXACT: HashExact = HashExact;
static EDIT_DISTANCE: EditDistance = EditDistance;
static PHONETIC: Phonetic = Phonetic;
static TOKEN_SET: TokenSet = TokenSet;

static NAME_STRATEGIES: [&dyn SimilarityStrategy; 4] =
    [&EXACT, &PHONETIC, &EDIT_DISTANCE, &TOKEN_SET];
static ADDRESS_STRATEGIES: [&dyn SimilarityStrategy; 2] = [&EXACT, &TOKEN_SET];
static IDENTIFIER_STRATEGIES: [&dyn SimilarityStrategy; 1] = [&EXACT];
static BINARY_STRATEGIES: [&dyn SimilarityStrategy; 1] = [&HASH_EXACT];

/// Static strategy table per field kind.
pub fn strategies_for(kind: FieldKind) -> &'static [&'static dyn SimilarityStrategy] {
    match kind {
        FieldKind::Name => &NAME_STRATEGIES,
        FieldKind::Address => &ADDRESS_STRATEGIES,
        FieldKind::File => &BINARY_STRATEGIES,
        FieldKind::Email
        | FieldKind::Phone
        | FieldKind::Username
        | FieldKind::Url
        | FieldKind::Ip
        | FieldKind::CryptoAddress => &IDENTIFIER_STRATEGIES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_is_one_or_not_applicable() {
        assert_eq!(Exact.score("a@b.com", "a@b.com"), Some(1.0));
        assert_eq!(Exact.score("a@b.com", "c@d.com"), None);
        assert_eq!(Exact.score("", ""), None);
    }

    #[test]
    fn edit_distance_matches_levenshtein_ratio() {
        // distance 3 over max length 7
        let score = EditDistance.score("kitten", "sitting").unwrap();
        assert!((score - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
        assert_eq!(EditDistance.score("", "abc"), None);
    }

    #[test]
    fn soundex_robert_rupert() {
        assert_eq!(soundex("robert"), "R163");
        assert_eq!(soundex("rupert"), "R163");
    }

    #[test]
    fn soundex_smith_smythe() {
        assert_eq!(soundex("smith"), soundex("smythe"));
    }

    #[test]
    fn phonetic_matches_per_token() {
        assert_eq!(Phonetic.score("jon doe", "john doe"), Some(1.0));
        assert_eq!(Phonetic.score("jon doe", "jane roe"), None);
        assert_eq!(Phonetic.score("123", "123"), None);
    }

    #[test]
    fn token_set_ignores_word_order() {
        let reordered = TokenSet.score("main st 123", "123 main st").unwrap();
        assert!((reordered - 1.0).abs() < 1e-9);
    }

    #[test]
    fn token_set_not_applicable_for_single_tokens() {
        assert_eq!(TokenSet.score("alice", "alicia"), None);
    }

    #[test]
    fn strategy_table_per_kind() {
        let names: Vec<_> = strategies_for(FieldKind::Name)
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, ["exact", "phonetic", "edit_distance", "token_set"]);

        let addresses: Vec<_> = strategies_for(FieldKind::Address)
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(addresses, ["exact", "token_set"]);

        let emails: Vec<_> = strategies_for(FieldKind::Email)
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(emails, ["exact"]);

        let files: Vec<_> = strategies_for(FieldKind::File)
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(files, ["hash_exact"]);
    }
}
