//! Canonicalization of raw values into comparable forms.
//!
//! String normalization is lossy by design: it trades information for
//! comparability, which drives both the false positives and the false
//! negatives of downstream matching. Content hashing for binary kinds is
//! exact and collision-resistant (SHA-256).

use sha2::{Digest, Sha256};

use crate::kinds::FieldKind;

/// Deployment policy for the normalizer.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Fold `user+tag@host` into `user@host`. Off by default: plus-tags
    /// distinguish real mailboxes on some providers.
    pub fold_email_tags: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            fold_email_tags: false,
        }
    }
}

impl NormalizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fold_email_tags(mut self, fold: bool) -> Self {
        self.fold_email_tags = fold;
        self
    }
}

/// Whether the input parsed cleanly or the normalizer had to degrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Clean,
    /// Malformed input. The normalized form is a best-effort guess and
    /// should be treated as a weaker match signal.
    BestEffort,
}

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub value: String,
    pub quality: Quality,
}

impl Normalized {
    fn clean(value: String) -> Self {
        Normalized {
            value,
            quality: Quality::Clean,
        }
    }

    fn best_effort(value: String) -> Self {
        Normalized {
            value,
            quality: Quality::BestEffort,
        }
    }
}

/// Canonicalize a raw value for its kind. Pure and total: malformed input
/// degrades to a best-effort form instead of failing. Returns `None` only
/// for binary kinds, which have no normalized string form (use
/// [`content_hash`] instead).
pub fn normalize(kind: FieldKind, raw: &str, config: &NormalizerConfig) -> Option<Normalized> {
    match kind {
        FieldKind::Email => Some(normalize_email(raw, config.fold_email_tags)),
        FieldKind::Phone => Some(normalize_phone(raw)),
        FieldKind::Address => Some(normalize_address(raw)),
        FieldKind::Name => Some(normalize_name(raw)),
        FieldKind::Username => Some(normalize_username(raw)),
        FieldKind::Url => Some(normalize_url(raw)),
        FieldKind::Ip => Some(normalize_ip(raw)),
        FieldKind::CryptoAddress => Some(normalize_crypto(raw)),
        FieldKind::File => None,
    }
}

/// SHA-256 of the raw bytes, hex-encoded.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn normalize_email(raw: &str, fold_tags: bool) -> Normalized {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return Normalized::best_effort(lowered);
    }

    match lowered.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            let local = if fold_tags {
                local.split('+').next().unwrap_or(local)
            } else {
                local
            };
            Normalized::clean(format!("{local}@{domain}"))
        }
        // No usable local@domain shape. Keep the lowered form so equal
        // garbage still matches equal garbage.
        _ => Normalized::best_effort(lowered),
    }
}

fn normalize_phone(raw: &str) -> Normalized {
    let trimmed = raw.trim();
    let mut digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    // A leading + marks an explicit country code. Anything else is left
    // unprefixed: guessing a country would manufacture false matches.
    if trimmed.starts_with('+') && !digits.is_empty() {
        digits.insert(0, '+');
    }
    if digits.is_empty() {
        Normalized::best_effort(trimmed.to_lowercase())
    } else {
        Normalized::clean(digits)
    }
}

const ADDRESS_ABBREVIATIONS: &[(&str, &str)] = &[
    ("street", "st"),
    ("avenue", "ave"),
    ("road", "rd"),
    ("boulevard", "blvd"),
    ("drive", "dr"),
    ("lane", "ln"),
    ("court", "ct"),
    ("place", "pl"),
    ("suite", "ste"),
    ("apartment", "apt"),
    ("floor", "fl"),
    ("north", "n"),
    ("south", "s"),
    ("east", "e"),
    ("west", "w"),
];

fn normalize_address(raw: &str) -> Normalized {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return Normalized::best_effort(lowered);
    }
    let folded = lowered
        .split_whitespace()
        .map(|token| {
            let stripped = token.trim_matches(|c: char| c == ',' || c == '.' || c == ';');
            ADDRESS_ABBREVIATIONS
                .iter()
                .find(|(long, _)| *long == stripped)
                .map(|(_, short)| *short)
                .unwrap_or(stripped)
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Normalized::clean(folded)
}

fn normalize_name(raw: &str) -> Normalized {
    let folded = fold_diacritics(&raw.trim().to_lowercase());
    let collapsed = collapse_whitespace(&folded);
    if collapsed.is_empty() {
        Normalized::best_effort(collapsed)
    } else {
        Normalized::clean(collapsed)
    }
}

fn normalize_username(raw: &str) -> Normalized {
    let lowered = raw.trim().to_lowercase();
    let stripped = lowered.strip_prefix('@').unwrap_or(&lowered);
    if stripped.is_empty() {
        Normalized::best_effort(stripped.to_string())
    } else {
        Normalized::clean(stripped.to_string())
    }
}

fn normalize_url(raw: &str) -> Normalized {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return Normalized::best_effort(lowered);
    }
    let trimmed = lowered.trim_end_matches('/').to_string();
    Normalized::clean(trimmed)
}

fn normalize_ip(raw: &str) -> Normalized {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        Normalized::best_effort(lowered)
    } else {
        Normalized::clean(lowered)
    }
}

fn normalize_crypto(raw: &str) -> Normalized {
    // Mixed case is significant (EIP-55 style checksums). Trim only.
    let trimmed = raw.trim().to_string();
    if trimmed.is_empty() {
        Normalized::best_effort(trimmed)
    } else {
        Normalized::clean(trimmed)
    }
}

/// Collapse runs of whitespace into single spaces.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fold common Latin diacritics to their ASCII base letter. Characters
/// outside the table pass through unchanged.
pub(crate) fn fold_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
            'ç' | 'ć' | 'č' => 'c',
            'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' => 'e',
            'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' => 'i',
            'ñ' | 'ń' => 'n',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => 'o',
            'ù' | 'ú' | 'û' | 'ü' | 'ū' => 'u',
            'ý' | 'ÿ' => 'y',
            'š' | 'ś' => 's',
            'ž' | 'ź' | 'ż' => 'z',
            'ł' => 'l',
            'đ' => 'd',
            'ß' => 's',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> NormalizerConfig {
        NormalizerConfig::default()
    }

    #[test]
    fn email_lowercases_and_trims() {
        let n = normalize(FieldKind::Email, "  Test@EXAMPLE.com ", &cfg()).unwrap();
        assert_eq!(n.value, "test@example.com");
        assert_eq!(n.quality, Quality::Clean);
    }

    #[test]
    fn email_tags_kept_by_default() {
        let n = normalize(FieldKind::Email, "user+news@example.com", &cfg()).unwrap();
        assert_eq!(n.value, "user+news@example.com");
    }

    #[test]
    fn email_tags_folded_when_enabled() {
        let config = NormalizerConfig::new().with_fold_email_tags(true);
        let n = normalize(FieldKind::Email, "user+news@example.com", &config).unwrap();
        assert_eq!(n.value, "user@example.com");
    }

    #[test]
    fn malformed_email_degrades_instead_of_failing() {
        let n = normalize(FieldKind::Email, "not-an-email", &cfg()).unwrap();
        assert_eq!(n.value, "not-an-email");
        assert_eq!(n.quality, Quality::BestEffort);
    }

    #[test]
    fn phone_strips_punctuation_keeps_plus() {
        let n = normalize(FieldKind::Phone, "+44 (0) 20 7946-0958", &cfg()).unwrap();
        assert_eq!(n.value, "+4402079460958");
        assert_eq!(n.quality, Quality::Clean);
    }

    #[test]
    fn phone_without_country_code_stays_unprefixed() {
        let n = normalize(FieldKind::Phone, "(555) 123-4567", &cfg()).unwrap();
        assert_eq!(n.value, "5551234567");
    }

    #[test]
    fn address_abbreviates_and_collapses() {
        let n = normalize(
            FieldKind::Address,
            "123  North Main Street,  Suite 4",
            &cfg(),
        )
        .unwrap();
        assert_eq!(n.value, "123 n main st ste 4");
    }

    #[test]
    fn name_folds_diacritics_and_case() {
        let n = normalize(FieldKind::Name, "  José   GARCÍA ", &cfg()).unwrap();
        assert_eq!(n.value, "jose garcia");
    }

    #[test]
    fn username_strips_at_sign() {
        let n = normalize(FieldKind::Username, "@JohnDoe", &cfg()).unwrap();
        assert_eq!(n.value, "johndoe");
    }

    #[test]
    fn url_drops_trailing_slash() {
        let n = normalize(FieldKind::Url, "HTTPS://Example.com/path/", &cfg()).unwrap();
        assert_eq!(n.value, "https://example.com/path");
    }

    #[test]
    fn crypto_preserves_case() {
        let n = normalize(
            FieldKind::CryptoAddress,
            " 0xAbC123dEf456AbC123dEf456AbC123dEf456AbC1 ",
            &cfg(),
        )
        .unwrap();
        assert_eq!(n.value, "0xAbC123dEf456AbC123dEf456AbC123dEf456AbC1");
    }

    #[test]
    fn file_has_no_normalized_form() {
        assert!(normalize(FieldKind::File, "ignored", &cfg()).is_none());
    }

    #[test]
    fn content_hash_is_stable_sha256() {
        let h = content_hash(b"hello world");
        assert_eq!(
            h,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(content_hash(b"hello world"), h);
        assert_ne!(content_hash(b"hello worlds"), h);
    }
}
