use serde::{Deserialize, Serialize};

/// The closed set of data-item kinds the engine can match on.
///
/// Strategy selection per kind is a static table resolved at compile time
/// (see [`crate::similarity::strategies_for`]) rather than runtime dispatch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Email,
    Phone,
    Address,
    Name,
    Username,
    Url,
    Ip,
    CryptoAddress,
    /// Binary content. Matched by SHA-256 content hash, never by
    /// normalized string value.
    File,
}

impl FieldKind {
    /// Convert to u8 for storage indexing
    pub fn to_u8(self) -> u8 {
        match self {
            FieldKind::Email => 0,
            FieldKind::Phone => 1,
            FieldKind::Address => 2,
            FieldKind::Name => 3,
            FieldKind::Username => 4,
            FieldKind::Url => 5,
            FieldKind::Ip => 6,
            FieldKind::CryptoAddress => 7,
            FieldKind::File => 8,
        }
    }

    /// Convert from u8
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(FieldKind::Email),
            1 => Some(FieldKind::Phone),
            2 => Some(FieldKind::Address),
            3 => Some(FieldKind::Name),
            4 => Some(FieldKind::Username),
            5 => Some(FieldKind::Url),
            6 => Some(FieldKind::Ip),
            7 => Some(FieldKind::CryptoAddress),
            8 => Some(FieldKind::File),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Email => "email",
            FieldKind::Phone => "phone",
            FieldKind::Address => "address",
            FieldKind::Name => "name",
            FieldKind::Username => "username",
            FieldKind::Url => "url",
            FieldKind::Ip => "ip",
            FieldKind::CryptoAddress => "crypto_address",
            FieldKind::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(FieldKind::Email),
            "phone" => Some(FieldKind::Phone),
            "address" => Some(FieldKind::Address),
            "name" => Some(FieldKind::Name),
            "username" => Some(FieldKind::Username),
            "url" => Some(FieldKind::Url),
            "ip" => Some(FieldKind::Ip),
            "crypto_address" => Some(FieldKind::CryptoAddress),
            "file" => Some(FieldKind::File),
            _ => None,
        }
    }

    /// Binary kinds carry a content hash instead of a normalized value.
    pub fn is_binary(self) -> bool {
        matches!(self, FieldKind::File)
    }

    pub fn all() -> [FieldKind; 9] {
        [
            FieldKind::Email,
            FieldKind::Phone,
            FieldKind::Address,
            FieldKind::Name,
            FieldKind::Username,
            FieldKind::Url,
            FieldKind::Ip,
            FieldKind::CryptoAddress,
            FieldKind::File,
        ]
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
