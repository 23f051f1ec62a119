use std::sync::LazyLock;

use regex::Regex;

use super::AnonymizeError;

/// Kinds of personally-identifiable fragments the anonymizer detects.
/// `as_str` doubles as the placeholder tag (`<TAX_ID_1>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    TaxId,
    Phone,
    Money,
    Date,
    Email,
    PostalCode,
    Institution,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaxId => "TAX_ID",
            Self::Phone => "PHONE",
            Self::Money => "MONEY",
            Self::Date => "DATE",
            Self::Email => "EMAIL",
            Self::PostalCode => "POSTAL_CODE",
            Self::Institution => "INSTITUTION",
        }
    }

    pub fn all() -> &'static [EntityType] {
        &[
            Self::TaxId,
            Self::Phone,
            Self::Money,
            Self::Date,
            Self::Email,
            Self::PostalCode,
            Self::Institution,
        ]
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A detector producing the exact substrings of one entity type found in a
/// text. Implementations must not hold mutable state across calls; the
/// anonymizer may run them from multiple chunks in any order.
pub trait Recognizer: Send + Sync {
    fn entity_type(&self) -> EntityType;
    fn detect(&self, text: &str) -> Result<Vec<String>, AnonymizeError>;
}

static TAX_ID: LazyLock<Regex> = LazyLock::new(|| {
    // Company registrations (00.000.000/0000-00) and personal tax ids
    // (000.000.000-00).
    Regex::new(r"\b\d{2}\.\d{3}\.\d{3}/\d{4}-\d{2}\b|\b\d{3}\.\d{3}\.\d{3}-\d{2}\b").unwrap()
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+\d{2}\s?)?\(?\d{2}\)?\s?\d{4,5}-\d{4}\b").unwrap()
});

static MONEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:R\$|US\$|\$|€)\s?\d{1,3}(?:\.\d{3})*(?:,\d{2})?").unwrap()
});

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,2}/\d{1,2}/\d{4}\b|\b\d{4}-\d{2}-\d{2}\b").unwrap()
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});

static POSTAL_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{5}-\d{3}\b").unwrap()
});

/// Regex-based recognizer for structured identifiers.
pub struct RegexRecognizer {
    entity_type: EntityType,
    pattern: &'static Regex,
}

impl RegexRecognizer {
    pub fn tax_id() -> Self {
        Self { entity_type: EntityType::TaxId, pattern: &TAX_ID }
    }

    pub fn phone() -> Self {
        Self { entity_type: EntityType::Phone, pattern: &PHONE }
    }

    pub fn money() -> Self {
        Self { entity_type: EntityType::Money, pattern: &MONEY }
    }

    pub fn date() -> Self {
        Self { entity_type: EntityType::Date, pattern: &DATE }
    }

    pub fn email() -> Self {
        Self { entity_type: EntityType::Email, pattern: &EMAIL }
    }

    pub fn postal_code() -> Self {
        Self { entity_type: EntityType::PostalCode, pattern: &POSTAL_CODE }
    }
}

impl Recognizer for RegexRecognizer {
    fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    fn detect(&self, text: &str) -> Result<Vec<String>, AnonymizeError> {
        let mut found: Vec<String> = Vec::new();
        for m in self.pattern.find_iter(text) {
            let s = m.as_str().to_string();
            if !found.contains(&s) {
                found.push(s);
            }
        }
        Ok(found)
    }
}

/// Deny-list recognizer for known institution names (exact, case-sensitive
/// occurrences; these are proper names as registered).
pub struct DenyListRecognizer {
    names: Vec<String>,
}

impl DenyListRecognizer {
    pub fn new(names: Vec<String>) -> Self {
        // Longest first so "Banco Alfa S.A." wins over "Banco Alfa".
        let mut names = names;
        names.sort_by(|a, b| b.len().cmp(&a.len()));
        Self { names }
    }
}

impl Recognizer for DenyListRecognizer {
    fn entity_type(&self) -> EntityType {
        EntityType::Institution
    }

    fn detect(&self, text: &str) -> Result<Vec<String>, AnonymizeError> {
        Ok(self
            .names
            .iter()
            .filter(|name| !name.is_empty() && text.contains(name.as_str()))
            .cloned()
            .collect())
    }
}

/// The full production recognizer set.
pub fn default_recognizers(institution_names: Vec<String>) -> Vec<Box<dyn Recognizer>> {
    vec![
        Box::new(RegexRecognizer::tax_id()),
        Box::new(RegexRecognizer::phone()),
        Box::new(RegexRecognizer::money()),
        Box::new(RegexRecognizer::date()),
        Box::new(RegexRecognizer::email()),
        Box::new(RegexRecognizer::postal_code()),
        Box::new(DenyListRecognizer::new(institution_names)),
    ]
}
