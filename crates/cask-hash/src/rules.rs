use std::collections::BTreeSet;

use cask_types::{MediaType, TypeError};

use crate::error::{HashError, HashResult};

/// Synonym pairs accepted out of the box.
///
/// Text formats the sniffer cannot tell apart from plain text are listed
/// alongside the historical aliases. ZIP-based formats accept a bare
/// `application/zip` sniff for files whose telling entries lie past the
/// sniff window.
pub const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("text/plain", "application/octet-stream"),
    ("image/jpeg", "image/jpg"),
    ("application/zip", "application/x-zip-compressed"),
    ("application/json", "text/plain"),
    ("text/csv", "text/plain"),
    ("text/markdown", "text/plain"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "application/zip",
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "application/zip",
    ),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "application/zip",
    ),
    ("application/vnd.oasis.opendocument.text", "application/zip"),
    ("application/vnd.oasis.opendocument.spreadsheet", "application/zip"),
    ("application/vnd.oasis.opendocument.presentation", "application/zip"),
    ("application/epub+zip", "application/zip"),
    ("application/java-archive", "application/zip"),
];

/// Equivalence between a declared and a sniffed media type.
///
/// Two types are compatible when their essences are equal or when the pair
/// has been registered as synonyms. Synonymy is symmetric but not
/// transitive: `application/json ≡ text/plain` and
/// `text/plain ≡ application/octet-stream` do not make JSON an octet stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaTypeRules {
    synonyms: BTreeSet<(MediaType, MediaType)>,
}

impl MediaTypeRules {
    /// Rules that accept exact matches only.
    pub fn exact() -> Self {
        Self {
            synonyms: BTreeSet::new(),
        }
    }

    /// Build rules from string pairs, validating each media type.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut rules = Self::exact();
        for (a, b) in pairs {
            rules.add_synonym(MediaType::parse(a)?, MediaType::parse(b)?);
        }
        Ok(rules)
    }

    pub fn add_synonym(&mut self, a: MediaType, b: MediaType) {
        self.synonyms.insert(ordered(a, b));
    }

    pub fn with_synonym(mut self, a: MediaType, b: MediaType) -> Self {
        self.add_synonym(a, b);
        self
    }

    pub fn len(&self) -> usize {
        self.synonyms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synonyms.is_empty()
    }

    pub fn are_compatible(&self, declared: &MediaType, sniffed: &MediaType) -> bool {
        declared == sniffed
            || self
                .synonyms
                .contains(&ordered(declared.clone(), sniffed.clone()))
    }

    /// Fail with [`HashError::ContentMismatch`] unless the types are compatible.
    pub fn check(&self, declared: &MediaType, sniffed: &MediaType) -> HashResult<()> {
        if self.are_compatible(declared, sniffed) {
            return Ok(());
        }
        tracing::debug!(%declared, %sniffed, "media type mismatch");
        Err(HashError::ContentMismatch {
            declared: declared.clone(),
            sniffed: sniffed.clone(),
        })
    }
}

impl Default for MediaTypeRules {
    fn default() -> Self {
        let mut rules = Self::exact();
        for (a, b) in DEFAULT_SYNONYMS {
            rules.add_synonym(MediaType::from_static(a), MediaType::from_static(b));
        }
        rules
    }
}

fn ordered(a: MediaType, b: MediaType) -> (MediaType, MediaType) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mt(s: &str) -> MediaType {
        MediaType::parse(s).unwrap()
    }

    #[test]
    fn exact_match_always_compatible() {
        let rules = MediaTypeRules::exact();
        assert!(rules.are_compatible(&mt("image/png"), &mt("image/png")));
        assert!(!rules.are_compatible(&mt("image/png"), &mt("image/gif")));
    }

    #[test]
    fn default_synonyms_are_symmetric() {
        let rules = MediaTypeRules::default();
        assert!(rules.are_compatible(&mt("text/plain"), &mt("application/octet-stream")));
        assert!(rules.are_compatible(&mt("application/octet-stream"), &mt("text/plain")));
        assert!(rules.are_compatible(&mt("image/jpg"), &mt("image/jpeg")));
        assert!(rules.are_compatible(
            &mt("application/x-zip-compressed"),
            &mt("application/zip")
        ));
    }

    #[test]
    fn synonyms_are_not_transitive() {
        let rules = MediaTypeRules::default();
        assert!(!rules.are_compatible(&mt("application/json"), &mt("application/octet-stream")));
    }

    #[test]
    fn zip_based_formats_accept_a_generic_zip_sniff() {
        let rules = MediaTypeRules::default();
        let docx = mt("application/vnd.openxmlformats-officedocument.wordprocessingml.document");
        let xlsx = mt("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet");
        assert!(rules.check(&docx, &mt("application/zip")).is_ok());
        assert!(rules.check(&xlsx, &mt("application/zip")).is_ok());
        assert!(rules.check(&mt("application/epub+zip"), &mt("application/zip")).is_ok());
        // A refined sniff still has to agree with the declaration.
        assert!(rules.check(&docx, &xlsx).is_err());
        assert!(rules.check(&docx, &mt("application/pdf")).is_err());
    }

    #[test]
    fn png_declared_pdf_sniffed_is_mismatch() {
        let err = MediaTypeRules::default()
            .check(&mt("image/png"), &mt("application/pdf"))
            .unwrap_err();
        match err {
            HashError::ContentMismatch { declared, sniffed } => {
                assert_eq!(declared.as_str(), "image/png");
                assert_eq!(sniffed.as_str(), "application/pdf");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn from_pairs_validates() {
        let rules = MediaTypeRules::from_pairs([("audio/x-wav", "audio/wav")]).unwrap();
        assert_eq!(rules.len(), 1);
        assert!(rules.are_compatible(&mt("audio/wav"), &mt("audio/x-wav")));
        assert!(MediaTypeRules::from_pairs([("nonsense", "audio/wav")]).is_err());
    }
}
