use std::collections::BTreeMap;

use cask_types::OwnerId;
use tracing::debug;

use crate::error::{SdkError, SdkResult};

/// What a caller presented to identify itself.
#[derive(Clone, Debug)]
pub enum Credentials {
    Bearer(String),
    Anonymous,
}

/// Resolves inbound credentials to the owner they act for.
pub trait PrincipalResolver: Send + Sync {
    /// The owner for `credentials`, or `Unauthenticated`.
    fn resolve(&self, credentials: &Credentials) -> SdkResult<OwnerId>;
}

/// Fixed bearer-token table, typically from the `principals` config section.
#[derive(Clone, Debug, Default)]
pub struct StaticTokens {
    tokens: BTreeMap<String, OwnerId>,
}

impl StaticTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a token → owner id table, validating each owner id.
    pub fn from_table(table: &BTreeMap<String, String>) -> SdkResult<Self> {
        let mut tokens = Self::new();
        for (token, owner) in table {
            tokens.insert(token.clone(), OwnerId::new(owner.as_str())?);
        }
        Ok(tokens)
    }

    pub fn insert(&mut self, token: impl Into<String>, owner: OwnerId) {
        self.tokens.insert(token.into(), owner);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl PrincipalResolver for StaticTokens {
    fn resolve(&self, credentials: &Credentials) -> SdkResult<OwnerId> {
        match credentials {
            Credentials::Anonymous => Err(SdkError::Unauthenticated(
                "credentials required".into(),
            )),
            Credentials::Bearer(token) => match self.tokens.get(token) {
                Some(owner) => {
                    debug!(%owner, "resolved bearer token");
                    Ok(owner.clone())
                }
                None => Err(SdkError::Unauthenticated("unknown token".into())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn table() -> BTreeMap<String, String> {
        let mut t = BTreeMap::new();
        t.insert("tok-alice".to_string(), "alice".to_string());
        t.insert("tok-bob".to_string(), "bob".to_string());
        t
    }

    #[test]
    fn known_token_resolves() {
        let tokens = StaticTokens::from_table(&table()).unwrap();
        assert_eq!(tokens.len(), 2);
        let owner = tokens
            .resolve(&Credentials::Bearer("tok-bob".into()))
            .unwrap();
        assert_eq!(owner.as_str(), "bob");
    }

    #[test]
    fn unknown_token_and_anonymous_are_unauthenticated() {
        let tokens = StaticTokens::from_table(&table()).unwrap();
        let err = tokens
            .resolve(&Credentials::Bearer("stolen".into()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
        let err = tokens.resolve(&Credentials::Anonymous).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    }

    #[test]
    fn blank_owner_in_table_rejected() {
        let mut t = table();
        t.insert("tok-nobody".into(), "  ".into());
        assert!(StaticTokens::from_table(&t).is_err());
    }
}
