/// Supplies the access token for remote calls.
///
/// Token acquisition lives outside the engine; a missing token just means
/// there is nothing to do yet.
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// Token fixed at construction, typically read from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        // Blank tokens count as absent
        Self(token.filter(|t| !t.trim().is_empty()))
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}
