//! Challenge-solving hook.
//!
//! A solver key can be configured, but no solver is wired in: the hook only
//! reports that a challenge-protected page was reached with a key present.

use url::Url;

#[derive(Debug, Clone, Default)]
pub struct ChallengeHook {
    api_key: Option<String>,
}

impl ChallengeHook {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Called once navigation reached readiness.
    pub fn after_navigation(&self, url: &Url) {
        if self.is_configured() {
            tracing::debug!(url = %url, "Challenge solver key present; solving not enabled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_is_unconfigured() {
        assert!(!ChallengeHook::new(Some(String::new())).is_configured());
        assert!(!ChallengeHook::new(None).is_configured());
        assert!(ChallengeHook::new(Some("k".into())).is_configured());
    }
}
