use serde::{Deserialize, Serialize};

/// Issuer name of the trusted first-party bot.
pub const GOV_BOT_ISSUER: &str = "gov-bot";

/// Broad origin of an authenticated identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssuerTag {
    /// Token signed by the first-party governance bot.
    #[serde(rename = "gov-bot")]
    GovBot,
    /// Token signed by any other registered issuer and confirmed over OAuth.
    #[serde(rename = "foreign")]
    Foreign,
}

impl IssuerTag {
    /// Returns the stable tag value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GovBot => GOV_BOT_ISSUER,
            Self::Foreign => "foreign",
        }
    }
}

/// Caller identity resolved from a bearer credential.
///
/// Identities are produced fresh per request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    subject: String,
    issuer: IssuerTag,
}

impl Identity {
    /// Creates an identity from a verified subject and issuer tag.
    #[must_use]
    pub fn new(subject: impl Into<String>, issuer: IssuerTag) -> Self {
        Self {
            subject: subject.into(),
            issuer,
        }
    }

    /// Returns the subject (user id) carried by the credential.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the issuer tag.
    #[must_use]
    pub fn issuer(&self) -> IssuerTag {
        self.issuer
    }

    /// Returns whether the identity was issued by the trusted first-party bot.
    #[must_use]
    pub fn is_first_party(&self) -> bool {
        self.issuer == IssuerTag::GovBot
    }
}
