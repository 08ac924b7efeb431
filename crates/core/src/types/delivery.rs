//! Webhook delivery destinations.

use core::fmt;

/// Errors that can occur when parsing a [`DeliveryMethod`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The address does not use a supported scheme.
    #[error("unsupported delivery address: {0}")]
    UnsupportedScheme(String),
    /// A `pubsub://` address is missing its project or topic.
    #[error("pub/sub address must look like pubsub://<project>:<topic>, got {0}")]
    MalformedPubSub(String),
}

/// Where Shopify delivers webhook events for a subscription.
///
/// ## Address formats
///
/// - `https://...` / `http://...` - HTTP callback
/// - `pubsub://<project>:<topic>` - Google Cloud Pub/Sub
/// - `arn:aws:events:...` - Amazon `EventBridge` partner source
///
/// ```
/// use hookgate_core::DeliveryMethod;
///
/// let dest: DeliveryMethod = "pubsub://my-project:hooks".parse().unwrap();
/// assert_eq!(dest.to_string(), "pubsub://my-project:hooks");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeliveryMethod {
    Http { callback_url: String },
    PubSub { project: String, topic: String },
    EventBridge { arn: String },
}

impl DeliveryMethod {
    const PUBSUB_SCHEME: &'static str = "pubsub://";
    const EVENTBRIDGE_PREFIX: &'static str = "arn:aws:events:";

    /// Parse a delivery address.
    ///
    /// # Errors
    ///
    /// Returns an error for unsupported schemes or malformed pub/sub addresses.
    pub fn parse(address: &str) -> Result<Self, DeliveryError> {
        if let Some(rest) = address.strip_prefix(Self::PUBSUB_SCHEME) {
            let (project, topic) = rest
                .split_once(':')
                .filter(|(p, t)| !p.is_empty() && !t.is_empty() && !t.contains(':'))
                .ok_or_else(|| DeliveryError::MalformedPubSub(address.to_string()))?;
            return Ok(Self::PubSub {
                project: project.to_string(),
                topic: topic.to_string(),
            });
        }

        if address.starts_with(Self::EVENTBRIDGE_PREFIX) {
            return Ok(Self::EventBridge {
                arn: address.to_string(),
            });
        }

        if address.starts_with("https://") || address.starts_with("http://") {
            return Ok(Self::Http {
                callback_url: address.to_string(),
            });
        }

        Err(DeliveryError::UnsupportedScheme(address.to_string()))
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::PubSub { .. } => "pubsub",
            Self::EventBridge { .. } => "eventbridge",
        }
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { callback_url } => f.write_str(callback_url),
            Self::PubSub { project, topic } => {
                write!(f, "{}{project}:{topic}", Self::PUBSUB_SCHEME)
            }
            Self::EventBridge { arn } => f.write_str(arn),
        }
    }
}

impl std::str::FromStr for DeliveryMethod {
    type Err = DeliveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
