//! Session state and SOAP header construction.
//!
//! A [`SessionContext`] is an immutable value. Calls that change session
//! state (authentication) produce a new context which the client swaps in
//! as a whole.

use crate::config::{ClientConfig, ACCOUNT_NAMESPACE, MAIL_NAMESPACE};
use crate::element::Element;
use chrono::{DateTime, Duration, Utc};

/// Name reported in the `userAgent` header element.
pub const USER_AGENT_NAME: &str = "zimbra-soap";

/// Namespace of the Zimbra header `context` element.
pub const CONTEXT_NAMESPACE: &str = "urn:zimbra";

/// Client identity sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent {
    pub name: String,
    pub version: String,
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            name: USER_AGENT_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Authentication and identity state of one logical session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    namespace: String,
    auth_token: Option<String>,
    /// Token lifetime in milliseconds, as reported by the server
    auth_token_lifetime: Option<u64>,
    authenticated_at: Option<DateTime<Utc>>,
    zimbra_id: Option<String>,
    username: Option<String>,
    user_agent: UserAgent,
}

impl SessionContext {
    /// Unauthenticated session issuing requests under `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            auth_token: None,
            auth_token_lifetime: None,
            authenticated_at: None,
            zimbra_id: None,
            username: None,
            user_agent: UserAgent::default(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            auth_token: config.auth_token.clone(),
            zimbra_id: config.zimbra_id.clone(),
            username: config.username.clone(),
            ..Self::new(config.namespace())
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn auth_token_lifetime(&self) -> Option<u64> {
        self.auth_token_lifetime
    }

    pub fn authenticated_at(&self) -> Option<DateTime<Utc>> {
        self.authenticated_at
    }

    pub fn zimbra_id(&self) -> Option<&str> {
        self.zimbra_id.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn user_agent(&self) -> &UserAgent {
        &self.user_agent
    }

    pub fn with_auth_token(self, token: impl Into<String>) -> Self {
        Self {
            auth_token: Some(token.into()),
            ..self
        }
    }

    pub fn with_zimbra_id(self, zimbra_id: impl Into<String>) -> Self {
        Self {
            zimbra_id: Some(zimbra_id.into()),
            ..self
        }
    }

    pub fn with_username(self, username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..self
        }
    }

    pub fn with_user_agent(self, user_agent: UserAgent) -> Self {
        Self { user_agent, ..self }
    }

    /// Session after a successful `Auth`.
    pub fn authenticated(
        &self,
        token: impl Into<String>,
        lifetime: Option<u64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            auth_token: Some(token.into()),
            auth_token_lifetime: lifetime,
            authenticated_at: Some(now),
            ..self.clone()
        }
    }

    /// Namespace the `Auth` call is issued under.
    ///
    /// Mail sessions authenticate through the account service.
    pub fn auth_namespace(&self) -> &str {
        if self.namespace == MAIL_NAMESPACE {
            ACCOUNT_NAMESPACE
        } else {
            &self.namespace
        }
    }

    /// When the current token expires, if the server reported a lifetime.
    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        let lifetime = i64::try_from(self.auth_token_lifetime?).ok()?;
        self.authenticated_at?
            .checked_add_signed(Duration::try_milliseconds(lifetime)?)
    }

    pub fn is_token_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at().is_some_and(|expires| now >= expires)
    }

    /// Build the `<context xmlns="urn:zimbra">` header element.
    pub fn build_header(&self) -> Element {
        let mut context = Element::new("context").with_attr("xmlns", CONTEXT_NAMESPACE);
        context.add_child("nosession");
        let user_agent = context.add_child("userAgent");
        user_agent.set_attr("name", &self.user_agent.name);
        user_agent.set_attr("version", &self.user_agent.version);
        if let Some(ref token) = self.auth_token {
            context.add_child_with_text("authToken", token.as_str());
        }
        if let Some(ref zimbra_id) = self.zimbra_id {
            context
                .add_child_with_text("account", zimbra_id.as_str())
                .set_attr("by", "id");
        }
        context
    }
}
