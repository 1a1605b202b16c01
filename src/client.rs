//! Zimbra SOAP client.
//!
//! Every remote operation goes through [`ZimbraClient::call`]. A few
//! operations get special handling:
//!
//! - operations whose element name has no `Request` suffix are sent as-is,
//! - `Auth` is issued under the account namespace on mail endpoints and its
//!   token is stored in the session.

use crate::config::{ClientConfig, SoapVersion};
use crate::element::Element;
use crate::error::{Result, ZimbraError};
use crate::request::{build_request, CallOptions, Record};
use crate::session::SessionContext;
use crate::transport::{HttpTransport, SoapCall, Transport};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Name of the authentication operation.
pub const AUTH_OPERATION: &str = "Auth";

/// Operations whose element name does not end in `Request`.
pub const SUFFIXLESS_OPERATIONS: [&str; 4] = [
    "DestroyWaitSet",
    "AdminDestroyWaitSet",
    "CreateAppointmentException",
    "IMGetChatConfiguration",
];

/// Client for one Zimbra SOAP endpoint and one logical session.
///
/// Calls take `&mut self`; use one client per concurrent session.
pub struct ZimbraClient<T: Transport = HttpTransport> {
    location: String,
    soap_version: SoapVersion,
    session: SessionContext,
    transport: T,
}

impl ZimbraClient<HttpTransport> {
    /// Create a client talking HTTP to the configured endpoint.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::from_config(config)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Client for the admin interface of `server`.
    pub fn admin(server: impl Into<String>) -> Result<Self> {
        Self::new(&ClientConfig::admin(server))
    }

    /// Client for the mail interface of `server`.
    pub fn mail(server: impl Into<String>) -> Result<Self> {
        Self::new(&ClientConfig::mail(server))
    }
}

impl<T: Transport> ZimbraClient<T> {
    pub fn with_transport(config: &ClientConfig, transport: T) -> Self {
        Self {
            location: config.location(),
            soap_version: config.soap_version,
            session: SessionContext::from_config(config),
            transport,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Namespace regular calls are issued under.
    pub fn namespace(&self) -> &str {
        self.session.namespace()
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Replace the session, e.g. to resume with a stored token.
    pub fn set_session(&mut self, session: SessionContext) {
        self.session = session;
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.session.token_expires_at()
    }

    /// Turn logging of full request/response documents on or off.
    pub fn set_trace(&mut self, enabled: bool) {
        self.transport.set_trace(enabled);
    }

    /// Invoke the remote operation `name`.
    ///
    /// Returns the first element of the response body, e.g. `GetAccountResponse`.
    pub fn call(&mut self, name: &str, options: CallOptions) -> Result<Element> {
        if name == AUTH_OPERATION || name == "AuthRequest" {
            return self.auth(options);
        }

        let options = if is_suffixless(name) {
            CallOptions {
                suppress_suffix: true,
                ..options
            }
        } else {
            options
        };

        let namespace = self.session.namespace().to_string();
        self.send(name, &options, &namespace)
    }

    /// Authenticate and store the returned token in the session.
    ///
    /// On mail endpoints the request is issued under `urn:zimbraAccount`; the
    /// session keeps its own namespace.
    pub fn auth(&mut self, options: CallOptions) -> Result<Element> {
        let namespace = self.session.auth_namespace().to_string();
        let response = self.send(AUTH_OPERATION, &options, &namespace)?;

        // Only reachable with raise_faults disabled
        if response.local_name() == "Fault" {
            return Ok(response);
        }

        let token = response.child_text("authToken").ok_or_else(|| {
            ZimbraError::InvalidResponse(format!("{} has no authToken", response.name()))
        })?;
        let lifetime = match response.child_text("lifetime") {
            Some(text) => match text.trim().parse::<u64>() {
                Ok(ms) => Some(ms),
                Err(e) => {
                    warn!(lifetime = text, error = %e, "Ignoring malformed token lifetime");
                    None
                }
            },
            None => None,
        };

        self.session = self.session.authenticated(token, lifetime, Utc::now());
        info!(
            namespace = self.session.namespace(),
            lifetime_ms = ?lifetime,
            "Authenticated"
        );
        Ok(response)
    }

    /// Authenticate with an account name and password.
    pub fn auth_with_password(&mut self, account: &str, password: &str) -> Result<Element> {
        let options = CallOptions::new()
            .arg("account", Record::text(account).attr("by", "name"))
            .arg("password", password);
        let response = self.auth(options)?;
        if self.session.username().is_none() {
            self.session = self.session.clone().with_username(account);
        }
        Ok(response)
    }

    pub fn destroy_wait_set(&mut self, options: CallOptions) -> Result<Element> {
        self.call("DestroyWaitSet", options)
    }

    pub fn admin_destroy_wait_set(&mut self, options: CallOptions) -> Result<Element> {
        self.call("AdminDestroyWaitSet", options)
    }

    pub fn create_appointment_exception(&mut self, options: CallOptions) -> Result<Element> {
        self.call("CreateAppointmentException", options)
    }

    pub fn im_get_chat_configuration(&mut self, options: CallOptions) -> Result<Element> {
        self.call("IMGetChatConfiguration", options)
    }

    fn send(&self, name: &str, options: &CallOptions, namespace: &str) -> Result<Element> {
        let body = build_request(name, options);
        let header = self.session.build_header();

        debug!(
            operation = body.name(),
            namespace,
            location = %self.location,
            authenticated = self.session.auth_token().is_some(),
            "Sending SOAP request"
        );

        self.transport.send(&SoapCall {
            location: &self.location,
            namespace,
            method: body.name(),
            version: self.soap_version,
            header: &header,
            body: &body,
        })
    }
}

fn is_suffixless(name: &str) -> bool {
    SUFFIXLESS_OPERATIONS.iter().any(|op| *op == name)
}
