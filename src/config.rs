//! Configuration types for the Zimbra SOAP client.

use crate::error::{Result, ZimbraError};
use crate::parser::{SOAP_11_NS, SOAP_12_NS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Namespace of the admin SOAP interface.
pub const ADMIN_NAMESPACE: &str = "urn:zimbraAdmin";
/// Namespace of the mail SOAP interface.
pub const MAIL_NAMESPACE: &str = "urn:zimbraMail";
/// Namespace of the account SOAP interface (used by `Auth` on mail endpoints).
pub const ACCOUNT_NAMESPACE: &str = "urn:zimbraAccount";

/// Main configuration for a Zimbra SOAP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Host name, or a full `http(s)://` URL used as-is
    pub server: String,

    /// Port used when deriving the URL from a bare host
    pub port: Option<u16>,

    /// Which SOAP interface to talk to
    pub endpoint: Endpoint,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Log full request and response documents
    pub trace: bool,

    /// SOAP version used for requests
    pub soap_version: SoapVersion,

    /// Surface SOAP Faults as errors (otherwise the Fault element is returned)
    pub raise_faults: bool,

    /// Pre-existing auth token
    pub auth_token: Option<String>,

    /// Account id sent as `<account by="id">` in the header
    pub zimbra_id: Option<String>,

    /// Account name, informational
    pub username: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            port: None,
            endpoint: Endpoint::Admin,
            timeout_secs: 60,
            trace: false,
            soap_version: SoapVersion::Soap11,
            raise_faults: true,
            auth_token: None,
            zimbra_id: None,
            username: None,
        }
    }
}

impl ClientConfig {
    /// Admin interface configuration for `server`.
    pub fn admin(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            endpoint: Endpoint::Admin,
            ..Default::default()
        }
    }

    /// Mail interface configuration for `server`.
    pub fn mail(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            endpoint: Endpoint::Mail,
            ..Default::default()
        }
    }

    /// Parse a YAML configuration document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ZimbraError::Config(format!("Invalid configuration: {}", e)))
    }

    /// Load a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Full SOAP endpoint URL.
    pub fn location(&self) -> String {
        self.endpoint.url(&self.server, self.port)
    }

    /// Namespace requests are issued under.
    pub fn namespace(&self) -> &'static str {
        self.endpoint.namespace()
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(ZimbraError::Config("server must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ZimbraError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// The two deployment variants of the Zimbra SOAP interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// `urn:zimbraAdmin` on `/service/admin/soap`, port 7071
    #[default]
    Admin,
    /// `urn:zimbraMail` on `/service/soap`, port 443
    Mail,
}

impl Endpoint {
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Admin => ADMIN_NAMESPACE,
            Self::Mail => MAIL_NAMESPACE,
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::Admin => 7071,
            Self::Mail => 443,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Admin => "/service/admin/soap",
            Self::Mail => "/service/soap",
        }
    }

    /// Derive the endpoint URL. Servers that already carry a scheme are kept as-is.
    pub fn url(&self, server: &str, port: Option<u16>) -> String {
        if server.starts_with("http") {
            return server.to_string();
        }
        format!(
            "https://{}:{}{}",
            server,
            port.unwrap_or_else(|| self.default_port()),
            self.path()
        )
    }
}

/// SOAP versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SoapVersion {
    /// SOAP 1.1 (namespace: http://schemas.xmlsoap.org/soap/envelope/)
    #[default]
    #[serde(rename = "1.1")]
    Soap11,
    /// SOAP 1.2 (namespace: http://www.w3.org/2003/05/soap-envelope)
    #[serde(rename = "1.2")]
    Soap12,
}

impl SoapVersion {
    /// Envelope namespace URI for this version.
    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            Self::Soap11 => SOAP_11_NS,
            Self::Soap12 => SOAP_12_NS,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Soap11 => "text/xml; charset=utf-8",
            Self::Soap12 => "application/soap+xml; charset=utf-8",
        }
    }
}
