//! Error types for the Zimbra SOAP client.

use thiserror::Error;

/// Zimbra SOAP client errors.
#[derive(Error, Debug)]
pub enum ZimbraError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("XML writing error: {0}")]
    XmlWrite(String),

    #[error("Invalid SOAP envelope: {0}")]
    InvalidEnvelope(String),

    #[error("{0}")]
    Fault(SoapFault),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ZimbraError>;

/// A SOAP Fault returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    /// Fault code (`soap:Client`, `soap:Sender`, ...)
    pub code: String,
    /// Human-readable reason
    pub reason: String,
    /// Zimbra error code from the fault detail, e.g. `account.AUTH_FAILED`
    pub detail_code: Option<String>,
}

impl std::fmt::Display for SoapFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SOAP fault [{}] {}", self.code, self.reason)?;
        if let Some(ref detail) = self.detail_code {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

impl From<quick_xml::Error> for ZimbraError {
    fn from(e: quick_xml::Error) -> Self {
        ZimbraError::XmlParse(e.to_string())
    }
}
