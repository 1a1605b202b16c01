//! Blocking SOAP transport.

use crate::config::{ClientConfig, SoapVersion};
use crate::element::Element;
use crate::envelope::build_envelope;
use crate::error::{Result, ZimbraError};
use crate::parser::parse_soap_envelope;
use crate::session::USER_AGENT_NAME;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, warn};

/// Log target for full request/response documents.
pub const TRACE_TARGET: &str = "zimbra_soap::transport";

/// One SOAP round trip.
#[derive(Debug, Clone, Copy)]
pub struct SoapCall<'a> {
    /// Endpoint URL
    pub location: &'a str,
    /// Namespace the request element is issued under
    pub namespace: &'a str,
    /// Request element name, e.g. `GetAccountRequest`
    pub method: &'a str,
    pub version: SoapVersion,
    /// Header content (the Zimbra `context` element)
    pub header: &'a Element,
    /// Request element
    pub body: &'a Element,
}

/// Performs one blocking SOAP call and returns the first element of the
/// response body.
pub trait Transport {
    fn send(&self, call: &SoapCall<'_>) -> Result<Element>;

    /// Enable or disable logging of full documents.
    fn set_trace(&mut self, _enabled: bool) {}
}

/// HTTP transport backed by reqwest's blocking client.
pub struct HttpTransport {
    client: Client,
    raise_faults: bool,
    trace: bool,
}

impl HttpTransport {
    pub fn new(timeout: Duration, raise_faults: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("{}/{}", USER_AGENT_NAME, env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            raise_faults,
            trace: false,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut transport =
            Self::new(Duration::from_secs(config.timeout_secs), config.raise_faults)?;
        transport.trace = config.trace;
        Ok(transport)
    }
}

impl Transport for HttpTransport {
    fn send(&self, call: &SoapCall<'_>) -> Result<Element> {
        let document = build_envelope(call.version, call.namespace, call.header, call.body)?;

        if self.trace {
            debug!(
                target: TRACE_TARGET,
                location = call.location,
                "Request document:\n{}",
                String::from_utf8_lossy(&document)
            );
        }

        let mut request = self
            .client
            .post(call.location)
            .header(CONTENT_TYPE, call.version.content_type());
        if call.version == SoapVersion::Soap11 {
            request = request.header(
                "SOAPAction",
                format!("\"{}#{}\"", call.namespace, call.method),
            );
        }

        let response = request.body(document).send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?;

        if self.trace {
            debug!(
                target: TRACE_TARGET,
                status,
                "Response document:\n{}",
                String::from_utf8_lossy(&body)
            );
        }

        decode_response(status, &body, self.raise_faults)
    }

    fn set_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }
}

/// Turn an HTTP response into the first element of its SOAP body.
///
/// Zimbra reports faults with a 500 status and a SOAP body, so the body is
/// decoded before the status is looked at.
pub fn decode_response(status: u16, body: &[u8], raise_faults: bool) -> Result<Element> {
    let envelope = match parse_soap_envelope(body) {
        Ok(envelope) => envelope,
        Err(e) if !(200..300).contains(&status) => {
            warn!(status, error = %e, "Non-SOAP error response");
            return Err(ZimbraError::HttpStatus {
                status,
                body: String::from_utf8_lossy(body).into_owned(),
            });
        }
        Err(e) => return Err(e),
    };

    if let Some(fault) = envelope.fault() {
        warn!(
            code = %fault.code,
            reason = %fault.reason,
            detail = fault.detail_code.as_deref().unwrap_or(""),
            "SOAP fault received"
        );
        if raise_faults {
            return Err(ZimbraError::Fault(fault));
        }
    }

    envelope
        .into_response()
        .ok_or_else(|| ZimbraError::InvalidResponse("Empty SOAP Body".to_string()))
}
