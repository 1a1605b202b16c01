//! Zimbra SOAP client library.
//!
//! Builds Zimbra SOAP requests from a call name and a nested argument tree,
//! sends them over a blocking transport with the Zimbra `context` header, and
//! parses `<a n="...">` attribute records from responses.
//!
//! # Features
//!
//! - Generic requests: any operation name, `Request` suffix handled
//! - Nested arguments with attributes and repeated elements
//! - Admin (`urn:zimbraAdmin`) and mail (`urn:zimbraMail`) endpoints
//! - `Auth` token bookkeeping in an immutable session value
//! - SOAP 1.1 and 1.2 envelopes, Fault decoding
//!
//! # Example
//!
//! ```ignore
//! use zimbra_soap::{parse_attributes, CallOptions, Record, ZimbraClient};
//!
//! let mut client = ZimbraClient::admin("mail.example.com")?;
//! client.auth_with_password("admin@example.com", "secret")?;
//!
//! let response = client.call(
//!     "GetAccount",
//!     CallOptions::new().arg("account", Record::text("user@example.com").attr("by", "name")),
//! )?;
//! let account = response.child("account").unwrap();
//! let attrs = parse_attributes(account.children());
//! println!("{:?}", attrs.get("zimbraMailQuota"));
//! ```

pub mod attributes;
pub mod client;
pub mod config;
pub mod element;
pub mod envelope;
pub mod error;
pub mod parser;
pub mod request;
pub mod session;
pub mod transport;

pub use attributes::{parse_attributes, AttributeMap};
pub use client::ZimbraClient;
pub use config::{ClientConfig, Endpoint, SoapVersion};
pub use element::Element;
pub use error::{Result, SoapFault, ZimbraError};
pub use request::{build_request, Arguments, Attributes, CallOptions, Record, TagValue};
pub use session::SessionContext;
pub use transport::{HttpTransport, Transport};
