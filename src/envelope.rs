//! SOAP envelope serialization for outgoing requests.

use crate::config::SoapVersion;
use crate::element::Element;
use crate::error::{Result, ZimbraError};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

const SOAP_ENVELOPE: &str = "soap:Envelope";
const SOAP_HEADER: &str = "soap:Header";
const SOAP_BODY: &str = "soap:Body";

/// Serialize a complete request document.
///
/// `namespace` is declared as the default namespace of the request element
/// unless the element already declares one.
pub fn build_envelope(
    version: SoapVersion,
    namespace: &str,
    header: &Element,
    body: &Element,
) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(write_error)?;

    writer
        .write_event(Event::Start(
            BytesStart::new(SOAP_ENVELOPE)
                .with_attributes([("xmlns:soap", version.envelope_namespace())]),
        ))
        .map_err(write_error)?;

    writer
        .write_event(Event::Start(BytesStart::new(SOAP_HEADER)))
        .map_err(write_error)?;
    header.write_to(&mut writer)?;
    writer
        .write_event(Event::End(BytesEnd::new(SOAP_HEADER)))
        .map_err(write_error)?;

    writer
        .write_event(Event::Start(BytesStart::new(SOAP_BODY)))
        .map_err(write_error)?;
    if body.attr("xmlns").is_some() {
        body.write_to(&mut writer)?;
    } else {
        let mut request = body.clone();
        request.set_attr("xmlns", namespace);
        request.write_to(&mut writer)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(SOAP_BODY)))
        .map_err(write_error)?;

    writer
        .write_event(Event::End(BytesEnd::new(SOAP_ENVELOPE)))
        .map_err(write_error)?;

    Ok(writer.into_inner())
}

fn write_error(e: impl std::fmt::Display) -> ZimbraError {
    ZimbraError::XmlWrite(e.to_string())
}
