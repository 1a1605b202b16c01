//! SOAP XML parsing utilities.
//!
//! Uses quick-xml, which never expands entities. Documents carrying a DOCTYPE
//! are rejected outright.

use crate::config::SoapVersion;
use crate::element::Element;
use crate::error::{Result, SoapFault, ZimbraError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// SOAP namespace URIs.
pub const SOAP_11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// Decoded SOAP envelope.
#[derive(Debug, Clone)]
pub struct SoapEnvelope {
    /// Detected SOAP version
    pub version: SoapVersion,
    /// SOAP Header (if present)
    pub header: Option<Element>,
    /// SOAP Body
    pub body: Element,
}

impl SoapEnvelope {
    /// The Fault element, if the body carries one.
    pub fn fault_element(&self) -> Option<&Element> {
        self.body.child("Fault")
    }

    /// Decoded fault, if the body carries one.
    pub fn fault(&self) -> Option<SoapFault> {
        self.fault_element().map(extract_fault)
    }

    /// First element of the body: the `...Response` element, or the Fault.
    pub fn into_response(self) -> Option<Element> {
        self.body.children().first().cloned()
    }
}

/// Parse raw bytes into an element tree.
pub fn parse_document(data: &[u8]) -> Result<Element> {
    let xml_str = std::str::from_utf8(data)
        .map_err(|e| ZimbraError::XmlParse(format!("Invalid UTF-8: {}", e)))?;

    let mut reader = Reader::from_str(xml_str);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                stack.push(element_from_start(e)?);
            }

            Ok(Event::Empty(ref e)) => {
                // Self-closing tags like <nosession/>
                let element = element_from_start(e)?;
                attach(&mut stack, &mut root, element)?;
            }

            Ok(Event::End(_)) => {
                let element = stack.pop().ok_or_else(|| {
                    ZimbraError::XmlParse("Unexpected closing tag".to_string())
                })?;
                attach(&mut stack, &mut root, element)?;
            }

            Ok(Event::Text(ref e)) => {
                if let Some(current) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|e| ZimbraError::XmlParse(e.to_string()))?;
                    // Indentation between elements; real text is kept verbatim
                    if !text.trim().is_empty() {
                        current.append_text(&text);
                    }
                }
            }

            Ok(Event::CData(ref e)) => {
                if let Some(current) = stack.last_mut() {
                    current.append_text(&String::from_utf8_lossy(e));
                }
            }

            // ENTITY declarations can only appear inside a DOCTYPE
            Ok(Event::DocType(_)) => {
                return Err(ZimbraError::XmlParse(
                    "DOCTYPE declarations are not allowed".to_string(),
                ));
            }

            Ok(Event::Eof) => break,

            Err(e) => {
                return Err(ZimbraError::XmlParse(format!(
                    "XML parse error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }

            _ => {}
        }

        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(ZimbraError::XmlParse(format!(
            "Unclosed element <{}>",
            open.name()
        )));
    }

    root.ok_or_else(|| ZimbraError::XmlParse("Document has no root element".to_string()))
}

/// Parse raw bytes as a SOAP envelope.
pub fn parse_soap_envelope(data: &[u8]) -> Result<SoapEnvelope> {
    let root = parse_document(data)?;

    if root.local_name() != "Envelope" {
        return Err(ZimbraError::InvalidEnvelope(format!(
            "Expected Envelope root element, found <{}>",
            root.name()
        )));
    }

    let version = match envelope_namespace(&root) {
        Some(SOAP_11_NS) => SoapVersion::Soap11,
        Some(SOAP_12_NS) => SoapVersion::Soap12,
        Some(other) => {
            return Err(ZimbraError::InvalidEnvelope(format!(
                "Unsupported SOAP namespace: {}",
                other
            )))
        }
        None => {
            return Err(ZimbraError::InvalidEnvelope(
                "No valid SOAP Envelope found with recognized namespace".to_string(),
            ))
        }
    };

    let header = root.child("Header").cloned();
    let body = root
        .child("Body")
        .cloned()
        .ok_or_else(|| ZimbraError::InvalidEnvelope("Missing SOAP Body".to_string()))?;

    Ok(SoapEnvelope {
        version,
        header,
        body,
    })
}

/// Decode a Fault element, accepting both SOAP 1.1 and 1.2 layouts.
pub fn extract_fault(fault: &Element) -> SoapFault {
    let code = fault
        .child_text("faultcode")
        .or_else(|| fault.child("Code").and_then(|c| c.child_text("Value")))
        .unwrap_or_default()
        .to_string();

    let reason = fault
        .child_text("faultstring")
        .or_else(|| fault.child("Reason").and_then(|r| r.child_text("Text")))
        .unwrap_or_default()
        .to_string();

    // Zimbra puts its own error code under <detail><Error><Code>
    let detail_code = fault
        .child("detail")
        .or_else(|| fault.child("Detail"))
        .and_then(|d| d.child("Error"))
        .and_then(|e| e.child_text("Code"))
        .map(String::from);

    SoapFault {
        code,
        reason,
        detail_code,
    }
}

/// Namespace URI bound to the envelope's own prefix.
fn envelope_namespace(root: &Element) -> Option<&str> {
    match root.name().split_once(':') {
        Some((prefix, _)) => root.attr(&format!("xmlns:{}", prefix)),
        None => root.attr("xmlns"),
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.push_child(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(ZimbraError::XmlParse(
            "Document has more than one root element".to_string(),
        ));
    }
    *root = Some(element);
    Ok(())
}

fn element_from_start(e: &BytesStart) -> Result<Element> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(|e| ZimbraError::XmlParse(format!("Invalid element name: {}", e)))?
        .to_string();

    let mut element = Element::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(|e| ZimbraError::XmlParse(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| ZimbraError::XmlParse(format!("Invalid attribute name: {}", e)))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| ZimbraError::XmlParse(e.to_string()))?;
        element.set_attr(key, value);
    }
    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTH_RESPONSE_11: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Header>
    <context xmlns="urn:zimbra"><change token="1234"/></context>
  </soap:Header>
  <soap:Body>
    <AuthResponse xmlns="urn:zimbraAdmin">
      <authToken>0_abcdef</authToken>
      <lifetime>43199998</lifetime>
    </AuthResponse>
  </soap:Body>
</soap:Envelope>"#;

    const FAULT_12: &str = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
  <soap:Body>
    <soap:Fault>
      <soap:Code><soap:Value>soap:Sender</soap:Value></soap:Code>
      <soap:Reason><soap:Text>authentication failed for [admin]</soap:Text></soap:Reason>
      <soap:Detail>
        <Error xmlns="urn:zimbra"><Code>account.AUTH_FAILED</Code><Trace>qtp1</Trace></Error>
      </soap:Detail>
    </soap:Fault>
  </soap:Body>
</soap:Envelope>"#;

    #[test]
    fn test_parse_document_tree() {
        let doc = parse_document(br#"<a n="x">1<b/><c k="v">two</c></a>"#).unwrap();
        assert_eq!(doc.name(), "a");
        assert_eq!(doc.attr("n"), Some("x"));
        assert_eq!(doc.text(), "1");
        assert_eq!(doc.children().len(), 2);
        assert_eq!(doc.child_text("c"), Some("two"));
        assert_eq!(doc.child("c").and_then(|c| c.attr("k")), Some("v"));
    }

    #[test]
    fn test_parse_document_unescapes() {
        let doc = parse_document(br#"<a n="x&amp;y">a &lt; b</a>"#).unwrap();
        assert_eq!(doc.attr("n"), Some("x&y"));
        assert_eq!(doc.text(), "a < b");
    }

    #[test]
    fn test_parse_document_cdata() {
        let doc = parse_document(b"<content><![CDATA[<b>bold</b>]]></content>").unwrap();
        assert_eq!(doc.text(), "<b>bold</b>");
    }

    #[test]
    fn test_parse_document_rejects_truncated() {
        assert!(parse_document(b"<a><b></b>").is_err());
        assert!(parse_document(b"").is_err());
    }

    #[test]
    fn test_parse_soap_11_response() {
        let envelope = parse_soap_envelope(AUTH_RESPONSE_11.as_bytes()).unwrap();
        assert_eq!(envelope.version, SoapVersion::Soap11);
        assert!(envelope.header.is_some());
        assert!(envelope.fault().is_none());

        let response = envelope.into_response().unwrap();
        assert_eq!(response.name(), "AuthResponse");
        assert_eq!(response.child_text("authToken"), Some("0_abcdef"));
        assert_eq!(response.child_text("lifetime"), Some("43199998"));
    }

    #[test]
    fn test_parse_soap_12_fault() {
        let envelope = parse_soap_envelope(FAULT_12.as_bytes()).unwrap();
        assert_eq!(envelope.version, SoapVersion::Soap12);
        assert!(envelope.header.is_none());

        let fault = envelope.fault().unwrap();
        assert_eq!(fault.code, "soap:Sender");
        assert_eq!(fault.reason, "authentication failed for [admin]");
        assert_eq!(fault.detail_code.as_deref(), Some("account.AUTH_FAILED"));
    }

    #[test]
    fn test_parse_soap_11_fault() {
        let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <soap:Fault>
      <faultcode>soap:Client</faultcode>
      <faultstring>unknown document: FooRequest</faultstring>
    </soap:Fault>
  </soap:Body>
</soap:Envelope>"#;
        let fault = parse_soap_envelope(xml.as_bytes()).unwrap().fault().unwrap();
        assert_eq!(fault.code, "soap:Client");
        assert_eq!(fault.reason, "unknown document: FooRequest");
        assert_eq!(fault.detail_code, None);
    }

    #[test]
    fn test_unknown_envelope_namespace() {
        let xml = r#"<s:Envelope xmlns:s="urn:other"><s:Body/></s:Envelope>"#;
        let err = parse_soap_envelope(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, ZimbraError::InvalidEnvelope(_)));
    }

    #[test]
    fn test_not_an_envelope() {
        let err = parse_soap_envelope(b"<html><body>502</body></html>").unwrap_err();
        assert!(matches!(err, ZimbraError::InvalidEnvelope(_)));
    }

    #[test]
    fn test_xxe_detection() {
        let xxe_payload = r#"<?xml version="1.0"?>
<!DOCTYPE foo [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>&xxe;</soap:Body>
</soap:Envelope>"#;

        let result = parse_soap_envelope(xxe_payload.as_bytes());
        assert!(matches!(result, Err(ZimbraError::XmlParse(_))));
    }

    #[test]
    fn test_doctype_inside_cdata_is_content() {
        let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <GetMsgResponse xmlns="urn:zimbraMail">
      <content><![CDATA[<!DOCTYPE html><html/>]]></content>
    </GetMsgResponse>
  </soap:Body>
</soap:Envelope>"#;
        let response = parse_soap_envelope(xml.as_bytes())
            .unwrap()
            .into_response()
            .unwrap();
        assert_eq!(response.child_text("content"), Some("<!DOCTYPE html><html/>"));
    }

    #[test]
    fn test_text_kept_verbatim() {
        let doc = parse_document(b"<r>\n  <sig>  Regards,\n  Jane\n</sig>\n  <m>one <b/> two</m>\n</r>")
            .unwrap();
        assert_eq!(doc.text(), "");
        assert_eq!(doc.child_text("sig"), Some("  Regards,\n  Jane\n"));
        assert_eq!(doc.child_text("m"), Some("one  two"));
    }
}
