//! Integration tests for the zimbra-soap crate.
//!
//! These tests exercise the public API surface end-to-end: request building,
//! envelope serialization, response decoding and the client facade, with an
//! in-process transport standing in for the server.

use pretty_assertions::assert_eq;
use std::cell::RefCell;
use zimbra_soap::config::{ACCOUNT_NAMESPACE, MAIL_NAMESPACE};
use zimbra_soap::envelope::build_envelope;
use zimbra_soap::parser::parse_soap_envelope;
use zimbra_soap::request::{normalize_call_name, RootAttributes};
use zimbra_soap::transport::{decode_response, SoapCall};
use zimbra_soap::{
    build_request, parse_attributes, Arguments, Attributes, CallOptions, ClientConfig, Element,
    Record, Result, SoapVersion, Transport, ZimbraClient, ZimbraError,
};

// ============================================================================
// Helper: a transport that serializes the envelope like the HTTP transport
// and answers with canned SOAP documents
// ============================================================================

struct CannedServer {
    /// (namespace, serialized request document)
    requests: RefCell<Vec<(String, String)>>,
    responses: RefCell<Vec<(u16, String)>>,
    raise_faults: bool,
}

impl CannedServer {
    fn new(responses: Vec<(u16, &str)>) -> Self {
        Self {
            requests: RefCell::new(Vec::new()),
            responses: RefCell::new(
                responses
                    .into_iter()
                    .rev()
                    .map(|(status, body)| (status, body.to_string()))
                    .collect(),
            ),
            raise_faults: true,
        }
    }
}

impl Transport for CannedServer {
    fn send(&self, call: &SoapCall<'_>) -> Result<Element> {
        let document = build_envelope(call.version, call.namespace, call.header, call.body)?;
        self.requests.borrow_mut().push((
            call.namespace.to_string(),
            String::from_utf8(document).unwrap(),
        ));
        let (status, body) = self
            .responses
            .borrow_mut()
            .pop()
            .expect("no canned response left");
        decode_response(status, body.as_bytes(), self.raise_faults)
    }
}

const AUTH_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Header><context xmlns="urn:zimbra"/></soap:Header>
  <soap:Body>
    <AuthResponse xmlns="urn:zimbraAccount">
      <authToken>0_5a8e1c</authToken>
      <lifetime>172799998</lifetime>
      <skin>harmony</skin>
    </AuthResponse>
  </soap:Body>
</soap:Envelope>"#;

const GET_INFO_RESPONSE: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <GetInfoResponse xmlns="urn:zimbraAccount">
      <name>user@example.com</name>
      <attrs>
        <attr name="displayName">Example User</attr>
        <attr name="zimbraPrefMailForwardingAddress">a@example.org</attr>
        <attr name="zimbraPrefMailForwardingAddress">b@example.org</attr>
      </attrs>
    </GetInfoResponse>
  </soap:Body>
</soap:Envelope>"#;

const AUTH_FAULT: &str = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
  <soap:Body>
    <soap:Fault>
      <soap:Code><soap:Value>soap:Sender</soap:Value></soap:Code>
      <soap:Reason><soap:Text>authentication failed for [user@example.com]</soap:Text></soap:Reason>
      <soap:Detail><Error xmlns="urn:zimbra"><Code>account.AUTH_FAILED</Code></Error></soap:Detail>
    </soap:Fault>
  </soap:Body>
</soap:Envelope>"#;

// ============================================================================
// Request building
// ============================================================================

#[test]
fn test_call_name_normalization() {
    for name in ["GetAccount", "NoOp", "SearchDirectory"] {
        assert_eq!(normalize_call_name(name, false), format!("{}Request", name));
        assert_eq!(normalize_call_name(name, true), name);
    }
    assert_eq!(normalize_call_name("NoOpRequest", false), "NoOpRequest");
}

#[test]
fn test_flat_attribute_mapping() {
    let attributes = Attributes::new()
        .with("limit", 25)
        .with("sortAscending", true)
        .with("query", "in:inbox");
    let request = build_request("Search", &CallOptions::new().attributes(attributes));
    assert_eq!(request.attr("limit"), Some("25"));
    assert_eq!(request.attr("sortAscending"), Some("true"));
    assert_eq!(request.attr("query"), Some("in:inbox"));
}

#[test]
fn test_modify_account_request_document() {
    let options = CallOptions::new()
        .arg("id", "4a7e9c35")
        .arg(
            "a",
            vec![
                Record::text("Example").attr("n", "givenName"),
                Record::text(0).attr("n", "zimbraMailQuota"),
            ],
        );
    let request = build_request("ModifyAccount", &options);
    assert_eq!(
        request.to_xml().unwrap(),
        concat!(
            "<ModifyAccountRequest>",
            "<id>4a7e9c35</id>",
            r#"<a n="givenName">Example</a>"#,
            r#"<a n="zimbraMailQuota">0</a>"#,
            "</ModifyAccountRequest>"
        )
    );
}

#[test]
fn test_yaml_body_matches_built_body() {
    let yaml = r#"
account:
  value: user@example.com
  by: name
attrs: zimbraMailHost
"#;
    let from_yaml = build_request(
        "GetAccount",
        &CallOptions::new().body(Arguments::from_yaml_str(yaml).unwrap()),
    );
    let built = build_request(
        "GetAccount",
        &CallOptions::new()
            .arg("account", Record::text("user@example.com").attr("by", "name"))
            .arg("attrs", "zimbraMailHost"),
    );
    assert_eq!(from_yaml, built);
}

#[test]
fn test_prebuilt_element_wins_over_flat_attributes() {
    let prebuilt = Element::new("query").with_text("(zimbraMailStatus=enabled)");
    let options = CallOptions {
        attributes: RootAttributes::Flat(Attributes::new().with("limit", 5)),
        positional: vec![prebuilt.clone()],
        ..Default::default()
    };
    let request = build_request("SearchDirectory", &options);
    assert_eq!(request.attributes().count(), 0);
    assert_eq!(request.children(), &[prebuilt]);
}

#[test]
fn test_empty_request_envelope() {
    let body = build_request("NoOp", &CallOptions::new());
    let document = build_envelope(
        SoapVersion::Soap11,
        "urn:zimbraAdmin",
        &Element::new("context"),
        &body,
    )
    .unwrap();
    let text = String::from_utf8(document).unwrap();
    assert!(text.contains(r#"<soap:Body><NoOpRequest xmlns="urn:zimbraAdmin"/></soap:Body>"#));
}

// ============================================================================
// Response parsing
// ============================================================================

#[test]
fn test_attribute_round_trip() {
    let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <GetConfigResponse xmlns="urn:zimbraAdmin">
      <a n="foo">1</a><a n="foo">2</a><a n="bar">3</a>
    </GetConfigResponse>
  </soap:Body>
</soap:Envelope>"#;
    let response = parse_soap_envelope(xml.as_bytes())
        .unwrap()
        .into_response()
        .unwrap();
    let attrs = parse_attributes(response.children());
    assert_eq!(attrs.len(), 2);
    assert_eq!(attrs["foo"], vec!["1".to_string(), "2".to_string()]);
    assert_eq!(attrs["bar"], vec!["3".to_string()]);
}

// ============================================================================
// Client end-to-end with canned server responses
// ============================================================================

#[test]
fn test_mail_auth_then_get_info() {
    let server = CannedServer::new(vec![(200, AUTH_RESPONSE), (200, GET_INFO_RESPONSE)]);
    let mut client = ZimbraClient::with_transport(&ClientConfig::mail("mail.example.com"), server);

    assert_eq!(client.namespace(), MAIL_NAMESPACE);
    client
        .auth_with_password("user@example.com", "secret")
        .unwrap();
    assert_eq!(client.namespace(), MAIL_NAMESPACE);
    assert_eq!(client.session().auth_token(), Some("0_5a8e1c"));
    assert_eq!(client.session().auth_token_lifetime(), Some(172_799_998));

    let info = client.call("GetInfo", CallOptions::new()).unwrap();
    assert_eq!(info.child_text("name"), Some("user@example.com"));
    let attrs = parse_attributes(info.child("attrs").unwrap().children());
    assert_eq!(attrs["displayName"], vec!["Example User".to_string()]);
    assert_eq!(attrs["zimbraPrefMailForwardingAddress"].len(), 2);

    let requests = client.transport().requests.borrow();
    assert_eq!(requests.len(), 2);

    let (auth_ns, auth_doc) = &requests[0];
    assert_eq!(auth_ns, ACCOUNT_NAMESPACE);
    assert!(auth_doc.contains(r#"<AuthRequest xmlns="urn:zimbraAccount">"#));
    assert!(auth_doc.contains(r#"<account by="name">user@example.com</account>"#));
    assert!(!auth_doc.contains("<authToken>"));

    let (info_ns, info_doc) = &requests[1];
    assert_eq!(info_ns, MAIL_NAMESPACE);
    assert!(info_doc.contains(r#"<GetInfoRequest xmlns="urn:zimbraMail"/>"#));
    assert!(info_doc.contains("<authToken>0_5a8e1c</authToken>"));
    assert!(info_doc.contains("<nosession/>"));
}

#[test]
fn test_auth_fault_surfaces_as_error() {
    let server = CannedServer::new(vec![(500, AUTH_FAULT)]);
    let mut client = ZimbraClient::with_transport(&ClientConfig::mail("mail.example.com"), server);

    let err = client
        .auth_with_password("user@example.com", "wrong")
        .unwrap_err();
    match err {
        ZimbraError::Fault(fault) => {
            assert_eq!(fault.code, "soap:Sender");
            assert_eq!(fault.detail_code.as_deref(), Some("account.AUTH_FAILED"));
        }
        other => panic!("expected fault, got {:?}", other),
    }
    assert_eq!(client.session().auth_token(), None);
    assert_eq!(client.namespace(), MAIL_NAMESPACE);
}

#[test]
fn test_fault_returned_when_not_raised() {
    let mut server = CannedServer::new(vec![(500, AUTH_FAULT)]);
    server.raise_faults = false;
    let mut client = ZimbraClient::with_transport(&ClientConfig::mail("mail.example.com"), server);

    let response = client.call("GetInfo", CallOptions::new()).unwrap();
    assert_eq!(response.local_name(), "Fault");
}

#[test]
fn test_gateway_error_is_http_status() {
    let server = CannedServer::new(vec![(502, "<html><body>Bad Gateway</body></html>")]);
    let mut client = ZimbraClient::with_transport(&ClientConfig::admin("zimbra.local"), server);
    let err = client.call("NoOp", CallOptions::new()).unwrap_err();
    assert!(matches!(err, ZimbraError::HttpStatus { status: 502, .. }));
}

#[test]
fn test_suffixless_operation_on_the_wire() {
    let response = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body><DestroyWaitSetResponse xmlns="urn:zimbraMail" waitSet="ws-1"/></soap:Body>
</soap:Envelope>"#;
    let server = CannedServer::new(vec![(200, response)]);
    let mut client = ZimbraClient::with_transport(&ClientConfig::mail("mail.example.com"), server);

    let result = client
        .destroy_wait_set(CallOptions::new().attr("waitSet", "ws-1"))
        .unwrap();
    assert_eq!(result.attr("waitSet"), Some("ws-1"));

    let requests = client.transport().requests.borrow();
    assert!(requests[0]
        .1
        .contains(r#"<DestroyWaitSet waitSet="ws-1" xmlns="urn:zimbraMail"/>"#));
}
