//! Minimal XML support for the SOAP transport: rendering invoice JSON as
//! XML elements, wrapping calls in SOAP 1.1 envelopes, and pulling single
//! element values back out of vendor replies.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

pub const SOAP_NAMESPACE: &str = "http://tempuri.org/";

static OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:[\w.-]+:)?([\w.-]+)(?:\s[^>]*)?>").unwrap());
static CLOSE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</(?:[\w.-]+:)?([\w.-]+)\s*>").unwrap());

/// Render a JSON value as an XML element named `name`.
///
/// Objects become nested elements, arrays repeat the element once per item,
/// `null` becomes an empty element and scalars become escaped text.
pub fn json_to_xml(name: &str, value: &Value) -> String {
    let mut out = String::new();
    write_element(&mut out, &element_name(name), value);
    out
}

fn write_element(out: &mut String, name: &str, value: &Value) {
    match value {
        Value::Array(items) => {
            for item in items {
                write_element(out, name, item);
            }
        }
        Value::Object(map) => {
            out.push_str(&format!("<{name}>"));
            for (key, child) in map {
                write_element(out, &element_name(key), child);
            }
            out.push_str(&format!("</{name}>"));
        }
        Value::Null => out.push_str(&format!("<{name}/>")),
        Value::String(s) => out.push_str(&format!("<{name}>{}</{name}>", escape(s))),
        other => out.push_str(&format!("<{name}>{other}</{name}>")),
    }
}

/// Coerce a JSON key into a valid XML element name.
fn element_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() || !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}

pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Build a SOAP 1.1 request for `action`. `params` are (name, raw inner XML)
/// pairs; callers escape text values themselves.
pub fn envelope(action: &str, params: &[(&str, String)]) -> String {
    let mut body = String::new();
    for (name, inner) in params {
        body.push_str(&format!("<tem:{name}>{inner}</tem:{name}>"));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\" xmlns:tem=\"{SOAP_NAMESPACE}\">\
         <soap:Body><tem:{action}>{body}</tem:{action}></soap:Body></soap:Envelope>"
    )
}

/// Text content of the first element called `name`, ignoring any namespace
/// prefix. Nested markup is returned as-is.
pub fn element_text(xml: &str, name: &str) -> Option<String> {
    let open = OPEN_TAG
        .captures_iter(xml)
        .find(|caps| &caps[1] == name && !caps[0].ends_with("/>"))?
        .get(0)?;
    let rest = &xml[open.end()..];
    let close = CLOSE_TAG
        .captures_iter(rest)
        .find(|caps| &caps[1] == name)?
        .get(0)?;
    Some(unescape(rest[..close.start()].trim()))
}

/// The `faultstring` of a SOAP fault, if the reply is one.
pub fn fault(xml: &str) -> Option<String> {
    element_text(xml, "Fault").map(|fault| {
        element_text(&fault, "faultstring").unwrap_or_else(|| "SOAP fault".to_string())
    })
}
