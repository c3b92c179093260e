//! XML-RPC documents.
//!
//! Writes and parses the two documents GBXRemote exchanges:
//!
//! ```text
//! <methodCall><methodName>…</methodName><params><param><value>…</value></param>…</params></methodCall>
//! <methodResponse><params><param><value>…</value></param></params></methodResponse>
//! <methodResponse><fault><value><struct>…</struct></value></fault></methodResponse>
//! ```
//!
//! Whitespace between tags is ignored; whitespace inside string content is
//! kept. A `<value>` without a type tag is a string.
//!
//! # Example
//!
//! ```
//! use gbxremote::codec::xml::{parse_method_call, write_method_call};
//! use gbxremote::Value;
//!
//! let doc = write_method_call("CallVote", &[Value::from("<restart/>")]);
//! let call = parse_method_call(doc.as_bytes()).unwrap();
//! assert_eq!(call.name, "CallVote");
//! assert_eq!(call.params, vec![Value::from("<restart/>")]);
//! ```

use std::borrow::Cow;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{GbxError, Result};
use crate::value::Value;

/// Deepest `<array>`/`<struct>` nesting the parser accepts.
pub const MAX_VALUE_DEPTH: usize = 64;

/// A `methodCall` document: outgoing calls and server callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub name: String,
    pub params: Vec<Value>,
}

/// A `methodResponse` document.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    /// The first `<param>` of a successful response.
    Success(Value),
    /// The raw `<fault>` value (a `{faultCode, faultString}` struct).
    Fault(Value),
}

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

pub fn write_method_call(name: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(128);
    out.push_str(XML_DECL);
    out.push_str("<methodCall><methodName>");
    out.push_str(&escape(name));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

pub fn write_method_response(response: &MethodResponse) -> String {
    let mut out = String::with_capacity(128);
    out.push_str(XML_DECL);
    out.push_str("<methodResponse>");
    match response {
        MethodResponse::Success(value) => {
            out.push_str("<params><param>");
            write_value(&mut out, value);
            out.push_str("</param></params>");
        }
        MethodResponse::Fault(value) => {
            out.push_str("<fault>");
            write_value(&mut out, value);
            out.push_str("</fault>");
        }
    }
    out.push_str("</methodResponse>");
    out
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Boolean(b) => {
            out.push_str("<boolean>");
            out.push(if *b { '1' } else { '0' });
            out.push_str("</boolean>");
        }
        Value::Int(i) => {
            out.push_str("<i4>");
            out.push_str(&i.to_string());
            out.push_str("</i4>");
        }
        Value::Double(d) => {
            out.push_str("<double>");
            out.push_str(&d.to_string());
            out.push_str("</double>");
        }
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::Base64(bytes) => {
            out.push_str("<base64>");
            out.push_str(&STANDARD.encode(bytes));
            out.push_str("</base64>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

pub fn parse_method_call(payload: &[u8]) -> Result<MethodCall> {
    let mut parser = Parser::new(payload)?;
    parser.expect_start(b"methodCall")?;
    parser.expect_start(b"methodName")?;
    let name = parser.read_text(b"methodName")?.trim().to_string();

    let params = match parser.next_tag()? {
        Event::Start(e) if e.name().as_ref() == b"params" => {
            let params = parser.parse_params()?;
            parser.expect_end(b"methodCall")?;
            params
        }
        Event::Empty(e) if e.name().as_ref() == b"params" => {
            parser.expect_end(b"methodCall")?;
            Vec::new()
        }
        Event::End(e) if e.name().as_ref() == b"methodCall" => Vec::new(),
        other => return Err(unexpected("<params>", &other)),
    };

    Ok(MethodCall { name, params })
}

pub fn parse_method_response(payload: &[u8]) -> Result<MethodResponse> {
    let mut parser = Parser::new(payload)?;
    parser.expect_start(b"methodResponse")?;

    let response = match parser.next_tag()? {
        Event::Start(e) if e.name().as_ref() == b"params" => {
            let first = parser
                .parse_params()?
                .into_iter()
                .next()
                .ok_or_else(|| GbxError::Xml("methodResponse has no <param>".to_string()))?;
            MethodResponse::Success(first)
        }
        Event::Start(e) if e.name().as_ref() == b"fault" => {
            let value = parser.read_value()?;
            parser.expect_end(b"fault")?;
            MethodResponse::Fault(value)
        }
        other => return Err(unexpected("<params> or <fault>", &other)),
    };

    parser.expect_end(b"methodResponse")?;
    Ok(response)
}

fn unexpected(expected: &str, found: &Event<'_>) -> GbxError {
    let found = match found {
        Event::Start(e) | Event::Empty(e) => {
            format!("<{}>", String::from_utf8_lossy(e.name().as_ref()))
        }
        Event::End(e) => format!("</{}>", String::from_utf8_lossy(e.name().as_ref())),
        Event::Text(_) | Event::CData(_) => "text".to_string(),
        Event::Eof => "end of document".to_string(),
        _ => "markup".to_string(),
    };
    GbxError::Xml(format!("expected {}, found {}", expected, found))
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| GbxError::Xml(e.to_string()))
}

fn unescaped(raw: &[u8]) -> Result<Cow<'_, str>> {
    unescape(utf8(raw)?).map_err(|e| GbxError::Xml(e.to_string()))
}

struct Parser<'a> {
    reader: Reader<&'a [u8]>,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(payload: &'a [u8]) -> Result<Self> {
        let text = utf8(payload)?;
        Ok(Self {
            reader: Reader::from_str(text),
            depth: 0,
        })
    }

    /// Next event, skipping declarations, comments and processing instructions.
    fn next_event(&mut self) -> Result<Event<'a>> {
        loop {
            match self.reader.read_event()? {
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => continue,
                Event::Eof => return Err(GbxError::Xml("unexpected end of document".to_string())),
                event => return Ok(event),
            }
        }
    }

    /// Next markup event; whitespace between tags is skipped.
    fn next_tag(&mut self) -> Result<Event<'a>> {
        loop {
            match self.next_event()? {
                Event::Text(t) if t.iter().all(u8::is_ascii_whitespace) => continue,
                event => return Ok(event),
            }
        }
    }

    fn expect_start(&mut self, name: &[u8]) -> Result<()> {
        match self.next_tag()? {
            Event::Start(e) if e.name().as_ref() == name => Ok(()),
            other => Err(unexpected(&format!("<{}>", String::from_utf8_lossy(name)), &other)),
        }
    }

    fn expect_end(&mut self, name: &[u8]) -> Result<()> {
        match self.next_tag()? {
            Event::End(e) if e.name().as_ref() == name => Ok(()),
            other => Err(unexpected(&format!("</{}>", String::from_utf8_lossy(name)), &other)),
        }
    }

    /// Character content up to the closing `end` tag, entities decoded.
    fn read_text(&mut self, end: &[u8]) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                Event::Text(t) => text.push_str(&unescaped(&t)?),
                Event::CData(c) => text.push_str(utf8(&c)?),
                Event::End(e) if e.name().as_ref() == end => return Ok(text),
                other => return Err(unexpected("character data", &other)),
            }
        }
    }

    /// `<param><value>…</value></param>` entries up to `</params>`.
    fn parse_params(&mut self) -> Result<Vec<Value>> {
        let mut params = Vec::new();
        loop {
            match self.next_tag()? {
                Event::Start(e) if e.name().as_ref() == b"param" => {
                    params.push(self.read_value()?);
                    self.expect_end(b"param")?;
                }
                Event::End(e) if e.name().as_ref() == b"params" => return Ok(params),
                other => return Err(unexpected("<param>", &other)),
            }
        }
    }

    /// A complete `<value>` element. `<value/>` is an empty string.
    fn read_value(&mut self) -> Result<Value> {
        match self.next_tag()? {
            Event::Start(e) if e.name().as_ref() == b"value" => self.parse_value(),
            Event::Empty(e) if e.name().as_ref() == b"value" => Ok(Value::String(String::new())),
            other => Err(unexpected("<value>", &other)),
        }
    }

    /// Body of a `<value>` whose start tag was already consumed.
    fn parse_value(&mut self) -> Result<Value> {
        let mut untyped = String::new();
        loop {
            match self.next_event()? {
                Event::Text(t) => untyped.push_str(&unescaped(&t)?),
                Event::CData(c) => untyped.push_str(utf8(&c)?),
                Event::End(e) if e.name().as_ref() == b"value" => return Ok(Value::String(untyped)),
                Event::Start(e) => {
                    let tag = e.name().as_ref().to_vec();
                    let value = self.parse_typed(&tag)?;
                    self.expect_end(b"value")?;
                    return Ok(value);
                }
                Event::Empty(e) => {
                    let value = empty_typed(e.name().as_ref())?;
                    self.expect_end(b"value")?;
                    return Ok(value);
                }
                other => return Err(unexpected("a value", &other)),
            }
        }
    }

    fn parse_typed(&mut self, tag: &[u8]) -> Result<Value> {
        match tag {
            b"i4" | b"int" => {
                let text = self.read_text(tag)?;
                text.trim()
                    .parse()
                    .map(Value::Int)
                    .map_err(|_| GbxError::Xml(format!("invalid integer {:?}", text)))
            }
            b"boolean" => {
                let text = self.read_text(tag)?;
                match text.trim() {
                    "1" | "true" => Ok(Value::Boolean(true)),
                    "0" | "false" => Ok(Value::Boolean(false)),
                    other => Err(GbxError::Xml(format!("invalid boolean {:?}", other))),
                }
            }
            b"double" => {
                let text = self.read_text(tag)?;
                text.trim()
                    .parse()
                    .map(Value::Double)
                    .map_err(|_| GbxError::Xml(format!("invalid double {:?}", text)))
            }
            b"string" => self.read_text(tag).map(Value::String),
            b"base64" => {
                let text = self.read_text(tag)?;
                let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                STANDARD
                    .decode(compact)
                    .map(Value::Base64)
                    .map_err(|e| GbxError::Xml(format!("invalid base64: {}", e)))
            }
            b"array" | b"struct" => {
                if self.depth >= MAX_VALUE_DEPTH {
                    return Err(GbxError::Xml(format!(
                        "value nesting exceeds {} levels",
                        MAX_VALUE_DEPTH
                    )));
                }
                self.depth += 1;
                let value = if tag == b"array" {
                    self.parse_array()
                } else {
                    self.parse_struct()
                };
                self.depth -= 1;
                value
            }
            other => Err(GbxError::Xml(format!(
                "unsupported value type <{}>",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    fn parse_array(&mut self) -> Result<Value> {
        let mut items = Vec::new();
        match self.next_tag()? {
            Event::Start(e) if e.name().as_ref() == b"data" => loop {
                match self.next_tag()? {
                    Event::Start(e) if e.name().as_ref() == b"value" => items.push(self.parse_value()?),
                    Event::Empty(e) if e.name().as_ref() == b"value" => {
                        items.push(Value::String(String::new()))
                    }
                    Event::End(e) if e.name().as_ref() == b"data" => break,
                    other => return Err(unexpected("<value>", &other)),
                }
            },
            Event::Empty(e) if e.name().as_ref() == b"data" => {}
            Event::End(e) if e.name().as_ref() == b"array" => return Ok(Value::Array(items)),
            other => return Err(unexpected("<data>", &other)),
        }
        self.expect_end(b"array")?;
        Ok(Value::Array(items))
    }

    fn parse_struct(&mut self) -> Result<Value> {
        let mut members = Vec::new();
        loop {
            match self.next_tag()? {
                Event::Start(e) if e.name().as_ref() == b"member" => {
                    self.expect_start(b"name")?;
                    let name = self.read_text(b"name")?;
                    let value = self.read_value()?;
                    self.expect_end(b"member")?;
                    members.push((name, value));
                }
                Event::End(e) if e.name().as_ref() == b"struct" => return Ok(Value::Struct(members)),
                other => return Err(unexpected("<member>", &other)),
            }
        }
    }
}

fn empty_typed(tag: &[u8]) -> Result<Value> {
    match tag {
        b"string" => Ok(Value::String(String::new())),
        b"base64" => Ok(Value::Base64(Vec::new())),
        b"array" => Ok(Value::Array(Vec::new())),
        b"struct" => Ok(Value::Struct(Vec::new())),
        other => Err(GbxError::Xml(format!(
            "empty <{}/> is not a valid value",
            String::from_utf8_lossy(other)
        ))),
    }
}
