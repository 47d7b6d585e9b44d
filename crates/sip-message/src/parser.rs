//! The parser contract (spec §6.2) and a structural, non-validating
//! implementation of it.
//!
//! RFC 3261's full grammar (token-level ABNF for headers, URIs, SDP
//! bodies) is out of scope here by design — spec §1 treats it as an
//! external collaborator. What this module commits to is the *contract*:
//! turn a byte buffer into a [`Message`] with the fields §6.2 lists
//! accessible, and the reverse. A production deployment can swap this
//! module out for a full grammar parser behind the same [`Parser`] trait
//! without the transaction engine noticing.

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::message::{Message, StartLine};
use crate::types::{Address, Method, StatusCode, Uri, Via};

/// The external parser contract: decompose bytes into a [`Message`],
/// and the reverse.
///
/// `sip-transaction` and `sip-transport` only depend on this trait, not
/// on [`StructuralParser`] directly, so a full-grammar implementation can
/// be dropped in later.
pub trait Parser {
    fn parse(&self, bytes: &[u8]) -> Result<Message>;
    fn serialize(&self, message: &Message) -> Vec<u8>;
}

/// The parser this crate ships: splits on CRLF, recognizes the headers
/// spec §6.2 names, and passes everything else through verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralParser;

impl Parser for StructuralParser {
    fn parse(&self, bytes: &[u8]) -> Result<Message> {
        parse_message(bytes)
    }

    fn serialize(&self, message: &Message) -> Vec<u8> {
        message_to_bytes(message)
    }
}

/// Parse a raw SIP datagram into a [`Message`].
///
/// Accepts both `\r\n` and bare `\n` line endings (real UDP stacks are not
/// always well-behaved about this); header folding is not supported.
pub fn parse_message(bytes: &[u8]) -> Result<Message> {
    let text = std::str::from_utf8(bytes).map_err(|_| Error::Empty)?;
    let text = text.trim_end_matches('\0');
    if text.trim().is_empty() {
        return Err(Error::Empty);
    }

    let mut lines = text.split("\r\n").flat_map(|l| l.split('\n'));
    let start = lines.next().ok_or(Error::Empty)?;

    let mut header_lines: Vec<&str> = Vec::new();
    let mut body_start: Option<usize> = None;
    let mut consumed = start.len() + 1;
    for line in lines {
        if line.is_empty() {
            consumed += 1;
            body_start = Some(consumed);
            break;
        }
        header_lines.push(line);
        consumed += line.len() + 1;
    }

    let start_line = parse_start_line(start)?;

    let mut via = Vec::new();
    let mut from = None;
    let mut to = None;
    let mut call_id = None;
    let mut cseq = None;
    let mut cseq_method = None;
    let mut contact = None;
    let mut route = Vec::new();
    let mut record_route = Vec::new();
    let mut max_forwards = None;
    let mut user_agent = None;
    let mut content_length = None;
    let mut extra_headers = Vec::new();

    for line in header_lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidHeader("header", line.to_string()))?;
        let name = name.trim();
        let value = value.trim();
        match normalize_header_name(name).as_str() {
            "via" => via.push(parse_via(value)?),
            "from" => from = Some(parse_address(value)?),
            "to" => to = Some(parse_address(value)?),
            "call-id" => call_id = Some(value.to_string()),
            "cseq" => {
                let (num, method) = value
                    .split_once(' ')
                    .ok_or_else(|| Error::InvalidHeader("CSeq", value.to_string()))?;
                cseq = Some(
                    num.trim()
                        .parse::<u32>()
                        .map_err(|_| Error::InvalidHeader("CSeq", value.to_string()))?,
                );
                cseq_method = Some(Method::parse(method.trim()));
            }
            "contact" => {
                if value.trim() != "*" {
                    contact = Some(parse_address(value)?);
                }
            }
            "route" => route.push(parse_uri_from_address_field(value)?),
            "record-route" => record_route.push(parse_uri_from_address_field(value)?),
            "max-forwards" => {
                max_forwards = value.trim().parse::<u32>().ok();
            }
            "user-agent" => user_agent = Some(value.to_string()),
            "content-length" => {
                content_length = value.trim().parse::<usize>().ok();
            }
            _ => extra_headers.push((name.to_string(), value.to_string())),
        }
    }

    let body = match body_start {
        Some(offset) if offset <= text.len() => text.as_bytes()[offset..].to_vec(),
        _ => Vec::new(),
    };

    let body = match content_length {
        Some(expected) if expected <= body.len() => body[..expected].to_vec(),
        _ => body,
    };

    Ok(Message {
        start_line,
        via,
        from: from.ok_or(Error::MissingHeader("From"))?,
        to: to.ok_or(Error::MissingHeader("To"))?,
        call_id: call_id.ok_or(Error::MissingHeader("Call-ID"))?,
        cseq: cseq.ok_or(Error::MissingHeader("CSeq"))?,
        cseq_method: cseq_method.ok_or(Error::MissingHeader("CSeq"))?,
        contact,
        route,
        record_route,
        max_forwards,
        user_agent,
        extra_headers,
        body,
    })
}

fn normalize_header_name(name: &str) -> String {
    // Accept the handful of compact forms RFC 3261 §7.3.3 allows.
    match name.to_ascii_lowercase().as_str() {
        "v" => "via".to_string(),
        "f" => "from".to_string(),
        "t" => "to".to_string(),
        "i" => "call-id".to_string(),
        "m" => "contact".to_string(),
        "l" => "content-length".to_string(),
        other => other.to_string(),
    }
}

fn parse_start_line(line: &str) -> Result<StartLine> {
    let mut parts = line.trim().splitn(3, ' ');
    let first = parts.next().ok_or_else(|| Error::InvalidStartLine(line.to_string()))?;
    if first.eq_ignore_ascii_case("SIP/2.0") {
        let code = parts.next().ok_or_else(|| Error::InvalidStartLine(line.to_string()))?;
        let reason = parts.next().unwrap_or("").to_string();
        let code: u16 = code
            .parse()
            .map_err(|_| Error::InvalidStatusCode(code.to_string()))?;
        Ok(StartLine::Response { status: StatusCode::new(code, reason) })
    } else {
        let request_uri = parts.next().ok_or_else(|| Error::InvalidStartLine(line.to_string()))?;
        let _version = parts.next(); // splitn(3) already consumed it as the 3rd token above for requests
        Ok(StartLine::Request {
            method: Method::parse(first),
            request_uri: Uri::parse(request_uri)?,
        })
    }
}

fn parse_via(value: &str) -> Result<Via> {
    // "SIP/2.0/UDP host:port;branch=...;received=...;rport=..."
    let mut segs = value.splitn(2, ';');
    let proto_and_sent_by = segs.next().unwrap_or("");
    let params = segs.next().unwrap_or("");

    let mut proto_parts = proto_and_sent_by.trim().splitn(2, char::is_whitespace);
    let proto = proto_parts.next().unwrap_or("SIP/2.0/UDP");
    let sent_by = proto_parts.next().unwrap_or("").trim();
    let transport = proto.rsplit('/').next().unwrap_or("UDP").to_string();

    let (host, port) = match sent_by.split_once(':') {
        Some((h, p)) => (h.to_string(), p.parse::<u16>().ok()),
        None => (sent_by.to_string(), None),
    };

    let mut via = Via {
        transport,
        sent_by_host: host,
        sent_by_port: port,
        branch: None,
        received: None,
        rport: None,
    };

    for param in params.split(';') {
        let param = param.trim();
        if param.is_empty() {
            continue;
        }
        match param.split_once('=') {
            Some((k, v)) if k.eq_ignore_ascii_case("branch") => via.branch = Some(v.to_string()),
            Some((k, v)) if k.eq_ignore_ascii_case("received") => via.received = Some(v.to_string()),
            Some((k, v)) if k.eq_ignore_ascii_case("rport") => via.rport = v.parse().ok(),
            _ => {}
        }
    }

    Ok(via)
}

fn parse_address(value: &str) -> Result<Address> {
    let value = value.trim();
    let (display_name, rest) = if let Some(start) = value.find('"') {
        if let Some(end) = value[start + 1..].find('"') {
            let name = value[start + 1..start + 1 + end].to_string();
            (Some(name), &value[start + end + 2..])
        } else {
            (None, value)
        }
    } else {
        (None, value)
    };

    let (uri_part, params) = if let (Some(lt), Some(gt)) = (rest.find('<'), rest.find('>')) {
        (&rest[lt + 1..gt], &rest[gt + 1..])
    } else {
        match rest.trim().split_once(';') {
            Some((u, p)) => (u.trim(), &rest[u.len() + 1..][..p.len()]),
            None => (rest.trim(), ""),
        }
    };

    let uri = Uri::parse(uri_part)?;
    let mut addr = Address { display_name, uri, tag: None, extra_params: Vec::new() };

    for param in params.split(';') {
        let param = param.trim();
        if param.is_empty() {
            continue;
        }
        match param.split_once('=') {
            Some((k, v)) if k.eq_ignore_ascii_case("tag") => addr.tag = Some(v.to_string()),
            Some((k, v)) => addr.extra_params.push((k.to_string(), v.to_string())),
            None => addr.extra_params.push((param.to_string(), String::new())),
        }
    }

    Ok(addr)
}

fn parse_uri_from_address_field(value: &str) -> Result<Uri> {
    Ok(parse_address(value)?.uri)
}

/// Render a [`Message`] back into a UTF-8 SIP/2.0 byte buffer
/// (spec §6.2 `message_to_str`).
pub fn message_to_bytes(message: &Message) -> Vec<u8> {
    let mut out = String::new();

    match &message.start_line {
        StartLine::Request { method, request_uri } => {
            out.push_str(&format!("{} {} SIP/2.0\r\n", method, request_uri));
        }
        StartLine::Response { status } => {
            out.push_str(&format!("SIP/2.0 {} {}\r\n", status.code, status.reason));
        }
    }

    for via in &message.via {
        out.push_str(&format!("Via: {}\r\n", via));
    }
    out.push_str(&format!("From: {}\r\n", message.from));
    out.push_str(&format!("To: {}\r\n", message.to));
    out.push_str(&format!("Call-ID: {}\r\n", message.call_id));
    out.push_str(&format!("CSeq: {} {}\r\n", message.cseq, message.cseq_method));
    for route in &message.route {
        out.push_str(&format!("Route: <{}>\r\n", route));
    }
    for rr in &message.record_route {
        out.push_str(&format!("Record-Route: <{}>\r\n", rr));
    }
    if let Some(contact) = &message.contact {
        out.push_str(&format!("Contact: {}\r\n", contact));
    }
    if let Some(mf) = message.max_forwards {
        out.push_str(&format!("Max-Forwards: {}\r\n", mf));
    }
    if let Some(ua) = &message.user_agent {
        out.push_str(&format!("User-Agent: {}\r\n", ua));
    }
    for (name, value) in &message.extra_headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!("Content-Length: {}\r\n", message.body.len()));
    out.push_str("\r\n");

    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(&message.body);
    bytes
}

/// A source of random 32-bit numbers for tag and branch generation
/// (spec §6.2 `random_number`).
pub fn random_number() -> u32 {
    rand::random::<u32>()
}

impl FromStr for Uri {
    type Err = Error;
    fn from_str(s: &str) -> Result<Uri> {
        Uri::parse(s)
    }
}
