//! Message constructors from the parser contract (spec §6.2):
//! `init_request` and `init_response`.

use crate::message::{Message, StartLine};
use crate::parser::random_number;
use crate::types::{Method, StatusCode, Uri};

const DEFAULT_MAX_FORWARDS: u32 = 70;
const DEFAULT_USER_AGENT: &str = "sip-core-engine/0.1";

/// An empty, unaddressed request shell. Callers fill in method,
/// Request-URI, From/To/Call-ID/CSeq/Via before sending.
pub fn init_request(method: Method, request_uri: Uri) -> Message {
    Message {
        start_line: StartLine::Request { method: method.clone(), request_uri },
        via: Vec::new(),
        from: crate::types::Address::new(Uri::new("invalid")),
        to: crate::types::Address::new(Uri::new("invalid")),
        call_id: format!("{:08x}", random_number()),
        cseq: 1,
        cseq_method: method,
        contact: None,
        route: Vec::new(),
        record_route: Vec::new(),
        max_forwards: Some(DEFAULT_MAX_FORWARDS),
        user_agent: Some(DEFAULT_USER_AGENT.to_string()),
        extra_headers: Vec::new(),
        body: Vec::new(),
    }
}

/// Build a response for `template_request` with the given status.
///
/// Per RFC 3261 §8.2.6.2 (spec §6.2): From is copied from the request
/// unchanged; To is copied and a tag is generated if the request's To
/// had none; Call-ID, CSeq and the *entire* Via sequence are cloned
/// unchanged. Two calls to `init_response(req, 200)` on the same
/// tagless request therefore differ only in the generated To-tag
/// (spec §8 round-trip property).
pub fn init_response(template_request: &Message, status: u16) -> Message {
    let status = status_for_code(status);

    let mut to = template_request.to.clone();
    if to.tag.is_none() {
        to = to.with_tag(format!("{:08x}", random_number()));
    }

    Message {
        start_line: StartLine::Response { status },
        via: template_request.via.clone(),
        from: template_request.from.clone(),
        to,
        call_id: template_request.call_id.clone(),
        cseq: template_request.cseq,
        cseq_method: template_request.cseq_method.clone(),
        contact: None,
        route: Vec::new(),
        record_route: template_request.record_route.clone(),
        max_forwards: None,
        user_agent: Some(DEFAULT_USER_AGENT.to_string()),
        extra_headers: Vec::new(),
        body: Vec::new(),
    }
}

fn status_for_code(code: u16) -> StatusCode {
    match code {
        100 => StatusCode::trying(),
        200 => StatusCode::ok(),
        487 => StatusCode::request_terminated(),
        501 => StatusCode::not_implemented(),
        _ => StatusCode::new(code, default_reason(code)),
    }
}

fn default_reason(code: u16) -> &'static str {
    match code {
        180 => "Ringing",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        486 => "Busy Here",
        500 => "Server Internal Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
