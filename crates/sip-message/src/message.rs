//! The immutable structured view over a SIP request or response
//! (spec §3 "Message").

use crate::types::{Address, Method, StatusCode, Uri, Via};

/// Either a Request-Line or a Status-Line; everything else in [`Message`]
/// is shared between the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request { method: Method, request_uri: Uri },
    Response { status: StatusCode },
}

/// A fully decomposed SIP message.
///
/// Cloning produces an owned, independent copy — every field here is
/// plain owned data, so `#[derive(Clone)]` already gives us that
/// guarantee without any special-casing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub start_line: StartLine,
    /// Top of stack first.
    pub via: Vec<Via>,
    pub from: Address,
    pub to: Address,
    pub call_id: String,
    pub cseq: u32,
    pub cseq_method: Method,
    pub contact: Option<Address>,
    /// Route set taken from `Route` headers on a request.
    pub route: Vec<Uri>,
    /// `Record-Route` headers, accumulated from responses.
    pub record_route: Vec<Uri>,
    pub max_forwards: Option<u32>,
    pub user_agent: Option<String>,
    /// Any header this crate doesn't model explicitly, kept verbatim so
    /// serialize(parse(x)) round-trips headers it doesn't understand.
    pub extra_headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Message {
    pub fn is_request(&self) -> bool {
        matches!(self.start_line, StartLine::Request { .. })
    }

    pub fn is_response(&self) -> bool {
        matches!(self.start_line, StartLine::Response { .. })
    }

    pub fn method(&self) -> Option<&Method> {
        match &self.start_line {
            StartLine::Request { method, .. } => Some(method),
            StartLine::Response { .. } => None,
        }
    }

    pub fn request_uri(&self) -> Option<&Uri> {
        match &self.start_line {
            StartLine::Request { request_uri, .. } => Some(request_uri),
            StartLine::Response { .. } => None,
        }
    }

    pub fn status(&self) -> Option<&StatusCode> {
        match &self.start_line {
            StartLine::Response { status } => Some(status),
            StartLine::Request { .. } => None,
        }
    }

    /// The top Via, if any — this is what carries the branch id that
    /// keys a transaction (spec §3 "Transaction" identity).
    pub fn top_via(&self) -> Option<&Via> {
        self.via.first()
    }

    pub fn branch(&self) -> Option<&str> {
        self.top_via().and_then(|v| v.branch.as_deref())
    }
}
