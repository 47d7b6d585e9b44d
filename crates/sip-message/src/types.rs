//! Structural types shared by requests and responses: methods, status
//! codes, URIs, addresses and the Via header.
//!
//! These are deliberately shallow compared to a full RFC 3261 grammar —
//! see the module docs on [`crate::parser`] for why.

use std::fmt;

/// SIP request method.
///
/// `Other` carries any token not in the well-known set so that unknown
/// methods still round-trip and can be answered with 501 (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Invite,
    Ack,
    Bye,
    Cancel,
    Register,
    Options,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Register => "REGISTER",
            Method::Options => "OPTIONS",
            Method::Other(s) => s.as_str(),
        }
    }

    pub fn parse(token: &str) -> Method {
        match token.to_ascii_uppercase().as_str() {
            "INVITE" => Method::Invite,
            "ACK" => Method::Ack,
            "BYE" => Method::Bye,
            "CANCEL" => Method::Cancel,
            "REGISTER" => Method::Register,
            "OPTIONS" => Method::Options,
            _ => Method::Other(token.to_string()),
        }
    }

    /// INVITE is the only method with its own pair of client/server state
    /// machines (ICT/IST); everything else uses NICT/NIST (spec §4.3).
    pub fn is_invite(&self) -> bool {
        matches!(self, Method::Invite)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A SIP status code together with its reason phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCode {
    pub code: u16,
    pub reason: String,
}

impl StatusCode {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self { code, reason: reason.into() }
    }

    pub fn trying() -> Self { Self::new(100, "Trying") }
    pub fn ok() -> Self { Self::new(200, "OK") }
    pub fn not_implemented() -> Self { Self::new(501, "Not Implemented") }
    pub fn request_terminated() -> Self { Self::new(487, "Request Terminated") }

    pub fn is_provisional(&self) -> bool { (100..200).contains(&self.code) }
    pub fn is_success(&self) -> bool { (200..300).contains(&self.code) }
    pub fn is_final(&self) -> bool { self.code >= 200 }
}

/// A minimal `sip:`/`sips:` URI: scheme, optional user, host, optional port.
///
/// Parameters beyond `user`/`host`/`port` (e.g. `transport=`) are kept as
/// an opaque tail so they round-trip even though this crate does not
/// interpret them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    pub secure: bool,
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub params: String,
}

impl Uri {
    pub fn new(host: impl Into<String>) -> Self {
        Self { secure: false, user: None, host: host.into(), port: None, params: String::new() }
    }

    pub fn parse(s: &str) -> crate::error::Result<Uri> {
        let s = s.trim();
        let s = s.strip_prefix('<').and_then(|s| s.strip_suffix('>')).unwrap_or(s);
        let (scheme, rest) = s.split_once(':')
            .ok_or_else(|| crate::error::Error::InvalidUri(s.to_string()))?;
        let secure = match scheme.to_ascii_lowercase().as_str() {
            "sip" => false,
            "sips" => true,
            _ => return Err(crate::error::Error::InvalidUri(s.to_string())),
        };
        let (userinfo_and_host, params) = match rest.split_once(';') {
            Some((a, b)) => (a, b.to_string()),
            None => (rest, String::new()),
        };
        let (user, hostport) = match userinfo_and_host.split_once('@') {
            Some((u, h)) => (Some(u.to_string()), h),
            None => (None, userinfo_and_host),
        };
        let (host, port) = match hostport.split_once(':') {
            Some((h, p)) => (
                h.to_string(),
                Some(p.parse::<u16>().map_err(|_| crate::error::Error::InvalidUri(s.to_string()))?),
            ),
            None => (hostport.to_string(), None),
        };
        Ok(Uri { secure, user, host, port, params })
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", if self.secure { "sips" } else { "sip" })?;
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        if !self.params.is_empty() {
            write!(f, ";{}", self.params)?;
        }
        Ok(())
    }
}

/// A display-name + URI + parameter pair, as used by From/To/Contact.
///
/// The `tag` parameter is pulled out explicitly because dialog matching
/// (spec §4.5) keys on it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub display_name: Option<String>,
    pub uri: Uri,
    pub tag: Option<String>,
    /// Any other `;name=value` parameters, verbatim, comma-joined.
    pub extra_params: Vec<(String, String)>,
}

impl Address {
    pub fn new(uri: Uri) -> Self {
        Self { display_name: None, uri, tag: None, extra_params: Vec::new() }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.display_name {
            write!(f, "\"{}\" ", name)?;
        }
        write!(f, "<{}>", self.uri)?;
        if let Some(tag) = &self.tag {
            write!(f, ";tag={}", tag)?;
        }
        for (k, v) in &self.extra_params {
            write!(f, ";{}={}", k, v)?;
        }
        Ok(())
    }
}

/// A single Via header entry (top-of-stack is index 0 of
/// [`crate::Message::via`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Via {
    pub transport: String,
    pub sent_by_host: String,
    pub sent_by_port: Option<u16>,
    pub branch: Option<String>,
    pub received: Option<String>,
    pub rport: Option<u16>,
}

impl Via {
    pub fn new(transport: impl Into<String>, host: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            transport: transport.into(),
            sent_by_host: host.into(),
            sent_by_port: None,
            branch: Some(branch.into()),
            received: None,
            rport: None,
        }
    }

    /// `sent-by` as it should be echoed back: host[:port].
    pub fn sent_by(&self) -> String {
        match self.sent_by_port {
            Some(p) => format!("{}:{}", self.sent_by_host, p),
            None => self.sent_by_host.clone(),
        }
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0/{} {}", self.transport, self.sent_by())?;
        if let Some(branch) = &self.branch {
            write!(f, ";branch={}", branch)?;
        }
        if let Some(received) = &self.received {
            write!(f, ";received={}", received)?;
        }
        if let Some(rport) = self.rport {
            write!(f, ";rport={}", rport)?;
        }
        Ok(())
    }
}
