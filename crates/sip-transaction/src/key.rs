//! Transaction identity (spec §3 "Transaction": "Identity: the four-tuple
//! (branch, sent-by Via, CSeq method, kind)").

use std::fmt;

use sip_message::Method;

/// Which of the four RFC 3261 state machines a transaction runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Ict,
    Ist,
    Nict,
    Nist,
}

impl TransactionKind {
    /// The kind a request creates, given which side of the dialog we're on
    /// (spec §4.3: ICT/NICT on the client side, IST/NIST on the server
    /// side).
    pub fn for_request(method: &Method, is_server: bool) -> Self {
        match (method.is_invite(), is_server) {
            (true, true) => TransactionKind::Ist,
            (true, false) => TransactionKind::Ict,
            (false, true) => TransactionKind::Nist,
            (false, false) => TransactionKind::Nict,
        }
    }

    pub fn is_invite(self) -> bool {
        matches!(self, TransactionKind::Ict | TransactionKind::Ist)
    }

    pub fn is_client(self) -> bool {
        matches!(self, TransactionKind::Ict | TransactionKind::Nict)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionKind::Ict => "ICT",
            TransactionKind::Ist => "IST",
            TransactionKind::Nict => "NICT",
            TransactionKind::Nist => "NIST",
        })
    }
}

/// Mirrors `rvoip_dialog_core::transaction::TransactionKey`: a hashable
/// identity replacing ad hoc tuple matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey {
    pub branch: String,
    pub sent_by: String,
    pub cseq_method: Method,
    pub kind: TransactionKind,
}

impl TransactionKey {
    pub fn new(branch: impl Into<String>, sent_by: impl Into<String>, cseq_method: Method, kind: TransactionKind) -> Self {
        Self { branch: branch.into(), sent_by: sent_by.into(), cseq_method, kind }
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.kind, self.branch, self.sent_by, self.cseq_method)
    }
}
