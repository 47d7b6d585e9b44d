//! The Dialog Table (spec §4.5, §3 "Dialog").
//!
//! Matching rule per RFC 3261 §12: a UAS matches an in-dialog request by
//! (Call-ID, local tag, remote tag) with a role-swap — what the dialog
//! calls its "local" tag is the *To* tag on the request that created it,
//! and its "remote" tag is the *From* tag, so matching an incoming
//! request for a dialog we're the callee in compares dialog.local_tag
//! against the request's To-tag and dialog.remote_tag against its From-tag.

use sip_message::{Message, Uri};

use crate::key::TransactionKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Early,
    Confirmed,
}

/// Uniquely identifies a dialog (spec §3 "Dialog": "identified by
/// (Call-ID, local-tag, remote-tag)").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DialogId {
    pub call_id: String,
    pub local_tag: String,
    pub remote_tag: String,
}

pub struct Dialog {
    pub id: DialogId,
    pub local_uri: Uri,
    pub remote_uri: Uri,
    pub remote_target: Uri,
    /// Built from `Record-Route`, most-recently-added first (RFC 3261
    /// §12.1.1: the callee reverses the order it saw them in).
    pub route_set: Vec<Uri>,
    pub local_cseq: u32,
    pub remote_cseq: u32,
    pub secure: bool,
    pub state: DialogState,
    /// The IST that established this dialog — its 2xx retransmissions
    /// stop once the dialog is confirmed (spec §4.5: "stop_retransmissions").
    pub ist_key: TransactionKey,
}

impl Dialog {
    /// Builds a dialog from a UAS's perspective: we sent `response` to
    /// `request` (spec §4.4 "On IST_STATUS_2XX_SENT"). Local tag is the
    /// response's To-tag (ours), remote tag is the request's From-tag
    /// (theirs).
    pub fn from_uas(request: &Message, response: &Message, ist_key: TransactionKey) -> Self {
        let local_tag = response.to.tag.clone().unwrap_or_default();
        let remote_tag = request.from.tag.clone().unwrap_or_default();
        let state = if response.status().is_some_and(sip_message::StatusCode::is_success) {
            DialogState::Confirmed
        } else {
            DialogState::Early
        };

        Self {
            id: DialogId { call_id: request.call_id.clone(), local_tag, remote_tag },
            local_uri: response.to.uri.clone(),
            remote_uri: request.from.uri.clone(),
            remote_target: request.contact.as_ref().map(|c| c.uri.clone()).unwrap_or_else(|| request.from.uri.clone()),
            route_set: response.record_route.iter().rev().cloned().collect(),
            local_cseq: 0,
            remote_cseq: request.cseq,
            secure: request.request_uri().is_some_and(|u| u.secure),
            state,
            ist_key,
        }
    }
}

/// Ordered sequence of dialogs keyed by (Call-ID, local-tag, remote-tag)
/// (spec §4.5).
#[derive(Default)]
pub struct DialogTable {
    dialogs: Vec<Dialog>,
}

impl DialogTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dialog: Dialog) {
        tracing::debug!(call_id = %dialog.id.call_id, local_tag = %dialog.id.local_tag, remote_tag = %dialog.id.remote_tag, "dialog inserted");
        self.dialogs.push(dialog);
    }

    pub fn confirm(&mut self, id: &DialogId) {
        if let Some(dialog) = self.dialogs.iter_mut().find(|d| &d.id == id) {
            dialog.state = DialogState::Confirmed;
        }
    }

    /// Matches an incoming request as a UAS would (spec §4.5 `find_as_uas`,
    /// RFC 3261 §12): role-swapped against the dialog's own tags.
    pub fn find_as_uas(&self, message: &Message) -> Option<&Dialog> {
        let to_tag = message.to.tag.as_deref()?;
        let from_tag = message.from.tag.as_deref()?;
        self.dialogs
            .iter()
            .find(|d| d.id.call_id == message.call_id && d.id.local_tag == to_tag && d.id.remote_tag == from_tag)
    }

    pub fn find_as_uas_mut(&mut self, message: &Message) -> Option<&mut Dialog> {
        let to_tag = message.to.tag.clone()?;
        let from_tag = message.from.tag.clone()?;
        self.dialogs
            .iter_mut()
            .find(|d| d.id.call_id == message.call_id && d.id.local_tag == to_tag && d.id.remote_tag == from_tag)
    }

    pub fn remove(&mut self, id: &DialogId) -> Option<Dialog> {
        let index = self.dialogs.iter().position(|d| &d.id == id)?;
        tracing::debug!(call_id = %id.call_id, "dialog removed");
        Some(self.dialogs.remove(index))
    }

    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::TransactionKind;
    use sip_message::{init_request, init_response, Method};

    fn dummy_ist_key() -> TransactionKey {
        TransactionKey::new("z9hG4bK-2", "host", Method::Invite, TransactionKind::Ist)
    }

    #[test]
    fn dialog_from_uas_role_swaps_tags() {
        let mut req = init_request(Method::Invite, Uri::parse("sip:bob@example.com").unwrap());
        req.from = sip_message::Address::new(Uri::parse("sip:alice@example.com").unwrap()).with_tag("ft2");
        req.to = sip_message::Address::new(Uri::parse("sip:bob@example.com").unwrap());
        req.call_id = "c2".to_string();
        let resp = init_response(&req, 200);

        let dialog = Dialog::from_uas(&req, &resp, dummy_ist_key());
        assert_eq!(dialog.id.call_id, "c2");
        assert_eq!(dialog.id.remote_tag, "ft2");
        assert_eq!(dialog.id.local_tag, resp.to.tag.clone().unwrap());
        assert_eq!(dialog.state, DialogState::Confirmed);
    }

    #[test]
    fn find_as_uas_matches_incoming_ack() {
        let mut req = init_request(Method::Invite, Uri::parse("sip:bob@example.com").unwrap());
        req.from = sip_message::Address::new(Uri::parse("sip:alice@example.com").unwrap()).with_tag("ft2");
        req.to = sip_message::Address::new(Uri::parse("sip:bob@example.com").unwrap());
        req.call_id = "c2".to_string();
        let resp = init_response(&req, 200);
        let dialog = Dialog::from_uas(&req, &resp, dummy_ist_key());

        let mut table = DialogTable::new();
        table.insert(dialog);

        let mut ack = init_request(Method::Ack, Uri::parse("sip:bob@example.com").unwrap());
        ack.from = req.from.clone();
        ack.to = resp.to.clone();
        ack.call_id = req.call_id.clone();

        assert!(table.find_as_uas(&ack).is_some());
    }

    #[test]
    fn unrelated_message_does_not_match() {
        let table = DialogTable::new();
        let mut ack = init_request(Method::Ack, Uri::parse("sip:bob@example.com").unwrap());
        ack.from = sip_message::Address::new(Uri::parse("sip:x@example.com").unwrap()).with_tag("a");
        ack.to = sip_message::Address::new(Uri::parse("sip:y@example.com").unwrap()).with_tag("b");
        ack.call_id = "nope".to_string();
        assert!(table.find_as_uas(&ack).is_none());
    }
}
