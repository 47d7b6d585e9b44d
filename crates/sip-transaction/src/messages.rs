//! ACK construction helpers (RFC 3261 §13.2.2.4/§17.1.1.3).
//!
//! Not part of the parser contract (spec §6.2 only asks for
//! `init_request`/`init_response`) because an ACK is neither: it borrows
//! its Call-ID/From/CSeq-number from the INVITE and its To from the
//! response, but is its own request with its own branch rules.

use sip_message::{init_request, random_number, Message, Method};

/// ACK to a non-2xx final response: RFC 3261 §17.1.1.3 has it reuse the
/// INVITE's branch and Via unchanged, since it's part of the same
/// transaction.
pub(crate) fn ack_for_non_2xx(request: &Message, response: &Message) -> Message {
    let mut ack = init_request(Method::Ack, request.request_uri().cloned().unwrap_or_else(|| request.from.uri.clone()));
    ack.via = request.via.clone();
    ack.from = request.from.clone();
    ack.to = response.to.clone();
    ack.call_id = request.call_id.clone();
    ack.cseq = request.cseq;
    ack.cseq_method = Method::Ack;
    ack.route = request.route.clone();
    ack.max_forwards = request.max_forwards;
    ack
}

/// ACK to a 2xx final response: RFC 3261 §13.2.2.4 requires a *new*
/// branch, since this ACK is not part of the INVITE transaction (it is
/// routed end to end, dialog-style).
pub(crate) fn ack_for_2xx(request: &Message, response: &Message) -> Message {
    let mut ack = ack_for_non_2xx(request, response);
    if let Some(via) = ack.via.first_mut() {
        via.branch = Some(format!("z9hG4bK-{:08x}", random_number()));
    }
    ack
}

#[cfg(test)]
mod tests {
    use super::*;
    use sip_message::{init_response, Uri};

    fn sample_invite() -> Message {
        let mut req = init_request(Method::Invite, Uri::parse("sip:bob@example.com").unwrap());
        req.via.push(sip_message::Via::new("UDP", "alice.example.com", "z9hG4bK-1"));
        req.from = sip_message::Address::new(Uri::parse("sip:alice@example.com").unwrap()).with_tag("ft1");
        req.to = sip_message::Address::new(Uri::parse("sip:bob@example.com").unwrap());
        req.call_id = "call-1".to_string();
        req
    }

    #[test]
    fn non_2xx_ack_reuses_the_invite_branch() {
        let req = sample_invite();
        let resp = init_response(&req, 486);
        let ack = ack_for_non_2xx(&req, &resp);
        assert_eq!(ack.branch(), req.branch());
        assert_eq!(ack.to, resp.to);
        assert_eq!(ack.cseq_method, Method::Ack);
    }

    #[test]
    fn two_xx_ack_gets_a_fresh_branch() {
        let req = sample_invite();
        let resp = init_response(&req, 200);
        let ack = ack_for_2xx(&req, &resp);
        assert_ne!(ack.branch(), req.branch());
        assert_eq!(ack.to, resp.to);
    }
}
