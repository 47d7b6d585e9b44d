//! Facade crate: re-exports the reactor, transport, and transaction/dialog
//! engine as a single dependency, the way the teacher's own `rvoip` crate
//! re-exports its stack of `rvoip-*` crates under one name.
//!
//! An embedding application needs exactly three things to run a SIP
//! endpoint: a [`Reactor`] to own, a [`SipCore`] built from a
//! [`TransportConfig`]/[`EngineConfig`] pair, and a loop that calls
//! [`SipCore::start`] once and then forwards every `reactor.run` callback
//! into [`SipCore::handle`]. [`run_until_signalled`] wires that up for the
//! common case of "run until told to stop."

pub use sip_message::{
    init_request, init_response, message_to_bytes, parse_message, Address, Message, Method,
    StartLine, StatusCode, Uri, Via,
};
pub use sip_reactor::{Priority, Readiness, Reactor, Token};
pub use sip_transport::{TransportConfig, DEFAULT_MAX_DATAGRAM_SIZE, DEFAULT_SIP_PORT};
pub use sip_transaction::{
    Dialog, DialogId, DialogState, DialogTable, EngineConfig, Error, Event, Result, SipCore,
    TimerSettings, TimerType, TransactionKey, TransactionKind,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Runs `core` on `reactor` until `keep_running` is cleared, dispatching
/// every ready registration to [`SipCore::handle`] (spec §4.1 "the reactor
/// drives everything; the engine never blocks").
///
/// Grounded on `esosip.c`'s top-level `_es_osip_loop` call site, which
/// likewise just spins `event_base_loop` until a shutdown flag is set.
pub fn run_until_signalled(
    reactor: &mut Reactor,
    core: &mut SipCore,
    keep_running: Arc<AtomicBool>,
) -> sip_reactor::Result<()> {
    while keep_running.load(Ordering::SeqCst) {
        reactor.turn(&mut |reactor, token, readiness| {
            core.handle(reactor, token, readiness);
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;

    fn loopback() -> TransportConfig {
        TransportConfig::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
    }

    #[test]
    fn sip_core_starts_and_stops_cleanly() {
        let mut reactor = Reactor::new().unwrap();
        let mut core = SipCore::new(loopback(), EngineConfig::new()).unwrap();
        core.start(&mut reactor).unwrap();
        assert!(core.local_socket().is_some());
        core.stop(&mut reactor).unwrap();
    }

    #[test]
    fn register_round_trip_answers_200_ok() {
        let mut server_reactor = Reactor::new().unwrap();
        let mut server = SipCore::new(loopback(), EngineConfig::new()).unwrap();
        server.start(&mut server_reactor).unwrap();
        let server_addr = server.local_socket().unwrap();

        let client_socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        client_socket.set_nonblocking(true).unwrap();

        let mut req = init_request(Method::Register, Uri::parse("sip:example.com").unwrap());
        req.via.push(Via::new("UDP", "client.example.com", "z9hG4bK-reg1"));
        req.from = Address::new(Uri::parse("sip:alice@example.com").unwrap()).with_tag("ft1");
        req.to = Address::new(Uri::parse("sip:alice@example.com").unwrap());
        req.call_id = "reg-call-1".to_string();
        let bytes = message_to_bytes(&req);
        client_socket.send_to(&bytes, server_addr).unwrap();

        let mut buf = [0u8; 2048];
        let mut got_response = None;
        for _ in 0..200 {
            server_reactor
                .turn(&mut |reactor, token, readiness| server.handle(reactor, token, readiness))
                .unwrap();
            if let Ok((len, _)) = client_socket.recv_from(&mut buf) {
                got_response = Some(parse_message(&buf[..len]).unwrap());
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        let response = got_response.expect("server should have answered the REGISTER");
        assert_eq!(response.status().unwrap().code, 200);
        // The NIST lingers in Completed (Timer J) to absorb retransmits.
        assert_eq!(server.transaction_count(TransactionKind::Nist), 1);
    }
}
