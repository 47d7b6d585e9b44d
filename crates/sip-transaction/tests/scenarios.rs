//! End-to-end SipCore scenarios driven over a real loopback UDP socket
//! (spec §8 "End-to-end scenarios").

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use serial_test::serial;
use sip_message::{init_request, message_to_bytes, parse_message, Address, Method, Uri, Via};
use sip_reactor::Reactor;
use sip_transaction::{EngineConfig, SipCore, TransactionKind};
use sip_transport::TransportConfig;

fn loopback_config() -> TransportConfig {
    TransportConfig::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
}

fn start_core() -> (Reactor, SipCore) {
    let mut reactor = Reactor::new().unwrap();
    let mut core = SipCore::new(loopback_config(), EngineConfig::new()).unwrap();
    core.start(&mut reactor).unwrap();
    (reactor, core)
}

/// Drives `reactor`/`core` turns until `client` has a datagram to read or
/// the attempt budget runs out; returns the parsed response.
fn recv_response(reactor: &mut Reactor, core: &mut SipCore, client: &UdpSocket) -> sip_message::Message {
    let mut buf = [0u8; 2048];
    for _ in 0..400 {
        reactor.turn(&mut |reactor, token, readiness| core.handle(reactor, token, readiness)).unwrap();
        if let Ok((len, _)) = client.recv_from(&mut buf) {
            return parse_message(&buf[..len]).unwrap();
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("no response arrived in time");
}

fn drain_a_few_turns(reactor: &mut Reactor, core: &mut SipCore) {
    for _ in 0..5 {
        reactor.turn(&mut |reactor, token, readiness| core.handle(reactor, token, readiness)).unwrap();
    }
}

fn client_socket() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.set_nonblocking(true).unwrap();
    socket
}

#[test]
#[serial]
fn register_gets_200_ok_with_generated_to_tag() {
    let (mut reactor, mut core) = start_core();
    let server_addr = core.local_socket().unwrap();
    let client = client_socket();

    let mut req = init_request(Method::Register, Uri::parse("sip:example.com").unwrap());
    req.via.push(Via::new("UDP", "10.0.0.1", "z9hG4bK-1"));
    req.from = Address::new(Uri::parse("sip:a@example.com").unwrap()).with_tag("ft1");
    req.to = Address::new(Uri::parse("sip:a@example.com").unwrap());
    req.call_id = "c1".to_string();
    client.send_to(&message_to_bytes(&req), server_addr).unwrap();

    let response = recv_response(&mut reactor, &mut core, &client);
    assert_eq!(response.status().unwrap().code, 200);
    assert_eq!(response.via, req.via);
    assert_eq!(response.from, req.from);
    assert_eq!(response.call_id, req.call_id);
    assert_eq!(response.cseq, req.cseq);
    assert!(response.to.tag.is_some(), "To must gain a generated tag");
}

#[test]
#[serial]
fn invite_ack_bye_runs_the_full_dialog_lifecycle() {
    let (mut reactor, mut core) = start_core();
    let server_addr = core.local_socket().unwrap();
    let client = client_socket();

    let mut invite = init_request(Method::Invite, Uri::parse("sip:bob@example.com").unwrap());
    invite.via.push(Via::new("UDP", "10.0.0.2", "z9hG4bK-2"));
    invite.from = Address::new(Uri::parse("sip:alice@example.com").unwrap()).with_tag("ft2");
    invite.to = Address::new(Uri::parse("sip:bob@example.com").unwrap());
    invite.call_id = "c2".to_string();
    client.send_to(&message_to_bytes(&invite), server_addr).unwrap();

    let ok = recv_response(&mut reactor, &mut core, &client);
    assert_eq!(ok.status().unwrap().code, 200);
    assert_eq!(core.transaction_count(TransactionKind::Ist), 1);
    assert_eq!(core.dialog_count(), 1);

    let mut ack = init_request(Method::Ack, Uri::parse("sip:bob@example.com").unwrap());
    ack.via = invite.via.clone();
    ack.from = invite.from.clone();
    ack.to = ok.to.clone();
    ack.call_id = invite.call_id.clone();
    ack.cseq = invite.cseq;
    client.send_to(&message_to_bytes(&ack), server_addr).unwrap();
    drain_a_few_turns(&mut reactor, &mut core);
    assert_eq!(core.dialog_count(), 1, "dialog survives the ACK");

    // In-dialog BYE from the original UAC: From/To keep the same tags the
    // INVITE/200 OK established (ft2 local to the caller, tT the callee's).
    let mut bye = init_request(Method::Bye, Uri::parse("sip:alice@example.com").unwrap());
    bye.via.push(Via::new("UDP", "10.0.0.2", "z9hG4bK-3"));
    bye.from = invite.from.clone();
    bye.to = ok.to.clone();
    bye.call_id = invite.call_id.clone();
    client.send_to(&message_to_bytes(&bye), server_addr).unwrap();

    let bye_ok = recv_response(&mut reactor, &mut core, &client);
    assert_eq!(bye_ok.status().unwrap().code, 200);
    assert_eq!(core.dialog_count(), 0, "BYE must remove the dialog");
}

#[test]
#[serial]
fn unknown_method_gets_501() {
    let (mut reactor, mut core) = start_core();
    let server_addr = core.local_socket().unwrap();
    let client = client_socket();

    let mut req = init_request(Method::parse("FROBNICATE"), Uri::parse("sip:x@example.com").unwrap());
    req.via.push(Via::new("UDP", "10.0.0.3", "z9hG4bK-4"));
    req.from = Address::new(Uri::parse("sip:a@example.com").unwrap()).with_tag("ft4");
    req.to = Address::new(Uri::parse("sip:x@example.com").unwrap());
    req.call_id = "c4".to_string();
    client.send_to(&message_to_bytes(&req), server_addr).unwrap();

    let response = recv_response(&mut reactor, &mut core, &client);
    assert_eq!(response.status().unwrap().code, 501);
}

#[test]
#[serial]
fn duplicate_invite_does_not_create_a_second_transaction() {
    let (mut reactor, mut core) = start_core();
    let server_addr = core.local_socket().unwrap();
    let client = client_socket();

    let mut invite = init_request(Method::Invite, Uri::parse("sip:bob@example.com").unwrap());
    invite.via.push(Via::new("UDP", "10.0.0.4", "z9hG4bK-5"));
    invite.from = Address::new(Uri::parse("sip:alice@example.com").unwrap()).with_tag("ft5");
    invite.to = Address::new(Uri::parse("sip:bob@example.com").unwrap());
    invite.call_id = "c5".to_string();
    let bytes = message_to_bytes(&invite);

    client.send_to(&bytes, server_addr).unwrap();
    let first = recv_response(&mut reactor, &mut core, &client);
    assert_eq!(core.transaction_count(TransactionKind::Ist), 1);

    client.send_to(&bytes, server_addr).unwrap();
    let second = recv_response(&mut reactor, &mut core, &client);
    assert_eq!(core.transaction_count(TransactionKind::Ist), 1, "a retransmit must not create a new IST");
    assert_eq!(first.to.tag, second.to.tag, "the retransmitted 200 must be the same stored response");
}

#[test]
#[serial]
fn stray_response_is_dropped_without_creating_anything() {
    let (mut reactor, mut core) = start_core();
    let server_addr = core.local_socket().unwrap();
    let client = client_socket();

    let mut fake_invite = init_request(Method::Invite, Uri::parse("sip:bob@example.com").unwrap());
    fake_invite.via.push(Via::new("UDP", "10.0.0.5", "z9hG4bK-nonexistent"));
    let response = sip_message::init_response(&fake_invite, 200);
    client.send_to(&message_to_bytes(&response), server_addr).unwrap();

    drain_a_few_turns(&mut reactor, &mut core);

    assert_eq!(core.transaction_count(TransactionKind::Ict), 0);
    assert_eq!(core.transaction_count(TransactionKind::Ist), 0);
    assert_eq!(core.dialog_count(), 0);

    let mut buf = [0u8; 2048];
    assert!(client.recv_from(&mut buf).is_err(), "no reply should be sent for a stray response");
}
