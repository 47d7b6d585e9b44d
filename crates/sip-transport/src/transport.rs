//! Non-blocking UDP socket bound to [`sip_reactor::Reactor`] (spec §4.2).
//!
//! Grounded on `rvoip_sip_transport::transport::udp::UdpTransport` (bind,
//! spawn-receive-loop, send/close/is_closed) and on `estransport.c`'s
//! `es_transport_init/start/stop/destroy/set_dscp/send` for the exact
//! constants and two-phase init/start split. Where the teacher spawns a
//! tokio task per socket, this reads the socket off the reactor's readable
//! notification instead, consistent with the single-thread model in §4.1.

use std::net::SocketAddr;

use mio::net::UdpSocket as MioUdpSocket;
use mio::Interest;
use sip_reactor::{Priority, Reactor, Token};
use socket2::{Domain, Protocol, SockRef, Socket as Socket2, Type};

use crate::config::TransportConfig;
use crate::error::{Error, Result};

/// Sinks the transport delivers datagrams and generic I/O notifications
/// to, set once via [`Transport::set_callbacks`] (spec §4.2).
pub struct Callbacks {
    /// Called once per datagram received, with the accepted slice (already
    /// truncated to `max_datagram_size` and NUL-terminated past its end)
    /// and the peer address.
    pub on_msg_recv: Box<dyn FnMut(&[u8], SocketAddr)>,
    /// A generic "I/O happened" notification the upper layer may ignore.
    pub on_event: Box<dyn FnMut()>,
}

impl Default for Callbacks {
    fn default() -> Self {
        Self { on_msg_recv: Box::new(|_, _| {}), on_event: Box::new(|| {}) }
    }
}

/// A non-blocking UDP socket registered with a [`Reactor`].
///
/// `init` only allocates the socket and sets `SO_REUSEADDR`; `start` binds
/// it and registers it for readability. The split matches `es_transport_init`
/// vs `es_transport_start` in the original, and lets a caller swap in a
/// different bind address right up until `start()`.
pub struct Transport {
    config: TransportConfig,
    socket: Option<MioUdpSocket>,
    token: Option<Token>,
    callbacks: Callbacks,
    recv_buf: Vec<u8>,
}

impl Transport {
    pub fn init(config: TransportConfig) -> Result<Self> {
        let recv_buf = vec![0u8; config.max_datagram_size + 1];
        Ok(Self { config, socket: None, token: None, callbacks: Callbacks::default(), recv_buf })
    }

    pub fn set_callbacks(&mut self, callbacks: Callbacks) {
        self.callbacks = callbacks;
    }

    /// Binds the configured address, applies DSCP if set, and registers the
    /// socket as readable, persistent, at I/O priority (spec §4.2 `start()`).
    pub fn start(&mut self, reactor: &mut Reactor) -> Result<()> {
        if self.socket.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let domain = if self.config.bind_addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
        let socket = Socket2::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_nonblocking(true)?;
        socket.set_reuse_address(true)?;
        socket.bind(&self.config.bind_addr.into())?;
        if let Some(dscp) = self.config.dscp {
            socket.set_tos(tos_value(dscp))?;
        }

        let std_socket: std::net::UdpSocket = socket.into();
        let mut mio_socket = MioUdpSocket::from_std(std_socket);
        let token = reactor.register_io(&mut mio_socket, Priority::Io, Interest::READABLE)?;

        tracing::info!(addr = %self.config.bind_addr, "SIP UDP transport started");
        self.socket = Some(mio_socket);
        self.token = Some(token);
        Ok(())
    }

    /// Deregisters the socket from the reactor without closing it.
    pub fn stop(&mut self, reactor: &mut Reactor) -> Result<()> {
        if let (Some(mut socket), Some(token)) = (self.socket.take(), self.token.take()) {
            reactor.deregister_io(&mut socket, token)?;
            tracing::info!("SIP UDP transport stopped");
        }
        Ok(())
    }

    /// Stops (if still running) and drops the socket, zeroing this
    /// transport's bookkeeping (spec §4.2 `destroy()`).
    pub fn destroy(mut self, reactor: &mut Reactor) -> Result<()> {
        self.stop(reactor)
    }

    /// The reactor token this transport's socket is registered under, once
    /// started.
    pub fn token(&self) -> Option<Token> {
        self.token
    }

    /// Exposes the bound local address so responses can be correlated back
    /// to the socket they arrived on (spec §4.2 `local_socket`).
    pub fn local_socket(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Fire-and-forget `sendto`; does not await network completion (spec
    /// §5 "Outbound datagram send is fire-and-forget at this layer").
    pub fn send(&self, destination: SocketAddr, bytes: &[u8]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(Error::NotStarted)?;
        match socket.send_to(bytes, destination) {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(%destination, error = %e, "sendto failed");
                Err(Error::Io(e))
            }
        }
    }

    /// Sets `IP_TOS = (dscp << 2) & 0xff` (spec §4.2, §6.1).
    pub fn set_dscp(&mut self, dscp: u8) -> Result<()> {
        self.config.dscp = Some(dscp);
        if let Some(socket) = &self.socket {
            SockRef::from(socket).set_tos(tos_value(dscp))?;
        }
        Ok(())
    }

    /// Drains every datagram currently available on the socket, delivering
    /// each through the registered callbacks (spec §4.2 "on readable").
    ///
    /// Called by the owner once the reactor reports this transport's token
    /// readable. Reads into a fixed `max_datagram_size`-byte window of
    /// `recv_buf`; anything longer is truncated by the kernel the same way
    /// `estransport.c`'s fixed 2048-byte buffer truncates it.
    pub fn readable(&mut self) {
        let Some(socket) = &self.socket else { return };
        let max = self.config.max_datagram_size;
        loop {
            match socket.recv_from(&mut self.recv_buf[..max]) {
                Ok((0, _)) => break,
                Ok((len, remote)) => {
                    // NUL-terminate past the accepted bytes (spec §4.2/§6.1).
                    self.recv_buf[len.min(max)] = 0;
                    (self.callbacks.on_msg_recv)(&self.recv_buf[..len], remote);
                    (self.callbacks.on_event)();
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(error = %e, "recvfrom failed");
                    break;
                }
            }
        }
    }

    /// Like [`Transport::readable`] but collects datagrams into `out`
    /// instead of dispatching through [`Callbacks`].
    ///
    /// Used by `sip_transaction::SipCore`'s receive path, which runs its
    /// own classify-and-dispatch logic per datagram rather than a
    /// fire-and-forget callback (spec §4.4 steps 1-7).
    pub fn recv_batch(&mut self, out: &mut Vec<(Vec<u8>, SocketAddr)>) {
        let Some(socket) = &self.socket else { return };
        let max = self.config.max_datagram_size;
        loop {
            match socket.recv_from(&mut self.recv_buf[..max]) {
                Ok((0, _)) => break,
                Ok((len, remote)) => {
                    self.recv_buf[len.min(max)] = 0;
                    out.push((self.recv_buf[..len].to_vec(), remote));
                    (self.callbacks.on_event)();
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(error = %e, "recvfrom failed");
                    break;
                }
            }
        }
    }
}

fn tos_value(dscp: u8) -> u32 {
    (u32::from(dscp) << 2) & 0xff
}
