use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use dns::{DnsType, Message, build_mdns_answer};

use crate::connection::Connection;
use crate::event::{Event, EventHandler};
use crate::socket::{MDNS_MULTICAST_IPV4, MDNS_PORT};

/// Answers multicast DNS A questions for one name.
///
/// Installed as a protocol handler on a UDP listener. Each received datagram
/// is consumed from the connection's receive buffer. Answers go to the
/// multicast group, or straight back to the asker when the question
/// requests a unicast response.
pub struct MdnsResponder {
    name: String,
    addr: Ipv4Addr,
    group: SocketAddr,
}

impl MdnsResponder {
    /// Responds for `name`; a trailing `.local` is optional.
    pub fn new(name: &str, addr: Ipv4Addr) -> Self {
        let name = name.trim_end_matches('.');
        let name = if name.to_ascii_lowercase().ends_with(".local") {
            name.to_owned()
        } else {
            format!("{name}.local")
        };
        Self {
            name,
            addr,
            group: SocketAddr::new(IpAddr::V4(MDNS_MULTICAST_IPV4), MDNS_PORT),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn respond(&self, conn: &mut Connection, data: &[u8]) {
        let msg = match Message::unpack(data) {
            Ok(msg) => msg,
            Err(err) => {
                log::trace!("{} mDNS: ignoring datagram: {err}", conn.id());
                return;
            }
        };
        if msg.header.response || msg.header.op_code != 0 {
            return;
        }

        let Some(question) = msg.questions.iter().find(|q| {
            matches!(q.typ, DnsType::A | DnsType::All) && q.name.matches(&self.name)
        }) else {
            return;
        };

        let unicast = question.class.unicast_response();
        let id = if unicast { msg.header.id } else { 0 };
        let answer = match build_mdns_answer(id, &self.name, self.addr) {
            Ok(answer) => answer,
            Err(err) => {
                log::warn!("{} mDNS: cannot answer for {}: {err}", conn.id(), self.name);
                return;
            }
        };

        if !unicast {
            conn.set_peer(self.group);
        }
        match conn.send(&answer) {
            Ok(()) => log::debug!(
                "{} mDNS {} response sent to {}",
                conn.id(),
                if unicast { 'U' } else { 'M' },
                conn.peer()
            ),
            Err(err) => log::warn!("{} mDNS: send failed: {err}", conn.id()),
        }
    }
}

impl EventHandler for MdnsResponder {
    fn handle_event(&mut self, conn: &mut Connection, event: &Event<'_>) {
        if let Event::Read(data) = event {
            self.respond(conn, data);
            let len = conn.recv().len();
            conn.recv_mut().delete(0, len);
        }
    }
}
