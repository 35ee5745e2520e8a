//! Values negotiated for one logical connection.
//!
//! Inbound values are this side's own configuration, announced to the peer in CONNECT (client)
//! or CONNACK (server). Outbound values are learned from the peer's CONNECT or CONNACK.

use std::collections::HashMap;

use log::debug;

use crate::{
    constants::MAX_PACKET_SIZE,
    error::DecodeError,
    packets::{conn_ack_packet::ConnAckPacket, connect_packet::ConnectPacket},
    protocol::PacketType,
};

#[derive(Debug, Clone)]
pub struct ConnectionLimits {
    maximum_packet_size_inbound: u32,
    maximum_packet_size_outbound: u32,

    /// 0 means the corresponding direction does not use Topic Aliases.
    topic_alias_maximum_inbound: u16,
    topic_alias_maximum_outbound: u16,

    problem_information_requested: bool,
    peer_problem_information_requested: bool,
    response_information_requested: bool,

    /// Topic Alias mappings established by inbound PUBLISH packets.
    topic_aliases: HashMap<u16, String>,

    negotiated: bool,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            maximum_packet_size_inbound: MAX_PACKET_SIZE,
            maximum_packet_size_outbound: MAX_PACKET_SIZE,
            topic_alias_maximum_inbound: 0,
            topic_alias_maximum_outbound: 0,
            problem_information_requested: true,
            peer_problem_information_requested: true,
            response_information_requested: false,
            topic_aliases: HashMap::new(),
            negotiated: false,
        }
    }
}

impl ConnectionLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum Packet Size this side accepts.
    pub fn with_maximum_packet_size(mut self, maximum_packet_size: u32) -> Self {
        self.maximum_packet_size_inbound = maximum_packet_size;
        self
    }

    /// Highest Topic Alias this side accepts from the peer.
    pub fn with_topic_alias_maximum(mut self, topic_alias_maximum: u16) -> Self {
        self.topic_alias_maximum_inbound = topic_alias_maximum;
        self
    }

    pub fn with_request_problem_information(mut self, requested: bool) -> Self {
        self.problem_information_requested = requested;
        self
    }

    pub fn with_request_response_information(mut self, requested: bool) -> Self {
        self.response_information_requested = requested;
        self
    }

    pub fn maximum_packet_size_inbound(&self) -> u32 {
        self.maximum_packet_size_inbound
    }

    pub fn maximum_packet_size_outbound(&self) -> u32 {
        self.maximum_packet_size_outbound
    }

    pub fn topic_alias_maximum_inbound(&self) -> u16 {
        self.topic_alias_maximum_inbound
    }

    pub fn topic_alias_maximum_outbound(&self) -> u16 {
        self.topic_alias_maximum_outbound
    }

    pub fn problem_information_requested(&self) -> bool {
        self.problem_information_requested
    }

    /// Whether Reason Strings and User Properties may be sent to the peer on failures.
    pub fn peer_problem_information_requested(&self) -> bool {
        self.peer_problem_information_requested
    }

    pub fn set_peer_problem_information_requested(&mut self, requested: bool) {
        self.peer_problem_information_requested = requested;
    }

    pub fn response_information_requested(&self) -> bool {
        self.response_information_requested
    }

    /// Whether a CONNACK or CONNECT has already been applied.
    pub fn is_negotiated(&self) -> bool {
        self.negotiated
    }

    /// Topic the peer mapped to `alias`, if any.
    pub fn topic_alias(&self, alias: u16) -> Option<&str> {
        self.topic_aliases.get(&alias).map(String::as_str)
    }

    pub(crate) fn register_topic_alias(&mut self, alias: u16, topic_name: String) {
        self.topic_aliases.insert(alias, topic_name);
    }

    /// Client side: take over the values the Server announced in its CONNACK.
    ///
    /// # Errors
    /// - `DecodeError::ProtocolError` if a CONNACK was already applied on this connection.
    pub fn apply_connack(&mut self, packet: &ConnAckPacket) -> Result<(), DecodeError> {
        self.begin_negotiation(PacketType::ConnAck)?;

        self.maximum_packet_size_outbound = packet.maximum_packet_size.unwrap_or(MAX_PACKET_SIZE);
        self.topic_alias_maximum_outbound = packet.topic_alias_maximum.unwrap_or(0);

        debug!(
            "Negotiated from CONNACK: maximum packet size {}, topic alias maximum {}",
            self.maximum_packet_size_outbound, self.topic_alias_maximum_outbound
        );

        Ok(())
    }

    /// Server side: take over the values the Client announced in its CONNECT.
    ///
    /// # Errors
    /// - `DecodeError::ProtocolError` if a CONNECT was already applied on this connection.
    pub fn apply_connect(&mut self, packet: &ConnectPacket) -> Result<(), DecodeError> {
        self.begin_negotiation(PacketType::Connect)?;

        self.maximum_packet_size_outbound = packet.maximum_packet_size.unwrap_or(MAX_PACKET_SIZE);
        self.topic_alias_maximum_outbound = packet.topic_alias_maximum.unwrap_or(0);
        self.peer_problem_information_requested =
            packet.request_problem_information.unwrap_or(true);

        debug!(
            "Negotiated from CONNECT: maximum packet size {}, topic alias maximum {}, problem information {}",
            self.maximum_packet_size_outbound,
            self.topic_alias_maximum_outbound,
            self.peer_problem_information_requested
        );

        Ok(())
    }

    fn begin_negotiation(&mut self, packet_type: PacketType) -> Result<(), DecodeError> {
        if self.negotiated {
            return Err(DecodeError::protocol(format!(
                "{packet_type} must not be received more than once on a connection"
            )));
        }

        self.negotiated = true;
        Ok(())
    }

    /// Forget everything learned from the peer. Called when the transport reconnects.
    pub fn reset(&mut self) {
        self.maximum_packet_size_outbound = MAX_PACKET_SIZE;
        self.topic_alias_maximum_outbound = 0;
        self.peer_problem_information_requested = true;
        self.topic_aliases.clear();
        self.negotiated = false;
    }

    /// Reason String and User Property on acknowledgements are only allowed when this side asked
    /// for problem information.
    pub(crate) fn check_problem_information(
        &self,
        packet_type: PacketType,
        name: &str,
    ) -> Result<(), DecodeError> {
        if self.problem_information_requested {
            return Ok(());
        }

        Err(DecodeError::protocol(format!(
            "{packet_type} must not include {name} if problem information was not requested"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_topic_aliases() {
        let limits = ConnectionLimits::default();
        assert_eq!(limits.maximum_packet_size_inbound(), MAX_PACKET_SIZE);
        assert_eq!(limits.topic_alias_maximum_inbound(), 0);
        assert!(limits.problem_information_requested());
        assert!(!limits.response_information_requested());
    }

    #[test]
    fn connack_sets_outbound_values_once() {
        let mut limits = ConnectionLimits::new().with_topic_alias_maximum(10);
        let connack = ConnAckPacket {
            maximum_packet_size: Some(1024),
            topic_alias_maximum: Some(5),
            ..ConnAckPacket::default()
        };

        limits.apply_connack(&connack).unwrap();
        assert_eq!(limits.maximum_packet_size_outbound(), 1024);
        assert_eq!(limits.topic_alias_maximum_outbound(), 5);
        assert_eq!(limits.topic_alias_maximum_inbound(), 10);

        assert!(matches!(limits.apply_connack(&connack), Err(DecodeError::ProtocolError(_))));
    }

    #[test]
    fn reset_forgets_peer_state() {
        let mut limits = ConnectionLimits::new().with_maximum_packet_size(100);
        limits.register_topic_alias(1, "a/b".into());
        limits.set_peer_problem_information_requested(false);
        limits
            .apply_connack(&ConnAckPacket { maximum_packet_size: Some(50), ..Default::default() })
            .unwrap();

        limits.reset();

        assert_eq!(limits.topic_alias(1), None);
        assert!(limits.peer_problem_information_requested());
        assert!(!limits.is_negotiated());
        assert_eq!(limits.maximum_packet_size_outbound(), MAX_PACKET_SIZE);
        assert_eq!(limits.maximum_packet_size_inbound(), 100);
    }

    #[test]
    fn problem_information_gate() {
        let limits = ConnectionLimits::new().with_request_problem_information(false);
        assert!(limits.check_problem_information(PacketType::PubAck, "Reason String").is_err());
        assert!(ConnectionLimits::new()
            .check_problem_information(PacketType::PubAck, "Reason String")
            .is_ok());
    }
}
