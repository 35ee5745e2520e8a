use bytes::Bytes;
use mqtt5_codec::{
    ConnAckPacket, ConnectPacket, ConnectReasonCode, Connection, ConnectionError,
    ConnectionLimits, DecodeError, DecoderRegistry, DisconnectReasonCode, Packet, PingReqPacket,
    PublishPacket, QoS,
};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn client_and_server_exchange_packets() {
    init_logger();
    let (client, server) = duplex(1024);

    let mut client = Connection::new(client, DecoderRegistry::client(), ConnectionLimits::default());
    let mut server = Connection::new(server, DecoderRegistry::server(), ConnectionLimits::default());

    let mut connect = ConnectPacket::new("sensor-1");
    connect.maximum_packet_size = Some(1024);
    client.write_packet(&connect.clone().into()).await.unwrap();

    let received = server.read_packet().await.unwrap();
    assert_eq!(received, Some(Packet::Connect(connect)));
    assert_eq!(server.limits().maximum_packet_size_outbound(), 1024);

    let mut connack = ConnAckPacket::new(ConnectReasonCode::Success);
    connack.topic_alias_maximum = Some(4);
    server.write_packet(&connack.clone().into()).await.unwrap();

    let received = client.read_packet().await.unwrap();
    assert_eq!(received, Some(Packet::ConnAck(connack)));
    assert_eq!(client.limits().topic_alias_maximum_outbound(), 4);

    let publish = PublishPacket::new("a/b", QoS::AtMostOnce, Bytes::from_static(b"payload"));
    client.write_packet(&publish.clone().into()).await.unwrap();
    client.write_packet(&PingReqPacket.into()).await.unwrap();

    assert_eq!(server.read_packet().await.unwrap(), Some(Packet::Publish(publish)));
    assert_eq!(server.read_packet().await.unwrap(), Some(Packet::PingReq(PingReqPacket)));

    drop(client);
    assert_eq!(server.read_packet().await.unwrap(), None);
}

#[tokio::test]
async fn packet_split_across_reads() {
    init_logger();
    let (mut peer, stream) = duplex(256);
    let mut connection =
        Connection::new(stream, DecoderRegistry::client(), ConnectionLimits::default());

    let reader = tokio::spawn(async move { connection.read_packet().await });

    peer.write_all(&[0x40]).await.unwrap();
    peer.write_all(&[0x02, 0x00]).await.unwrap();
    peer.write_all(&[0x07]).await.unwrap();

    let packet = reader.await.unwrap().unwrap();
    assert!(matches!(packet, Some(Packet::PubAck(ack)) if ack.packet_identifier == 7));
}

#[tokio::test]
async fn malformed_packet_is_answered_with_disconnect() {
    init_logger();
    let (mut peer, stream) = duplex(256);
    let mut connection =
        Connection::new(stream, DecoderRegistry::client(), ConnectionLimits::default());

    // PUBACK with a reason code PUBACK does not define
    peer.write_all(&[0x40, 0x03, 0x00, 0x01, 0x05]).await.unwrap();

    let error = connection.read_packet().await.unwrap_err();
    assert!(matches!(error, ConnectionError::Decode(DecodeError::MalformedPacket(_))));

    let mut response = [0u8; 2];
    peer.read_exact(&mut response).await.unwrap();
    assert_eq!(response[0], 0xE0);

    let mut body = vec![0u8; response[1] as usize];
    peer.read_exact(&mut body).await.unwrap();
    assert_eq!(body[0], DisconnectReasonCode::MalformedPacket as u8);
}

#[tokio::test]
async fn failed_connect_is_answered_with_connack() {
    init_logger();
    let (mut peer, stream) = duplex(256);
    let mut connection =
        Connection::new(stream, DecoderRegistry::server(), ConnectionLimits::default());

    // MQTT 3.1.1 CONNECT
    peer.write_all(&[0x10, 13, 0, 4, b'M', b'Q', b'T', b'T', 4, 0b10, 0, 60, 0, 1, b'c'])
        .await
        .unwrap();

    let error = connection.read_packet().await.unwrap_err();
    assert!(matches!(error, ConnectionError::Decode(DecodeError::UnsupportedProtocolVersion(_))));

    let mut response = [0u8; 4];
    peer.read_exact(&mut response).await.unwrap();
    assert_eq!(response[0], 0x20);
    assert_eq!(response[3], ConnectReasonCode::UnsupportedProtocolVersion as u8);
}

#[tokio::test]
async fn oversized_packet_is_rejected_before_its_body_arrives() {
    init_logger();
    let (mut peer, stream) = duplex(256);
    let limits = ConnectionLimits::new().with_maximum_packet_size(32);
    let mut connection = Connection::new(stream, DecoderRegistry::client(), limits);

    // PUBLISH announcing 200 bytes, only the fixed header is sent
    peer.write_all(&[0x30, 0xC8, 0x01]).await.unwrap();

    let error = connection.read_packet().await.unwrap_err();
    assert!(matches!(error, ConnectionError::Decode(DecodeError::PacketTooLarge(_))));
}

#[tokio::test]
async fn eof_inside_a_packet_is_a_reset() {
    init_logger();
    let (mut peer, stream) = duplex(256);
    let mut connection =
        Connection::new(stream, DecoderRegistry::client(), ConnectionLimits::default());

    peer.write_all(&[0x40, 0x02, 0x00]).await.unwrap();
    drop(peer);

    let error = connection.read_packet().await.unwrap_err();
    assert!(matches!(error, ConnectionError::ConnectionReset));
}
