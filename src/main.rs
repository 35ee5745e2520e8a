use bytes::{Buf, Bytes};
use log::{error, info};
use mqtt5_codec::{decode_fixed_header, ConnectionLimits, DecoderRegistry};
use tokio::io::{self, AsyncBufReadExt, BufReader};

/// Decodes hex encoded packets, one per line, from stdin.
///
/// All lines share one set of connection limits, so a CONNACK or CONNECT followed by PUBLISH
/// packets using topic aliases decodes as it would on a live connection. Pass `client` or
/// `server` to only accept the packets of that direction.
#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let registry = match std::env::args().nth(1).as_deref() {
        Some("client") => DecoderRegistry::client(),
        Some("server") => DecoderRegistry::server(),
        _ => DecoderRegistry::all(),
    };
    let mut limits = ConnectionLimits::default();

    info!("Reading hex encoded packets from stdin using {registry:?}");

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line: String = line.split_whitespace().collect();
        if line.is_empty() {
            continue;
        }

        let bytes = match hex::decode(&line) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Invalid hex input {line}: {e}");
                continue;
            }
        };

        let header = match decode_fixed_header(&bytes) {
            Ok(Some(header)) if header.packet_size() == bytes.len() => header,
            Ok(Some(header)) => {
                println!(
                    "error: remaining length {} does not match the {} bytes given",
                    header.remaining_len,
                    bytes.len() - header.header_len
                );
                continue;
            }
            Ok(None) => {
                println!("error: incomplete fixed header");
                continue;
            }
            Err(e) => {
                println!("error: {e}");
                continue;
            }
        };

        let mut body = Bytes::from(bytes);
        body.advance(header.header_len);

        match registry.decode(header.first_byte, body, &mut limits) {
            Ok(packet) => println!("{packet:#?}"),
            Err(e) => println!("error: {e}\nreply: {:#?}", e.to_disconnect(&limits)),
        }
    }

    Ok(())
}
