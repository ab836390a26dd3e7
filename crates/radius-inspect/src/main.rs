use clap::Parser;
use radius_codec::{
    AcctPacket, AuthPacket, Code, CodecConfig, MemoryDictionary, Packet, message_auth,
};
use std::process;
use std::sync::Arc;
use tracing::{debug, error, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Decode a raw RADIUS packet and print its header and attributes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "radius-inspect")]
struct Cli {
    /// Packet bytes as hex (whitespace and colons are ignored)
    #[arg(value_name = "HEX")]
    packet: String,

    /// Shared secret used to verify authenticators and reveal passwords
    #[arg(short, long, default_value = "")]
    secret: String,

    /// JSON dictionary merged over the standard RFC 2865 attributes
    #[arg(short, long, value_name = "FILE")]
    dictionary: Option<String>,

    /// JSON codec configuration
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Verify the packet as an Accounting-Request
    #[arg(short, long)]
    accounting: bool,

    /// Reveal password-hidden attributes
    #[arg(long)]
    decrypt: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(message) = run(&cli) {
        error!("{}", message);
        eprintln!("Error: {}", message);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = match &cli.config {
        Some(path) => CodecConfig::from_file(path).map_err(|e| format!("config {}: {}", path, e))?,
        None => CodecConfig::default(),
    };

    let mut dictionary = MemoryDictionary::rfc2865();
    if let Some(path) = &cli.dictionary {
        dictionary
            .merge_json_file(path)
            .map_err(|e| format!("dictionary {}: {}", path, e))?;
        debug!(path = %path, attributes = dictionary.len(), "loaded dictionary");
    }

    let cleaned: String = cli
        .packet
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let bytes = hex::decode(&cleaned).map_err(|e| format!("invalid hex: {}", e))?;

    let mut packet = Packet::new(0u8, &cli.secret, Arc::new(dictionary)).with_config(config);
    packet
        .decode_from_bytes(&bytes)
        .map_err(|e| format!("decode failed: {}", e))?;

    if cli.secret.is_empty() && (cli.accounting || cli.decrypt) {
        warn!("no shared secret given, verification and decryption will not be meaningful");
    }

    let mut notes = Vec::new();
    if cli.accounting {
        let accounting = AcctPacket::from(packet.clone());
        let verdict = if accounting.verify_request() { "valid" } else { "INVALID" };
        notes.push(format!("Request Authenticator: {}", verdict));
    }

    if let Some(note) = message_authenticator_note(&packet, &bytes, cli.secret.as_bytes()) {
        notes.push(note);
    }

    if cli.decrypt {
        let mut auth = AuthPacket::from(packet);
        auth.decrypt_attributes()
            .map_err(|e| format!("decryption failed: {}", e))?;
        packet = auth.into_packet();
    }

    println!("{}", packet);
    if let Some(authenticator) = packet.authenticator {
        println!("Authenticator: {}", hex::encode(authenticator));
    }
    for note in notes {
        println!("{}", note);
    }
    Ok(())
}

/// Only requests are verified; a reply's HMAC covers the request authenticator
fn message_authenticator_note(packet: &Packet, bytes: &[u8], secret: &[u8]) -> Option<String> {
    if !packet.packet_code().is_some_and(Code::is_request) {
        return message_auth::find_message_authenticator(bytes)
            .ok()
            .flatten()
            .map(|_| "Message-Authenticator: not verified (not a request)".to_string());
    }

    match message_auth::verify_message_authenticator(bytes, secret, None) {
        Ok(Some(true)) => Some("Message-Authenticator: valid".to_string()),
        Ok(Some(false)) => Some("Message-Authenticator: INVALID".to_string()),
        Ok(None) => None,
        Err(e) => Some(format!("Message-Authenticator: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_codec::message_auth::{add_placeholder, sign_message_authenticator};
    use radius_codec::{Dictionary, IdAllocator};

    fn dictionary() -> Arc<dyn Dictionary> {
        Arc::new(MemoryDictionary::rfc2865())
    }

    fn signed_request() -> (AuthPacket, Vec<u8>) {
        let ids = IdAllocator::new(0);
        let mut request = AuthPacket::new(b"secret", dictionary());
        request.add_attribute("User-Name", "alice").unwrap();
        add_placeholder(&mut request);
        let mut bytes = request.encode_request(&ids).unwrap();
        sign_message_authenticator(&mut bytes, b"secret", None).unwrap();
        (request, bytes)
    }

    #[test]
    fn test_request_message_authenticator_verified() {
        let (_, bytes) = signed_request();
        let packet = Packet::decode(&bytes, b"secret", dictionary()).unwrap();
        assert_eq!(
            message_authenticator_note(&packet, &bytes, b"secret").as_deref(),
            Some("Message-Authenticator: valid")
        );
        assert_eq!(
            message_authenticator_note(&packet, &bytes, b"wrong").as_deref(),
            Some("Message-Authenticator: INVALID")
        );
    }

    #[test]
    fn test_reply_message_authenticator_not_verified() {
        let (request, _) = signed_request();
        let request_authenticator = request.authenticator.unwrap();
        let mut reply = request.create_reply();
        add_placeholder(&mut reply);
        let mut bytes = reply.encode_reply().unwrap();
        sign_message_authenticator(&mut bytes, b"secret", Some(&request_authenticator)).unwrap();

        let packet = Packet::decode(&bytes, b"secret", dictionary()).unwrap();
        assert_eq!(
            message_authenticator_note(&packet, &bytes, b"secret").as_deref(),
            Some("Message-Authenticator: not verified (not a request)")
        );
    }

    #[test]
    fn test_no_message_authenticator_no_note() {
        let ids = IdAllocator::new(0);
        let mut request = AuthPacket::new(b"secret", dictionary());
        let bytes = request.encode_request(&ids).unwrap();
        let packet = Packet::decode(&bytes, b"secret", dictionary()).unwrap();
        assert_eq!(message_authenticator_note(&packet, &bytes, b"secret"), None);
    }
}
