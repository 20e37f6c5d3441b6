use log::*;
use minnow_ws::{HandshakeConfig, OpCode, ReadEvent, ServerConfig, WsConnection};
use pki_types::{CertificateDer, PrivateKeyDer};
use rustls_pemfile::{certs, private_key};
use std::fs::File;
use std::io::{self, BufReader, ErrorKind};
use std::net::ToSocketAddrs;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;

async fn handle_connection(mut conn: WsConnection<TlsStream<TcpStream>>) {
    loop {
        match conn.read(None).await {
            Ok(ReadEvent::Data { opcode, payload }) => {
                let result = match opcode {
                    OpCode::Text => {
                        let text = String::from_utf8_lossy(payload).into_owned();
                        conn.send_text(&text).await
                    }
                    OpCode::Binary => {
                        let data = payload.to_vec();
                        conn.send_binary(&data).await
                    }
                    _ => unreachable!("control opcodes never surface as ReadEvent::Data"),
                };
                if let Err(err) = result {
                    error!("failed to echo frame: {}", err);
                    break;
                }
            }
            Ok(ReadEvent::Timeout) => continue,
            Err(err) => {
                error!("connection closed: {}", err);
                break;
            }
        }
    }
}

fn load_certs(path: &Path) -> io::Result<Vec<CertificateDer<'static>>> {
    certs(&mut BufReader::new(File::open(path)?)).collect()
}

fn load_key(path: &Path) -> io::Result<PrivateKeyDer<'static>> {
    Ok(private_key(&mut BufReader::new(File::open(path)?))
        .unwrap()
        .ok_or(io::Error::new(ErrorKind::Other, "no private key found".to_string()))?)
}

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let addr = String::from("127.0.0.1:9002")
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable))?;

    let certs = load_certs(Path::new("server.crt"))?;
    let key = load_key(Path::new("server.key"))?;

    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

    let server_config = ServerConfig {
        tls_config: Some(Arc::new(tls_config)),
        ..ServerConfig::default()
    };
    let handshake_config = HandshakeConfig::<TlsStream<TcpStream>>::default();

    minnow_ws::server::serve_tls(
        addr,
        server_config.buffers,
        server_config.tls_config.expect("tls_config set above"),
        handshake_config,
        handle_connection,
    )
    .await
}
