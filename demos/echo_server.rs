use log::*;
use minnow_ws::{HandshakeConfig, OpCode, ReadEvent, ServerConfig, WsConnection};
use tokio::net::TcpStream;

async fn handle_connection(mut conn: WsConnection<TcpStream>) {
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

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let addr = "127.0.0.1:9002".parse().expect("valid socket address");
    let server_config = ServerConfig::default();
    let handshake_config = HandshakeConfig::<TcpStream>::default();

    minnow_ws::server::serve_tcp(addr, server_config.buffers, handshake_config, handle_connection).await
}
