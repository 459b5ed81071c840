//! Zabbix sender protocol: `ZBXD\x01`, a little-endian u64 payload length,
//! then the JSON payload. The server answers in the same framing and closes
//! the connection.

use crate::error::ForwardError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const HEADER: &[u8; 5] = b"ZBXD\x01";
const HEADER_LEN: usize = 13;
/// Largest reply payload accepted from the server.
pub const MAX_REPLY_LEN: u64 = 1 << 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub host: String,
    pub key: String,
    pub value: String,
    pub clock: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Packet {
    pub request: &'static str,
    pub data: Vec<Metric>,
    pub clock: i64,
}

impl Packet {
    pub fn new(data: Vec<Metric>, clock: i64) -> Self {
        Self {
            request: "sender data",
            data,
            clock,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ForwardError> {
        let payload =
            serde_json::to_vec(self).map_err(|e| ForwardError::Protocol(e.to_string()))?;
        Ok(frame(&payload))
    }
}

pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(HEADER);
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct RawResponse {
    response: String,
    #[serde(default)]
    info: String,
}

/// Counts reported back by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SendSummary {
    pub processed: u64,
    pub failed: u64,
    pub total: u64,
}

/// Parse `processed: 1; failed: 0; total: 1; seconds spent: 0.000055`.
pub fn parse_info(info: &str) -> Result<SendSummary, ForwardError> {
    let mut summary = SendSummary::default();
    let mut seen = 0;
    for part in info.split(';') {
        let Some((name, value)) = part.split_once(':') else {
            continue;
        };
        let slot = match name.trim() {
            "processed" => &mut summary.processed,
            "failed" => &mut summary.failed,
            "total" => &mut summary.total,
            _ => continue,
        };
        *slot = value
            .trim()
            .parse()
            .map_err(|_| ForwardError::Protocol(format!("bad count in info '{info}'")))?;
        seen += 1;
    }
    if seen < 3 {
        return Err(ForwardError::Protocol(format!("incomplete info '{info}'")));
    }
    Ok(summary)
}

/// Payload length declared by a reply header.
pub fn declared_len(header: &[u8]) -> Result<u64, ForwardError> {
    if header.len() < HEADER_LEN || &header[..4] != b"ZBXD" {
        return Err(ForwardError::Protocol(format!(
            "short or unframed reply ({} bytes)",
            header.len()
        )));
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&header[5..HEADER_LEN]);
    let len = u64::from_le_bytes(len);
    if len > MAX_REPLY_LEN {
        return Err(ForwardError::Protocol(format!(
            "reply declares {len} bytes, limit is {MAX_REPLY_LEN}"
        )));
    }
    Ok(len)
}

/// Decode a framed server reply and check that every value was accepted.
pub fn decode_response(raw: &[u8]) -> Result<SendSummary, ForwardError> {
    let declared = declared_len(raw)?;
    let payload = &raw[HEADER_LEN..];
    if payload.len() as u64 != declared {
        return Err(ForwardError::Protocol(format!(
            "reply declares {declared} bytes but carries {}",
            payload.len()
        )));
    }
    let reply: RawResponse = serde_json::from_slice(payload)
        .map_err(|e| ForwardError::Protocol(e.to_string()))?;
    let summary = parse_info(&reply.info)?;
    if reply.response != "success" || summary.failed != 0 {
        return Err(ForwardError::Rejected {
            failed: summary.failed,
            total: summary.total,
            info: reply.info,
        });
    }
    Ok(summary)
}

/// Pushes trapper values to one Zabbix server or proxy.
#[derive(Debug, Clone)]
pub struct Sender {
    addr: String,
    timeout: Duration,
}

impl Sender {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn send(&self, packet: &Packet) -> Result<SendSummary, ForwardError> {
        let buf = packet.encode()?;
        let exchange = async {
            let mut stream = TcpStream::connect(&self.addr)
                .await
                .map_err(|source| ForwardError::Connect {
                    addr: self.addr.clone(),
                    source,
                })?;
            stream.write_all(&buf).await?;
            let mut header = [0u8; HEADER_LEN];
            stream.read_exact(&mut header).await.map_err(|e| {
                ForwardError::Protocol(format!("reading reply header: {e}"))
            })?;
            let len = declared_len(&header)?;
            let mut reply = header.to_vec();
            (&mut stream).take(len).read_to_end(&mut reply).await?;
            Ok::<_, ForwardError>(reply)
        };
        let reply = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ForwardError::Timeout(self.addr.clone()))??;

        let summary = decode_response(&reply)?;
        tracing::debug!(
            addr = %self.addr,
            processed = summary.processed,
            total = summary.total,
            "zabbix accepted values"
        );
        Ok(summary)
    }
}
