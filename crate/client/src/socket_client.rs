//! TLS socket client for the KMIP 1.4 endpoint.
//! Each request opens its own connection, writes a single TTLV request
//! message and reads back a single TTLV response message.
//! Client authentication uses the PEM certificate and key of the profile.
use std::{
    io::{Read, Write},
    net::{TcpStream, ToSocketAddrs},
    path::PathBuf,
    time::Duration,
};

use native_tls::{Certificate, Identity, Protocol, TlsConnector};
use okms_kmip::{
    kmip_1_4::{
        kmip_messages::{RequestMessage, ResponseMessage},
        kmip_operations::KmipRequest,
    },
    ttlv::TTLV,
};
use tracing::{debug, trace};

use crate::{
    client_bail,
    encodings::private_key_pem_to_pkcs8,
    error::result::{KmsClientResult, KmsClientResultHelper},
    file_utils::read_bytes_from_file,
};

/// Largest response message accepted from the server, header included
pub const MAX_RESPONSE_SIZE: usize = 16_000;

const TTLV_HEADER_SIZE: usize = 8;

/// Configuration of the KMIP socket client
#[derive(Clone, Debug)]
pub struct KmipClientConfig {
    /// Server address as `host:port`
    pub endpoint: String,
    /// Extra CA bundle (PEM) used to verify the server
    pub ca: Option<PathBuf>,
    /// Client certificate (PEM)
    pub cert: PathBuf,
    /// Client private key (PEM, PKCS#1, SEC1 or PKCS#8)
    pub key: PathBuf,
    pub timeout: Option<Duration>,
}

/// Client for the KMIP endpoint of a KMS domain
pub struct KmipClient {
    host: String,
    port: u16,
    timeout: Option<Duration>,
    connector: TlsConnector,
}

/// Split `host:port`, accepting bracketed IPv6 hosts
pub fn split_host_port(endpoint: &str) -> KmsClientResult<(String, u16)> {
    let Some((host, port)) = endpoint.rsplit_once(':') else {
        client_bail!("Invalid KMIP endpoint {endpoint:?}: expected host:port");
    };
    let port = port
        .parse::<u16>()
        .with_context(|| format!("Invalid port in KMIP endpoint {endpoint:?}"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        client_bail!("Invalid KMIP endpoint {endpoint:?}: missing host");
    }
    Ok((host.to_owned(), port))
}

impl KmipClient {
    /// Build the client: the TLS connector is created once and reused for
    /// every request
    pub fn instantiate(config: &KmipClientConfig) -> KmsClientResult<Self> {
        let (host, port) = split_host_port(&config.endpoint)?;

        let cert_pem = read_bytes_from_file(&config.cert)?;
        let key_pem = private_key_pem_to_pkcs8(&read_bytes_from_file(&config.key)?)?;
        let identity = Identity::from_pkcs8(&cert_pem, &key_pem)
            .context("Failed to create identity from client certificate and key")?;

        let mut builder = TlsConnector::builder();
        builder
            .identity(identity)
            .min_protocol_version(Some(Protocol::Tlsv12));
        if let Some(ca) = &config.ca {
            for block in pem::parse_many(read_bytes_from_file(ca)?)? {
                builder.add_root_certificate(
                    Certificate::from_der(block.contents())
                        .context("Failed to load CA certificate")?,
                );
            }
        }
        let connector = builder.build().context("Failed to build TLS connector")?;

        Ok(Self {
            host,
            port,
            timeout: config.timeout,
            connector,
        })
    }

    /// Send a KMIP request and parse the payload of its response
    pub fn send<R: KmipRequest>(&self, request: &R) -> KmsClientResult<R::Response> {
        let operation = request.operation();
        let message =
            RequestMessage::new(operation, request.payload()).with_random_correlation_value();
        trace!("KMIP request ==>\n{}", message.to_ttlv());
        let request_data = message
            .to_ttlv()
            .to_bytes()
            .context("Failed to serialize TTLV to bytes")?;

        let response_data = self.send_bytes(&request_data)?;

        let ttlv = TTLV::from_bytes(&response_data).context("Failed to deserialize response TTLV")?;
        trace!("KMIP response <==\n{ttlv}");
        let payload = ResponseMessage::from_ttlv(&ttlv)?.into_payload(operation)?;
        Ok(R::parse_response(&payload)?)
    }

    fn send_bytes(&self, data: &[u8]) -> KmsClientResult<Vec<u8>> {
        debug!("Sending request: {}", hex::encode(data));

        let stream = connect(&self.host, self.port, self.timeout)?;
        stream
            .set_read_timeout(self.timeout)
            .context("Failed to set read timeout")?;
        stream
            .set_write_timeout(self.timeout)
            .context("Failed to set write timeout")?;

        let mut tls_stream = self
            .connector
            .connect(&self.host, stream)
            .context("Failed to establish TLS connection")?;

        tls_stream
            .write_all(data)
            .context("Failed to send request data")?;
        tls_stream.flush().context("Failed to flush TLS stream")?;

        debug!("Request sent");

        let response = read_response(&mut tls_stream)?;
        debug!("Received response: {}", hex::encode(&response));
        Ok(response)
    }
}

/// Open a TCP connection to the first reachable address of `host`.
/// The timeout, when set, bounds each connection attempt.
fn connect(host: &str, port: u16, timeout: Option<Duration>) -> KmsClientResult<TcpStream> {
    let addrs = (host, port)
        .to_socket_addrs()
        .with_context(|| format!("Failed to resolve KMIP server {host}:{port}"))?;
    let mut last_error = None;
    for addr in addrs {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connection to {addr} failed: {e}");
                last_error = Some(e);
            }
        }
    }
    match last_error {
        Some(e) => client_bail!("Failed to connect to KMIP server {host}:{port}: {e}"),
        None => client_bail!("KMIP server {host}:{port} resolved to no address"),
    }
}

/// Read one TTLV message: the 8 bytes header, then the body whose length
/// is carried in bytes 4..8 of the header
pub(crate) fn read_response<S: Read>(stream: &mut S) -> KmsClientResult<Vec<u8>> {
    let mut header = [0_u8; TTLV_HEADER_SIZE];
    stream
        .read_exact(&mut header)
        .context("Failed to read response header")?;
    let length = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    if length > MAX_RESPONSE_SIZE - TTLV_HEADER_SIZE {
        client_bail!(
            "KMIP response of {} bytes exceeds the maximum size of {MAX_RESPONSE_SIZE} bytes",
            length + TTLV_HEADER_SIZE
        );
    }

    let mut response = vec![0_u8; length];
    stream
        .read_exact(&mut response)
        .context("Failed to read response")?;

    Ok([header.to_vec(), response].concat())
}
