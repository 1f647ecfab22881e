use std::{path::PathBuf, time::Duration};

use clap::Args;
use okms_client::{KmipClientConfig, RestAuth, RestClientConfig, read_bytes_from_file};
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::{ConfigFile, DEFAULT_PROFILE, expand_tilde, okms_id_from_certificate};
use crate::{cli_bail, cli_error, error::result::KmsCliResult};

/// The two surfaces of a KMS domain, each with its own endpoint settings
/// under `profiles.<profile>.<service>`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Service {
    Http,
    Kmip,
}

impl Service {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Kmip => "kmip",
        }
    }

    const fn env_prefix(self) -> &'static str {
        match self {
            Self::Http => "KMS_HTTP",
            Self::Kmip => "KMS_KMIP",
        }
    }
}

/// Endpoint flags shared by the commands talking to a KMS domain
#[derive(Args, Clone, Debug, Default)]
pub struct EndpointArgs {
    /// Endpoint address to the KMS domain
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Path to CA bundle used to verify the server certificate
    #[arg(long, global = true)]
    pub ca: Option<String>,

    /// Path to the client certificate (PEM)
    #[arg(long, global = true)]
    pub cert: Option<String>,

    /// Path to the client private key (PEM)
    #[arg(long, global = true)]
    pub key: Option<String>,

    /// Authentication method
    #[arg(long, global = true, value_parser = ["mtls", "token"])]
    pub auth_method: Option<String>,

    /// Id of the OKMS domain, when the certificate does not carry it
    #[arg(long, global = true)]
    pub okms_id: Option<String>,
}

#[derive(Clone, Debug)]
pub enum EndpointAuth {
    Mtls {
        cert: PathBuf,
        key: PathBuf,
        /// Configured domain id, used when the certificate has none
        okms_id: Option<String>,
    },
    Token {
        token: Zeroizing<String>,
        okms_id: Uuid,
    },
}

/// Fully resolved connection settings of one service
#[derive(Clone, Debug)]
pub struct EndpointConfig {
    pub endpoint: String,
    pub ca: Option<PathBuf>,
    pub auth: EndpointAuth,
}

impl EndpointConfig {
    /// Settings of the REST client. With mTLS the domain id is read from
    /// the certificate's `otherName`, or taken from the configuration when
    /// the certificate holds none or a wildcard.
    pub fn rest_config(&self, retry: u32, timeout: Option<Duration>) -> KmsCliResult<RestClientConfig> {
        let (auth, okms_id) = match &self.auth {
            EndpointAuth::Mtls { cert, key, okms_id } => {
                let from_cert = okms_id_from_certificate(&read_bytes_from_file(cert)?)
                    .filter(|id| id != "*");
                debug!("domain id from certificate: {from_cert:?}");
                let okms_id = from_cert
                    .or_else(|| okms_id.clone())
                    .and_then(|id| Uuid::parse_str(id.trim()).ok())
                    .ok_or_else(|| cli_error!("Invalid OKMS ID"))?;
                (
                    RestAuth::Mtls {
                        cert: cert.clone(),
                        key: key.clone(),
                    },
                    okms_id,
                )
            }
            EndpointAuth::Token { token, okms_id } => (
                RestAuth::Token {
                    token: token.to_string(),
                },
                *okms_id,
            ),
        };
        Ok(RestClientConfig {
            endpoint: self.endpoint.clone(),
            ca: self.ca.clone(),
            auth,
            okms_id,
            retry,
            timeout,
        })
    }

    /// Settings of the KMIP socket client, which only supports mTLS
    pub fn kmip_config(&self, timeout: Option<Duration>) -> KmsCliResult<KmipClientConfig> {
        let EndpointAuth::Mtls { cert, key, .. } = &self.auth else {
            cli_bail!("The KMIP endpoint only supports mtls authentication");
        };
        Ok(KmipClientConfig {
            endpoint: self.endpoint.clone(),
            ca: self.ca.clone(),
            cert: cert.clone(),
            key: key.clone(),
            timeout,
        })
    }
}

/// Resolve the endpoint settings of `service`.
///
/// `profile` is the value of `--profile` (or `KMS_PROFILE`). Each parameter
/// is taken from its flag, then from `KMS_<SERVICE>_<PARAM>`, then from the
/// selected profile of the configuration file.
pub fn resolve_endpoint(
    config: &ConfigFile,
    profile: Option<&str>,
    service: Service,
    args: &EndpointArgs,
) -> KmsCliResult<EndpointConfig> {
    resolve_endpoint_with(config, profile, service, args, |name| {
        std::env::var(name).ok()
    })
}

pub(crate) fn resolve_endpoint_with(
    config: &ConfigFile,
    profile: Option<&str>,
    service: Service,
    args: &EndpointArgs,
    env: impl Fn(&str) -> Option<String>,
) -> KmsCliResult<EndpointConfig> {
    let profile = profile
        .filter(|p| !p.is_empty())
        .map(ToOwned::to_owned)
        .or_else(|| config.get_str("profile").filter(|p| !p.is_empty()))
        .unwrap_or_else(|| DEFAULT_PROFILE.to_owned());
    debug!("resolving {} endpoint with profile {profile}", service.name());

    let param = |key: &str, env_suffix: &str, flag: Option<&String>| -> Option<String> {
        flag.cloned()
            .or_else(|| env(&format!("{}_{env_suffix}", service.env_prefix())))
            .or_else(|| config.get_str(&format!("profiles.{profile}.{}.{key}", service.name())))
            .filter(|v| !v.is_empty())
    };
    let path_param = |key: &str, env_suffix: &str, flag: Option<&String>| {
        param(key, env_suffix, flag)
            .map(|p| expand_tilde(&p).map(PathBuf::from))
            .transpose()
    };

    let Some(endpoint) = param("endpoint", "ENDPOINT", args.endpoint.as_ref()) else {
        cli_bail!("Missing endpoint address parameter");
    };
    let ca = path_param("ca", "CA", args.ca.as_ref())?;
    let method = param("auth.type", "AUTH_METHOD", args.auth_method.as_ref())
        .unwrap_or_else(|| "mtls".to_owned());
    let okms_id = param("okmsId", "OKMSID", args.okms_id.as_ref());

    let auth = match method.as_str() {
        "mtls" => {
            let cert = path_param("auth.cert", "CERT", args.cert.as_ref())?
                .ok_or_else(|| cli_error!("Missing certificate file parameter"))?;
            let key = path_param("auth.key", "KEY", args.key.as_ref())?
                .ok_or_else(|| cli_error!("Missing private key parameter"))?;
            EndpointAuth::Mtls { cert, key, okms_id }
        }
        "token" => {
            let token = param("auth.token", "TOKEN", None)
                .ok_or_else(|| cli_error!("Missing token parameter"))?;
            let okms_id = okms_id.ok_or_else(|| cli_error!("Missing okmsId parameter"))?;
            let okms_id =
                Uuid::parse_str(okms_id.trim()).map_err(|_e| cli_error!("Invalid okmsId"))?;
            EndpointAuth::Token {
                token: Zeroizing::new(token),
                okms_id,
            }
        }
        other => cli_bail!("Unsupported auth method {other:?}"),
    };

    Ok(EndpointConfig {
        endpoint,
        ca,
        auth,
    })
}
