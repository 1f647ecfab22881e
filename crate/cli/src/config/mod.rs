//! YAML configuration file: location, version migration and profiles.
//!
//! The document is kept as a [`serde_yaml::Mapping`] so that keys this
//! client does not know about survive a load/write cycle.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::{
    cli_bail, cli_error,
    error::result::{KmsCliResult, KmsCliResultHelper},
};

mod endpoint;
mod okms_id;
mod validators;

pub use endpoint::{EndpointArgs, EndpointAuth, EndpointConfig, Service, resolve_endpoint};
pub use okms_id::okms_id_from_certificate;
pub use validators::{allow_empty, expand_tilde, validate_file_exists, validate_tcp_addr, validate_url};

pub const CONFIG_FILE_NAME: &str = "okms.yaml";
pub const CONFIG_DIR: &str = ".ovh-kms";
pub const DEFAULT_PROFILE: &str = "default";
pub const CURRENT_VERSION: i64 = 1;

#[derive(Debug, Clone)]
pub struct ConfigFile {
    doc: Mapping,
    path: Option<PathBuf>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let mut doc = Mapping::new();
        doc.insert("version".into(), CURRENT_VERSION.into());
        Self { doc, path: None }
    }
}

impl ConfigFile {
    /// Load the configuration file.
    ///
    /// An explicit `custom_file` must be readable. Otherwise `./okms.yaml`
    /// is tried, then `~/.ovh-kms/okms.yaml`, which is created when missing.
    pub fn load(custom_file: Option<&str>) -> KmsCliResult<Self> {
        if let Some(custom_file) = custom_file {
            let path = PathBuf::from(expand_tilde(custom_file)?);
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?;
            let mut config = Self::from_yaml(&text)?;
            config.path = Some(path);
            return Ok(config);
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if let Ok(text) = fs::read_to_string(&local) {
            debug!("using config file {}", local.display());
            let mut config = Self::from_yaml(&text)?;
            config.path = Some(local);
            return Ok(config);
        }

        let path = PathBuf::from(expand_tilde(&format!("~/{CONFIG_DIR}/{CONFIG_FILE_NAME}"))?);
        match fs::read_to_string(&path) {
            Ok(text) => {
                let mut config = Self::from_yaml(&text)?;
                config.path = Some(path);
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                eprintln!("Creating empty config file at {}", path.display());
                let mut config = Self::default();
                config.path = Some(path);
                if let Err(e) = config.write_to_file() {
                    warn!("Failed to create the config file: {e}");
                }
                Ok(config)
            }
            Err(e) => {
                warn!("Ignoring config file {}: {e}", path.display());
                let mut config = Self::default();
                config.path = Some(path);
                Ok(config)
            }
        }
    }

    /// Parse a document, migrating it to the current version
    pub fn from_yaml(text: &str) -> KmsCliResult<Self> {
        let doc = match serde_yaml::from_str::<Value>(text)? {
            Value::Mapping(doc) => doc,
            Value::Null => Mapping::new(),
            _ => cli_bail!("Invalid config file: expected a YAML mapping"),
        };
        let doc = match version_of(&doc)? {
            0 => {
                if !doc.is_empty() {
                    eprintln!(
                        "[WARN] Using an old configuration format (v0). Migrate by running okms \
                         configure --migrate-only"
                    );
                }
                migrate_v0_to_v1(&doc)
            }
            CURRENT_VERSION => doc,
            other => cli_bail!("Unsupported config version {other}"),
        };
        Ok(Self { doc, path: None })
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    /// Value at a dotted `key`, scalars rendered as strings
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        match lookup(&self.doc, key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        lookup(&self.doc, key).is_some()
    }

    /// Set the value at a dotted `key`, creating the intermediate maps
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        set_path(&mut self.doc, key, value.into());
    }

    /// Profile names, sorted, or `["default"]` when none is defined
    #[must_use]
    pub fn profile_list(&self) -> Vec<String> {
        let mut list: Vec<String> = match lookup(&self.doc, "profiles") {
            Some(Value::Mapping(profiles)) => profiles
                .keys()
                .filter_map(|k| k.as_str().map(ToOwned::to_owned))
                .collect(),
            _ => vec![],
        };
        if list.is_empty() {
            list.push(DEFAULT_PROFILE.to_owned());
        }
        list.sort();
        list
    }

    #[must_use]
    pub fn current_profile(&self) -> String {
        self.get_str("profile")
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| {
                self.profile_list()
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| DEFAULT_PROFILE.to_owned())
            })
    }

    pub fn switch_profile(&mut self, profile: &str) -> KmsCliResult<()> {
        if !self.exists(&format!("profiles.{profile}")) {
            cli_bail!("Profile {profile:?} is not defined");
        }
        self.set("profile", profile);
        Ok(())
    }

    pub fn to_yaml(&self) -> KmsCliResult<String> {
        Ok(serde_yaml::to_string(&self.doc)?)
    }

    /// Write the document, creating the parent directories
    pub fn write_to_file(&self) -> KmsCliResult<()> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| cli_error!("No config file path given"))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir(parent)
                .with_context(|| format!("Failed to create folder {}", parent.display()))?;
        }
        write_private(path, self.to_yaml()?.as_bytes())
            .with_context(|| format!("Failed to save configuration file {}", path.display()))?;
        debug!("configuration written to {}", path.display());
        Ok(())
    }
}

#[cfg(unix)]
fn create_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o755).create(path)
}

#[cfg(not(unix))]
fn create_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::{io::Write, os::unix::fs::OpenOptionsExt};
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(path, bytes)
}

fn version_of(doc: &Mapping) -> KmsCliResult<i64> {
    match doc.get("version") {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| cli_error!("Unsupported config version {n}")),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_e| cli_error!("Unsupported config version {s}")),
        Some(_) => cli_bail!("Invalid config version"),
    }
}

fn lookup<'a>(doc: &'a Mapping, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_mapping()?.get(part)?;
    }
    Some(current)
}

fn set_path(doc: &mut Mapping, key: &str, value: Value) {
    match key.split_once('.') {
        None => {
            doc.insert(key.into(), value);
        }
        Some((head, rest)) => {
            let entry = doc
                .entry(head.into())
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if !entry.is_mapping() {
                *entry = Value::Mapping(Mapping::new());
            }
            if let Value::Mapping(child) = entry {
                set_path(child, rest, value);
            }
        }
    }
}

/// Rewrite a v0 document, where each top-level key is a profile holding
/// either endpoint fields for the REST API or one map per service
fn migrate_v0_to_v1(old: &Mapping) -> Mapping {
    let mut new = Mapping::new();
    new.insert("version".into(), CURRENT_VERSION.into());
    new.insert("profile".into(), DEFAULT_PROFILE.into());
    new.insert("profiles".into(), Value::Mapping(Mapping::new()));

    for (name, profile) in old {
        let (Some(name), Value::Mapping(profile)) = (name.as_str(), profile) else {
            continue;
        };
        let prefix = format!("profiles.{name}");
        migrate_service(profile, &mut new, &format!("{prefix}.http"));
        for (service, settings) in profile {
            if let (Some(service), Value::Mapping(settings)) = (service.as_str(), settings) {
                migrate_service(settings, &mut new, &format!("{prefix}.{service}"));
            }
        }
    }
    new
}

fn migrate_service(src: &Mapping, dst: &mut Mapping, prefix: &str) {
    for (key, value) in src {
        let Some(key) = key.as_str() else { continue };
        if value.is_mapping() {
            continue;
        }
        let scalar = match value {
            Value::String(s) if s.is_empty() => continue,
            Value::Null => continue,
            v => v.clone(),
        };
        match key {
            "endpoint" | "ca" => set_path(dst, &format!("{prefix}.{key}"), scalar),
            "cert" | "key" => {
                set_path(dst, &format!("{prefix}.auth.type"), "mtls".into());
                set_path(dst, &format!("{prefix}.auth.{key}"), scalar);
            }
            other => set_path(dst, &format!("{prefix}.{other}"), scalar),
        }
    }
}
