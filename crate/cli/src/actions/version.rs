use clap::Parser;
use serde::Serialize;

use super::console::Stdout;
use crate::error::result::KmsCliResult;

/// Commit hash, set at build time
pub const COMMIT: &str = match option_env!("OKMS_COMMIT") {
    Some(commit) => commit,
    None => "none",
};

/// Build date, set at build time
pub const BUILD_DATE: &str = match option_env!("OKMS_BUILD_DATE") {
    Some(date) => date,
    None => "unknown",
};

#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
    version: &'static str,
    commit: &'static str,
    build_date: &'static str,
}

impl VersionInfo {
    const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            commit: COMMIT,
            build_date: BUILD_DATE,
        }
    }
}

/// Print the version information
#[derive(Parser, Debug)]
#[clap(verbatim_doc_comment)]
pub struct VersionAction;

impl VersionAction {
    pub fn process(&self, stdout: &Stdout) -> KmsCliResult<()> {
        let info = VersionInfo::current();
        stdout.write(&info, || {
            format!(
                "Version: {}\nCommit: {}\nBuild date: {}",
                info.version, info.commit, info.build_date
            )
        })
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::VersionInfo;

    #[test]
    fn test_version_info() {
        let info = VersionInfo::current();
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert!(!info.commit.is_empty());
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("buildDate").is_some());
    }
}
