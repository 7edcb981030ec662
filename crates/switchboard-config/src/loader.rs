// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./switchboard.toml`, then `~/.config/switchboard/switchboard.toml`,
//! then `/etc/switchboard/switchboard.toml`, with `SWITCHBOARD_*` environment
//! variables applied last.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SwitchboardConfig;

/// Config sections addressable from the environment.
const ENV_SECTIONS: &[&str] = &[
    "server",
    "auth",
    "poll",
    "chat",
    "telephony",
    "qr",
    "storage",
    "logging",
];

/// Standard config file locations, lowest precedence first.
pub fn standard_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/switchboard/switchboard.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("switchboard/switchboard.toml"));
    }
    paths.push(PathBuf::from("switchboard.toml"));
    paths
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<SwitchboardConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from an inline TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<SwitchboardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SwitchboardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    standard_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(SwitchboardConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Environment provider mapping `SWITCHBOARD_<SECTION>_<KEY>` to `section.key`.
///
/// Only the first underscore after the section name is a separator, so
/// `SWITCHBOARD_POLL_LIST_INTERVAL_MS` becomes `poll.list_interval_ms`.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("SWITCHBOARD_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_on_section_only() {
        assert_eq!(map_env_key("poll_list_interval_ms"), "poll.list_interval_ms");
        assert_eq!(map_env_key("auth_admin_api_key"), "auth.admin_api_key");
        assert_eq!(map_env_key("server_port"), "server.port");
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }

    #[test]
    fn env_overrides_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("sb.toml", "[server]\nport = 4000\n")?;
            jail.set_env("SWITCHBOARD_SERVER_PORT", "5005");
            jail.set_env("SWITCHBOARD_TELEPHONY_TENANT_ID", "tenant-9");
            let config = load_config_from_path(Path::new("sb.toml"))?;
            assert_eq!(config.server.port, 5005);
            assert_eq!(config.telephony.tenant_id.as_deref(), Some("tenant-9"));
            Ok(())
        });
    }
}
