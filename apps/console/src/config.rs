use std::{fs, io, path::Path, time::Duration};

use anyhow::Context;
use client_core::{
    ClientSettings, DEFAULT_HISTORY_LIMIT, DEFAULT_HISTORY_TABLE, DEFAULT_PAYMENT_AMOUNT,
    DEFAULT_PAYMENT_DURATION_DAYS,
};
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "console.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub history_limit: u32,
    pub history_table: String,
    pub reconnect_delay_ms: u64,
    pub notification_ttl_ms: u64,
    pub reauthenticate_on_reconnect: bool,
    pub payment_amount: u64,
    pub payment_duration_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8443/ws".into(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            history_table: DEFAULT_HISTORY_TABLE.into(),
            reconnect_delay_ms: 3_000,
            notification_ttl_ms: 3_000,
            reauthenticate_on_reconnect: true,
            payment_amount: DEFAULT_PAYMENT_AMOUNT,
            payment_duration_days: DEFAULT_PAYMENT_DURATION_DAYS,
        }
    }
}

impl Settings {
    pub fn to_client_settings(&self) -> ClientSettings {
        let mut client = ClientSettings::new(self.server_url.clone());
        client.history_limit = self.history_limit;
        client.history_table = self.history_table.clone();
        client.reconnect_delay = Duration::from_millis(self.reconnect_delay_ms);
        client.notification_ttl = Duration::from_millis(self.notification_ttl_ms);
        client.reauthenticate_on_reconnect = self.reauthenticate_on_reconnect;
        client.default_payment_amount = self.payment_amount;
        client.default_payment_duration_days = self.payment_duration_days;
        client
    }

    fn apply_file(&mut self, file: FileSettings) {
        if let Some(v) = file.server_url {
            self.server_url = v;
        }
        if let Some(v) = file.history_limit {
            self.history_limit = v;
        }
        if let Some(v) = file.history_table {
            self.history_table = v;
        }
        if let Some(v) = file.reconnect_delay_ms {
            self.reconnect_delay_ms = v;
        }
        if let Some(v) = file.notification_ttl_ms {
            self.notification_ttl_ms = v;
        }
        if let Some(v) = file.reauthenticate_on_reconnect {
            self.reauthenticate_on_reconnect = v;
        }
        if let Some(v) = file.payment_amount {
            self.payment_amount = v;
        }
        if let Some(v) = file.payment_duration_days {
            self.payment_duration_days = v;
        }
    }

    /// Later names win: `CONSOLE_SERVER_URL` is overridden by `APP__SERVER_URL`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("CONSOLE_SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = lookup("APP__SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = lookup("APP__HISTORY_TABLE") {
            self.history_table = v;
        }
        parse_env(&lookup, "APP__HISTORY_LIMIT", &mut self.history_limit);
        parse_env(&lookup, "APP__RECONNECT_DELAY_MS", &mut self.reconnect_delay_ms);
        parse_env(&lookup, "APP__NOTIFICATION_TTL_MS", &mut self.notification_ttl_ms);
        parse_env(
            &lookup,
            "APP__REAUTHENTICATE_ON_RECONNECT",
            &mut self.reauthenticate_on_reconnect,
        );
        parse_env(&lookup, "APP__PAYMENT_AMOUNT", &mut self.payment_amount);
        parse_env(
            &lookup,
            "APP__PAYMENT_DURATION_DAYS",
            &mut self.payment_duration_days,
        );
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    server_url: Option<String>,
    history_limit: Option<u32>,
    history_table: Option<String>,
    reconnect_delay_ms: Option<u64>,
    notification_ttl_ms: Option<u64>,
    reauthenticate_on_reconnect: Option<bool>,
    payment_amount: Option<u64>,
    payment_duration_days: Option<u32>,
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut T,
) {
    let Some(raw) = lookup(name) else {
        return;
    };
    match raw.trim().parse() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!(variable = name, value = %raw, "ignoring unparsable setting"),
    }
}

/// Defaults, then the config file, then environment overrides.
///
/// An explicit `path` must exist; the default `console.toml` is optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(path) {
        Ok(raw) => {
            let file = parse_file(&raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?;
            settings.apply_file(file);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    }

    settings.apply_env(|name| std::env::var(name).ok());
    Ok(settings)
}

fn parse_file(raw: &str) -> anyhow::Result<FileSettings> {
    Ok(toml::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults_match_client_defaults() {
        let client = Settings::default().to_client_settings();
        assert_eq!(client.history_limit, 1000);
        assert_eq!(client.history_table, "MessagesLogs");
        assert_eq!(client.reconnect_delay, Duration::from_secs(3));
        assert_eq!(client.notification_ttl, Duration::from_secs(3));
        assert!(client.reauthenticate_on_reconnect);
        assert_eq!(client.default_payment_amount, 3000);
        assert_eq!(client.default_payment_duration_days, 30);
    }

    #[test]
    fn file_overrides_only_present_keys() {
        let mut settings = Settings::default();
        let file = parse_file(
            r#"
            server_url = "wss://console.example/ws"
            reconnect_delay_ms = 500
            reauthenticate_on_reconnect = false
            "#,
        )
        .expect("parse");
        settings.apply_file(file);

        assert_eq!(settings.server_url, "wss://console.example/ws");
        assert_eq!(settings.reconnect_delay_ms, 500);
        assert!(!settings.reauthenticate_on_reconnect);
        assert_eq!(settings.history_limit, 1000);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(parse_file("server = \"ws://x\"").is_err());
    }

    #[test]
    fn env_overrides_file_and_app_prefix_wins() {
        let mut settings = Settings::default();
        settings.apply_env(env(&[
            ("CONSOLE_SERVER_URL", "ws://console/ws"),
            ("APP__SERVER_URL", "ws://app/ws"),
            ("APP__HISTORY_LIMIT", "250"),
            ("APP__PAYMENT_AMOUNT", "not-a-number"),
        ]));
        assert_eq!(settings.server_url, "ws://app/ws");
        assert_eq!(settings.history_limit, 250);
        assert_eq!(settings.payment_amount, 3000);
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        let err = load_settings(Some(Path::new("/nonexistent/console.toml")))
            .expect_err("missing file");
        assert!(format!("{err:#}").contains("failed to read config file"));
    }
}
