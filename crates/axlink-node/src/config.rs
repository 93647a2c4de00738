//! TOML-based engine configuration.
//!
//! A `[link]` section supplies the global protocol parameters and
//! `[[channels]]` entries override them per channel. Values are validated
//! against the protocol limits at load time; nothing is reparsed at
//! runtime.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use axlink_core::constants::{
    K_MAXFRAME_BASIC_DEFAULT, K_MAXFRAME_BASIC_MAX, K_MAXFRAME_BASIC_MIN,
    K_MAXFRAME_EXTENDED_DEFAULT, K_MAXFRAME_EXTENDED_MAX, K_MAXFRAME_EXTENDED_MIN,
    MAX_SESSIONS_DEFAULT, N1_PACLEN_DEFAULT, N1_PACLEN_MAX, N1_PACLEN_MIN, N2_RETRY_DEFAULT,
    N2_RETRY_MAX, N2_RETRY_MIN, T1V_SECONDS_DEFAULT, T1V_SECONDS_MAX, T1V_SECONDS_MIN,
    T3_SECONDS_DEFAULT,
};
use axlink_core::types::{ChannelId, SeqMode};
use axlink_protocol::LinkParams;

use crate::error::NodeError;

/// Top-level engine configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub link: LinkSection,
    #[serde(default)]
    pub channels: Vec<ChannelEntry>,
}

/// The `[link]` section: global defaults.
#[derive(Debug, Deserialize)]
pub struct LinkSection {
    /// Maximum information-field size N1 in bytes.
    #[serde(default = "default_paclen")]
    pub paclen: usize,
    /// Retry limit N2.
    #[serde(default = "default_retry")]
    pub retry: u32,
    /// Retransmission timeout T1 in seconds.
    #[serde(default = "default_frack")]
    pub frack: u64,
    /// Idle keepalive T3 in seconds; 0 disables it.
    #[serde(default = "default_idle_poll")]
    pub idle_poll: u64,
    /// Window size K for modulo-8 sequencing.
    #[serde(default = "default_maxframe")]
    pub maxframe: u8,
    /// Window size K for modulo-128 sequencing.
    #[serde(default = "default_extended_maxframe")]
    pub extended_maxframe: u8,
    /// Bound on concurrent link instances.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_paclen() -> usize {
    N1_PACLEN_DEFAULT
}

fn default_retry() -> u32 {
    N2_RETRY_DEFAULT
}

fn default_frack() -> u64 {
    T1V_SECONDS_DEFAULT
}

fn default_idle_poll() -> u64 {
    T3_SECONDS_DEFAULT
}

fn default_maxframe() -> u8 {
    K_MAXFRAME_BASIC_DEFAULT
}

fn default_extended_maxframe() -> u8 {
    K_MAXFRAME_EXTENDED_DEFAULT
}

fn default_max_sessions() -> usize {
    MAX_SESSIONS_DEFAULT
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            paclen: default_paclen(),
            retry: default_retry(),
            frack: default_frack(),
            idle_poll: default_idle_poll(),
            maxframe: default_maxframe(),
            extended_maxframe: default_extended_maxframe(),
            max_sessions: default_max_sessions(),
        }
    }
}

/// A `[[channels]]` entry overriding the global parameters for one channel.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelEntry {
    pub channel: u8,
    pub paclen: Option<usize>,
    pub retry: Option<u32>,
    pub frack: Option<u64>,
    pub idle_poll: Option<u64>,
    pub maxframe: Option<u8>,
    pub extended_maxframe: Option<u8>,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s)
            .map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value against the protocol limits.
    pub fn validate(&self) -> Result<(), NodeError> {
        validate_values(
            "link",
            self.link.paclen,
            self.link.retry,
            self.link.frack,
            self.link.maxframe,
            self.link.extended_maxframe,
        )?;
        for entry in &self.channels {
            validate_values(
                "channel",
                entry.paclen.unwrap_or(self.link.paclen),
                entry.retry.unwrap_or(self.link.retry),
                entry.frack.unwrap_or(self.link.frack),
                entry.maxframe.unwrap_or(self.link.maxframe),
                entry
                    .extended_maxframe
                    .unwrap_or(self.link.extended_maxframe),
            )?;
        }
        if self.link.max_sessions == 0 {
            return Err(NodeError::Config("max_sessions must be at least 1".into()));
        }
        Ok(())
    }

    /// The per-instance parameters for a new link on `channel`.
    #[must_use]
    pub fn params_for(&self, channel: ChannelId, mode: SeqMode) -> LinkParams {
        let entry = self.channels.iter().find(|e| e.channel == channel.0);
        let paclen = entry
            .and_then(|e| e.paclen)
            .unwrap_or(self.link.paclen);
        let retry = entry.and_then(|e| e.retry).unwrap_or(self.link.retry);
        let frack = entry.and_then(|e| e.frack).unwrap_or(self.link.frack);
        let idle_poll = entry
            .and_then(|e| e.idle_poll)
            .unwrap_or(self.link.idle_poll);
        let window = match mode {
            SeqMode::Mod8 => entry.and_then(|e| e.maxframe).unwrap_or(self.link.maxframe),
            SeqMode::Mod128 => entry
                .and_then(|e| e.extended_maxframe)
                .unwrap_or(self.link.extended_maxframe),
        };
        LinkParams {
            window,
            n1: paclen,
            max_retries: retry,
            t1: Duration::from_secs(frack),
            t3: Duration::from_secs(idle_poll),
        }
    }
}

fn validate_values(
    section: &str,
    paclen: usize,
    retry: u32,
    frack: u64,
    maxframe: u8,
    extended_maxframe: u8,
) -> Result<(), NodeError> {
    if !(N1_PACLEN_MIN..=N1_PACLEN_MAX).contains(&paclen) {
        return Err(NodeError::Config(format!(
            "{section}: paclen {paclen} outside {N1_PACLEN_MIN}..={N1_PACLEN_MAX}"
        )));
    }
    if !(N2_RETRY_MIN..=N2_RETRY_MAX).contains(&retry) {
        return Err(NodeError::Config(format!(
            "{section}: retry {retry} outside {N2_RETRY_MIN}..={N2_RETRY_MAX}"
        )));
    }
    if !(T1V_SECONDS_MIN..=T1V_SECONDS_MAX).contains(&frack) {
        return Err(NodeError::Config(format!(
            "{section}: frack {frack} outside {T1V_SECONDS_MIN}..={T1V_SECONDS_MAX}"
        )));
    }
    if !(K_MAXFRAME_BASIC_MIN..=K_MAXFRAME_BASIC_MAX).contains(&maxframe) {
        return Err(NodeError::Config(format!(
            "{section}: maxframe {maxframe} outside {K_MAXFRAME_BASIC_MIN}..={K_MAXFRAME_BASIC_MAX}"
        )));
    }
    if !(K_MAXFRAME_EXTENDED_MIN..=K_MAXFRAME_EXTENDED_MAX).contains(&extended_maxframe) {
        return Err(NodeError::Config(format!(
            "{section}: extended_maxframe {extended_maxframe} outside {K_MAXFRAME_EXTENDED_MIN}..={K_MAXFRAME_EXTENDED_MAX}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = EngineConfig::parse("").unwrap();
        assert_eq!(config.link.paclen, 256);
        assert_eq!(config.link.retry, 10);
        assert_eq!(config.link.frack, 4);
        assert_eq!(config.link.maxframe, 4);
        assert_eq!(config.link.extended_maxframe, 32);
        assert_eq!(config.link.max_sessions, 64);
    }

    #[test]
    fn link_section_overrides() {
        let config = EngineConfig::parse(
            r#"
            [link]
            paclen = 128
            retry = 5
            frack = 3
            maxframe = 7
            "#,
        )
        .unwrap();
        let params = config.params_for(ChannelId(0), SeqMode::Mod8);
        assert_eq!(params.n1, 128);
        assert_eq!(params.max_retries, 5);
        assert_eq!(params.t1, Duration::from_secs(3));
        assert_eq!(params.window, 7);
    }

    #[test]
    fn channel_entry_overrides_link_defaults() {
        let config = EngineConfig::parse(
            r#"
            [link]
            maxframe = 4

            [[channels]]
            channel = 1
            maxframe = 2
            frack = 6
            "#,
        )
        .unwrap();
        let ch0 = config.params_for(ChannelId(0), SeqMode::Mod8);
        assert_eq!(ch0.window, 4);
        assert_eq!(ch0.t1, Duration::from_secs(4));
        let ch1 = config.params_for(ChannelId(1), SeqMode::Mod8);
        assert_eq!(ch1.window, 2);
        assert_eq!(ch1.t1, Duration::from_secs(6));
    }

    #[test]
    fn extended_mode_uses_extended_window() {
        let config = EngineConfig::parse("").unwrap();
        assert_eq!(config.params_for(ChannelId(0), SeqMode::Mod128).window, 32);
    }

    #[test]
    fn out_of_range_maxframe_rejected() {
        let err = EngineConfig::parse("[link]\nmaxframe = 8\n").unwrap_err();
        assert!(err.to_string().contains("maxframe"));
    }

    #[test]
    fn out_of_range_extended_maxframe_rejected() {
        // 127 would make SREJ ambiguous; the cap is 63.
        let err = EngineConfig::parse("[link]\nextended_maxframe = 64\n").unwrap_err();
        assert!(err.to_string().contains("extended_maxframe"));
    }

    #[test]
    fn out_of_range_frack_rejected() {
        assert!(EngineConfig::parse("[link]\nfrack = 1\n").is_err());
        assert!(EngineConfig::parse("[link]\nfrack = 16\n").is_err());
    }

    #[test]
    fn out_of_range_retry_rejected() {
        assert!(EngineConfig::parse("[link]\nretry = 0\n").is_err());
        assert!(EngineConfig::parse("[link]\nretry = 16\n").is_err());
    }

    #[test]
    fn channel_override_is_validated_too() {
        let err = EngineConfig::parse(
            r#"
            [[channels]]
            channel = 0
            retry = 99
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("retry"));
    }

    #[test]
    fn zero_idle_poll_disables_t3() {
        let config = EngineConfig::parse("[link]\nidle_poll = 0\n").unwrap();
        let params = config.params_for(ChannelId(0), SeqMode::Mod8);
        assert!(params.t3.is_zero());
    }
}
