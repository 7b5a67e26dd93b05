// packages/rebind/src/utils/config.rs
//! Redirect configuration
//!
//! The shim is configured entirely through two environment variables:
//!
//! - `REBIND_OLD_PORT`: the port whose bind requests are moved
//! - `REBIND_NEW_PORT`: the loopback port they are moved to
//!
//! Both are read on every bind call. Anything other than two non-zero
//! base-10 port numbers disables redirection.

use crate::utils::errors::{RebindError, Result};
use config::{Config, Environment};
use serde::Deserialize;
use std::ffi::OsString;
use std::num::NonZeroU16;

/// Prefix shared by every variable the shim reads
pub const ENV_PREFIX: &str = "REBIND";

/// Port that triggers redirection
pub const OLD_PORT_VAR: &str = "REBIND_OLD_PORT";

/// Loopback port substituted on redirection
pub const NEW_PORT_VAR: &str = "REBIND_NEW_PORT";

/// Raw redirect settings as found in the environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RebindConfig {
    /// Value of `REBIND_OLD_PORT`, if set and non-empty
    #[serde(default)]
    pub old_port: Option<String>,

    /// Value of `REBIND_NEW_PORT`, if set and non-empty
    #[serde(default)]
    pub new_port: Option<String>,
}

impl RebindConfig {
    /// Load settings from the live process environment
    pub fn load() -> Result<Self> {
        Self::from_os_vars(std::env::vars_os())
    }

    /// Load settings from raw environment entries.
    ///
    /// Entries whose name or value is not UTF-8 are skipped; such a value
    /// could never hold a valid port.
    pub fn from_os_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        Self::from_vars(
            vars.into_iter()
                .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?))),
        )
    }

    /// Load settings from an explicit set of environment variables.
    ///
    /// Only `REBIND_OLD_PORT` and `REBIND_NEW_PORT`, matched case-sensitively,
    /// reach the `config` source. It would otherwise fold other spellings
    /// such as `REBIND_old_port` onto the same key.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source: config::Map<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .filter(|(key, _)| is_redirect_var(key))
            .collect();

        let environment = Environment::with_prefix(ENV_PREFIX)
            .ignore_empty(true)
            .source(Some(source));

        let settings = Config::builder().add_source(environment).build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Validate both ports into a [`RedirectRule`]
    pub fn redirect_rule(&self) -> Result<RedirectRule> {
        let old_port = parse_port(OLD_PORT_VAR, self.old_port.as_deref())?;
        let new_port = parse_port(NEW_PORT_VAR, self.new_port.as_deref())?;

        Ok(RedirectRule { old_port, new_port })
    }
}

fn is_redirect_var(key: &str) -> bool {
    key == OLD_PORT_VAR || key == NEW_PORT_VAR
}

/// A validated old-port to new-port mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectRule {
    /// Requested port that gets moved
    pub old_port: NonZeroU16,

    /// Loopback port it is moved to
    pub new_port: NonZeroU16,
}

impl RedirectRule {
    pub fn new(old_port: NonZeroU16, new_port: NonZeroU16) -> Self {
        Self { old_port, new_port }
    }

    /// Whether a bind request for `port` should be redirected
    pub fn applies_to(&self, port: u16) -> bool {
        self.old_port.get() == port
    }
}

/// Parse a port value with `strtol` base-10 rules.
///
/// Leading whitespace and a single `+` are accepted. Trailing characters,
/// zero, and values above 65535 are rejected.
pub fn parse_port(var: &'static str, value: Option<&str>) -> Result<NonZeroU16> {
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or(RebindError::NotConfigured { var })?;

    value
        .trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '\x0b')
        .parse::<u16>()
        .ok()
        .and_then(NonZeroU16::new)
        .ok_or_else(|| RebindError::InvalidPort {
            var,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(n: u16) -> NonZeroU16 {
        NonZeroU16::new(n).unwrap()
    }

    #[test]
    fn test_from_vars_reads_both_ports() {
        let config = RebindConfig::from_vars([
            (OLD_PORT_VAR, "8080"),
            (NEW_PORT_VAR, "9090"),
        ])
        .unwrap();

        assert_eq!(config.old_port.as_deref(), Some("8080"));
        assert_eq!(config.new_port.as_deref(), Some("9090"));

        let rule = config.redirect_rule().unwrap();
        assert_eq!(rule, RedirectRule::new(port(8080), port(9090)));
    }

    #[test]
    fn test_load_from_process_env() {
        // Whatever the test runner's environment holds, loading never fails
        assert!(RebindConfig::load().is_ok());
    }

    #[test]
    fn test_variable_names_are_case_sensitive() {
        let config = RebindConfig::from_vars([
            ("REBIND_old_port", "8080"),
            ("REBIND_New_Port", "9090"),
            ("rebind_old_port", "8080"),
        ])
        .unwrap();

        assert_eq!(config, RebindConfig::default());
        assert!(matches!(
            config.redirect_rule(),
            Err(RebindError::NotConfigured { var: OLD_PORT_VAR })
        ));
    }

    #[test]
    fn test_exact_names_win_over_other_spellings() {
        let config = RebindConfig::from_vars([
            ("REBIND_old_port", "abc"),
            (OLD_PORT_VAR, "8080"),
            ("REBIND_Old_Port", "1"),
            (NEW_PORT_VAR, "9090"),
            ("REBIND_new_port", "2"),
        ])
        .unwrap();

        assert_eq!(
            config.redirect_rule().unwrap(),
            RedirectRule::new(port(8080), port(9090))
        );
    }

    #[test]
    fn test_from_os_vars_skips_non_utf8() {
        use std::os::unix::ffi::OsStringExt;

        let config = RebindConfig::from_os_vars([
            (OsString::from(OLD_PORT_VAR), OsString::from_vec(vec![b'8', 0xff])),
            (OsString::from(NEW_PORT_VAR), OsString::from("9090")),
            (OsString::from_vec(b"REBIND_\xffOLD".to_vec()), OsString::from("1")),
            (OsString::from("HOME"), OsString::from("/root")),
        ])
        .unwrap();

        assert_eq!(config.old_port, None);
        assert_eq!(config.new_port.as_deref(), Some("9090"));
        assert!(matches!(
            config.redirect_rule(),
            Err(RebindError::NotConfigured { var: OLD_PORT_VAR })
        ));
    }

    #[test]
    fn test_from_os_vars_reads_exact_names() {
        let config = RebindConfig::from_os_vars([
            (OsString::from("PATH"), OsString::from("/usr/bin")),
            (OsString::from(OLD_PORT_VAR), OsString::from(" 23")),
            (OsString::from(NEW_PORT_VAR), OsString::from("2023")),
        ])
        .unwrap();

        assert_eq!(
            config.redirect_rule().unwrap(),
            RedirectRule::new(port(23), port(2023))
        );
    }

    #[test]
    fn test_unrelated_vars_are_ignored() {
        let config = RebindConfig::from_vars([
            ("PATH", "/usr/bin"),
            ("REBIND_LOG", "trace"),
            (OLD_PORT_VAR, "23"),
        ])
        .unwrap();

        assert_eq!(config.old_port.as_deref(), Some("23"));
        assert_eq!(config.new_port, None);
    }

    #[test]
    fn test_missing_and_empty_are_not_configured() {
        let empty = RebindConfig::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(empty, RebindConfig::default());
        assert!(matches!(
            empty.redirect_rule(),
            Err(RebindError::NotConfigured { var: OLD_PORT_VAR })
        ));

        let blank = RebindConfig::from_vars([(OLD_PORT_VAR, "8080"), (NEW_PORT_VAR, "")]).unwrap();
        assert_eq!(blank.new_port, None);
        assert!(matches!(
            blank.redirect_rule(),
            Err(RebindError::NotConfigured { var: NEW_PORT_VAR })
        ));
    }

    #[test]
    fn test_malformed_old_port_disables_rule() {
        let config = RebindConfig::from_vars([(OLD_PORT_VAR, "abc"), (NEW_PORT_VAR, "9090")]).unwrap();

        assert!(matches!(
            config.redirect_rule(),
            Err(RebindError::InvalidPort { var: OLD_PORT_VAR, .. })
        ));
    }

    #[test]
    fn test_parse_port_strtol_rules() {
        assert_eq!(parse_port(OLD_PORT_VAR, Some("80")).unwrap(), port(80));
        assert_eq!(parse_port(OLD_PORT_VAR, Some("  80")).unwrap(), port(80));
        assert_eq!(parse_port(OLD_PORT_VAR, Some("+80")).unwrap(), port(80));
        assert_eq!(parse_port(OLD_PORT_VAR, Some("0080")).unwrap(), port(80));
        assert_eq!(parse_port(OLD_PORT_VAR, Some("65535")).unwrap(), port(65535));

        for bad in ["0", "-80", "80x", "80 ", "8.0", "0x50", "+", " ", "65536", "99999999999"] {
            assert!(
                parse_port(OLD_PORT_VAR, Some(bad)).is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rule_matches_only_old_port() {
        let rule = RedirectRule::new(port(8080), port(9090));
        assert!(rule.applies_to(8080));
        assert!(!rule.applies_to(8081));
        assert!(!rule.applies_to(9090));
        assert!(!rule.applies_to(0));
    }
}
