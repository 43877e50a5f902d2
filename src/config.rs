/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::{fmt::Debug, str::FromStr, sync::Arc, time::Duration};

use serde::Deserialize;

use crate::{mailer::Logger, message::Mailbox};

pub const DEFAULT_SENDMAIL: &str = "/usr/sbin/sendmail";
pub const DEFAULT_HOST: &str = "localhost";

/// Mailer configuration.
///
/// Every field is optional. A configuration is usually deserialized by the
/// embedding application:
///
/// ```rust
///     let config: Config = serde_json::from_str(r#"{
///         "driver": "sendmail",
///         "sendmail": "/usr/sbin/sendmail -bs",
///         "pretend": true,
///         "from": { "address": "noreply@example.com", "name": "Example" }
///     }"#)?;
/// ```
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub driver: Option<Driver>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub encryption: Encryption,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sendmail binary followed by its flags.
    pub sendmail: Option<String>,
    pub pretend: bool,
    pub from: Option<Mailbox>,
    /// Transport timeout in seconds.
    pub timeout: Option<u64>,
    /// Host name announced in EHLO.
    pub helo_host: Option<String>,
    #[serde(skip)]
    pub logger: Option<Arc<dyn Logger>>,
}

/// Transport driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Driver {
    /// SMTP relay.
    Smtp,
    /// The host's native mail facility.
    Mail,
    /// A local sendmail compatible binary.
    Sendmail,
}

/// SMTP connection security.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encryption {
    /// Clear text.
    #[default]
    None,
    /// Implicit TLS.
    Ssl,
    /// Upgrade with STARTTLS.
    #[serde(alias = "starttls")]
    Tls,
}

impl Config {
    pub fn new(driver: Driver) -> Self {
        Config {
            driver: Some(driver),
            ..Default::default()
        }
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Configured port, or the well-known port for the encryption mode.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(match self.encryption {
            Encryption::None => 25,
            Encryption::Ssl => 465,
            Encryption::Tls => 587,
        })
    }

    pub fn sendmail_command(&self) -> &str {
        self.sendmail
            .as_deref()
            .filter(|command| !command.trim().is_empty())
            .unwrap_or(DEFAULT_SENDMAIL)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    /// Username and password, only when both are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some((username, password)),
            _ => None,
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("encryption", &self.encryption)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("sendmail", &self.sendmail)
            .field("pretend", &self.pretend)
            .field("from", &self.from)
            .field("timeout", &self.timeout)
            .field("helo_host", &self.helo_host)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Smtp => "smtp",
            Driver::Mail => "mail",
            Driver::Sendmail => "sendmail",
        }
    }
}

impl FromStr for Driver {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let driver = s.trim();
        if driver.eq_ignore_ascii_case("smtp") {
            Ok(Driver::Smtp)
        } else if driver.eq_ignore_ascii_case("mail") {
            Ok(Driver::Mail)
        } else if driver.eq_ignore_ascii_case("sendmail") {
            Ok(Driver::Sendmail)
        } else {
            Err(crate::Error::Configuration(format!(
                "Unsupported mail driver {:?}",
                driver
            )))
        }
    }
}

impl TryFrom<String> for Driver {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
