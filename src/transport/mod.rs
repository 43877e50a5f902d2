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

//! Transport provider.
//!
//! A [`Transport`] is created once from a [`Config`] and selected by its
//! driver. No connection is made and no process is spawned until a message
//! is sent.

#[cfg(feature = "sendmail")]
pub mod sendmail;
#[cfg(feature = "smtp")]
pub mod smtp;

use std::fmt::Debug;

use crate::{
    config::{Config, Driver},
    mailer::Dispatch,
};

#[cfg(feature = "sendmail")]
use crate::config::DEFAULT_SENDMAIL;
#[cfg(feature = "sendmail")]
pub use sendmail::SendmailTransport;
#[cfg(feature = "smtp")]
pub use smtp::SmtpTransport;

/// SMTP envelope of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub mail_from: String,
    pub rcpt_to: Vec<String>,
}

/// Mail transport selected by [`Driver`].
pub enum Transport {
    #[cfg(feature = "smtp")]
    Smtp(SmtpTransport),
    #[cfg(feature = "sendmail")]
    Sendmail {
        driver: Driver,
        transport: SendmailTransport,
    },
}

impl Transport {
    /// Creates the transport for the configured driver.
    pub fn new(config: &Config) -> crate::Result<Self> {
        let driver = config
            .driver
            .ok_or_else(|| crate::Error::Configuration("Missing mail driver".to_string()))?;

        match driver {
            #[cfg(feature = "smtp")]
            Driver::Smtp => Ok(Transport::Smtp(SmtpTransport::new(config))),
            #[cfg(feature = "sendmail")]
            Driver::Sendmail => Ok(Transport::Sendmail {
                driver,
                transport: SendmailTransport::new(config.sendmail_command())
                    .timeout(config.timeout()),
            }),
            #[cfg(feature = "sendmail")]
            Driver::Mail => Ok(Transport::Sendmail {
                driver,
                transport: SendmailTransport::new(DEFAULT_SENDMAIL).timeout(config.timeout()),
            }),
            #[allow(unreachable_patterns)]
            driver => Err(crate::Error::Configuration(format!(
                "The {} driver is not enabled in this build",
                driver
            ))),
        }
    }

    pub fn driver(&self) -> Driver {
        match self {
            #[cfg(feature = "smtp")]
            Transport::Smtp(_) => Driver::Smtp,
            #[cfg(feature = "sendmail")]
            Transport::Sendmail { driver, .. } => *driver,
        }
    }

    /// Delivers a rendered message.
    ///
    /// Recipients rejected by the transport are reported in
    /// [`Dispatch::failed`]; every other failure is returned as an error.
    pub async fn send(&self, envelope: &Envelope, message: &[u8]) -> crate::Result<Dispatch> {
        tracing::debug!(
            driver = %self.driver(),
            from = %envelope.mail_from,
            rcpt_count = envelope.rcpt_to.len(),
            size = message.len(),
            "Delivering message"
        );

        match self {
            #[cfg(feature = "smtp")]
            Transport::Smtp(transport) => transport.send(envelope, message).await,
            #[cfg(feature = "sendmail")]
            Transport::Sendmail { transport, .. } => transport.send(envelope, message).await,
        }
    }
}

impl Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "smtp")]
            Transport::Smtp(transport) => transport.fmt(f),
            #[cfg(feature = "sendmail")]
            Transport::Sendmail { driver, transport } => f
                .debug_struct("Transport")
                .field("driver", driver)
                .field("sendmail", transport)
                .finish(),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::config::{Config, Driver};

    use super::Transport;

    #[test]
    fn select_driver() {
        assert!(matches!(
            Transport::new(&Config::default()),
            Err(crate::Error::Configuration(_))
        ));

        for driver in [Driver::Smtp, Driver::Mail, Driver::Sendmail] {
            assert_eq!(Transport::new(&Config::new(driver)).unwrap().driver(), driver);
        }
    }

    #[test]
    fn sendmail_command() {
        let transport = Transport::new(&Config {
            sendmail: Some("/opt/bin/sendmail -bs".to_string()),
            ..Config::new(Driver::Sendmail)
        })
        .unwrap();
        match transport {
            Transport::Sendmail { transport, .. } => {
                assert_eq!(transport.program(), "/opt/bin/sendmail");
                assert!(transport.args().is_empty());
            }
            _ => panic!("Expected sendmail transport"),
        }

        match Transport::new(&Config::new(Driver::Mail)).unwrap() {
            Transport::Sendmail { transport, .. } => {
                assert_eq!(transport.program(), "/usr/sbin/sendmail");
            }
            _ => panic!("Expected sendmail transport"),
        }
    }
}
