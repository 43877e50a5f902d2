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

use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
};

use crate::{
    config::Config,
    message::{Mailbox, Message},
    transport::Transport,
};

/// Receives the summary line of every message sent in pretend mode.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
}

/// [`Logger`] that emits `tracing` events at the info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "mail_dispatch::pretend", "{}", message);
    }
}

/// Outcome of a single send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// Number of recipients accepted by the transport.
    pub accepted: usize,
    /// Recipients rejected by the transport.
    pub failed: Vec<String>,
}

/// Builds messages and hands them to the configured transport, or to the
/// logger when pretending.
pub struct Mailer {
    transport: Transport,
    from: Option<Mailbox>,
    logger: Option<Arc<dyn Logger>>,
    pretending: bool,
    failed_recipients: Mutex<Vec<String>>,
}

impl Mailer {
    /// Creates a mailer and its transport from a configuration.
    pub fn new(config: Config) -> crate::Result<Self> {
        let mut mailer = Mailer::with_transport(Transport::new(&config)?);

        if let Some(logger) = config.logger {
            mailer.set_logger(logger);
        }

        if let Some(from) = config.from.filter(|from| !from.address.is_empty()) {
            mailer.from = Some(from);
        }

        // Pretend mode writes a summary of each message to the logger
        // instead of delivering it, which is handy for local development.
        mailer.pretend(config.pretend);

        Ok(mailer)
    }

    pub fn with_transport(transport: Transport) -> Self {
        Mailer {
            transport,
            from: None,
            logger: None,
            pretending: false,
            failed_recipients: Mutex::new(Vec::new()),
        }
    }

    /// Sets the sender used by every message unless the message overrides it.
    pub fn always_from(&mut self, address: impl Into<String>, name: Option<&str>) {
        self.from = Some(Mailbox {
            address: address.into(),
            name: name.map(String::from),
        });
    }

    /// Tells the mailer not to deliver messages.
    pub fn pretend(&mut self, value: bool) {
        self.pretending = value;
    }

    pub fn is_pretending(&self) -> bool {
        self.pretending
    }

    /// Sends a new message populated by `build`.
    ///
    /// In pretend mode one line is written to the logger and the result
    /// reports a single accepted recipient. Without a logger nothing happens
    /// and `None` is returned. Otherwise the message is delivered and the
    /// transport's result is returned. The message is only rendered when it
    /// is delivered.
    pub async fn send<F>(&self, build: F) -> crate::Result<Option<Dispatch>>
    where
        F: FnOnce(&mut Message),
    {
        let mut message = self.create_message();
        build(&mut message);

        if self.pretending {
            return Ok(match &self.logger {
                Some(logger) => {
                    log_message(logger.as_ref(), &message);
                    Some(Dispatch {
                        accepted: 1,
                        failed: Vec::new(),
                    })
                }
                None => {
                    tracing::warn!(
                        subject = message.subject.as_deref().unwrap_or_default(),
                        "Pretend mode is enabled but no logger is attached, message dropped"
                    );
                    None
                }
            });
        }

        let envelope = message.envelope()?;
        let raw = message.render()?;
        self.set_failures(Vec::new());
        let dispatch = self.transport.send(&envelope, &raw).await?;
        if !dispatch.failed.is_empty() {
            tracing::debug!(
                accepted = dispatch.accepted,
                failed = dispatch.failed.len(),
                "Some recipients were rejected"
            );
        }
        self.set_failures(dispatch.failed.clone());

        Ok(Some(dispatch))
    }

    fn create_message(&self) -> Message {
        let mut message = Message::new();

        // Set the global sender on every message so callers do not have
        // to repeat it.
        if let Some(from) = &self.from {
            message.from(from.clone());
        }

        message
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Recipients rejected during the most recent delivery.
    pub fn failures(&self) -> Vec<String> {
        self.failed_recipients
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    fn set_failures(&self, failures: Vec<String>) {
        *self
            .failed_recipients
            .lock()
            .unwrap_or_else(|err| err.into_inner()) = failures;
    }

    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = Some(logger);
    }
}

fn log_message(logger: &dyn Logger, message: &Message) {
    let emails = message
        .to
        .iter()
        .map(|mailbox| mailbox.address.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    logger.info(&format!(
        "Pretending to mail message [{}] to: {}",
        message.subject.as_deref().unwrap_or_default(),
        emails
    ));
}

impl Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("transport", &self.transport)
            .field("from", &self.from)
            .field("logger", &self.logger.is_some())
            .field("pretending", &self.pretending)
            .finish()
    }
}
