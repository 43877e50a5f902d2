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

//! # mail-dispatch
//!
//! _mail-dispatch_ is a thin layer for composing and dispatching e-mail messages through a
//! configurable transport. It includes the following features:
//!
//! - Transport selection from a single configuration record: **SMTP** (delegated to
//!   [`mail-send`](https://crates.io/crates/mail-send)), a local **sendmail** binary or the
//!   host's native **mail** facility.
//! - **Pretend** mode, which logs a one-line summary of each message instead of delivering it.
//! - Closure based message building with a configurable default sender.
//! - Attachments with RFC 2047 encoded display names.
//! - Per-recipient failure reporting for SMTP deliveries.
//! - Full async (requires Tokio).
//!
//! ## Usage Example
//!
//! Send a message through an SMTP relay:
//!
//! ```rust
//!     let config: Config = serde_json::from_str(r#"{
//!         "driver": "smtp",
//!         "host": "smtp.example.com",
//!         "port": 465,
//!         "encryption": "ssl",
//!         "username": "john",
//!         "password": "p4ssw0rd",
//!         "from": { "address": "noreply@example.com", "name": "Example" }
//!     }"#).unwrap();
//!
//!     let mailer = Mailer::new(config).unwrap();
//!     let dispatch = mailer
//!         .send(|message| {
//!             message
//!                 .to(["jane@example.com"])
//!                 .subject("Hi!")
//!                 .set_body("<h1>Hello, world!</h1>", "text/html");
//!         })
//!         .await
//!         .unwrap();
//! ```
//!
//! Log messages instead of sending them:
//!
//! ```rust
//!     let mut mailer = Mailer::new(config).unwrap();
//!     mailer.pretend(true);
//!     mailer.set_logger(Arc::new(TracingLogger));
//! ```
//!
//! ## License
//!
//! Licensed under either of
//!
//!  * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//!  * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.
//!

pub mod config;
pub mod helper;
pub mod mailer;
pub mod message;
#[forbid(unsafe_code)]
pub mod transport;

use std::fmt::Display;

pub use config::{Config, Driver, Encryption};
pub use helper::{AttachData, MailHelper};
pub use mail_builder;
pub use mailer::{Dispatch, Logger, Mailer, TracingLogger};
pub use message::{AttachmentOptions, Mailbox, Message};
pub use transport::{Envelope, Transport};

#[derive(Debug)]
pub enum Error {
    /// Missing or unsupported transport driver.
    Configuration(String),

    /// Malformed argument, such as an attachment triple of the wrong length.
    InvalidArgument(String),

    /// Missing message sender.
    MissingSender,

    /// Missing message recipients.
    MissingRecipients,

    /// I/O error
    Io(std::io::Error),

    /// SMTP delivery error.
    #[cfg(feature = "smtp")]
    Smtp(mail_send::Error),

    /// The sendmail binary exited unsuccessfully.
    Sendmail { status: Option<i32>, stderr: String },

    /// Transport timeout.
    Timeout,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns `true` for failures raised while talking to the transport.
    pub fn is_transport(&self) -> bool {
        match self {
            #[cfg(feature = "smtp")]
            Error::Smtp(_) => true,
            Error::Io(_) | Error::Sendmail { .. } | Error::Timeout => true,
            _ => false,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Configuration(e) => write!(f, "Configuration error: {}", e),
            Error::InvalidArgument(e) => write!(f, "Invalid argument: {}", e),
            Error::MissingSender => write!(f, "Missing message sender"),
            Error::MissingRecipients => write!(f, "Missing message recipients"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            #[cfg(feature = "smtp")]
            Error::Smtp(e) => write!(f, "SMTP error: {}", e),
            Error::Sendmail { status, stderr } => match status {
                Some(code) => write!(f, "sendmail exited with status {}: {}", code, stderr.trim()),
                None => write!(f, "sendmail terminated by signal: {}", stderr.trim()),
            },
            Error::Timeout => write!(f, "Transport timeout"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(feature = "smtp")]
impl From<mail_send::Error> for Error {
    fn from(err: mail_send::Error) -> Self {
        Error::Smtp(err)
    }
}
