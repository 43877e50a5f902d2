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

use std::{borrow::Cow, fmt::Display};

use mail_builder::{headers::address::Address, mime::MimePart, MessageBuilder};
use serde::Deserialize;

use crate::transport::Envelope;

pub mod encoding;

pub use encoding::{decode_attachment_name, encode_attachment_name};

/// Outbound message, populated by the closure passed to
/// [`Mailer::send`](crate::Mailer::send).
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub from: Option<Mailbox>,
    pub to: Vec<Mailbox>,
    pub cc: Vec<Mailbox>,
    pub bcc: Vec<Mailbox>,
    pub reply_to: Vec<Mailbox>,
    pub subject: Option<String>,
    pub body: Option<Body>,
    /// Alternative representation of the body, usually plain text.
    pub alternative: Option<Body>,
    pub attachments: Vec<Attachment>,
}

/// E-mail address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Mailbox {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    pub content: String,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub data: Vec<u8>,
    pub original_name: String,
    /// Display name after [`encode_attachment_name`].
    pub display_name: String,
    pub content_type: String,
}

/// Options accepted by [`Message::attach_data`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentOptions {
    /// File name shown to the recipient, defaults to the original name.
    pub display_name: Option<String>,
    /// MIME type, guessed from the original name when missing.
    pub mime: Option<String>,
}

impl Message {
    /// Create a new empty message.
    pub fn new() -> Self {
        Message::default()
    }

    /// Set the sender of the message.
    pub fn from(&mut self, mailbox: impl Into<Mailbox>) -> &mut Self {
        self.from = Some(mailbox.into());
        self
    }

    /// Add one or more recipients.
    pub fn to<I>(&mut self, addresses: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Mailbox>,
    {
        self.to.extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Add one or more carbon copy recipients.
    pub fn cc<I>(&mut self, addresses: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Mailbox>,
    {
        self.cc.extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Add one or more blind carbon copy recipients.
    pub fn bcc<I>(&mut self, addresses: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Mailbox>,
    {
        self.bcc.extend(addresses.into_iter().map(Into::into));
        self
    }

    pub fn reply_to<I>(&mut self, addresses: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Mailbox>,
    {
        self.reply_to.extend(addresses.into_iter().map(Into::into));
        self
    }

    pub fn subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the message body and its MIME type, e.g. `text/html`.
    pub fn set_body(
        &mut self,
        content: impl Into<String>,
        content_type: impl Into<String>,
    ) -> &mut Self {
        self.body = Some(Body {
            content: content.into(),
            content_type: content_type.into(),
        });
        self
    }

    /// Add an alternative representation of the body.
    pub fn add_part(
        &mut self,
        content: impl Into<String>,
        content_type: impl Into<String>,
    ) -> &mut Self {
        self.alternative = Some(Body {
            content: content.into(),
            content_type: content_type.into(),
        });
        self
    }

    /// Attach in-memory data.
    ///
    /// The display name goes through [`encode_attachment_name`] before it
    /// is stored.
    pub fn attach_data(
        &mut self,
        data: impl Into<Vec<u8>>,
        original_name: impl Into<String>,
        options: AttachmentOptions,
    ) -> &mut Self {
        let original_name = original_name.into();
        let display_name =
            encode_attachment_name(options.display_name.as_deref().unwrap_or(&original_name));
        let content_type = options.mime.unwrap_or_else(|| {
            mime_guess::from_path(&original_name)
                .first_or_octet_stream()
                .to_string()
        });

        self.attachments.push(Attachment {
            data: data.into(),
            original_name,
            display_name,
            content_type,
        });
        self
    }

    /// Builds the SMTP envelope: the sender plus every `To`, `Cc` and `Bcc`
    /// address, without duplicates.
    pub fn envelope(&self) -> crate::Result<Envelope> {
        let mail_from = self
            .from
            .as_ref()
            .map(|from| from.address.trim())
            .filter(|address| !address.is_empty())
            .ok_or(crate::Error::MissingSender)?
            .to_string();

        let mut rcpt_to: Vec<String> = Vec::new();
        for mailbox in self.to.iter().chain(&self.cc).chain(&self.bcc) {
            let address = mailbox.address.trim();
            if !address.is_empty() && !rcpt_to.iter().any(|rcpt| rcpt == address) {
                rcpt_to.push(address.to_string());
            }
        }

        if rcpt_to.is_empty() {
            return Err(crate::Error::MissingRecipients);
        }

        Ok(Envelope { mail_from, rcpt_to })
    }

    /// Converts the message into a [`MessageBuilder`]. `Bcc` recipients are
    /// left out of the headers.
    pub fn to_builder(&self) -> MessageBuilder<'_> {
        let mut builder = MessageBuilder::new();

        if let Some(from) = &self.from {
            builder = builder.from(from.to_address());
        }
        if !self.to.is_empty() {
            builder = builder.to(address_list(&self.to));
        }
        if !self.cc.is_empty() {
            builder = builder.cc(address_list(&self.cc));
        }
        if !self.reply_to.is_empty() {
            builder = builder.reply_to(address_list(&self.reply_to));
        }
        if let Some(subject) = &self.subject {
            builder = builder.subject(subject.as_str());
        }

        let mut body = match (&self.body, &self.alternative) {
            (Some(body), Some(alternative)) => MimePart::new(
                "multipart/alternative",
                vec![alternative.to_part(), body.to_part()],
            ),
            (Some(body), None) | (None, Some(body)) => body.to_part(),
            (None, None) => MimePart::new("text/plain", ""),
        };

        if !self.attachments.is_empty() {
            let mut parts = Vec::with_capacity(self.attachments.len() + 1);
            parts.push(body);
            parts.extend(self.attachments.iter().map(|attachment| {
                MimePart::new(
                    attachment.content_type.as_str(),
                    attachment.data.as_slice(),
                )
                .attachment(attachment.file_name())
            }));
            body = MimePart::new("multipart/mixed", parts);
        }

        builder.body(body)
    }

    /// Renders the message in Internet Message Format.
    pub fn render(&self) -> crate::Result<Vec<u8>> {
        self.to_builder().write_to_vec().map_err(Into::into)
    }
}

impl Attachment {
    /// Display name as the recipient sees it. `mail-builder` applies its own
    /// parameter encoding, so it must receive the decoded name.
    pub fn file_name(&self) -> Cow<'_, str> {
        match decode_attachment_name(&self.display_name) {
            Ok(name) => Cow::Owned(name),
            Err(_) => Cow::Borrowed(&self.display_name),
        }
    }
}

fn address_list(mailboxes: &[Mailbox]) -> Address<'_> {
    Address::new_list(mailboxes.iter().map(Mailbox::to_address).collect())
}

impl Body {
    fn to_part(&self) -> MimePart<'_> {
        MimePart::new(self.content_type.as_str(), self.content.as_str())
    }
}

impl Mailbox {
    pub fn new(address: impl Into<String>, name: Option<impl Into<String>>) -> Self {
        Mailbox {
            address: address.into(),
            name: name.map(Into::into),
        }
    }

    fn to_address(&self) -> Address<'_> {
        Address::new_address(self.name.as_deref(), self.address.as_str())
    }
}

impl From<&str> for Mailbox {
    fn from(address: &str) -> Self {
        Mailbox {
            address: address.to_string(),
            name: None,
        }
    }
}

impl From<String> for Mailbox {
    fn from(address: String) -> Self {
        Mailbox {
            address,
            name: None,
        }
    }
}

impl From<&String> for Mailbox {
    fn from(address: &String) -> Self {
        Mailbox::from(address.as_str())
    }
}

/// `(name, address)`, in the same order as `mail-builder`.
impl From<(&str, &str)> for Mailbox {
    fn from((name, address): (&str, &str)) -> Self {
        Mailbox {
            address: address.to_string(),
            name: Some(name.to_string()),
        }
    }
}

impl From<(String, String)> for Mailbox {
    fn from((name, address): (String, String)) -> Self {
        Mailbox {
            address,
            name: Some(name),
        }
    }
}

impl Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => f.write_str(&self.address),
        }
    }
}

impl AttachmentOptions {
    /// Options with the `as` display name set.
    pub fn named(display_name: impl Into<String>) -> Self {
        AttachmentOptions {
            display_name: Some(display_name.into()),
            mime: None,
        }
    }

    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}
