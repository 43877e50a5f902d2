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

use crate::{
    config::Config,
    mailer::{Dispatch, Mailer},
    message::{AttachmentOptions, Mailbox},
};

/// One-call helper for HTML notifications.
///
/// ```rust
///     let helper = MailHelper::new(config)?;
///     helper
///         .sendmail(
///             ["ops@example.com"],
///             "Something broke",
///             "<h2 style=\"color:#ff0000\">See the attached report</h2>",
///             Some(AttachData::new("trace", "alert.txt", "report.txt")),
///         )
///         .await?;
/// ```
#[derive(Debug)]
pub struct MailHelper {
    pub mailer: Mailer,
}

/// In-memory attachment: raw data, original file name and display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachData {
    pub data: Vec<u8>,
    pub original_name: String,
    pub display_name: String,
}

impl MailHelper {
    pub fn new(config: Config) -> crate::Result<Self> {
        Ok(MailHelper {
            mailer: Mailer::new(config)?,
        })
    }

    /// Sends an HTML message to `to`, optionally with one attachment.
    pub async fn sendmail<I>(
        &self,
        to: I,
        subject: &str,
        html_body: &str,
        attach_data: Option<AttachData>,
    ) -> crate::Result<Option<Dispatch>>
    where
        I: IntoIterator,
        I::Item: Into<Mailbox>,
    {
        self.mailer
            .send(|message| {
                message
                    .to(to)
                    .subject(subject)
                    .set_body(html_body, "text/html");

                if let Some(attachment) = attach_data {
                    message.attach_data(
                        attachment.data,
                        attachment.original_name,
                        AttachmentOptions::named(attachment.display_name),
                    );
                }
            })
            .await
    }
}

impl AttachData {
    pub fn new(
        data: impl Into<Vec<u8>>,
        original_name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        AttachData {
            data: data.into(),
            original_name: original_name.into(),
            display_name: display_name.into(),
        }
    }
}

impl<D, O, N> From<(D, O, N)> for AttachData
where
    D: Into<Vec<u8>>,
    O: Into<String>,
    N: Into<String>,
{
    fn from((data, original_name, display_name): (D, O, N)) -> Self {
        AttachData::new(data, original_name, display_name)
    }
}

impl<T: AsRef<str>> TryFrom<&[T]> for AttachData {
    type Error = crate::Error;

    fn try_from(value: &[T]) -> Result<Self, Self::Error> {
        match value {
            [data, original_name, display_name] => Ok(AttachData::new(
                data.as_ref(),
                original_name.as_ref(),
                display_name.as_ref(),
            )),
            _ => Err(crate::Error::InvalidArgument(format!(
                "Attachment data must contain exactly 3 elements (data, original name, display name), got {}",
                value.len()
            ))),
        }
    }
}

impl TryFrom<Vec<String>> for AttachData {
    type Error = crate::Error;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        AttachData::try_from(value.as_slice())
    }
}
