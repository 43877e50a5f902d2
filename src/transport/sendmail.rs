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

use std::{process::Stdio, time::Duration};

use tokio::{io::AsyncWriteExt, process::Command};

use crate::{config::DEFAULT_SENDMAIL, mailer::Dispatch};

use super::Envelope;

// Flags replaced by the explicit envelope arguments.
const IGNORED_FLAGS: &[&str] = &["-bs", "-t", "-i", "-oi"];

/// Sends messages by piping them to a sendmail compatible binary.
#[derive(Debug, Clone)]
pub struct SendmailTransport {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl SendmailTransport {
    /// Creates a transport from a command line such as
    /// `/usr/sbin/sendmail -bs`.
    pub fn new(command: &str) -> Self {
        let mut parts = command.split_whitespace();
        let program = parts.next().unwrap_or(DEFAULT_SENDMAIL).to_string();
        let mut args = Vec::new();

        while let Some(arg) = parts.next() {
            if IGNORED_FLAGS.contains(&arg) {
                tracing::debug!(flag = arg, "Ignoring sendmail flag");
            } else if arg == "-f" {
                // The envelope sender always comes from the message.
                let sender = parts.next().unwrap_or_default();
                tracing::debug!(flag = arg, sender, "Ignoring sendmail flag");
            } else if let Some(sender) = arg.strip_prefix("-f") {
                tracing::debug!(flag = "-f", sender, "Ignoring sendmail flag");
            } else {
                args.push(arg.to_string());
            }
        }

        SendmailTransport {
            program,
            args,
            timeout: None,
        }
    }

    /// Kill the process if it does not exit in time.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn command(&self, envelope: &Envelope) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("-i")
            .arg("-f")
            .arg(&envelope.mail_from)
            .arg("--")
            .args(&envelope.rcpt_to)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Pipes the message to the sendmail binary. Delivery is all or nothing.
    ///
    /// The binary may exit before reading all of its input. Its exit status
    /// takes precedence over the resulting broken pipe.
    pub async fn send(&self, envelope: &Envelope, message: &[u8]) -> crate::Result<Dispatch> {
        let run = async {
            let mut child = self.command(envelope).spawn()?;
            let stdin = child.stdin.take();
            let write = async move {
                match stdin {
                    Some(mut stdin) => stdin.write_all(message).await,
                    None => Ok(()),
                }
            };
            let (written, output) = tokio::join!(write, child.wait_with_output());
            output.map(|output| (written, output))
        };

        let (written, output) = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, run)
                .await
                .map_err(|_| crate::Error::Timeout)??,
            None => run.await?,
        };

        if !output.status.success() {
            return Err(crate::Error::Sendmail {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        written?;

        Ok(Dispatch {
            accepted: envelope.rcpt_to.len(),
            failed: Vec::new(),
        })
    }
}

#[cfg(all(test, unix))]
mod test {
    use std::{path::PathBuf, time::Duration};

    use crate::transport::Envelope;

    use super::SendmailTransport;

    fn script(name: &str, body: &str) -> (PathBuf, SendmailTransport) {
        let dir = std::env::temp_dir().join(format!(
            "mail-dispatch-{}-{}",
            std::process::id(),
            name
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sendmail.sh");
        std::fs::write(&path, body.replace("$DIR", dir.to_str().unwrap())).unwrap();
        let transport = SendmailTransport::new(&format!("/bin/sh {} -bs", path.display()));
        (dir, transport)
    }

    fn envelope() -> Envelope {
        Envelope {
            mail_from: "noreply@x.com".to_string(),
            rcpt_to: vec!["a@x.com".to_string(), "b@x.com".to_string()],
        }
    }

    #[test]
    fn parse_command() {
        let transport = SendmailTransport::new("/usr/sbin/sendmail -bs -oem");
        assert_eq!(transport.program(), "/usr/sbin/sendmail");
        assert_eq!(transport.args(), ["-oem"]);

        let transport = SendmailTransport::new("/usr/sbin/sendmail -f bounce@x.com -oem -t");
        assert_eq!(transport.args(), ["-oem"]);

        let transport = SendmailTransport::new("sendmail -fbounce@x.com -oi -odb");
        assert_eq!(transport.program(), "sendmail");
        assert_eq!(transport.args(), ["-odb"]);

        let transport = SendmailTransport::new("   ");
        assert_eq!(transport.program(), "/usr/sbin/sendmail");
    }

    #[tokio::test]
    async fn pipe_message() {
        let (dir, transport) = script(
            "pipe",
            "printf '%s\\n' \"$@\" > \"$DIR/args\"\ncat > \"$DIR/message\"\n",
        );

        let dispatch = transport
            .send(&envelope(), b"Subject: hi\r\n\r\nhello\r\n")
            .await
            .unwrap();
        assert_eq!(dispatch.accepted, 2);
        assert!(dispatch.failed.is_empty());

        let args = std::fs::read_to_string(dir.join("args")).unwrap();
        assert_eq!(
            args.lines().collect::<Vec<_>>(),
            ["-i", "-f", "noreply@x.com", "--", "a@x.com", "b@x.com"]
        );
        assert_eq!(
            std::fs::read(dir.join("message")).unwrap(),
            b"Subject: hi\r\n\r\nhello\r\n"
        );
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn exit_status() {
        let (dir, transport) = script(
            "status",
            "cat > /dev/null\necho 'a@x.com... User unknown' >&2\nexit 67\n",
        );

        match transport.send(&envelope(), b"test").await {
            Err(crate::Error::Sendmail { status, stderr }) => {
                assert_eq!(status, Some(67));
                assert!(stderr.contains("User unknown"), "{stderr}");
            }
            other => panic!("Unexpected result {other:?}"),
        }
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn exit_before_reading_input() {
        let (dir, transport) = script(
            "refused",
            "echo 'Message refused' >&2\nexit 67\n",
        );
        let message = vec![b'x'; 4 * 1024 * 1024];

        match transport.send(&envelope(), &message).await {
            Err(crate::Error::Sendmail { status, stderr }) => {
                assert_eq!(status, Some(67));
                assert!(stderr.contains("Message refused"), "{stderr}");
            }
            other => panic!("Unexpected result {other:?}"),
        }
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn timeout() {
        let (dir, transport) = script("timeout", "cat > /dev/null\nsleep 5\n");
        let transport = transport.timeout(Some(Duration::from_millis(200)));

        assert!(matches!(
            transport.send(&envelope(), b"test").await,
            Err(crate::Error::Timeout)
        ));
        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn missing_binary() {
        let transport = SendmailTransport::new("/nonexistent/sendmail");
        assert!(matches!(
            transport.send(&envelope(), b"test").await,
            Err(crate::Error::Io(_))
        ));
    }
}
