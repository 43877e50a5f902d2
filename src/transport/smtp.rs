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

use std::fmt::Debug;

use mail_send::{smtp::message::Parameters, SmtpClient, SmtpClientBuilder};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    config::{Config, Encryption},
    mailer::Dispatch,
};

use super::Envelope;

/// SMTP relay transport. A new connection is opened for every message.
pub struct SmtpTransport {
    builder: SmtpClientBuilder<String>,
    hostname: String,
    port: u16,
    encryption: Encryption,
}

impl SmtpTransport {
    pub fn new(config: &Config) -> Self {
        let hostname = config.host().to_string();
        let port = config.port();
        let mut builder = SmtpClientBuilder::new(hostname.clone(), port)
            .implicit_tls(config.encryption == Encryption::Ssl);

        if let Some((username, secret)) = config.credentials() {
            builder = builder.credentials((username.to_string(), secret.to_string()));
        }
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(helo_host) = &config.helo_host {
            builder = builder.helo_host(helo_host.clone());
        }

        SmtpTransport {
            builder,
            hostname,
            port,
            encryption: config.encryption,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn encryption(&self) -> Encryption {
        self.encryption
    }

    /// Connects, delivers the message and quits.
    pub async fn send(&self, envelope: &Envelope, message: &[u8]) -> crate::Result<Dispatch> {
        match self.encryption {
            Encryption::None => deliver(self.builder.connect_plain().await?, envelope, message).await,
            Encryption::Ssl | Encryption::Tls => {
                deliver(self.builder.connect().await?, envelope, message).await
            }
        }
    }
}

async fn deliver<T: AsyncRead + AsyncWrite + Unpin>(
    mut client: SmtpClient<T>,
    envelope: &Envelope,
    message: &[u8],
) -> crate::Result<Dispatch> {
    let params = Parameters::default();
    client.mail_from(&envelope.mail_from, &params).await?;

    let mut dispatch = Dispatch::default();
    for rcpt in &envelope.rcpt_to {
        match client.rcpt_to(rcpt, &params).await {
            Ok(()) => dispatch.accepted += 1,
            Err(err @ mail_send::Error::UnexpectedReply(_)) => {
                tracing::debug!(rcpt = %rcpt, reason = %err, "Recipient rejected");
                dispatch.failed.push(rcpt.clone());
            }
            Err(err) => return Err(err.into()),
        }
    }

    if dispatch.accepted > 0 {
        client.data(message).await?;
    } else {
        client.rset().await?;
    }

    // The transaction is complete at this point.
    if let Err(err) = client.quit().await {
        tracing::debug!(reason = %err, "QUIT failed");
    }

    Ok(dispatch)
}

impl Debug for SmtpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpTransport")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("encryption", &self.encryption)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    };

    use crate::{
        config::{Config, Driver},
        transport::{Envelope, Transport},
    };

    pub(crate) struct Session {
        pub commands: Vec<String>,
        pub data: String,
    }

    /// Accepts `sessions` SMTP sessions in turn, rejecting the given
    /// recipients. The listener is closed once the last one ends.
    pub(crate) async fn spawn_server(
        sessions: usize,
        reject: &'static [&'static str],
    ) -> (Config, JoinHandle<Vec<Session>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = Config {
            host: Some("127.0.0.1".to_string()),
            port: Some(listener.local_addr().unwrap().port()),
            helo_host: Some("client.test".to_string()),
            timeout: Some(10),
            ..Config::new(Driver::Smtp)
        };

        let handle = tokio::spawn(async move {
            let mut served = Vec::with_capacity(sessions);
            for _ in 0..sessions {
                let (stream, _) = listener.accept().await.unwrap();
                served.push(serve(stream, reject).await);
            }
            served
        });

        (config, handle)
    }

    async fn serve(stream: TcpStream, reject: &[&str]) -> Session {
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut session = Session {
            commands: Vec::new(),
            data: String::new(),
        };
        let mut in_data = false;

        write.write_all(b"220 localhost ESMTP\r\n").await.unwrap();

        while let Some(line) = lines.next_line().await.unwrap() {
            if in_data {
                if line == "." {
                    in_data = false;
                    write.write_all(b"250 2.0.0 Queued\r\n").await.unwrap();
                } else {
                    session.data.push_str(&line);
                    session.data.push('\n');
                }
                continue;
            }

            let command = line.to_ascii_uppercase();
            session.commands.push(line.clone());
            let reply: &[u8] = if command.starts_with("EHLO") {
                b"250-localhost\r\n250 8BITMIME\r\n"
            } else if command.starts_with("MAIL FROM") {
                b"250 2.1.0 OK\r\n"
            } else if command.starts_with("RCPT TO") {
                if reject.iter().any(|rcpt| line.contains(rcpt)) {
                    b"550 5.1.1 User unknown\r\n"
                } else {
                    b"250 2.1.5 OK\r\n"
                }
            } else if command == "DATA" {
                in_data = true;
                b"354 Start mail input\r\n"
            } else if command == "RSET" {
                b"250 2.0.0 OK\r\n"
            } else if command == "QUIT" {
                write.write_all(b"221 2.0.0 Bye\r\n").await.unwrap();
                break;
            } else {
                b"502 5.5.2 Command not recognized\r\n"
            };
            write.write_all(reply).await.unwrap();
        }

        session
    }

    fn envelope(rcpt_to: &[&str]) -> Envelope {
        Envelope {
            mail_from: "noreply@x.com".to_string(),
            rcpt_to: rcpt_to.iter().map(|rcpt| rcpt.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn partial_delivery() {
        let (config, server) = spawn_server(1, &["bad@x.com"]).await;
        let transport = Transport::new(&config).unwrap();

        let dispatch = transport
            .send(
                &envelope(&["a@x.com", "bad@x.com", "b@x.com"]),
                b"Subject: hi\r\n\r\nhello\r\n",
            )
            .await
            .unwrap();
        assert_eq!(dispatch.accepted, 2);
        assert_eq!(dispatch.failed, ["bad@x.com"]);

        let session = server.await.unwrap().remove(0);
        assert_eq!(session.commands[0], "EHLO client.test");
        assert_eq!(
            &session.commands[1..],
            [
                "MAIL FROM:<noreply@x.com>",
                "RCPT TO:<a@x.com>",
                "RCPT TO:<bad@x.com>",
                "RCPT TO:<b@x.com>",
                "DATA",
                "QUIT"
            ]
        );
        assert!(session.data.contains("hello"), "{}", session.data);
    }

    #[tokio::test]
    async fn all_recipients_rejected() {
        let (config, server) = spawn_server(1, &["bad@x.com", "worse@x.com"]).await;
        let transport = Transport::new(&config).unwrap();

        let dispatch = transport
            .send(&envelope(&["bad@x.com", "worse@x.com"]), b"Subject: hi\r\n\r\nhello\r\n")
            .await
            .unwrap();
        assert_eq!(dispatch.accepted, 0);
        assert_eq!(dispatch.failed, ["bad@x.com", "worse@x.com"]);

        let session = server.await.unwrap().remove(0);
        assert!(session.commands.iter().any(|command| command == "RSET"));
        assert!(!session.commands.iter().any(|command| command == "DATA"));
        assert!(session.data.is_empty());
    }

    #[tokio::test]
    async fn connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = Transport::new(&Config {
            host: Some("127.0.0.1".to_string()),
            port: Some(port),
            timeout: Some(5),
            ..Config::new(Driver::Smtp)
        })
        .unwrap();

        let err = transport
            .send(&envelope(&["a@x.com"]), b"test")
            .await
            .unwrap_err();
        assert!(err.is_transport(), "{err}");
    }
}
