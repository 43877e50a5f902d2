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

use std::sync::Arc;

use mail_dispatch::{AttachData, Config, Driver, MailHelper, TracingLogger};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // Nothing is delivered in pretend mode, each message is summarized
    // on a single log line instead.
    let helper = MailHelper::new(Config {
        pretend: true,
        logger: Some(Arc::new(TracingLogger)),
        from: Some(("Example", "noreply@example.com").into()),
        ..Config::new(Driver::Sendmail)
    })
    .unwrap();

    let dispatch = helper
        .sendmail(
            ["ops@example.com", "oncall@example.com"],
            "System failure",
            "<h2 style=\"color:#ff0000\">The system failed again, see the attachment</h2>",
            Some(AttachData::new("stack trace", "alert.txt", "read me.txt")),
        )
        .await
        .unwrap();

    println!("{:?}", dispatch);
}
