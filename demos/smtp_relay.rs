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

use mail_dispatch::{AttachmentOptions, Config, Mailer};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config: Config = serde_json::from_str(
        r#"{
            "driver": "smtp",
            "host": "smtp.example.com",
            "port": 587,
            "encryption": "tls",
            "username": "john",
            "password": "p4ssw0rd",
            "from": { "address": "john@example.com", "name": "John Doe" }
        }"#,
    )
    .unwrap();

    let mailer = Mailer::new(config).unwrap();
    let dispatch = mailer
        .send(|message| {
            message
                .to([("Jane Doe", "jane@example.com"), ("James Smith", "james@test.com")])
                .subject("Hi!")
                .set_body("<h1>Hello, world!</h1>", "text/html")
                .add_part("Hello world!", "text/plain")
                .attach_data(
                    "a,b\n1,2\n",
                    "report.csv",
                    AttachmentOptions::named("Monthly report.csv"),
                );
        })
        .await
        .unwrap()
        .unwrap();

    println!(
        "Accepted {} recipients, rejected {:?}",
        dispatch.accepted, dispatch.failed
    );
}
