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

use base64::{engine::general_purpose::STANDARD, Engine};

const PREFIX: &str = "=?UTF-8?B?";
const SUFFIX: &str = "?=";

// 45 raw bytes -> 60 base64 chars, 72 chars per encoded word.
const MAX_CHUNK: usize = 45;

/// Encodes an attachment file name as RFC 2047 encoded words.
///
/// Printable ASCII names are returned unchanged.
pub fn encode_attachment_name(name: &str) -> String {
    if name.bytes().all(|ch| (0x20..0x7f).contains(&ch)) && !name.contains("=?") {
        return name.to_string();
    }

    let mut encoded = String::with_capacity(name.len() * 2);
    let mut chunk_start = 0;
    let mut chunk_end = 0;

    for (pos, ch) in name.char_indices() {
        let end = pos + ch.len_utf8();
        if end - chunk_start > MAX_CHUNK && chunk_end > chunk_start {
            push_word(&mut encoded, &name[chunk_start..chunk_end]);
            chunk_start = chunk_end;
        }
        chunk_end = end;
    }
    if chunk_end > chunk_start {
        push_word(&mut encoded, &name[chunk_start..chunk_end]);
    }

    encoded
}

fn push_word(encoded: &mut String, chunk: &str) {
    if !encoded.is_empty() {
        encoded.push(' ');
    }
    encoded.push_str(PREFIX);
    encoded.push_str(&STANDARD.encode(chunk.as_bytes()));
    encoded.push_str(SUFFIX);
}

/// Decodes a name produced by [`encode_attachment_name`].
///
/// Input without encoded words is returned unchanged.
pub fn decode_attachment_name(name: &str) -> crate::Result<String> {
    let trimmed = name.trim();
    if !trimmed.starts_with("=?") {
        return Ok(name.to_string());
    }

    let mut bytes = Vec::with_capacity(trimmed.len());
    for word in trimmed.split_ascii_whitespace() {
        let payload = strip_prefix_ignore_case(word, PREFIX)
            .and_then(|word| word.strip_suffix(SUFFIX))
            .ok_or_else(|| {
                crate::Error::InvalidArgument(format!("Unsupported encoded word {:?}", word))
            })?;
        bytes.extend(STANDARD.decode(payload).map_err(|err| {
            crate::Error::InvalidArgument(format!("Invalid encoded word {:?}: {}", word, err))
        })?);
    }

    String::from_utf8(bytes)
        .map_err(|_| crate::Error::InvalidArgument("Encoded name is not valid UTF-8".to_string()))
}

fn strip_prefix_ignore_case<'x>(value: &'x str, prefix: &str) -> Option<&'x str> {
    value
        .get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &value[prefix.len()..])
}

#[cfg(test)]
mod test {
    use super::{decode_attachment_name, encode_attachment_name};

    #[test]
    fn ascii_names_pass_through() {
        for name in ["display.txt", "report 2024.pdf", ""] {
            assert_eq!(encode_attachment_name(name), name);
            assert_eq!(decode_attachment_name(name).unwrap(), name);
        }
    }

    #[test]
    fn encode_non_ascii() {
        let encoded = encode_attachment_name("尼玛看这里.txt");
        assert_eq!(encoded, "=?UTF-8?B?5bC8546b55yL6L+Z6YeMLnR4dA==?=");
        assert_eq!(decode_attachment_name(&encoded).unwrap(), "尼玛看这里.txt");

        let encoded = encode_attachment_name("café.pdf");
        assert!(encoded.starts_with("=?UTF-8?B?"));
        assert_eq!(decode_attachment_name(&encoded).unwrap(), "café.pdf");
    }

    #[test]
    fn long_names_are_split() {
        let name = "附件".repeat(30) + ".txt";
        let encoded = encode_attachment_name(&name);
        let words = encoded.split(' ').collect::<Vec<_>>();
        assert!(words.len() > 1);
        for word in &words {
            assert!(word.len() <= 75, "{word} is too long");
        }
        assert_eq!(decode_attachment_name(&encoded).unwrap(), name);
    }

    #[test]
    fn reject_malformed() {
        assert!(decode_attachment_name("=?UTF-8?Q?caf=C3=A9?=").is_err());
        assert!(decode_attachment_name("=?UTF-8?B?***?=").is_err());
    }
}
