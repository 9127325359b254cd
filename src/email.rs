use crate::canonicalization::{canonicalize_body, canonicalize_header};

/// The canonicalized header block and body of a whole message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalMessage {
    pub header: String,
    pub body: String,
}

/// Split a raw mail into its header block and its body.
///
/// The separator is the first empty line, whatever line ending it uses.
/// The header part keeps the line break of its last field.
/// A mail without any empty line is all header and has an empty body.
pub fn split_message(raw: &str) -> (&str, &str) {
    let bytes = raw.as_bytes();
    let mut line_start = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let break_len = match (bytes[idx], bytes.get(idx + 1)) {
            (b'\r', Some(b'\n')) => 2,
            (b'\r', _) | (b'\n', _) => 1,
            _ => {
                idx += 1;
                continue;
            }
        };
        if idx == line_start {
            return (&raw[..line_start], &raw[idx + break_len..]);
        }
        idx += break_len;
        line_start = idx;
    }

    (raw, "")
}

/// Canonicalize both parts of a raw mail with the relaxed algorithms.
pub fn canonicalize_message(raw: &str) -> CanonicalMessage {
    let (header, body) = split_message(raw);
    CanonicalMessage {
        header: canonicalize_header(header),
        body: canonicalize_body(body),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const MAIL: &str = "A: X\r\nB : Y\t\r\n\tZ  \r\n\r\n C \r\nD \t E\r\n\r\n\r\n";

    #[test]
    fn split_message_test() {
        assert_eq!(split_message(MAIL), ("A: X\r\nB : Y\t\r\n\tZ  \r\n", " C \r\nD \t E\r\n\r\n\r\n"));
        assert_eq!(split_message("A: X\nB: Y\n\nbody\n"), ("A: X\nB: Y\n", "body\n"));
        assert_eq!(split_message("A: X\rB: Y\r\rbody"), ("A: X\rB: Y\r", "body"));
        assert_eq!(split_message("\r\nbody only"), ("", "body only"));
        assert_eq!(split_message("A: X\r\n"), ("A: X\r\n", ""));
        assert_eq!(split_message(""), ("", ""));
    }

    #[test]
    fn canonicalize_message_test() {
        assert_eq!(
            canonicalize_message(MAIL),
            CanonicalMessage {
                header: "a:X\r\nb:Y Z\r\n".to_string(),
                body: " C\r\nD E\r\n".to_string(),
            }
        );
        assert_eq!(
            canonicalize_message("Subject: no body"),
            CanonicalMessage {
                header: "subject:no body\r\n".to_string(),
                body: "\r\n".to_string(),
            }
        );
    }
}
