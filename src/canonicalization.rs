use nom::{bytes::complete::take_till, character::complete::char, sequence::terminated, IResult};
use std::fmt;

const CRLF: &str = "\r\n";

fn is_wsp(character: char) -> bool {
    character == ' ' || character == '\t'
}

/// A header field after relaxed canonicalization.
/// Displays as `name:value`, the exact line that gets hashed (without its CRLF).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalField {
    pub name: String,
    pub value: String,
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.value)
    }
}

/// Replace literal `\r\n` and `\n` escape sequences by CRLF, and a literal `\t` by a space.
///
/// Header blocks sent as a single JSON string often arrive with their line breaks escaped twice.
/// This is not part of RFC 6376; [canonicalize_header_block] does not apply it.
pub fn unescape_line_breaks(raw: &str) -> String {
    raw.replace("\\r\\n", CRLF)
        .replace("\\n", CRLF)
        .replace("\\t", " ")
}

// Every CRLF, lone CR and lone LF becomes one CRLF.
fn normalize_line_endings(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len() + 2);
    let mut characters = text.chars().peekable();
    while let Some(character) = characters.next() {
        match character {
            '\r' => {
                characters.next_if_eq(&'\n');
                normalized.push_str(CRLF);
            }
            '\n' => normalized.push_str(CRLF),
            character => normalized.push(character),
        }
    }
    normalized
}

// Replace each CRLF followed by WSP (a folded continuation) by a single space.
fn unfold(text: &str) -> String {
    let mut unfolded = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find(CRLF) {
        unfolded.push_str(&rest[..idx]);
        let after = &rest[idx + CRLF.len()..];
        let continuation = after.trim_start_matches(is_wsp);
        if continuation.len() < after.len() {
            unfolded.push(' ');
        } else {
            unfolded.push_str(CRLF);
        }
        rest = continuation;
    }
    unfolded.push_str(rest);
    unfolded
}

// Reduce every run of WSP to a single SP character.
fn collapse_wsp(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut previous = false;
    for character in text.chars() {
        if is_wsp(character) {
            if !previous {
                collapsed.push(' ');
            }
            previous = true;
        } else {
            collapsed.push(character);
            previous = false;
        }
    }
    collapsed
}

// Split on CRLF, lone CR or lone LF. A break at the very end does not open a new line.
fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\r' => {
                lines.push(&text[start..idx]);
                if bytes.get(idx + 1) == Some(&b'\n') {
                    idx += 1;
                }
                start = idx + 1;
            }
            b'\n' => {
                lines.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => (),
        }
        idx += 1;
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

fn field_name(line: &str) -> IResult<&str, &str> {
    terminated(take_till(|c| c == ':'), char(':'))(line)
}

fn join_fields<'a>(fields: impl IntoIterator<Item = &'a CanonicalField>) -> String {
    let mut canonicalized = String::new();
    for field in fields {
        canonicalized.push_str(&field.to_string());
        canonicalized.push_str(CRLF);
    }
    if canonicalized.is_empty() {
        canonicalized.push_str(CRLF);
    }
    canonicalized
}

/// Canonicalize a header value using the relaxed canonicalization algorithm.
///
/// The value **must** already be unfolded.
pub fn canonicalize_header_value(value: &str) -> String {
    collapse_wsp(value).trim_matches(' ').to_string()
}

/// Canonicalize a single unfolded header line.
///
/// Returns `None` when the line has no colon: such a line is not a header field and gets dropped.
pub fn canonicalize_field(line: &str) -> Option<CanonicalField> {
    let (value, name) = match field_name(line) {
        Ok(parsed) => parsed,
        Err(_) => {
            tracing::trace!(line, "dropping header line without a colon");
            return None;
        }
    };

    Some(CanonicalField {
        name: name.trim_matches(is_wsp).to_lowercase(),
        value: canonicalize_header_value(value),
    })
}

/// Canonicalize every field of a header block, in order of appearance.
/// Duplicated names are kept as distinct fields.
pub fn canonicalize_fields(raw: &str) -> Vec<CanonicalField> {
    unfold(&normalize_line_endings(raw))
        .split(CRLF)
        .filter(|line| !line.is_empty())
        .filter_map(canonicalize_field)
        .collect()
}

/// Canonicalize a header block using the relaxed canonicalization algorithm, without unescaping.
///
/// See https://tools.ietf.org/html/rfc6376#section-3.4.2 for implementation details
pub fn canonicalize_header_block(raw: &str) -> String {
    join_fields(&canonicalize_fields(raw))
}

/// Canonicalize a raw header block using the relaxed canonicalization algorithm.
///
/// Escaped line breaks are restored first (see [unescape_line_breaks]).
/// The output has one `name:value\r\n` line per field and is never empty: a block without any field gives `"\r\n"`.
pub fn canonicalize_header(raw: &str) -> String {
    canonicalize_header_block(&unescape_line_breaks(raw))
}

/// Canonicalize only the header fields listed in `signed_headers` (the `h=` tag of a DKIM signature), in that order.
///
/// Names are compared case-insensitively. When a name appears several times in `signed_headers`,
/// instances are consumed from the bottom of the block upward (RFC 6376 §5.4.2).
/// Names with no remaining instance are skipped.
pub fn canonicalize_signed_headers<S: AsRef<str>>(raw: &str, signed_headers: &[S]) -> String {
    let fields = canonicalize_fields(&unescape_line_breaks(raw));
    let mut already_used = vec![false; fields.len()];
    let mut selected = Vec::new();

    for signed_header in signed_headers {
        let signed_header = signed_header.as_ref().trim_matches(is_wsp);
        let found = (0..fields.len())
            .rev()
            .find(|&idx| !already_used[idx] && unicase::eq_ascii(fields[idx].name.as_str(), signed_header));
        if let Some(idx) = found {
            already_used[idx] = true;
            selected.push(&fields[idx]);
        }
    }

    join_fields(selected)
}

/// Canonicalize body using the relaxed canonicalization algorithm.
///
/// An empty body (or one made only of blank lines) is canonicalized as a single `"\r\n"`.
pub fn canonicalize_body(raw: &str) -> String {
    // See https://tools.ietf.org/html/rfc6376#section-3.4.4 for implementation details

    // Ignore all whitespace at the end of lines, then reduce all sequences of WSP within a line to a single SP character.
    let mut lines: Vec<String> = split_lines(raw)
        .into_iter()
        .map(|line| collapse_wsp(line.trim_end_matches(is_wsp)))
        .collect();

    // Ignore all empty lines at the end of the message body.
    while lines.last().map_or(false, |line| line.is_empty()) {
        lines.pop();
    }

    if lines.is_empty() {
        return CRLF.to_string();
    }

    let mut body = lines.join(CRLF);
    body.push_str(CRLF);
    body
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEADERS: &str = "A: X\r\nB : Y\t\r\n\tZ  \r\n";
    const BODY: &str = " C \r\nD \t E\r\n\r\n\r\n";

    #[test]
    fn canonicalize_header_test() {
        assert_eq!(canonicalize_header(HEADERS), "a:X\r\nb:Y Z\r\n");
        assert_eq!(
            canonicalize_header("Subject:   Hello\r\n World  \r\nFrom: a@b.com\r\n"),
            "subject:Hello World\r\nfrom:a@b.com\r\n"
        );
    }

    #[test]
    fn canonicalize_body_test() {
        assert_eq!(canonicalize_body(BODY), " C\r\nD E\r\n");
        assert_eq!(canonicalize_body("a  b \t\r\nc\r\n\r\n\r\n"), "a b\r\nc\r\n");
        assert_eq!(canonicalize_body("no terminator"), "no terminator\r\n");
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(canonicalize_header(""), "\r\n");
        assert_eq!(canonicalize_header("\r\n\r\n"), "\r\n");
        assert_eq!(canonicalize_body(""), "\r\n");
        assert_eq!(canonicalize_body("\r\n\r\n \t\r\n\n"), "\r\n");
    }

    #[test]
    fn malformed_lines_are_dropped() {
        assert_eq!(canonicalize_header("NoColonHere\r\nX: 1\r\n"), "x:1\r\n");
        assert_eq!(canonicalize_header("only\r\ngarbage"), "\r\n");
        assert_eq!(canonicalize_field("NoColonHere"), None);
    }

    #[test]
    fn first_colon_splits() {
        assert_eq!(
            canonicalize_field("  Date : Mon, 1 Jan 2024 10:00:00 +0000 "),
            Some(CanonicalField {
                name: "date".to_string(),
                value: "Mon, 1 Jan 2024 10:00:00 +0000".to_string(),
            })
        );
        assert_eq!(canonicalize_header(":\r\n"), ":\r\n");
    }

    #[test]
    fn escaped_line_breaks() {
        let real = "Subject: Hello\r\n\tWorld\r\nTo: b@c.org\r\n";
        assert_eq!(
            canonicalize_header("Subject: Hello\\r\\n\\tWorld\\r\\nTo: b@c.org\\r\\n"),
            canonicalize_header(real)
        );
        assert_eq!(
            canonicalize_header("Subject: Hello\\n World\\nTo: b@c.org"),
            canonicalize_header(real)
        );
        assert_eq!(unescape_line_breaks("a\\r\\nb\\nc\\td"), "a\r\nb\r\nc d");
        // An unterminated escape is ordinary text.
        assert_eq!(canonicalize_header("X-Path: C:\\r"), "x-path:C:\\r\r\n");
    }

    #[test]
    fn escaped_tab_in_name() {
        assert_eq!(canonicalize_header("X\\tY: v"), "x y:v\r\n");
        assert!(!canonicalize_header("X\\tY:\\t a\\t\\tb\r\n").contains('\t'));
    }

    #[test]
    fn only_wsp_is_trimmed() {
        assert_eq!(canonicalize_header("X:\u{a0}v\u{a0}"), "x:\u{a0}v\u{a0}\r\n");
        assert_eq!(canonicalize_header("\u{b}Y\u{c}: w"), "\u{b}y\u{c}:w\r\n");
        assert_eq!(canonicalize_body("a\u{a0} \r\n"), "a\u{a0}\r\n");
    }

    #[test]
    fn header_block_does_not_unescape() {
        assert_eq!(canonicalize_header_block("A: 1\\nB: 2"), "a:1\\nB: 2\r\n");
    }

    #[test]
    fn line_ending_equivalence() {
        let crlf = canonicalize_header("From: a@b.com\r\nSubject: Hi\r\n  there\r\n");
        assert_eq!(canonicalize_header("From: a@b.com\nSubject: Hi\n  there\n"), crlf);
        assert_eq!(canonicalize_header("From: a@b.com\rSubject: Hi\r  there\r"), crlf);

        let crlf = canonicalize_body("line  one\r\n\r\nline\ttwo \r\n\r\n");
        assert_eq!(canonicalize_body("line  one\n\nline\ttwo \n\n"), crlf);
        assert_eq!(canonicalize_body("line  one\r\rline\ttwo \r\r"), crlf);
        assert_eq!(crlf, "line one\r\n\r\nline two\r\n");
    }

    #[test]
    fn idempotence() {
        let header = canonicalize_header("Subject:   Hello\r\n World  \r\nFrom: a@b.com\r\nfrom: c@d.org\r\n");
        assert_eq!(canonicalize_header(&header), header);

        let body = canonicalize_body(" a  b\t\r\n\r\nc \r\n\r\n");
        assert_eq!(canonicalize_body(&body), body);
        assert_eq!(canonicalize_body("\r\n"), "\r\n");
    }

    #[test]
    fn canonical_output_shape() {
        let header = canonicalize_header("X-MiXeD:\t a \t\t b  \r\nREPLY-TO:  x  \r\n\tY\r");
        assert_eq!(header, "x-mixed:a b\r\nreply-to:x Y\r\n");
        for line in header.split_terminator("\r\n") {
            let (name, value) = line.split_at(line.find(':').unwrap());
            assert!(!name.chars().any(|c| c.is_uppercase()));
            assert!(!value.contains("  ") && !value.contains('\t'));
            assert!(!value[1..].starts_with(' ') && !value.ends_with(' '));
            assert!(!line.contains('\r') && !line.contains('\n'));
        }
    }

    #[test]
    fn duplicates_keep_their_order() {
        assert_eq!(
            canonicalize_header("Received: one\r\nX: 1\r\nReceived: two\r\n"),
            "received:one\r\nx:1\r\nreceived:two\r\n"
        );
    }

    #[test]
    fn canonicalize_signed_headers_test() {
        const BLOCK: &str = "A: X\r\nB : Y\t\r\n\tZ  \r\nA: second\r\n";
        assert_eq!(canonicalize_signed_headers(BLOCK, &["a", "b"]), "a:second\r\nb:Y Z\r\n");
        assert_eq!(canonicalize_signed_headers(BLOCK, &["B", "a", "A"]), "b:Y Z\r\na:second\r\na:X\r\n");
        assert_eq!(canonicalize_signed_headers(BLOCK, &["a", "a", "a"]), "a:second\r\na:X\r\n");
        assert_eq!(canonicalize_signed_headers(BLOCK, &["missing"]), "\r\n");
        assert_eq!(
            canonicalize_signed_headers(BLOCK, &[" b ".to_string()]),
            "b:Y Z\r\n"
        );
    }
}
