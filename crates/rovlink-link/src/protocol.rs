//! Line framing and handshake frames.
//!
//! Boards talk newline-terminated UTF-8 text. Every payload line is
//! `name:value`, where the first `:` is the delimiter. The identification
//! handshake is a fixed request frame answered by a line whose first field
//! contains `device_name`.

/// The newline byte that terminates every line.
pub const TERMINATOR: u8 = b'\n';

pub use rovlink_core::frames::{DEVICE_NAME_FIELD, HANDSHAKE_REQUEST, RESPONSE_CLOSE};

/// Result of attempting to decode one line from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete line was decoded.
    Line {
        /// The line text without the terminator or a trailing `\r`.
        line: String,
        /// Number of bytes consumed from the input buffer.
        consumed: usize,
    },

    /// A complete line was found but is not valid UTF-8.
    Invalid(usize),

    /// The buffer does not yet contain a complete line.
    Incomplete,
}

/// Decode one newline-terminated line from a byte buffer.
///
/// Returns the first complete line found, or [`DecodeResult::Incomplete`]
/// if no terminator is present yet.
pub fn decode_line(buf: &[u8]) -> DecodeResult {
    let term_pos = match buf.iter().position(|&b| b == TERMINATOR) {
        Some(pos) => pos,
        None => return DecodeResult::Incomplete,
    };

    let consumed = term_pos + 1;
    let mut body = &buf[..term_pos];
    if let [rest @ .., b'\r'] = body {
        body = rest;
    }

    match std::str::from_utf8(body) {
        Ok(s) => DecodeResult::Line {
            line: s.to_string(),
            consumed,
        },
        Err(_) => DecodeResult::Invalid(consumed),
    }
}

/// Split a line on its first `:` into `(name, value)`.
///
/// Returns `None` if there is no delimiter or the name is empty.
pub fn split_line(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}

/// Extract the declared device name from a handshake response line.
///
/// The first `:`-separated field must contain `device_name`; the second
/// field, with trailing `>` stripped, is the name. Returns `None` for any
/// other line, including a response with an empty name.
///
/// # Examples
///
/// ```
/// use rovlink_link::protocol::parse_handshake_response;
///
/// assert_eq!(parse_handshake_response("device_name:Teensy>"), Some("Teensy".into()));
/// assert_eq!(parse_handshake_response("<device_name:SensorArduino>"), Some("SensorArduino".into()));
/// assert_eq!(parse_handshake_response("depth:1.5"), None);
/// ```
pub fn parse_handshake_response(line: &str) -> Option<String> {
    let mut fields = line.trim().split(':');
    let first = fields.next()?;
    if !first.contains(DEVICE_NAME_FIELD) {
        return None;
    }
    let name = fields.next()?.trim().trim_end_matches(RESPONSE_CLOSE).trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // decode_line
    // -----------------------------------------------------------------------

    #[test]
    fn decode_empty_buffer() {
        assert_eq!(decode_line(b""), DecodeResult::Incomplete);
    }

    #[test]
    fn decode_no_terminator() {
        assert_eq!(decode_line(b"depth:1.5"), DecodeResult::Incomplete);
    }

    #[test]
    fn decode_simple_line() {
        assert_eq!(
            decode_line(b"depth:1.5\n"),
            DecodeResult::Line {
                line: "depth:1.5".into(),
                consumed: 10,
            }
        );
    }

    #[test]
    fn decode_strips_carriage_return() {
        assert_eq!(
            decode_line(b"roll:-2\r\n"),
            DecodeResult::Line {
                line: "roll:-2".into(),
                consumed: 9,
            }
        );
    }

    #[test]
    fn decode_multiple_in_buffer() {
        // Two complete lines; only the first is returned.
        assert_eq!(
            decode_line(b"a:1\nb:2\n"),
            DecodeResult::Line {
                line: "a:1".into(),
                consumed: 4,
            }
        );
    }

    #[test]
    fn decode_non_utf8_is_invalid() {
        assert_eq!(decode_line(&[0xFF, 0xFE, b'\n']), DecodeResult::Invalid(3));
    }

    // -----------------------------------------------------------------------
    // split_line
    // -----------------------------------------------------------------------

    #[test]
    fn split_on_first_colon_only() {
        assert_eq!(split_line("reset:a:b"), Some(("reset", "a:b")));
    }

    #[test]
    fn split_without_colon() {
        assert_eq!(split_line("no_colon_here"), None);
    }

    #[test]
    fn split_empty_name() {
        assert_eq!(split_line(":3.0"), None);
    }

    #[test]
    fn split_trims_whitespace() {
        assert_eq!(split_line(" depth : 4.0 "), Some(("depth", "4.0")));
    }

    // -----------------------------------------------------------------------
    // parse_handshake_response
    // -----------------------------------------------------------------------

    #[test]
    fn handshake_bracketed_response() {
        assert_eq!(
            parse_handshake_response("<device_name:StepperArduino>"),
            Some("StepperArduino".into())
        );
    }

    #[test]
    fn handshake_empty_name_rejected() {
        assert_eq!(parse_handshake_response("device_name:>"), None);
        assert_eq!(parse_handshake_response("device_name"), None);
    }

    #[test]
    fn handshake_other_lines_rejected() {
        assert_eq!(parse_handshake_response("IMU:ready"), None);
        assert_eq!(parse_handshake_response(""), None);
    }

    #[test]
    fn parses_the_frame_boards_send() {
        let frame = rovlink_core::frames::handshake_response("SensorArduino");
        assert_eq!(
            parse_handshake_response(&frame),
            Some("SensorArduino".into())
        );
    }
}
