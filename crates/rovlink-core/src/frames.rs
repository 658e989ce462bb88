//! Fixed frames of the identification handshake.
//!
//! Shared by the handshake in `rovlink-link` and the simulated boards in
//! `rovlink-test-harness`.

/// Identification request sent to every candidate port.
pub const HANDSHAKE_REQUEST: &[u8] = b"<request_name:0>";

/// Marker that identifies a handshake response in the first field.
pub const DEVICE_NAME_FIELD: &str = "device_name";

/// Closing byte of a handshake response's name field.
pub const RESPONSE_CLOSE: char = '>';

/// The response line a board named `name` sends, without its terminator.
pub fn handshake_response(name: &str) -> String {
    format!("{DEVICE_NAME_FIELD}:{name}{RESPONSE_CLOSE}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_frame_shape() {
        assert_eq!(handshake_response("Teensy"), "device_name:Teensy>");
    }
}
