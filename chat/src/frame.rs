use std::borrow::Cow;

/// Type tag carried by chat text frames.
pub const CHAT_TAG: u64 = 4;

/// One application-level message: a type tag plus an opaque payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub tag: u64,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(tag: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }

    /// Build a chat text frame.
    pub fn chat(text: &str) -> Self {
        Self::new(CHAT_TAG, text)
    }

    pub fn is_chat(&self) -> bool {
        self.tag == CHAT_TAG
    }

    /// Payload decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_frame_has_chat_tag() {
        let frame = Frame::chat("hi");
        assert!(frame.is_chat());
        assert_eq!(frame.payload, b"hi");
        assert!(!Frame::new(7, "hi").is_chat());
    }

    #[test]
    fn text_tolerates_invalid_utf8() {
        let frame = Frame::new(CHAT_TAG, vec![b'o', b'k', 0xff]);
        assert_eq!(frame.text(), "ok\u{fffd}");
    }
}
