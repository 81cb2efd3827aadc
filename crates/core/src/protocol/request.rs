/// A client's "send me the current frame" message.
///
/// The bytes carry no meaning beyond their presence. What matters is
/// whether the read produced anything other than whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest {
    /// Number of bytes received for this request (including whitespace).
    pub len: usize,
}

impl FrameRequest {
    /// Interpret one read from the socket.
    ///
    /// Returns `None` when the bytes are empty or only ASCII whitespace,
    /// which the session treats as the client hanging up.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.trim_ascii().is_empty() {
            return None;
        }
        Some(FrameRequest { len: raw.len() })
    }
}
