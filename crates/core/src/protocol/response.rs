use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// Width of the [`Framing::Header16`] length header.
pub const HEADER16_LEN: usize = 16;

/// How each response payload is delimited on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Payload bytes only.
    #[default]
    Raw,
    /// 16-byte ASCII decimal length, left aligned and space padded.
    Header16,
    /// 4-byte big-endian length.
    U32be,
}

impl Framing {
    /// Header bytes that precede a payload of `len` bytes.
    pub fn header(self, len: usize) -> io::Result<Vec<u8>> {
        match self {
            Framing::Raw => Ok(Vec::new()),
            Framing::Header16 => {
                let header = format!("{len:<HEADER16_LEN$}");
                if header.len() > HEADER16_LEN {
                    return Err(too_large(len));
                }
                Ok(header.into_bytes())
            }
            Framing::U32be => {
                let len = u32::try_from(len).map_err(|_| too_large(len))?;
                Ok(len.to_be_bytes().to_vec())
            }
        }
    }
}

impl std::str::FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Framing::Raw),
            "header16" => Ok(Framing::Header16),
            "u32be" => Ok(Framing::U32be),
            other => Err(format!(
                "unknown framing '{other}' (expected raw, header16 or u32be)"
            )),
        }
    }
}

fn too_large(len: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("payload of {len} bytes does not fit the length header"),
    )
}

/// Write one framed response and flush it.
///
/// An empty `payload` is still a complete response: nothing at all for
/// [`Framing::Raw`], a zero-length header otherwise.
pub fn write_response<W: Write>(
    writer: &mut W,
    framing: Framing,
    payload: &[u8],
) -> io::Result<()> {
    let header = framing.header(payload.len())?;
    if !header.is_empty() {
        writer.write_all(&header)?;
    }
    writer.write_all(payload)?;
    writer.flush()
}
