//! A line-oriented [`Packet`] codec, for tests and debugging.
//!
//! Every packet takes exactly one line:
//!
//! - `open key=value key=value` is a stream header,
//! - `close` is the stream footer,
//! - `text <data>` is character data between elements,
//! - anything else is a single serialised element.
//!
//! Header values cannot contain spaces, and elements must fit on one line.

use std::fmt::Write;
use std::io;

use bytes::{BufMut, BytesMut};
use minidom::Element;
use tokio_util::codec::{Decoder, Encoder};

use crate::proto::Packet;

fn invalid<E: Into<Box<dyn std::error::Error + Send + Sync>>>(e: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// See the [module documentation](self).
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCodec;

impl LineCodec {
    /// Constructor
    pub fn new() -> LineCodec {
        LineCodec
    }
}

fn parse_line(line: &str) -> io::Result<Packet> {
    if line == "close" {
        return Ok(Packet::StreamEnd);
    }
    if let Some(data) = line.strip_prefix("text ") {
        return Ok(Packet::Text(data.to_owned()));
    }
    if let Some(attrs) = line.strip_prefix("open") {
        if attrs.is_empty() || attrs.starts_with(' ') {
            let attrs = attrs
                .split_whitespace()
                .map(|pair| {
                    pair.split_once('=')
                        .map(|(k, v)| (k.to_owned(), v.to_owned()))
                        .ok_or_else(|| invalid(format!("malformed attribute {:?}", pair)))
                })
                .collect::<io::Result<_>>()?;
            return Ok(Packet::StreamStart(attrs));
        }
    }
    line.parse::<Element>()
        .map(Packet::Stanza)
        .map_err(|e| invalid(e.to_string()))
}

impl Decoder for LineCodec {
    type Item = Packet;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Packet>, io::Error> {
        let Some(end) = buf.iter().position(|b| *b == b'\n') else {
            return Ok(None);
        };
        let line = buf.split_to(end + 1);
        let line = std::str::from_utf8(&line[..end]).map_err(invalid)?;
        parse_line(line.trim_end_matches('\r')).map(Some)
    }
}

impl Encoder<Packet> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), io::Error> {
        let line = match packet {
            Packet::StreamStart(attrs) => {
                let mut attrs: Vec<_> = attrs.into_iter().collect();
                attrs.sort();
                let mut line = String::from("open");
                for (key, value) in attrs {
                    write!(line, " {}={}", key, value).map_err(invalid)?;
                }
                line
            }
            Packet::Stanza(elem) => String::from(&elem),
            Packet::Text(data) => format!("text {}", data),
            Packet::StreamEnd => String::from("close"),
        };
        if line.contains('\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "packet does not fit on one line",
            ));
        }
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
