//! Decoded URI representation
//!
//! Same layout as the encoded form, but `%HH` escapes are expanded, a
//! `+` in the query becomes a space, and the query carries a parallel
//! parameter table of `(name_offset, value_offset)` pairs plus one
//! sentinel entry marking the end of the region.

use crate::error::Result;

use super::{split_parts, EncodedUri, Part, UriBuf, Writer, PART_COUNT};

/// A parsed URI with all percent escapes expanded
pub struct DecodedUri {
    pub(crate) buf: UriBuf,
    /// `(name_offset, value_offset)` per parameter, sentinel last.
    /// A name spans `name_offset .. value_offset - 1`, its value runs
    /// to one byte before the next entry's name offset.
    params: Vec<(u16, u16)>,
}

impl DecodedUri {
    /// Parse an input URI and expand its escapes.
    ///
    /// The path is normalized after decoding; the query is split into
    /// parameters at `&` and `=`.
    pub fn parse(input: &[u8]) -> Result<Self> {
        match Self::parse_impl(input) {
            Ok(uri) => Ok(uri),
            Err(err) => {
                tracing::debug!(%err, "uri decode failed");
                Err(err)
            }
        }
    }

    /// Decode an already-encoded URI
    pub fn from_encoded(encoded: &EncodedUri) -> Result<Self> {
        Self::parse_impl(encoded.bytes())
    }

    fn parse_impl(input: &[u8]) -> Result<Self> {
        let raw = split_parts(input)?;

        let mut cap = 0usize;
        if let Some(s) = raw.scheme {
            cap += s.len() + 1;
        }
        if let Some(a) = raw.authority {
            cap += 2 + super::decoded_len(a);
        }
        // The path is normalized on its raw (still escaped) bytes so an
        // escaped dot stays data; size by the raw length
        cap += raw.path.len();
        if let Some(q) = raw.query {
            cap += 1 + super::decoded_len(q);
        }
        if let Some(f) = raw.fragment {
            cap += 1 + super::decoded_len(f);
        }

        let mut writer = Writer::with_capacity(cap)?;
        let mut offset = [0u16; PART_COUNT + 1];
        let mut params: Vec<(u16, u16)> = Vec::new();

        if let Some(s) = raw.scheme {
            writer.extend(s);
            writer.push(b':');
        }
        offset[Part::Authority as usize] = writer.pos() as u16;
        if let Some(a) = raw.authority {
            writer.extend(b"//");
            writer.decode(a, false);
        }
        offset[Part::Path as usize] = writer.pos() as u16;
        let path_start = writer.pos();
        writer.extend(raw.path);
        writer.normalize_tail(path_start);
        writer.decode_tail(path_start, false);
        offset[Part::Query as usize] = writer.pos() as u16;
        if let Some(q) = raw.query {
            writer.push(b'?');
            if !q.is_empty() {
                for (i, segment) in q.split(|b| *b == b'&').enumerate() {
                    if i > 0 {
                        writer.push(b'&');
                    }
                    let name_off = writer.pos() as u16;
                    let (name_raw, value_raw) = match segment.iter().position(|b| *b == b'=') {
                        Some(eq) => (&segment[..eq], Some(&segment[eq + 1..])),
                        None => (segment, None),
                    };
                    writer.decode(name_raw, true);
                    let value_off = match value_raw {
                        Some(v) => {
                            writer.push(b'=');
                            let off = writer.pos() as u16;
                            writer.decode(v, true);
                            off
                        }
                        // No '=': the value is empty, one past the name
                        None => (writer.pos() + 1) as u16,
                    };
                    params.push((name_off, value_off));
                }
            }
            // Sentinel: one past the end of the query region
            params.push(((writer.pos() + 1) as u16, (writer.pos() + 1) as u16));
        }
        offset[Part::Fragment as usize] = writer.pos() as u16;
        if let Some(f) = raw.fragment {
            writer.push(b'#');
            writer.decode(f, false);
        }
        offset[PART_COUNT] = writer.pos() as u16;

        Ok(Self {
            buf: writer.finish(offset),
            params,
        })
    }

    /// The full decoded URI
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        self.buf.bytes()
    }

    /// Total length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when the URI is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.len() == 0
    }

    /// Content of one part, without its prefix/suffix
    pub fn part(&self, part: Part) -> &[u8] {
        self.buf.part(part)
    }

    /// True if the URI carries a scheme
    pub fn is_absolute(&self) -> bool {
        self.buf.present(Part::Scheme)
    }

    /// Number of query parameters
    pub fn param_count(&self) -> usize {
        self.params.len().saturating_sub(1)
    }

    /// Decoded name and value of parameter `i`
    pub fn param(&self, i: usize) -> Option<(&[u8], &[u8])> {
        if i + 1 >= self.params.len() {
            return None;
        }
        let bytes = self.bytes();
        let (name_off, value_off) = self.params[i];
        let (next_name_off, _) = self.params[i + 1];

        let name_off = name_off as usize;
        let value_off = value_off as usize;
        let name_len = value_off.saturating_sub(name_off + 1);
        let value_len = (next_name_off as usize).saturating_sub(value_off + 1);

        let name_end = (name_off + name_len).min(bytes.len());
        let name = &bytes[name_off.min(bytes.len())..name_end];
        let value_end = (value_off + value_len).min(bytes.len());
        let value = &bytes[value_off.min(bytes.len())..value_end];
        Some((name, value))
    }

    /// Deep copy through the global allocator
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            buf: self.buf.try_clone()?,
            params: self.params.clone(),
        })
    }
}

impl std::fmt::Debug for DecodedUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DecodedUri({})", String::from_utf8_lossy(self.bytes()))
    }
}
