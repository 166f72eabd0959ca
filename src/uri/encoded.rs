//! Wire-form URI representation
//!
//! An `EncodedUri` holds the URI as it would be transmitted: reserved
//! bytes percent-encoded per part, spaces in the query as `+`, and the
//! path normalized. Parsing is idempotent — feeding the bytes of an
//! `EncodedUri` back through `parse` reproduces them.

use crate::error::{QuadixError, Result};
use crate::trie::ByteKeyed;

use super::{split_parts, DecodedUri, EncodeRule, Part, UriBuf, Writer, PART_COUNT};

/// A parsed, normalized, percent-encoded URI
pub struct EncodedUri {
    pub(crate) buf: UriBuf,
}

impl EncodedUri {
    /// Parse and normalize an input URI.
    ///
    /// Valid `%HH` escapes in the input pass through unchanged; bytes
    /// outside a part's allowed set are encoded; the path is
    /// normalized in place.
    pub fn parse(input: &[u8]) -> Result<Self> {
        match Self::parse_impl(input) {
            Ok(uri) => Ok(uri),
            Err(err) => {
                tracing::debug!(%err, "uri parse failed");
                Err(err)
            }
        }
    }

    fn parse_impl(input: &[u8]) -> Result<Self> {
        let raw = split_parts(input)?;

        let mut cap = 0usize;
        if let Some(s) = raw.scheme {
            cap += s.len() + 1;
        }
        if let Some(a) = raw.authority {
            cap += 2 + super::encoded_len(a, EncodeRule::reparse(Part::Authority));
        }
        cap += super::encoded_len(raw.path, EncodeRule::reparse(Part::Path));
        if let Some(q) = raw.query {
            cap += 1 + super::encoded_len(q, EncodeRule::reparse(Part::Query));
        }
        if let Some(f) = raw.fragment {
            cap += 1 + super::encoded_len(f, EncodeRule::reparse(Part::Fragment));
        }

        let mut writer = Writer::with_capacity(cap)?;
        let mut offset = [0u16; PART_COUNT + 1];

        if let Some(s) = raw.scheme {
            writer.extend(s);
            writer.push(b':');
        }
        offset[Part::Authority as usize] = writer.pos() as u16;
        if let Some(a) = raw.authority {
            writer.extend(b"//");
            writer.encode(a, EncodeRule::reparse(Part::Authority));
        }
        offset[Part::Path as usize] = writer.pos() as u16;
        let path_start = writer.pos();
        writer.encode(raw.path, EncodeRule::reparse(Part::Path));
        writer.normalize_tail(path_start);
        offset[Part::Query as usize] = writer.pos() as u16;
        if let Some(q) = raw.query {
            writer.push(b'?');
            writer.encode(q, EncodeRule::reparse(Part::Query));
        }
        offset[Part::Fragment as usize] = writer.pos() as u16;
        if let Some(f) = raw.fragment {
            writer.push(b'#');
            writer.encode(f, EncodeRule::reparse(Part::Fragment));
        }
        offset[PART_COUNT] = writer.pos() as u16;

        Ok(Self {
            buf: writer.finish(offset),
        })
    }

    /// Compose a URI from raw (unencoded) components.
    ///
    /// Each parameter becomes `name=value` in the query; an empty
    /// `params` slice produces no query part. The path is normalized
    /// after encoding.
    pub fn build(
        scheme: Option<&str>,
        authority: Option<&[u8]>,
        path: Option<&[u8]>,
        params: &[(&[u8], &[u8])],
        fragment: Option<&[u8]>,
    ) -> Result<Self> {
        let result = Self::build_impl(scheme, authority, path, params, fragment);
        if let Err(err) = &result {
            tracing::debug!(%err, "uri build failed");
        }
        result
    }

    fn build_impl(
        scheme: Option<&str>,
        authority: Option<&[u8]>,
        path: Option<&[u8]>,
        params: &[(&[u8], &[u8])],
        fragment: Option<&[u8]>,
    ) -> Result<Self> {
        if let Some(s) = scheme {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_alphabetic()) {
                return Err(QuadixError::invalid_argument(
                    "uri scheme must be one or more letters",
                ));
            }
        }
        let path = path.unwrap_or(b"");
        if authority.is_some() && !path.is_empty() && path[0] != b'/' {
            return Err(QuadixError::invalid_argument(
                "path must be absolute when an authority is present",
            ));
        }

        let params = (!params.is_empty()).then_some(params);
        Self::compose(scheme.map(str::as_bytes), authority, path, params, fragment)
    }

    /// Re-encode a decoded URI
    pub fn from_decoded(decoded: &DecodedUri) -> Result<Self> {
        let params: Vec<(&[u8], &[u8])> = (0..decoded.param_count())
            .map(|i| decoded.param(i).expect("index below param_count"))
            .collect();
        Self::compose(
            decoded.buf.part_opt(Part::Scheme),
            decoded.buf.part_opt(Part::Authority),
            decoded.buf.part(Part::Path),
            decoded.buf.present(Part::Query).then_some(params.as_slice()),
            decoded.buf.part_opt(Part::Fragment),
        )
    }

    /// Shared component encoder behind `build` and `from_decoded`
    fn compose(
        scheme: Option<&[u8]>,
        authority: Option<&[u8]>,
        path: &[u8],
        params: Option<&[(&[u8], &[u8])]>,
        fragment: Option<&[u8]>,
    ) -> Result<Self> {
        let mut cap = 0usize;
        if let Some(s) = scheme {
            cap += s.len() + 1;
        }
        if let Some(a) = authority {
            cap += 2 + super::encoded_len(a, EncodeRule::component(Part::Authority));
        }
        cap += super::encoded_len(path, EncodeRule::component(Part::Path));
        if let Some(pairs) = params {
            cap += 1;
            for (i, (name, value)) in pairs.iter().enumerate() {
                if i > 0 {
                    cap += 1;
                }
                cap += super::encoded_len(name, EncodeRule::component(Part::Query));
                cap += 1 + super::encoded_len(value, EncodeRule::component(Part::Query));
            }
        }
        if let Some(f) = fragment {
            cap += 1 + super::encoded_len(f, EncodeRule::component(Part::Fragment));
        }

        let mut writer = Writer::with_capacity(cap)?;
        let mut offset = [0u16; PART_COUNT + 1];

        if let Some(s) = scheme {
            writer.extend(s);
            writer.push(b':');
        }
        offset[Part::Authority as usize] = writer.pos() as u16;
        if let Some(a) = authority {
            writer.extend(b"//");
            writer.encode(a, EncodeRule::component(Part::Authority));
        }
        offset[Part::Path as usize] = writer.pos() as u16;
        let path_start = writer.pos();
        writer.encode(path, EncodeRule::component(Part::Path));
        writer.normalize_tail(path_start);
        offset[Part::Query as usize] = writer.pos() as u16;
        if let Some(pairs) = params {
            writer.push(b'?');
            for (i, (name, value)) in pairs.iter().enumerate() {
                if i > 0 {
                    writer.push(b'&');
                }
                writer.encode(name, EncodeRule::component(Part::Query));
                writer.push(b'=');
                writer.encode(value, EncodeRule::component(Part::Query));
            }
        }
        offset[Part::Fragment as usize] = writer.pos() as u16;
        if let Some(f) = fragment {
            writer.push(b'#');
            writer.encode(f, EncodeRule::component(Part::Fragment));
        }
        offset[PART_COUNT] = writer.pos() as u16;

        Ok(Self {
            buf: writer.finish(offset),
        })
    }

    /// Splice already-encoded part slices into a fresh URI; used by
    /// reference resolution, where every input is in wire form.
    fn splice(
        scheme: Option<&[u8]>,
        authority: Option<&[u8]>,
        path_head: &[u8],
        path_tail: &[u8],
        normalize: bool,
        query: Option<&[u8]>,
        fragment: Option<&[u8]>,
    ) -> Result<Self> {
        let mut cap = 0usize;
        if let Some(s) = scheme {
            cap += s.len() + 1;
        }
        if let Some(a) = authority {
            cap += 2 + a.len();
        }
        cap += path_head.len() + path_tail.len();
        if let Some(q) = query {
            cap += 1 + q.len();
        }
        if let Some(f) = fragment {
            cap += 1 + f.len();
        }

        let mut writer = Writer::with_capacity(cap)?;
        let mut offset = [0u16; PART_COUNT + 1];

        if let Some(s) = scheme {
            writer.extend(s);
            writer.push(b':');
        }
        offset[Part::Authority as usize] = writer.pos() as u16;
        if let Some(a) = authority {
            writer.extend(b"//");
            writer.extend(a);
        }
        offset[Part::Path as usize] = writer.pos() as u16;
        let path_start = writer.pos();
        writer.extend(path_head);
        writer.extend(path_tail);
        if normalize {
            writer.normalize_tail(path_start);
        }
        offset[Part::Query as usize] = writer.pos() as u16;
        if let Some(q) = query {
            writer.push(b'?');
            writer.extend(q);
        }
        offset[Part::Fragment as usize] = writer.pos() as u16;
        if let Some(f) = fragment {
            writer.push(b'#');
            writer.extend(f);
        }
        offset[PART_COUNT] = writer.pos() as u16;

        Ok(Self {
            buf: writer.finish(offset),
        })
    }

    /// Resolve `rel` against the absolute `base` and return the target
    /// URI (RFC 3986 reference resolution, with merged-path handling).
    pub fn resolve(base: &EncodedUri, rel: &EncodedUri) -> Result<EncodedUri> {
        if rel.is_absolute() {
            return rel.try_clone();
        }

        let scheme = base.buf.part_opt(Part::Scheme);
        if rel.buf.present(Part::Authority) {
            return Self::splice(
                scheme,
                rel.buf.part_opt(Part::Authority),
                rel.buf.part(Part::Path),
                b"",
                false,
                rel.buf.part_opt(Part::Query),
                rel.buf.part_opt(Part::Fragment),
            );
        }

        let authority = base.buf.part_opt(Part::Authority);
        let rel_path = rel.buf.part(Part::Path);
        if rel_path.is_empty() {
            let query = rel
                .buf
                .part_opt(Part::Query)
                .or_else(|| base.buf.part_opt(Part::Query));
            return Self::splice(
                scheme,
                authority,
                base.buf.part(Part::Path),
                b"",
                false,
                query,
                rel.buf.part_opt(Part::Fragment),
            );
        }

        if rel_path[0] == b'/' {
            return Self::splice(
                scheme,
                authority,
                rel_path,
                b"",
                true,
                rel.buf.part_opt(Part::Query),
                rel.buf.part_opt(Part::Fragment),
            );
        }

        // Merged path: base path up to its last '/', or just '/' when
        // the base has an authority and an empty path
        let base_path = base.buf.part(Part::Path);
        let head: &[u8] = if authority.is_some() && base_path.is_empty() {
            b"/"
        } else {
            match base_path.iter().rposition(|b| *b == b'/') {
                Some(i) => &base_path[..=i],
                None => b"",
            }
        };
        Self::splice(
            scheme,
            authority,
            head,
            rel_path,
            true,
            rel.buf.part_opt(Part::Query),
            rel.buf.part_opt(Part::Fragment),
        )
    }

    /// The full encoded URI
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

    /// Content of one part, without its prefix/suffix; empty when the
    /// part is absent.
    pub fn part(&self, part: Part) -> &[u8] {
        self.buf.part(part)
    }

    /// True if the URI carries a scheme
    pub fn is_absolute(&self) -> bool {
        self.buf.present(Part::Scheme)
    }

    /// Scheme content, when present
    pub fn scheme(&self) -> Option<&[u8]> {
        self.buf.part_opt(Part::Scheme)
    }

    /// Authority content, when present
    pub fn authority(&self) -> Option<&[u8]> {
        self.buf.part_opt(Part::Authority)
    }

    /// Path content (possibly empty)
    pub fn path(&self) -> &[u8] {
        self.buf.part(Part::Path)
    }

    /// Query content, when present
    pub fn query(&self) -> Option<&[u8]> {
        self.buf.part_opt(Part::Query)
    }

    /// Fragment content, when present
    pub fn fragment(&self) -> Option<&[u8]> {
        self.buf.part_opt(Part::Fragment)
    }

    /// Deep copy through the global allocator
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            buf: self.buf.try_clone()?,
        })
    }
}

impl std::fmt::Debug for EncodedUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncodedUri({})", String::from_utf8_lossy(self.bytes()))
    }
}

impl PartialEq for EncodedUri {
    fn eq(&self, other: &Self) -> bool {
        self.bytes() == other.bytes()
    }
}

impl Eq for EncodedUri {}

/// An encoded URI keys a `StrTrie` by its full byte form; the bytes
/// live in the URI's own heap buffer and stay put while the URI does.
impl ByteKeyed for EncodedUri {
    fn key(&self) -> &[u8] {
        self.bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(input: &str) -> EncodedUri {
        EncodedUri::parse(input.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_splits_and_keeps_wire_form() {
        let uri = parsed("http://www.de/Path/file?X#Y");
        assert_eq!(uri.bytes(), b"http://www.de/Path/file?X#Y");
        assert_eq!(uri.scheme(), Some(b"http".as_slice()));
        assert_eq!(uri.authority(), Some(b"www.de".as_slice()));
        assert_eq!(uri.path(), b"/Path/file");
        assert_eq!(uri.query(), Some(b"X".as_slice()));
        assert_eq!(uri.fragment(), Some(b"Y".as_slice()));
        assert!(uri.is_absolute());
    }

    #[test]
    fn test_parse_normalizes_path() {
        let uri = parsed("//.//1//2//3//.//./.");
        assert_eq!(uri.authority(), Some(b".".as_slice()));
        assert_eq!(uri.path(), b"/1/2/3/");
        assert!(!uri.is_absolute());
    }

    #[test]
    fn test_parse_encodes_reserved_bytes() {
        let uri = parsed("/a b");
        assert_eq!(uri.bytes(), b"/a%20b");

        // ':' is reserved in the path, spaces in the query become '+'
        let uri = parsed("x/a:b?k v");
        assert_eq!(uri.bytes(), b"x/a%3Ab?k+v");

        // An existing valid escape passes through; a bare '%' does not
        let uri = parsed("/ok%41?p%ZZq");
        assert_eq!(uri.bytes(), b"/ok%41?p%25ZZq");
    }

    #[test]
    fn test_parse_is_idempotent() {
        for input in [
            "http://www.de/Path/file?X#Y",
            "/a b/c d",
            "x?a=1&b=2 3",
            "//host/%41%zz",
            "s://h/p;x?q+#f",
            "../rel/./path",
        ] {
            let once = EncodedUri::parse(input.as_bytes()).unwrap();
            let twice = EncodedUri::parse(once.bytes()).unwrap();
            assert_eq!(once.bytes(), twice.bytes(), "input {input}");
        }
    }

    #[test]
    fn test_parse_query_keeps_separators() {
        let uri = parsed("p?a=1&b=+2");
        assert_eq!(uri.query(), Some(b"a=1&b=%2B2".as_slice()));
    }

    #[test]
    fn test_build_basic() {
        let uri = EncodedUri::build(
            Some("http"),
            Some(b"www.example.de"),
            Some(b"/a path/x"),
            &[(b"name", b"a value"), (b"k", b"v")],
            Some(b"frag"),
        )
        .unwrap();
        assert_eq!(
            uri.bytes(),
            b"http://www.example.de/a%20path/x?name=a+value&k=v#frag"
        );
    }

    #[test]
    fn test_build_rejects_bad_inputs() {
        let err = EncodedUri::build(Some("h2tp"), None, Some(b"/x"), &[], None).unwrap_err();
        assert!(matches!(err, QuadixError::InvalidArgument { .. }));

        let err =
            EncodedUri::build(Some("http"), Some(b"host"), Some(b"rel"), &[], None).unwrap_err();
        assert!(matches!(err, QuadixError::InvalidArgument { .. }));

        // Empty path with authority is fine
        assert!(EncodedUri::build(Some("http"), Some(b"host"), None, &[], None).is_ok());
    }

    #[test]
    fn test_build_normalizes_path() {
        let uri = EncodedUri::build(None, None, Some(b"/a/b/../c/./d"), &[], None).unwrap();
        assert_eq!(uri.bytes(), b"/a/c/d");
    }

    #[test]
    fn test_resolve_parent_reference() {
        let base = parsed("http://www.de/Path/file?X#Y");
        let rel = parsed("../x.html");
        let target = EncodedUri::resolve(&base, &rel).unwrap();
        assert_eq!(target.bytes(), b"http://www.de/x.html");
    }

    #[test]
    fn test_resolve_cases() {
        let base = parsed("http://h/a/b?q");

        // Absolute reference wins outright
        let rel = parsed("ftp://other/z");
        assert_eq!(
            EncodedUri::resolve(&base, &rel).unwrap().bytes(),
            b"ftp://other/z"
        );

        // Network-path reference replaces the authority
        let rel = parsed("//n/p");
        assert_eq!(
            EncodedUri::resolve(&base, &rel).unwrap().bytes(),
            b"http://n/p"
        );

        // Absolute path replaces the base path
        let rel = parsed("/root");
        assert_eq!(
            EncodedUri::resolve(&base, &rel).unwrap().bytes(),
            b"http://h/root"
        );

        // Empty reference keeps path and query of the base
        let rel = parsed("");
        assert_eq!(
            EncodedUri::resolve(&base, &rel).unwrap().bytes(),
            b"http://h/a/b?q"
        );

        // Query-only reference keeps the base path
        let rel = parsed("?n=1");
        assert_eq!(
            EncodedUri::resolve(&base, &rel).unwrap().bytes(),
            b"http://h/a/b?n=1"
        );

        // Sibling file
        let rel = parsed("c");
        assert_eq!(
            EncodedUri::resolve(&base, &rel).unwrap().bytes(),
            b"http://h/a/c"
        );
    }

    #[test]
    fn test_try_clone_is_deep_and_equal() {
        let uri = parsed("http://h/p?q#f");
        let copy = uri.try_clone().unwrap();
        assert_eq!(uri, copy);
        assert_ne!(uri.bytes().as_ptr(), copy.bytes().as_ptr());
    }

    #[test]
    fn test_part_accessors_absent_parts() {
        let uri = parsed("just/a/path");
        assert_eq!(uri.scheme(), None);
        assert_eq!(uri.authority(), None);
        assert_eq!(uri.query(), None);
        assert_eq!(uri.fragment(), None);
        assert_eq!(uri.part(Part::Query), b"");
        assert_eq!(uri.path(), b"just/a/path");
    }
}
