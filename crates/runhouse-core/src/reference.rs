//! Byte-Range References
//!
//! A [`BlobRef`] points at the exact bytes of one payload field inside a batch
//! blob. The index stores references, not payloads, as a single text token:
//!
//! ```text
//! s3://runs/batches/5d0c…e1.json#118:164/inputs
//! └┬─┘ └┬─┘ └──────────┬───────┘ └─┬─┘└┬┘ └─┬──┘
//! scheme container    key        start end field
//! ```
//!
//! The span is half-open (`[start, end)`) and measured against the blob bytes
//! exactly as uploaded, so a range read of that span returns the field's JSON
//! value and nothing else.
//!
//! ## Decoding
//!
//! [`BlobRef::decode`] is total: any malformed token yields `None`. Callers treat
//! `None` the same as an empty reference, which is the explicit "no payload"
//! marker.

use std::fmt;
use std::ops::Range;

/// URI scheme prefix for encoded references.
pub const REF_SCHEME: &str = "s3://";

/// A pointer to one payload field's bytes inside a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    /// Bucket holding the blob
    pub container: String,

    /// Object key of the blob within the bucket
    pub key: String,

    /// First byte of the field value (inclusive)
    pub start: u64,

    /// One past the last byte of the field value (exclusive)
    pub end: u64,

    /// Payload field name (`inputs`, `outputs`, `metadata`)
    pub field: String,
}

impl BlobRef {
    pub fn new(
        container: impl Into<String>,
        key: impl Into<String>,
        start: u64,
        end: u64,
        field: impl Into<String>,
    ) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
            start,
            end,
            field: field.into(),
        }
    }

    /// Encode into the single-token text form stored in the index.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode a stored reference.
    ///
    /// Returns `None` for the empty string and for any token that does not
    /// follow `s3://<container>/<key>#<start>:<end>/<field>`.
    pub fn decode(s: &str) -> Option<Self> {
        let rest = s.strip_prefix(REF_SCHEME)?;
        let (container, key_and_fragment) = rest.split_once('/')?;
        let (key, fragment) = key_and_fragment.rsplit_once('#')?;
        if container.is_empty() || key.is_empty() {
            return None;
        }

        let (offsets, field) = fragment.split_once('/')?;
        let (start, end) = offsets.split_once(':')?;
        let start = start.parse::<u64>().ok()?;
        let end = end.parse::<u64>().ok()?;

        Some(Self::new(container, key, start, end, field))
    }

    /// Byte range for a range read.
    pub fn range(&self) -> Range<u64> {
        self.start..self.end
    }

    /// Length of the referenced span in bytes (zero for inverted spans).
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// True when the span cannot contain a JSON value.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}/{}#{}:{}/{}",
            REF_SCHEME, self.container, self.key, self.start, self.end, self.field
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_format() {
        let r = BlobRef::new("runs", "batches/abc.json", 10, 42, "inputs");
        assert_eq!(r.encode(), "s3://runs/batches/abc.json#10:42/inputs");
    }

    #[test]
    fn test_decode_encoded_reference() {
        let r = BlobRef::new("runs", "batches/abc.json", 118, 164, "metadata");
        let decoded = BlobRef::decode(&r.encode()).unwrap();
        assert_eq!(decoded, r);
        assert_eq!(decoded.range(), 118..164);
        assert_eq!(decoded.len(), 46);
    }

    #[test]
    fn test_decode_key_with_nested_path() {
        let decoded = BlobRef::decode("s3://bucket/a/b/c.json#0:2/outputs").unwrap();
        assert_eq!(decoded.container, "bucket");
        assert_eq!(decoded.key, "a/b/c.json");
        assert_eq!(decoded.field, "outputs");
    }

    #[test]
    fn test_empty_string_is_no_payload() {
        assert!(BlobRef::decode("").is_none());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let bad = [
            "runs/batches/abc.json#0:2/inputs",   // missing scheme
            "gs://runs/batches/abc.json#0:2/inputs",
            "s3://runs",                          // missing key
            "s3:///batches/abc.json#0:2/inputs",  // empty container
            "s3://runs/#0:2/inputs",              // empty key
            "s3://runs/batches/abc.json",         // missing fragment
            "s3://runs/batches/abc.json#0:2",     // missing field delimiter
            "s3://runs/batches/abc.json#02/inputs",
            "s3://runs/batches/abc.json#a:2/inputs",
            "s3://runs/batches/abc.json#0:-2/inputs",
        ];
        for s in bad {
            assert!(BlobRef::decode(s).is_none(), "expected decode failure for {s}");
        }
    }

    #[test]
    fn test_inverted_span_is_empty() {
        let r = BlobRef::new("runs", "k", 9, 3, "inputs");
        assert!(r.is_empty());
        assert_eq!(r.len(), 0);

        let r = BlobRef::new("runs", "k", 3, 5, "inputs");
        assert!(!r.is_empty());
    }
}
