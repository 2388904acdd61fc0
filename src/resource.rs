// The archive data model (§3).
//
// `Archive` is produced in one pass by the parser and is read-only
// thereafter; `Resource` is an immutable record of one captured part.

use std::rc::Rc;

use indexmap::IndexMap;

/// How a part's body was encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    Base64,
    QuotedPrintable,
    SevenBit,
    EightBit,
    Binary,
}

impl TransferEncoding {
    /// Parse a `Content-Transfer-Encoding` header value.
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "base64" => Some(Self::Base64),
            "quoted-printable" => Some(Self::QuotedPrintable),
            "7bit" => Some(Self::SevenBit),
            "8bit" => Some(Self::EightBit),
            "binary" => Some(Self::Binary),
            _ => None,
        }
    }
}

/// One captured part of the MHTML archive.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Body as read from the archive, before transfer-decoding (§4.C P1).
    pub data: String,
    /// MIME type with any `charset=` parameter stripped, e.g. `text/css`.
    pub content_type: String,
    /// Declared charset, if any.
    pub charset: Option<String>,
    pub transfer_encoding: TransferEncoding,
    /// Present when the part carried a `Content-ID` header (without the
    /// surrounding angle brackets).
    pub content_id: Option<String>,
    /// Present when the part carried a `Content-Location` header.
    pub location: Option<String>,
}

impl Resource {
    pub(crate) fn is_html(&self) -> bool {
        self.content_type.eq_ignore_ascii_case("text/html")
    }

    pub(crate) fn is_css(&self) -> bool {
        self.content_type.eq_ignore_ascii_case("text/css")
    }

    pub(crate) fn is_image(&self) -> bool {
        self.content_type
            .to_ascii_lowercase()
            .starts_with("image")
    }
}

/// Diagnostic metadata captured from the outer MIME envelope. Never affects
/// conversion; present purely for `Debug`/introspection.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub subject: Option<String>,
    pub date: Option<String>,
    pub snapshot_location: Option<String>,
}

/// The parsed MHTML archive (§3).
#[derive(Debug, Clone, Default)]
pub struct Archive {
    /// URL string identifying the root HTML resource.
    pub index: String,
    /// URL → Resource, keyed by `Content-Location`. First occurrence wins (P2).
    ///
    /// `Rc`-wrapped so the shallow copy taken for recursive iframe
    /// conversion (§5) is O(1) rather than a deep clone of every resource.
    pub media: Rc<IndexMap<String, Resource>>,
    /// CID → Resource, keyed by `Content-ID`.
    pub frames: Rc<IndexMap<String, Resource>>,
    pub envelope: Envelope,
}

impl Archive {
    /// I1: the index resource exists and is `text/html`.
    pub fn validate(&self) -> bool {
        matches!(self.media.get(&self.index), Some(r) if r.is_html())
    }

    pub(crate) fn insert_media(&mut self, location: String, resource: Resource) {
        // P2: first occurrence wins.
        Rc::make_mut(&mut self.media)
            .entry(location)
            .or_insert(resource);
    }

    pub(crate) fn insert_frame(&mut self, cid: String, resource: Resource) {
        Rc::make_mut(&mut self.frames).entry(cid).or_insert(resource);
    }

    /// Construct a shallow-copy archive for recursive iframe conversion (§5):
    /// new index, shared media/frames.
    pub(crate) fn reindexed(&self, new_index: String) -> Archive {
        Archive {
            index: new_index,
            media: Rc::clone(&self.media),
            frames: Rc::clone(&self.frames),
            envelope: self.envelope.clone(),
        }
    }
}
