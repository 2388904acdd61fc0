// Transfer-encoding decoders (§4.A). Pure functions, no archive state.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};

use crate::resource::TransferEncoding;

/// Decode a part body according to its declared transfer encoding.
///
/// Returns `None` on malformed base64/quoted-printable input (§7
/// `DecodeFailure`) — callers retain the part with an empty decoded body.
pub fn decode(data: &str, encoding: TransferEncoding) -> Option<Vec<u8>> {
    match encoding {
        TransferEncoding::Base64 => decode_base64(data),
        TransferEncoding::QuotedPrintable => decode_quoted_printable(data),
        TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary => {
            Some(data.as_bytes().to_vec())
        }
    }
}

/// Strict RFC 4648 base64, tolerating interior whitespace and line folds.
fn decode_base64(data: &str) -> Option<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64.decode(cleaned).ok()
}

/// `=HH` hex escapes and soft line breaks (`=` at end of line).
fn decode_quoted_printable(data: &str) -> Option<Vec<u8>> {
    quoted_printable::decode(data.as_bytes(), quoted_printable::ParseMode::Lenient).ok()
}

/// Produce a `data:` URI embedding `bytes` as `content_type`.
///
/// Images/binaries are always base64-encoded. Quoted-printable (textual)
/// payloads are instead percent-encoded to preserve text semantics rather
/// than bloating the URI with a base64 blob of mostly-ASCII text.
pub fn to_data_uri(bytes: &[u8], content_type: &str, encoding: TransferEncoding) -> String {
    match encoding {
        TransferEncoding::QuotedPrintable => {
            let text = String::from_utf8_lossy(bytes);
            let encoded = utf8_percent_encode(&text, NON_ALPHANUMERIC).to_string();
            format!("data:{content_type};utf8,{encoded}")
        }
        _ => {
            let payload = BASE64.encode(bytes);
            format!("data:{content_type};base64,{payload}")
        }
    }
}

/// Produce a `data:<type>;base64,<payload>` URI. Unlike [`to_data_uri`],
/// this is always base64 regardless of the source transfer encoding — the
/// form the CSS rewriter's substitution contract requires (§4.D).
pub fn data_uri_base64(bytes: &[u8], content_type: &str) -> String {
    format!("data:{content_type};base64,{}", BASE64.encode(bytes))
}

/// Best-effort UTF-8 normalisation used by the parser's `PART_BODY` state
/// (§4.C): a percent-encode/decode round trip. Returns the original string
/// unchanged if the round trip fails to stay valid UTF-8.
pub fn normalize_utf8(body: &str) -> String {
    let encoded = utf8_percent_encode(body, NON_ALPHANUMERIC).to_string();
    match percent_decode_str(&encoded).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => body.to_string(),
    }
}
