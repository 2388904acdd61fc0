// The MHTML parser (§4.C): a small explicit state machine.
//
//   TOP_HEADERS -> PART_HEADERS -> PART_BODY -> (loop) -> END
//
// The parser never looks at bytes outside the slice it owns; it has no
// network or filesystem dependency. It tolerates mixed `\r\n`/`\n` line
// endings by stripping a trailing `\r` off every line before use, and
// re-joins part bodies with plain `\n` — which also gives us, for free, the
// "mixed-line-ending inputs parse identically" property (§8).

use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

use crate::decode::normalize_utf8;
use crate::error::MhtmlError;
use crate::resource::{Archive, Envelope, Resource, TransferEncoding};

#[derive(Debug, Clone, Copy)]
enum ParserState {
    TopHeaders,
    PartHeaders,
    PartBody,
    End,
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Escalate `UnexpectedEOF`/`MissingPartHeader` to a hard `InvalidArchive`
    /// instead of returning the archive built so far (§7).
    pub strict: bool,
    /// Stop after the first HTML part is fully read, discarding the rest of
    /// the stream (§4.C P3).
    pub html_only: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict: false,
            html_only: false,
        }
    }
}

/// A cursor over `\n`-delimited lines of a byte slice, with the trailing
/// `\r` (if any) stripped from each line.
struct LineReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> LineReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Returns the next line as raw bytes, trailing `\r` stripped. Callers
    /// decide how to interpret the bytes (headers are ASCII in practice;
    /// bodies get a lossy UTF-8 pass).
    fn next_line_bytes(&mut self) -> Option<&'a [u8]> {
        if self.at_eof() {
            return None;
        }
        let rest = &self.data[self.pos..];
        let (line, advance) = match rest.iter().position(|&b| b == b'\n') {
            Some(nl) => (&rest[..nl], nl + 1),
            None => (rest, rest.len()),
        };
        self.pos += advance;
        let line = if line.last() == Some(&b'\r') {
            &line[..line.len() - 1]
        } else {
            line
        };
        Some(line)
    }

    fn next_line(&mut self) -> Option<String> {
        self.next_line_bytes()
            .map(|l| String::from_utf8_lossy(l).into_owned())
    }
}

fn boundary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)boundary\s*=\s*"?([^";]+)"?"#).unwrap())
}

fn charset_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)charset\s*=\s*"?([^";]+)"?"#).unwrap())
}

/// Read an RFC-2822-style header block (name/value pairs, with
/// whitespace-prefixed continuation lines) until a blank line or EOF.
/// Returns `None` if EOF was reached before a blank line.
fn read_header_block(reader: &mut LineReader<'_>) -> Option<IndexMap<String, String>> {
    let mut headers: IndexMap<String, String> = IndexMap::new();
    let mut last_key: Option<String> = None;

    loop {
        let line = reader.next_line()?;
        if line.is_empty() {
            return Some(headers);
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(key) = &last_key {
                if let Some(existing) = headers.get_mut(key) {
                    existing.push(' ');
                    existing.push_str(line.trim());
                }
            }
            continue;
        }
        if let Some(colon) = line.find(':') {
            let name = line[..colon].trim().to_ascii_lowercase();
            let value = line[colon + 1..].trim().to_string();
            headers.insert(name.clone(), value);
            last_key = Some(name);
        }
    }
}

/// A line "contains" the boundary when the token appears anywhere in it
/// (§9 Open Question — decision: inherit the source's substring-match
/// simplification rather than requiring an anchored `^--boundary` match).
fn is_boundary_line(line: &str, boundary: &str) -> bool {
    line.contains(boundary)
}

struct PartHeaderFields {
    content_type: Option<String>,
    charset: Option<String>,
    transfer_encoding: Option<TransferEncoding>,
    content_id: Option<String>,
    content_location: Option<String>,
}

fn extract_part_fields(headers: &IndexMap<String, String>) -> PartHeaderFields {
    let raw_content_type = headers.get("content-type").cloned();
    let (content_type, charset) = match &raw_content_type {
        Some(raw) => {
            let mime = raw.split(';').next().unwrap_or(raw).trim().to_string();
            let charset = charset_regex()
                .captures(raw)
                .map(|c| c[1].trim().to_string());
            (Some(mime), charset)
        }
        None => (None, None),
    };
    let transfer_encoding = headers
        .get("content-transfer-encoding")
        .and_then(|v| TransferEncoding::parse(v));
    let content_id = headers
        .get("content-id")
        .map(|v| v.trim().trim_start_matches('<').trim_end_matches('>').to_string());
    let content_location = headers.get("content-location").map(|v| v.trim().to_string());

    PartHeaderFields {
        content_type,
        charset,
        transfer_encoding,
        content_id,
        content_location,
    }
}

/// Run the parser over the full MHTML byte stream.
pub fn parse_archive(data: &[u8], options: &ParseOptions) -> Result<Archive, MhtmlError> {
    let mut reader = LineReader::new(data);
    let mut archive = Archive::default();
    let mut state = ParserState::TopHeaders;
    let mut boundary = String::new();
    let mut first_part_seen = false;

    // Current part under construction.
    let mut cur_fields: Option<PartHeaderFields> = None;
    let mut cur_body: Vec<String> = Vec::new();

    loop {
        match state {
            ParserState::TopHeaders => {
                tracing::debug!("parser state: TopHeaders");
                let headers = read_header_block(&mut reader).ok_or_else(|| {
                    MhtmlError::UnexpectedEof("stream ended before the outer header block finished".into())
                })?;
                archive.envelope = Envelope {
                    subject: headers.get("subject").cloned(),
                    date: headers.get("date").cloned(),
                    snapshot_location: headers.get("snapshot-content-location").cloned(),
                };
                let content_type = headers.get("content-type").ok_or_else(|| {
                    MhtmlError::InvalidArchive("missing outer Content-Type header".into())
                })?;
                let main_type = content_type.split(';').next().unwrap_or("").trim();
                if !main_type.to_ascii_lowercase().starts_with("multipart/") {
                    return Err(MhtmlError::InvalidArchive(format!(
                        "outer Content-Type is not multipart/*: {main_type}"
                    )));
                }
                boundary = boundary_regex()
                    .captures(content_type)
                    .map(|c| c[1].trim().to_string())
                    .ok_or_else(|| {
                        MhtmlError::InvalidArchive("outer Content-Type missing boundary parameter".into())
                    })?;

                // Consume whitespace, then require the first boundary marker line.
                loop {
                    match reader.next_line() {
                        Some(line) if line.trim().is_empty() => continue,
                        Some(line) if is_boundary_line(&line, &boundary) => break,
                        Some(_) => {
                            return Err(MhtmlError::InvalidArchive(
                                "expected first boundary marker after outer headers".into(),
                            ))
                        }
                        None => {
                            return Err(MhtmlError::UnexpectedEof(
                                "stream ended before the first boundary marker".into(),
                            ))
                        }
                    }
                }
                state = ParserState::PartHeaders;
            }

            ParserState::PartHeaders => {
                tracing::debug!("parser state: PartHeaders");
                let headers = match read_header_block(&mut reader) {
                    Some(h) => h,
                    None => {
                        if options.strict {
                            return Err(MhtmlError::UnexpectedEof(
                                "stream ended mid part-header block".into(),
                            ));
                        }
                        tracing::warn!("stream ended mid part-header block, ending leniently");
                        state = ParserState::End;
                        continue;
                    }
                };
                let fields = extract_part_fields(&headers);

                let missing: Vec<&str> = {
                    let mut m = Vec::new();
                    if fields.content_type.is_none() {
                        m.push("Content-Type");
                    }
                    if fields.transfer_encoding.is_none() {
                        m.push("Content-Transfer-Encoding");
                    }
                    if fields.content_id.is_none() && fields.content_location.is_none() {
                        m.push("Content-ID or Content-Location");
                    }
                    m
                };
                if !missing.is_empty() {
                    if options.strict {
                        return Err(MhtmlError::MissingPartHeader {
                            offset: reader.pos,
                            detail: missing.join(", "),
                        });
                    }
                    // Lenient: drop this part but still consume its body so
                    // the cursor advances past it correctly.
                    tracing::warn!(missing = missing.join(", "), "dropping part with missing headers");
                    cur_fields = None;
                } else {
                    cur_fields = Some(fields);
                }
                cur_body.clear();
                state = ParserState::PartBody;
            }

            ParserState::PartBody => {
                tracing::debug!("parser state: PartBody");
                let mut ended_stream = true;
                loop {
                    match reader.next_line() {
                        Some(line) if is_boundary_line(&line, &boundary) => {
                            ended_stream = false;
                            break;
                        }
                        Some(line) => cur_body.push(line),
                        None => {
                            ended_stream = true;
                            break;
                        }
                    }
                }

                if let Some(fields) = cur_fields.take() {
                    let raw_body = cur_body.join("\n");
                    let body = normalize_utf8(&raw_body);
                    let content_type = fields.content_type.unwrap();
                    let is_html = content_type.eq_ignore_ascii_case("text/html");

                    if !first_part_seen {
                        first_part_seen = true;
                        if is_html {
                            if let Some(loc) = &fields.content_location {
                                archive.index = loc.clone();
                            }
                        }
                    }

                    let resource = Resource {
                        data: body,
                        content_type,
                        charset: fields.charset,
                        transfer_encoding: fields.transfer_encoding.unwrap(),
                        content_id: fields.content_id.clone(),
                        location: fields.content_location.clone(),
                    };

                    if let Some(loc) = fields.content_location {
                        archive.insert_media(loc, resource.clone());
                    }
                    if let Some(cid) = fields.content_id {
                        archive.insert_frame(cid, resource);
                    }

                    if options.html_only && is_html {
                        tracing::debug!("html-only: stopping after the index part");
                        state = ParserState::End;
                        continue;
                    }
                }

                state = if ended_stream {
                    ParserState::End
                } else {
                    ParserState::PartHeaders
                };
            }

            ParserState::End => {
                tracing::debug!("parser state: End");
                break;
            }
        }
    }

    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(boundary: &str, ending: &str) -> String {
        let lines = [
            "MIME-Version: 1.0",
            &format!("Content-Type: multipart/related; boundary=\"{boundary}\""),
            "",
            &format!("--{boundary}"),
            "Content-Type: text/html; charset=utf-8",
            "Content-Transfer-Encoding: quoted-printable",
            "Content-Location: http://example.com/",
            "",
            "<html><body>Hello</body></html>",
            &format!("--{boundary}"),
            "Content-Type: text/css",
            "Content-Transfer-Encoding: 7bit",
            "Content-Location: http://example.com/style.css",
            "",
            "body { color: red; }",
            &format!("--{boundary}--"),
            "",
        ];
        lines.join(ending)
    }

    #[test]
    fn parses_minimal_archive() {
        let text = sample("BOUNDARY", "\n");
        let archive = parse_archive(text.as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(archive.index, "http://example.com/");
        assert!(archive.validate());
        assert_eq!(archive.media.len(), 2);
        assert!(archive.media["http://example.com/"].data.contains("Hello"));
    }

    #[test]
    fn crlf_and_lf_parse_identically() {
        let lf = parse_archive(sample("BOUNDARY", "\n").as_bytes(), &ParseOptions::default()).unwrap();
        let crlf = parse_archive(sample("BOUNDARY", "\r\n").as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(lf.index, crlf.index);
        assert_eq!(lf.media.keys().collect::<Vec<_>>(), crlf.media.keys().collect::<Vec<_>>());
        assert_eq!(
            lf.media["http://example.com/"].data,
            crlf.media["http://example.com/"].data
        );
    }

    #[test]
    fn mixed_line_endings_within_one_input() {
        let mut mixed = String::new();
        let lf_version = sample("BOUNDARY", "\n");
        for (i, line) in lf_version.lines().enumerate() {
            mixed.push_str(line);
            mixed.push_str(if i % 2 == 0 { "\r\n" } else { "\n" });
        }
        let archive = parse_archive(mixed.as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(archive.index, "http://example.com/");
    }

    #[test]
    fn first_occurrence_of_a_url_wins() {
        let boundary = "B";
        let text = format!(
            "Content-Type: multipart/related; boundary=\"{boundary}\"\n\n--{boundary}\nContent-Type: text/html\nContent-Transfer-Encoding: 7bit\nContent-Location: http://example.com/\n\nfirst\n--{boundary}\nContent-Type: text/html\nContent-Transfer-Encoding: 7bit\nContent-Location: http://example.com/\n\nsecond\n--{boundary}--\n"
        );
        let archive = parse_archive(text.as_bytes(), &ParseOptions::default()).unwrap();
        assert!(archive.media["http://example.com/"].data.contains("first"));
    }

    #[test]
    fn html_only_short_circuits() {
        let text = sample("BOUNDARY", "\n");
        let archive = parse_archive(
            text.as_bytes(),
            &ParseOptions {
                strict: false,
                html_only: true,
            },
        )
        .unwrap();
        assert_eq!(archive.media.len(), 1);
    }

    #[test]
    fn missing_boundary_parameter_is_invalid() {
        let text = "Content-Type: multipart/related\n\n";
        let err = parse_archive(text.as_bytes(), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, MhtmlError::InvalidArchive(_)));
    }

    #[test]
    fn lenient_mode_drops_part_missing_both_id_and_location() {
        let boundary = "B";
        let text = format!(
            "Content-Type: multipart/related; boundary=\"{boundary}\"\n\n--{boundary}\nContent-Type: text/html\nContent-Transfer-Encoding: 7bit\nContent-Location: http://example.com/\n\nroot\n--{boundary}\nContent-Type: text/css\nContent-Transfer-Encoding: 7bit\n\northan\n--{boundary}--\n"
        );
        let archive = parse_archive(text.as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(archive.media.len(), 1);
    }

    #[test]
    fn strict_mode_rejects_part_missing_both_id_and_location() {
        let boundary = "B";
        let text = format!(
            "Content-Type: multipart/related; boundary=\"{boundary}\"\n\n--{boundary}\nContent-Type: text/html\nContent-Transfer-Encoding: 7bit\nContent-Location: http://example.com/\n\nroot\n--{boundary}\nContent-Type: text/css\nContent-Transfer-Encoding: 7bit\n\northan\n--{boundary}--\n"
        );
        let err = parse_archive(
            text.as_bytes(),
            &ParseOptions {
                strict: true,
                html_only: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, MhtmlError::MissingPartHeader { .. }));
    }
}
