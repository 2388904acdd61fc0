// End-to-end MHTML-to-HTML conversion scenarios.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use mhtml2html::{convert, ConvertOptions, MhtmlError};
use pretty_assertions::assert_eq;

fn part(headers: &[(&str, &str)], body: &str) -> String {
    let mut s = String::new();
    for (k, v) in headers {
        s.push_str(&format!("{k}: {v}\n"));
    }
    s.push('\n');
    s.push_str(body);
    s.push('\n');
    s
}

fn archive(boundary: &str, parts: &[String], line_ending: &str) -> Vec<u8> {
    let mut out = format!("Content-Type: multipart/related; boundary=\"{boundary}\"\n\n");
    for p in parts {
        out.push_str(&format!("--{boundary}\n"));
        out.push_str(p);
    }
    out.push_str(&format!("--{boundary}--\n"));
    if line_ending == "\r\n" {
        out = out.replace('\n', "\r\n");
    }
    out.into_bytes()
}

#[test]
fn minimal_document_round_trips() {
    let index = part(
        &[
            ("Content-Type", "text/html; charset=utf-8"),
            ("Content-Transfer-Encoding", "7bit"),
            ("Content-Location", "http://example.com/"),
        ],
        "<html><head><title>Hi</title></head><body><p>Hello</p></body></html>",
    );
    let data = archive("BOUNDARY", &[index], "\n");

    let html = convert(&data, &ConvertOptions::default()).unwrap();
    assert!(html.contains("Hello"));
    assert!(html.contains("<base target=\"_parent\">"));
}

#[test]
fn inlined_external_stylesheet_embeds_referenced_image() {
    let index = part(
        &[
            ("Content-Type", "text/html"),
            ("Content-Transfer-Encoding", "7bit"),
            ("Content-Location", "http://example.com/"),
        ],
        r#"<html><head><link rel="stylesheet" href="style.css"></head><body></body></html>"#,
    );
    let style = part(
        &[
            ("Content-Type", "text/css"),
            ("Content-Transfer-Encoding", "7bit"),
            ("Content-Location", "http://example.com/style.css"),
        ],
        "body { background: url(bg.png); }",
    );
    let image = part(
        &[
            ("Content-Type", "image/png"),
            ("Content-Transfer-Encoding", "base64"),
            ("Content-Location", "http://example.com/bg.png"),
        ],
        &BASE64.encode(b"\x89PNG\r\n"),
    );
    let data = archive("BOUNDARY", &[index, style, image], "\n");

    let html = convert(&data, &ConvertOptions::default()).unwrap();
    assert!(!html.contains("<link"));
    assert!(html.contains("<style>"));
    assert!(html.contains("data:image/png;base64,"));
}

#[test]
fn nested_css_import_resolves_relative_url_across_levels() {
    let index = part(
        &[
            ("Content-Type", "text/html"),
            ("Content-Transfer-Encoding", "7bit"),
            ("Content-Location", "http://example.com/"),
        ],
        r#"<html><head><link rel="stylesheet" href="a.css"></head><body></body></html>"#,
    );
    let a_css = part(
        &[
            ("Content-Type", "text/css"),
            ("Content-Transfer-Encoding", "7bit"),
            ("Content-Location", "http://example.com/a.css"),
        ],
        "@import url(sub/b.css);",
    );
    let b_css = part(
        &[
            ("Content-Type", "text/css"),
            ("Content-Transfer-Encoding", "7bit"),
            ("Content-Location", "http://example.com/sub/b.css"),
        ],
        "body { background: url(../img/bg.png); }",
    );
    let image = part(
        &[
            ("Content-Type", "image/png"),
            ("Content-Transfer-Encoding", "base64"),
            ("Content-Location", "http://example.com/img/bg.png"),
        ],
        &BASE64.encode(b"\x89PNG\r\n"),
    );
    let data = archive("BOUNDARY", &[index, a_css, b_css, image], "\n");

    let html = convert(&data, &ConvertOptions::default()).unwrap();
    // The innermost image must have made it all the way up through two
    // levels of @import nesting into the top-level <style>.
    assert!(html.contains("data:text/css;base64,"));
    let b64_start = html.find("base64,").unwrap() + "base64,".len();
    let b64_end = html[b64_start..].find('\'').unwrap() + b64_start;
    let outer_css = BASE64.decode(&html[b64_start..b64_end]).unwrap();
    let outer_css = String::from_utf8(outer_css).unwrap();
    assert!(outer_css.contains("data:text/css;base64,") || outer_css.contains("data:image/png;base64,"));
}

#[test]
fn base64_encoded_css_part_is_decoded_before_rewriting() {
    let index = part(
        &[
            ("Content-Type", "text/html"),
            ("Content-Transfer-Encoding", "7bit"),
            ("Content-Location", "http://example.com/"),
        ],
        r#"<html><head><link rel="stylesheet" href="style.css"></head><body></body></html>"#,
    );
    let style = part(
        &[
            ("Content-Type", "text/css"),
            ("Content-Transfer-Encoding", "base64"),
            ("Content-Location", "http://example.com/style.css"),
        ],
        &BASE64.encode(b"body { color: red; }"),
    );
    let data = archive("BOUNDARY", &[index, style], "\n");

    let html = convert(&data, &ConvertOptions::default()).unwrap();
    assert!(html.contains("color: red"));
}

#[test]
fn mixed_line_endings_convert_identically_to_lf_only() {
    let index = part(
        &[
            ("Content-Type", "text/html"),
            ("Content-Transfer-Encoding", "7bit"),
            ("Content-Location", "http://example.com/"),
        ],
        "<html><body><p>Hello</p></body></html>",
    );
    let lf = archive("BOUNDARY", &[index.clone()], "\n");
    let crlf = archive("BOUNDARY", &[index], "\r\n");

    let html_lf = convert(&lf, &ConvertOptions::default()).unwrap();
    let html_crlf = convert(&crlf, &ConvertOptions::default()).unwrap();
    assert_eq!(html_lf, html_crlf);
}

#[test]
fn iframe_is_left_untouched_without_the_option() {
    let index = part(
        &[
            ("Content-Type", "text/html"),
            ("Content-Transfer-Encoding", "7bit"),
            ("Content-Location", "http://example.com/"),
        ],
        r#"<html><body><iframe src="cid:frame1"></iframe></body></html>"#,
    );
    let frame = part(
        &[
            ("Content-Type", "text/html"),
            ("Content-Transfer-Encoding", "7bit"),
            ("Content-ID", "<frame1>"),
        ],
        "<p>Inner</p>",
    );
    let data = archive("BOUNDARY", &[index, frame], "\n");

    let html = convert(&data, &ConvertOptions::default()).unwrap();
    assert!(html.contains("cid:frame1"));
}

#[test]
fn iframe_is_recursively_inlined_with_the_option() {
    let index = part(
        &[
            ("Content-Type", "text/html"),
            ("Content-Transfer-Encoding", "7bit"),
            ("Content-Location", "http://example.com/"),
        ],
        r#"<html><body><iframe src="cid:frame1"></iframe></body></html>"#,
    );
    let frame = part(
        &[
            ("Content-Type", "text/html"),
            ("Content-Transfer-Encoding", "7bit"),
            ("Content-ID", "<frame1>"),
        ],
        "<p>Inner</p>",
    );
    let data = archive("BOUNDARY", &[index, frame], "\n");

    let html = convert(
        &data,
        &ConvertOptions {
            convert_iframes: true,
        },
    )
    .unwrap();
    assert!(!html.contains("cid:frame1"));
    assert!(html.contains("data:text/html;charset=utf-8,"));
}

#[test]
fn archive_with_no_html_index_is_rejected() {
    let css_only = part(
        &[
            ("Content-Type", "text/css"),
            ("Content-Transfer-Encoding", "7bit"),
            ("Content-Location", "http://example.com/"),
        ],
        "body {}",
    );
    let data = archive("BOUNDARY", &[css_only], "\n");

    let err = convert(&data, &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, MhtmlError::InvalidArchive(_)));
}
