// The DOM rewriter (§4.E) and the DOM-provider capability (§4.F, §9).
//
// The capability boundary sits at "HTML string -> mutable tree"
// (`DomProvider::parse_html`); once a tree exists, the rewriter below binds
// directly to `markup5ever_rcdom::Handle`, the only concrete tree shape this
// crate ships — mirroring how the teacher's own `parse_html` is a concrete,
// non-abstracted function rather than something threaded through a trait at
// every call site.

pub(crate) mod helpers;
mod shadow;

use std::collections::VecDeque;
use std::sync::OnceLock;

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, RcDom};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;

use crate::css;
use crate::decode;
use crate::error::MhtmlError;
use crate::resolver;
use crate::resource::Archive;

/// Options controlling DOM conversion (§6).
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Recursively inline `cid:` iframes into `data:text/html` URIs.
    pub convert_iframes: bool,
}

/// The injected capability: parse an HTML string into a mutable element
/// tree. The core never constructs one itself beyond the default impl.
pub trait DomProvider {
    type Tree;
    fn parse_html(&self, html: &str) -> Self::Tree;
}

/// The default DOM provider, backed by `html5ever`/`markup5ever_rcdom`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Html5everProvider;

impl DomProvider for Html5everProvider {
    type Tree = Handle;

    fn parse_html(&self, html: &str) -> Handle {
        let processed = rename_shadow_attrs(html);
        let opts = ParseOpts {
            tree_builder: TreeBuilderOpts {
                drop_doctype: false,
                ..Default::default()
            },
            ..Default::default()
        };
        parse_document(RcDom::default(), opts)
            .from_utf8()
            .one(processed.as_bytes())
            .document
    }
}

fn shadow_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(shadowrootmode|shadowmode)(\s*=)").unwrap())
}

/// Rename `shadowrootmode`/`shadowmode` attributes to their `data-`
/// prefixed form before parsing (§4.E pre-processing). Some DOM providers
/// implement partial declarative-shadow-DOM semantics that would otherwise
/// consume — and silently erase — the host's light-DOM children before this
/// rewriter gets a chance to preserve them.
fn rename_shadow_attrs(html: &str) -> String {
    shadow_attr_regex()
        .replace_all(html, |caps: &regex::Captures| {
            format!("data-{}{}", caps[1].to_ascii_lowercase(), &caps[2])
        })
        .into_owned()
}

/// Serialize a parsed document tree back to an HTML string.
pub fn serialize(document: &Handle) -> String {
    helpers::serialize(document)
}

/// Walk `document` breadth-first and mutate it in place per §4.E.
pub fn rewrite<P: DomProvider<Tree = Handle>>(
    document: &Handle,
    archive: &Archive,
    options: &ConvertOptions,
    provider: &P,
) -> Result<(), MhtmlError> {
    let mut queue: VecDeque<Handle> = VecDeque::new();
    queue.push_back(document.clone());

    while let Some(node) = queue.pop_front() {
        for child in helpers::children(&node) {
            queue.push_back(child);
        }

        if !helpers::is_element(&node) {
            continue;
        }

        helpers::remove_attr(&node, "integrity");
        shadow::flatten(&node);

        match helpers::tag_name(&node).as_deref() {
            Some("head") => insert_base(&node),
            Some("link") => rewrite_link(&node, archive),
            Some("style") => rewrite_style(&node, archive),
            Some("img") => rewrite_img(&node, archive),
            Some("iframe") => rewrite_iframe(&node, archive, options, provider)?,
            _ => rewrite_inline_style(&node, archive),
        }
    }

    Ok(())
}

fn insert_base(head: &Handle) {
    let base = helpers::create_element("base");
    helpers::set_attr(&base, "target", "_parent");
    helpers::prepend_child(head, &base);
}

fn rewrite_link(node: &Handle, archive: &Archive) {
    let rel = helpers::get_attr(node, "rel").unwrap_or_default();
    if !rel.eq_ignore_ascii_case("stylesheet") {
        return;
    }
    let Some(href) = helpers::get_attr(node, "href") else {
        return;
    };
    let Some(key) = resolver::resolve(&archive.index, &href, &archive.media) else {
        tracing::debug!(href, "link href did not resolve, leaving <link> unchanged");
        return;
    };
    let resource = &archive.media[&key];
    if !resource.is_css() {
        return;
    }
    let Some(raw_bytes) = decode::decode(&resource.data, resource.transfer_encoding) else {
        tracing::warn!(url = key, "failed to decode stylesheet, leaving <link> unchanged");
        return;
    };
    let css_text = String::from_utf8_lossy(&raw_bytes).into_owned();
    let rewritten = css::rewrite(&css_text, &key, archive);

    let style = helpers::create_element("style");
    helpers::set_text(&style, &rewritten);
    helpers::replace_with(node, &style);
}

fn rewrite_style(node: &Handle, archive: &Archive) {
    let original = helpers::get_text(node);
    let rewritten = css::rewrite(&original, &archive.index, archive);

    let style = helpers::create_element("style");
    helpers::set_text(&style, &rewritten);
    helpers::replace_with(node, &style);
}

fn rewrite_img(node: &Handle, archive: &Archive) {
    if let Some(src) = helpers::get_attr(node, "src") {
        match resolver::resolve(&archive.index, &src, &archive.media) {
            Some(key) => {
                let resource = &archive.media[&key];
                if resource.is_image() {
                    match decode::decode(&resource.data, resource.transfer_encoding) {
                        Some(raw_bytes) => {
                            let uri =
                                decode::to_data_uri(&raw_bytes, &resource.content_type, resource.transfer_encoding);
                            helpers::set_attr(node, "src", &uri);
                        }
                        None => {
                            tracing::warn!(url = key, "failed to decode image, leaving src unchanged");
                        }
                    }
                }
            }
            None => {
                tracing::debug!(src, "img src did not resolve, leaving unchanged");
            }
        }
    }
    rewrite_inline_style(node, archive);
}

fn rewrite_iframe<P: DomProvider<Tree = Handle>>(
    node: &Handle,
    archive: &Archive,
    options: &ConvertOptions,
    provider: &P,
) -> Result<(), MhtmlError> {
    if !options.convert_iframes {
        return Ok(());
    }
    let Some(src) = helpers::get_attr(node, "src") else {
        return Ok(());
    };
    let Some(cid) = src.strip_prefix("cid:") else {
        return Ok(());
    };
    let Some(frame) = archive.frames.get(cid).cloned() else {
        tracing::debug!(cid, "iframe cid not found in frame table, leaving src unchanged");
        return Ok(());
    };
    if !frame.is_html() {
        return Ok(());
    }
    let Some(raw_bytes) = decode::decode(&frame.data, frame.transfer_encoding) else {
        tracing::warn!(cid, "failed to decode iframe body, leaving src unchanged");
        return Ok(());
    };
    let html = String::from_utf8_lossy(&raw_bytes).into_owned();

    // The shallow-copy archive (§5): new index, shared media/frames.
    let new_index = frame.location.clone().unwrap_or_else(|| format!("cid:{cid}"));
    let mut frame_archive = archive.reindexed(new_index.clone());
    frame_archive.insert_media(new_index, frame);

    let inner_tree = provider.parse_html(&html);
    rewrite(&inner_tree, &frame_archive, options, provider)?;
    let serialized = helpers::serialize(&inner_tree);
    let percent_encoded = utf8_percent_encode(&serialized, NON_ALPHANUMERIC).to_string();
    helpers::set_attr(node, "src", &format!("data:text/html;charset=utf-8,{percent_encoded}"));

    Ok(())
}

fn rewrite_inline_style(node: &Handle, archive: &Archive) {
    if let Some(style) = helpers::get_attr(node, "style") {
        if !style.is_empty() {
            let rewritten = css::rewrite(&style, &archive.index, archive);
            if rewritten != style {
                helpers::set_attr(node, "style", &rewritten);
            }
        }
    }
}
