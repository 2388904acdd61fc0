// Declarative-shadow-DOM flattening (§4.E).
//
// html5ever parses a `<template>`'s content into its own detached document
// fragment (`NodeData::Element::template_contents`), not into the
// template's regular `children` — so inspecting/extracting shadow content
// means reaching into that field rather than the normal child list.

use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData};

use super::helpers::{append_child, children, detach, get_attr, is_element, remove_attr, tag_name};

fn is_comment(handle: &Handle) -> bool {
    matches!(handle.data, NodeData::Comment { .. })
}

fn template_fragment(template: &Handle) -> Option<Handle> {
    match &template.data {
        NodeData::Element {
            ref template_contents,
            ..
        } => template_contents.borrow().clone(),
        _ => None,
    }
}

/// A host's shadow template, if it carries a renamed shadow-root attribute.
pub(crate) fn find_shadow_template(host: &Handle) -> Option<Handle> {
    children(host).into_iter().find(|c| {
        tag_name(c).as_deref() == Some("template")
            && (get_attr(c, "data-shadowrootmode").is_some() || get_attr(c, "data-shadowmode").is_some())
    })
}

/// A fragment is "only slot placeholders" if every *element* child is a
/// `<slot>` — text (including interstitial whitespace from ordinarily
/// formatted markup) and comment children don't count either way.
fn only_slot_placeholders(fragment: &Handle) -> bool {
    children(fragment)
        .iter()
        .filter(|c| is_element(c))
        .all(|c| tag_name(c).as_deref() == Some("slot"))
}

/// Flatten `host`'s declarative shadow template, if it has one, then strip
/// its `loaded` attribute regardless (§4.E).
pub(crate) fn flatten(host: &Handle) {
    if let Some(template) = find_shadow_template(host) {
        let host_children = children(host);
        // Only element siblings count — a formatted document's whitespace
        // text nodes around the template are not "light DOM content".
        let has_non_template_siblings = host_children
            .iter()
            .any(|c| is_element(c) && !Rc::ptr_eq(c, &template));

        let fragment = template_fragment(&template);
        let only_slots = fragment
            .as_ref()
            .map(only_slot_placeholders)
            .unwrap_or(true);

        if !(only_slots || has_non_template_siblings) {
            if let Some(fragment) = fragment {
                for child in children(&fragment) {
                    if is_comment(&child) {
                        continue;
                    }
                    detach(&child);
                    append_child(host, &child);
                }
            }
        }
        detach(&template);
    }

    remove_attr(host, "loaded");
}
