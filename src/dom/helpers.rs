// Low-level node helpers over `markup5ever_rcdom::Handle`.
//
// The DOM rewriter mutates nodes through raw attribute/child operations
// rather than any structured CSSOM-like API, per §4.E's rationale: common
// CSSOM round-trips drop custom properties (`--name: value`).

use std::cell::RefCell;
use std::rc::Rc;

use html5ever::tendril::StrTendril;
use html5ever::{ns, Attribute, LocalName, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData};

pub(crate) fn tag_name(handle: &Handle) -> Option<String> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref().to_ascii_lowercase()),
        _ => None,
    }
}

pub(crate) fn is_element(handle: &Handle) -> bool {
    matches!(handle.data, NodeData::Element { .. })
}

pub(crate) fn get_attr(handle: &Handle, name: &str) -> Option<String> {
    if let NodeData::Element { ref attrs, .. } = handle.data {
        attrs
            .borrow()
            .iter()
            .find(|a| a.name.local.as_ref().eq_ignore_ascii_case(name))
            .map(|a| a.value.to_string())
    } else {
        None
    }
}

pub(crate) fn set_attr(handle: &Handle, name: &str, value: &str) {
    if let NodeData::Element { ref attrs, .. } = handle.data {
        let mut attrs = attrs.borrow_mut();
        if let Some(attr) = attrs
            .iter_mut()
            .find(|a| a.name.local.as_ref().eq_ignore_ascii_case(name))
        {
            attr.value = StrTendril::from(value);
        } else {
            attrs.push(Attribute {
                name: QualName::new(None, ns!(), LocalName::from(name)),
                value: StrTendril::from(value),
            });
        }
    }
}

pub(crate) fn remove_attr(handle: &Handle, name: &str) {
    if let NodeData::Element { ref attrs, .. } = handle.data {
        attrs
            .borrow_mut()
            .retain(|a| !a.name.local.as_ref().eq_ignore_ascii_case(name));
    }
}

pub(crate) fn children(handle: &Handle) -> Vec<Handle> {
    handle.children.borrow().iter().cloned().collect()
}

pub(crate) fn create_element(name: &str) -> Handle {
    Rc::new(Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from(name)),
        attrs: RefCell::new(Vec::new()),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    }))
}

pub(crate) fn create_text(text: &str) -> Handle {
    Rc::new(Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(text)),
    }))
}

pub(crate) fn append_child(parent: &Handle, child: &Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child.clone());
}

pub(crate) fn prepend_child(parent: &Handle, child: &Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().insert(0, child.clone());
}

/// Detach `node` from its parent's child list, if any.
pub(crate) fn detach(node: &Handle) {
    let parent_weak = node.parent.take();
    if let Some(parent) = parent_weak.and_then(|w| w.upgrade()) {
        let mut siblings = parent.children.borrow_mut();
        if let Some(idx) = siblings.iter().position(|c| Rc::ptr_eq(c, node)) {
            siblings.remove(idx);
        }
    }
}

/// Replace `old` with `new` at the same position in its parent's children.
pub(crate) fn replace_with(old: &Handle, new: &Handle) {
    let parent_weak = old.parent.take();
    if let Some(parent) = parent_weak.and_then(|w| w.upgrade()) {
        let mut siblings = parent.children.borrow_mut();
        if let Some(idx) = siblings.iter().position(|c| Rc::ptr_eq(c, old)) {
            new.parent.set(Some(Rc::downgrade(&parent)));
            siblings[idx] = new.clone();
        }
    }
}

/// Replace all children of `handle` with a single text node.
pub(crate) fn set_text(handle: &Handle, text: &str) {
    handle.children.borrow_mut().clear();
    let node = create_text(text);
    append_child(handle, &node);
}

/// Concatenate all direct text-node children.
pub(crate) fn get_text(handle: &Handle) -> String {
    let mut out = String::new();
    for child in handle.children.borrow().iter() {
        if let NodeData::Text { ref contents } = child.data {
            out.push_str(&contents.borrow());
        }
    }
    out
}

/// Serialize a node subtree back to an HTML string.
pub(crate) fn serialize(handle: &Handle) -> String {
    let mut buf = Vec::new();
    let serializable: markup5ever_rcdom::SerializableHandle = handle.clone().into();
    html5ever::serialize::serialize(&mut buf, &serializable, Default::default())
        .expect("serializing an in-memory DOM cannot fail");
    String::from_utf8_lossy(&buf).into_owned()
}
