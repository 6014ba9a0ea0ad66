//! XML document handling on top of `markup5ever_rcdom`.
//!
//! Input is parsed with `xml5ever` into an `RcDom`; importers walk it through
//! the [`MarkupNode`] trait. Exporters build a DOM with [`element`] and
//! [`append`], tidy it with [`pretty_print`], and write it with [`to_xml`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::{Context, Result};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use xml5ever::driver::{parse_document, XmlParseOpts};
use xml5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use xml5ever::tendril::TendrilSink;
use xml5ever::{Attribute, LocalName, Namespace, QualName};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const INDENT: &str = "  ";

/// What an importer needs to know about a markup node.
pub trait MarkupNode: Sized {
    /// Element name, or `None` for documents, text and other non-elements.
    fn tag(&self) -> Option<&str>;

    fn attribute(&self, name: &str) -> Option<String>;

    /// Text directly inside this node, or `None` if there is none.
    fn text(&self) -> Option<String>;

    /// Element children in document order.
    fn children(&self) -> Vec<Self>;
}

impl MarkupNode for Handle {
    fn tag(&self) -> Option<&str> {
        match &self.data {
            NodeData::Element { name, .. } => Some(&*name.local),
            _ => None,
        }
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match &self.data {
            NodeData::Element { attrs, .. } => attrs
                .borrow()
                .iter()
                .find(|attr| &*attr.name.local == name)
                .map(|attr| attr.value.to_string()),
            _ => None,
        }
    }

    fn text(&self) -> Option<String> {
        let mut text: Option<String> = None;
        for child in self.children.borrow().iter() {
            if let NodeData::Text { contents } = &child.data {
                text.get_or_insert_with(String::new)
                    .push_str(&contents.borrow());
            }
        }
        text
    }

    fn children(&self) -> Vec<Self> {
        self.children
            .borrow()
            .iter()
            .filter(|child| is_element(child))
            .cloned()
            .collect()
    }
}

/// Parse an XML document. Returns the document node.
///
/// The parser recovers from malformed input instead of failing, matching the
/// importer's rule that bad markup degrades rather than errors.
pub fn parse(source: &str) -> Handle {
    let dom = parse_document(RcDom::default(), XmlParseOpts::default()).one(source);
    dom.document
}

/// Create an element with attributes, in no namespace.
pub fn element(tag: &str, attrs: &[(&str, &str)]) -> Handle {
    let attributes = attrs
        .iter()
        .map(|(name, value)| Attribute {
            name: qual_name(name),
            value: (*value).into(),
        })
        .collect();

    Rc::new(Node {
        parent: Cell::new(None),
        children: RefCell::new(Vec::new()),
        data: NodeData::Element {
            name: qual_name(tag),
            attrs: RefCell::new(attributes),
            template_contents: Default::default(),
            mathml_annotation_xml_integration_point: false,
        },
    })
}

/// Create a text node.
pub fn text(contents: &str) -> Handle {
    Rc::new(Node {
        parent: Cell::new(None),
        children: RefCell::new(Vec::new()),
        data: NodeData::Text {
            contents: RefCell::new(contents.into()),
        },
    })
}

pub fn append(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Tidy an exported tree, bottom-up.
///
/// Child elements left with no element children and no attributes are
/// removed. Nodes that keep element children get whitespace so that each
/// child starts on its own line, indented one step deeper than `depth`.
pub fn pretty_print(node: &Handle, depth: usize) {
    let children: Vec<Handle> = node.children.borrow().clone();

    let mut kept = Vec::with_capacity(children.len());
    for child in children {
        if is_element(&child) {
            pretty_print(&child, depth + 1);
            if element_count(&child) == 0 && !has_attributes(&child) {
                continue;
            }
        }
        kept.push(child);
    }

    if kept.iter().any(is_element) {
        let inner = format!("\n{}", INDENT.repeat(depth + 1));
        let mut spaced = Vec::with_capacity(kept.len() * 2 + 1);
        for child in kept {
            if is_element(&child) {
                spaced.push(text(&inner));
            }
            spaced.push(child);
        }
        spaced.push(text(&format!("\n{}", INDENT.repeat(depth))));
        for child in &spaced {
            child.parent.set(Some(Rc::downgrade(node)));
        }
        *node.children.borrow_mut() = spaced;
    } else {
        *node.children.borrow_mut() = kept;
    }
}

/// Serialize `root` and everything below it, with an XML declaration.
pub fn to_xml(root: &Handle) -> Result<String> {
    let mut output = Vec::new();
    output.extend_from_slice(XML_DECLARATION.as_bytes());

    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    let serializable = SerializableHandle::from(root.clone());
    serialize(&mut output, &serializable, opts).context("XML serialization failed")?;
    output.push(b'\n');

    String::from_utf8(output).context("Serialized XML is not valid UTF-8")
}

fn qual_name(local: &str) -> QualName {
    QualName::new(None, Namespace::from(""), LocalName::from(local))
}

fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

fn element_count(node: &Handle) -> usize {
    node.children.borrow().iter().filter(|c| is_element(c)).count()
}

fn has_attributes(node: &Handle) -> bool {
    match &node.data {
        NodeData::Element { attrs, .. } => !attrs.borrow().is_empty(),
        _ => false,
    }
}
