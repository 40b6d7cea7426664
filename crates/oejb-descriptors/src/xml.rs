use roxmltree::{Document, Node};

use crate::error::{DescriptorError, Result};

/// Parses `text` and checks the root element's local name.
pub(crate) fn parse_document<'a>(
    text: &'a str,
    descriptor: &'static str,
    root: &str,
) -> Result<Document<'a>> {
    let doc = Document::parse(text).map_err(|source| DescriptorError::Xml { descriptor, source })?;
    let found = doc.root_element().tag_name().name();
    if found != root {
        return Err(DescriptorError::invalid(
            descriptor,
            format!("expected <{root}> root element, found <{found}>"),
        ));
    }
    Ok(doc)
}

pub(crate) fn child_element<'a, 'input>(
    node: &Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

pub(crate) fn child_elements<'a, 'input: 'a>(
    node: &Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

pub(crate) fn text(node: &Node<'_, '_>) -> Option<String> {
    node.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub(crate) fn child_text(node: &Node<'_, '_>, name: &str) -> Option<String> {
    child_element(node, name).and_then(|n| text(&n))
}

/// Trimmed texts of every `<name>` child.
pub(crate) fn child_texts(node: &Node<'_, '_>, name: &str) -> Vec<String> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().name() == name)
        .filter_map(|n| text(&n))
        .collect()
}

pub(crate) fn bool_attribute(node: &Node<'_, '_>, name: &str) -> bool {
    node.attribute(name)
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
}
