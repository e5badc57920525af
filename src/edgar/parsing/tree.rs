use super::error::ExtractError;

#[derive(Debug, Clone, PartialEq)]
pub struct MarkupNode {
    /// Qualified name, `{namespace}local` when the element is namespaced.
    pub tag: String,
    pub text: Option<String>,
    pub is_leaf: bool,
}

impl MarkupNode {
    pub fn local_name(&self) -> &str {
        local_name(&self.tag)
    }
}

/// Element tree flattened into document order.
#[derive(Debug, Clone, Default)]
pub struct MarkupTree {
    nodes: Vec<MarkupNode>,
}

impl MarkupTree {
    pub fn iter(&self) -> impl Iterator<Item = &MarkupNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Portion of a tag after its last namespace separator.
pub fn local_name(tag: &str) -> &str {
    let tag = tag.trim();
    match tag.rfind(|c| c == '}' || c == ':') {
        Some(idx) => &tag[idx + 1..],
        None => tag,
    }
}

pub fn parse_markup(text: &str) -> Result<MarkupTree, ExtractError> {
    let document = roxmltree::Document::parse(text)?;

    let nodes = document
        .root()
        .descendants()
        .filter(|n| n.is_element())
        .map(|node| {
            let name = node.tag_name();
            let tag = match name.namespace() {
                Some(ns) => format!("{{{}}}{}", ns, name.name()),
                None => name.name().to_string(),
            };
            MarkupNode {
                tag,
                text: node.text().map(str::to_string),
                is_leaf: !node.children().any(|c| c.is_element()),
            }
        })
        .collect();

    Ok(MarkupTree { nodes })
}
