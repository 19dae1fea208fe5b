pub use roxmltree::*;
use tracing::trace;

use crate::XmlError;

pub fn parse(xml: &str) -> Result<Document<'_>, roxmltree::Error> {
    roxmltree::Document::parse(xml)
}

/// Visits one node and accumulates the state needed to produce `Value`.
pub trait XmlVisitor<'a> {
    type Value;

    fn visit_node(&mut self, node: Node<'a, 'a>) -> Result<(), XmlError>;

    fn visit_children(
        &mut self,
        _children: impl Iterator<Item = Node<'a, 'a>>,
    ) -> Result<(), XmlError> {
        Ok(())
    }

    fn finish(self) -> Result<Self::Value, XmlError>;
}

pub trait XmlDeserialize<'a>: Sized {
    type Visitor: XmlVisitor<'a, Value = Self>;

    fn visitor() -> Self::Visitor;

    fn from_node(node: Node<'a, 'a>) -> Result<Self, XmlError> {
        NodeDeserializer::new(node).deserialize(Self::visitor())
    }
}

pub struct NodeDeserializer<'a> {
    root: Node<'a, 'a>,
}

impl<'a> NodeDeserializer<'a> {
    pub fn new(root: Node<'a, 'a>) -> Self {
        Self { root }
    }

    pub fn deserialize<V>(self, mut visitor: V) -> Result<V::Value, XmlError>
    where
        V: XmlVisitor<'a>,
    {
        trace!(tag = self.root.tag_name().name(), "deserializing node");
        visitor.visit_node(self.root)?;
        visitor.visit_children(self.root.children())?;
        visitor.finish()
    }
}

/// Element children of `node`, skipping text, comments and processing instructions.
pub fn element_children<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

/// Concatenation of all direct text children of `node`.
pub fn text_content(node: Node<'_, '_>) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|child| child.text())
        .collect()
}

/// Ensures `node` is an element called `expected` (local name), in `namespace` when given.
pub fn expect_element(
    node: Node<'_, '_>,
    expected: &str,
    namespace: Option<&str>,
) -> Result<(), XmlError> {
    if !node.is_element() {
        return Err(XmlError::InvalidNodeType {
            expected: NodeType::Element,
            found: node.node_type(),
        });
    }

    let tag = node.tag_name();
    if tag.name() != expected {
        return Err(XmlError::XmlInvalidTag {
            expected: expected.to_owned(),
            found: tag.name().to_owned(),
        });
    }

    let found = tag.namespace();
    match namespace {
        Some(expected) if found != Some(expected) => Err(XmlError::XmlInvalidNamespace {
            expected: expected.to_owned(),
            found: found.map(str::to_owned),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountVisitor {
        name: Option<String>,
        children: usize,
    }

    impl<'a> XmlVisitor<'a> for CountVisitor {
        type Value = (String, usize);

        fn visit_node(&mut self, node: Node<'a, 'a>) -> Result<(), XmlError> {
            self.name = Some(node.tag_name().name().to_owned());
            Ok(())
        }

        fn visit_children(
            &mut self,
            children: impl Iterator<Item = Node<'a, 'a>>,
        ) -> Result<(), XmlError> {
            self.children = children.filter(Node::is_element).count();
            Ok(())
        }

        fn finish(self) -> Result<Self::Value, XmlError> {
            let name = self
                .name
                .ok_or_else(|| XmlError::InvalidXml("node was never visited".to_owned()))?;
            Ok((name, self.children))
        }
    }

    #[test]
    fn test_node_deserializer_drives_visitor() {
        let document = parse("<root>text<a/><!-- c --><b/></root>").unwrap();
        let value = NodeDeserializer::new(document.root_element())
            .deserialize(CountVisitor {
                name: None,
                children: 0,
            })
            .unwrap();
        assert_eq!(value, ("root".to_owned(), 2));
    }

    #[test]
    fn test_text_content_joins_text_nodes() {
        let document = parse("<v>a &amp; <![CDATA[<b>]]></v>").unwrap();
        assert_eq!(text_content(document.root_element()), "a & <b>");
    }

    #[test]
    fn test_expect_element_checks_namespace() {
        let document = parse(r#"<s:Envelope xmlns:s="urn:a"/>"#).unwrap();
        let root = document.root_element();

        assert!(expect_element(root, "Envelope", Some("urn:a")).is_ok());
        assert!(matches!(
            expect_element(root, "Envelope", Some("urn:b")),
            Err(XmlError::XmlInvalidNamespace { .. })
        ));
        assert!(matches!(
            expect_element(root, "Body", None),
            Err(XmlError::XmlInvalidTag { .. })
        ));
    }
}
