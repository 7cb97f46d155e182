//! Loss-tolerant XML document tree.
//!
//! Keeps every element, attribute, namespace declaration, comment, CDATA
//! section, processing instruction and run of text in document order, so a
//! parse followed by a serialize changes nothing an XML parser would notice.
//! Formatting inside tags (attribute quoting, `<a/>` vs `<a />`) is not kept.

use std::io::Write;

use xml::attribute::OwnedAttribute;
use xml::name::OwnedName;
use xml::namespace::{Namespace, NS_XMLNS_PREFIX, NS_XML_PREFIX};
use xml::reader::{ParserConfig, XmlEvent as ReaderEvent};
use xml::writer::{EmitterConfig, EventWriter, XmlEvent as WriterEvent};

/// Declaration written ahead of every serialized document.
pub const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// A node inside an element, or before/after the root element.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction { name: String, data: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: OwnedName,
    pub attributes: Vec<OwnedAttribute>,
    /// Namespace bindings introduced on this element, as (prefix, uri);
    /// an empty prefix is the default namespace.
    pub namespaces: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    /// Value of the unprefixed attribute `local_name`.
    pub fn attr(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.prefix.is_none() && a.name.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Set an existing unprefixed attribute, keeping its position.
    ///
    /// Returns false if the element has no such attribute.
    pub fn set_attr(&mut self, local_name: &str, value: &str) -> bool {
        match self
            .attributes
            .iter_mut()
            .find(|a| a.name.prefix.is_none() && a.name.local_name == local_name)
        {
            Some(attr) => {
                attr.value = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn is_named(&self, local_name: &str) -> bool {
        self.name.prefix.is_none() && self.name.local_name == local_name
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First child element named `local_name`.
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.is_named(local_name))
    }

    pub fn child_mut(&mut self, local_name: &str) -> Option<&mut Element> {
        self.child_elements_mut().find(|e| e.is_named(local_name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    /// Comments and processing instructions ahead of the root
    pub prolog: Vec<Node>,
    pub root: Element,
    /// Comments and processing instructions after the root
    pub epilog: Vec<Node>,
}

impl XmlDocument {
    /// Parse a complete document.
    pub fn parse(source: &[u8]) -> Result<Self, String> {
        let reader = ParserConfig::new()
            .trim_whitespace(false)
            .whitespace_to_characters(true)
            .cdata_to_characters(false)
            .ignore_comments(false)
            .coalesce_characters(true)
            .create_reader(source);

        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root: Option<Element> = None;
        let mut open: Vec<Element> = Vec::new();
        let mut scopes: Vec<Namespace> = Vec::new();

        for event in reader {
            let event = event.map_err(|e| format!("XML Parser Error: {}", e))?;
            let node = match event {
                ReaderEvent::StartDocument { .. } => continue,
                ReaderEvent::EndDocument => break,
                ReaderEvent::StartElement {
                    name,
                    attributes,
                    namespace,
                } => {
                    if root.is_some() {
                        return Err(format!(
                            "XML Parse Error: Expected end of document. Instead found: <{}>",
                            name
                        ));
                    }
                    let namespaces = declared_namespaces(&namespace, scopes.last());
                    scopes.push(namespace);
                    open.push(Element {
                        name,
                        attributes,
                        namespaces,
                        children: Vec::new(),
                    });
                    continue;
                }
                ReaderEvent::EndElement { name } => {
                    scopes.pop();
                    let element = open.pop().ok_or_else(|| {
                        format!("XML Parse Error: Unexpected </{}>", name)
                    })?;
                    match open.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(element)),
                        None => root = Some(element),
                    }
                    continue;
                }
                ReaderEvent::Characters(text) | ReaderEvent::Whitespace(text) => {
                    // Text outside the root can only be insignificant whitespace.
                    if open.is_empty() {
                        continue;
                    }
                    Node::Text(text)
                }
                ReaderEvent::CData(text) => Node::CData(text),
                ReaderEvent::Comment(text) => Node::Comment(text),
                ReaderEvent::ProcessingInstruction { name, data } => {
                    Node::ProcessingInstruction { name, data }
                }
                // DOCTYPE declarations are not retained
                #[allow(unreachable_patterns)]
                _ => continue,
            };

            match (open.last_mut(), root.is_some()) {
                (Some(parent), _) => parent.children.push(node),
                (None, false) => prolog.push(node),
                (None, true) => epilog.push(node),
            }
        }

        let root = root.ok_or_else(|| "XML Parse Error: Document has no root element".to_string())?;
        Ok(Self {
            prolog,
            root,
            epilog,
        })
    }

    /// Serialize with [`XML_HEADER`] in front.
    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        let mut out = Vec::from(XML_HEADER.as_bytes());
        {
            let mut writer = EmitterConfig::new()
                .write_document_declaration(false)
                .perform_indent(false)
                .normalize_empty_elements(true)
                .autopad_comments(false)
                .create_writer(&mut out);

            for node in &self.prolog {
                write_node(&mut writer, node)?;
            }
            write_element(&mut writer, &self.root)?;
            for node in &self.epilog {
                write_node(&mut writer, node)?;
            }
        }
        out.push(b'\n');
        Ok(out)
    }
}

/// Bindings in `scope` that its parent scope does not already provide.
fn declared_namespaces(scope: &Namespace, parent: Option<&Namespace>) -> Vec<(String, String)> {
    scope
        .0
        .iter()
        .filter(|(prefix, _)| prefix.as_str() != NS_XML_PREFIX && prefix.as_str() != NS_XMLNS_PREFIX)
        .filter(|(prefix, uri)| {
            let inherited = parent.and_then(|p| p.0.get(prefix.as_str()));
            match inherited {
                Some(previous) => previous != *uri,
                None => !uri.is_empty(),
            }
        })
        .map(|(prefix, uri)| (prefix.clone(), uri.clone()))
        .collect()
}

fn write_node<W: Write>(writer: &mut EventWriter<W>, node: &Node) -> Result<(), String> {
    let result = match node {
        Node::Element(element) => return write_element(writer, element),
        Node::Text(text) => writer.write(WriterEvent::characters(text)),
        Node::CData(text) => writer.write(WriterEvent::cdata(text)),
        Node::Comment(text) => writer.write(WriterEvent::comment(text)),
        Node::ProcessingInstruction { name, data } => {
            writer.write(WriterEvent::processing_instruction(name, data.as_deref()))
        }
    };
    result.map_err(|e| format!("XML Writer Error: {}", e))
}

fn write_element<W: Write>(writer: &mut EventWriter<W>, element: &Element) -> Result<(), String> {
    let mut start = WriterEvent::start_element(element.name.borrow());
    for (prefix, uri) in &element.namespaces {
        start = if prefix.is_empty() {
            start.default_ns(uri.as_str())
        } else {
            start.ns(prefix.as_str(), uri.as_str())
        };
    }
    for attr in &element.attributes {
        start = start.attr(attr.name.borrow(), &attr.value);
    }
    writer
        .write(start)
        .map_err(|e| format!("XML Writer Error: {}", e))?;

    for child in &element.children {
        write_node(writer, child)?;
    }

    writer
        .write(WriterEvent::end_element())
        .map_err(|e| format!("XML Writer Error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(source: &str) -> XmlDocument {
        let doc = XmlDocument::parse(source.as_bytes()).unwrap();
        let bytes = doc.to_bytes().unwrap();
        let reparsed = XmlDocument::parse(&bytes).unwrap();
        assert_eq!(doc, reparsed, "serialized form:\n{}", String::from_utf8_lossy(&bytes));
        reparsed
    }

    #[test]
    fn test_parse_tree() {
        let doc = XmlDocument::parse(
            br#"<?xml version="1.0" encoding="utf-8"?>
<configuration>
  <appSettings>
    <add key="a" value="1"/>
  </appSettings>
</configuration>"#,
        )
        .unwrap();

        assert!(doc.root.is_named("configuration"));
        let settings = doc.root.child("appSettings").unwrap();
        let add = settings.child("add").unwrap();
        assert_eq!(add.attr("key"), Some("a"));
        assert_eq!(add.attr("value"), Some("1"));
        assert_eq!(add.attr("missing"), None);
        assert!(doc.prolog.is_empty());
    }

    #[test]
    fn test_serialize_starts_with_header() {
        let doc = XmlDocument::parse(b"<configuration/>").unwrap();
        let text = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
        assert!(text.starts_with(XML_HEADER));
        assert!(text.contains("<configuration"));
    }

    #[test]
    fn test_roundtrip_preserves_unknown_nodes() {
        let doc = roundtrip(
            r#"<?xml version="1.0"?>
<!-- managed by hand -->
<configuration>
  <configSections>
    <section name="log4net" type="log4net.Config.Log4NetConfigurationSectionHandler, log4net"/>
  </configSections>
  <?custom-pi some data?>
  <appSettings>
    <!-- where packages land -->
    <add key="PackagesFolder" value="C:\packages"/>
  </appSettings>
  <script><![CDATA[if (a < b) { go(); }]]></script>
  <note>fish &amp; chips</note>
</configuration>"#,
        );

        assert_eq!(doc.prolog, vec![Node::Comment(" managed by hand ".to_string())]);
        let script = doc.root.child("script").unwrap();
        assert_eq!(
            script.children,
            vec![Node::CData("if (a < b) { go(); }".to_string())]
        );
        let note = doc.root.child("note").unwrap();
        assert_eq!(note.children, vec![Node::Text("fish & chips".to_string())]);
        assert!(doc
            .root
            .children
            .iter()
            .any(|n| matches!(n, Node::ProcessingInstruction { name, .. } if name == "custom-pi")));
    }

    #[test]
    fn test_roundtrip_preserves_namespaces() {
        let doc = roundtrip(
            r#"<configuration xmlns:x="urn:extra">
  <runtime>
    <assemblyBinding xmlns="urn:schemas-microsoft-com:asm.v1">
      <dependentAssembly x:flag="1"/>
    </assemblyBinding>
  </runtime>
</configuration>"#,
        );

        assert_eq!(
            doc.root.namespaces,
            vec![("x".to_string(), "urn:extra".to_string())]
        );
        let binding = doc
            .root
            .child("runtime")
            .unwrap()
            .child_elements()
            .next()
            .unwrap();
        assert_eq!(
            binding.namespaces,
            vec![(String::new(), "urn:schemas-microsoft-com:asm.v1".to_string())]
        );
        let dependent = binding.child_elements().next().unwrap();
        assert!(dependent.namespaces.is_empty());
    }

    #[test]
    fn test_roundtrip_escapes_attribute_values() {
        let doc = roundtrip(r#"<configuration a="x &lt; &quot;y&quot; &amp; z"/>"#);
        assert_eq!(doc.root.attr("a"), Some(r#"x < "y" & z"#));
    }

    #[test]
    fn test_set_attr_keeps_order() {
        let mut doc = XmlDocument::parse(br#"<add key="k" value="v" extra="e"/>"#).unwrap();
        assert!(doc.root.set_attr("value", "w"));
        assert!(!doc.root.set_attr("absent", "w"));

        let names: Vec<&str> = doc
            .root
            .attributes
            .iter()
            .map(|a| a.name.local_name.as_str())
            .collect();
        assert_eq!(names, vec!["key", "value", "extra"]);
        assert_eq!(doc.root.attr("value"), Some("w"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(XmlDocument::parse(b"").is_err());
        assert!(XmlDocument::parse(b"<configuration>").is_err());
        assert!(XmlDocument::parse(b"<a></b>").is_err());
        assert!(XmlDocument::parse(b"not xml at all").is_err());
    }
}
