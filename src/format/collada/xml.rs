use std::io::Write;

use quick_xml::{
    events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};

use crate::error::{Error, Result};

/// A node of the element tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(Element),
    /// Unescaped character data, whitespace included.
    Text(String),
    CData(String),
    Comment(String),
    /// The `<?xml ... ?>` declaration, without the delimiters.
    Declaration(String),
    Instruction(String),
    DocType(String),
}

/// An XML element with its attributes kept in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    /// Unescaped attribute values.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut element = Self::new(name);
        element.set_text(text);
        element
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(name, _)| name == key) {
            Some((_, old)) => *old = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    /// Iterates over the child elements, with their index in `children`.
    pub fn elements(&self) -> impl Iterator<Item = (usize, &Element)> {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(index, node)| match node {
                XmlNode::Element(element) => Some((index, element)),
                _ => None,
            })
    }

    /// Returns the first child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements()
            .map(|(_, element)| element)
            .find(|element| element.name == name)
    }

    pub fn children_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Element> + 'n
    where
        'a: 'n,
    {
        self.elements()
            .map(|(_, element)| element)
            .filter(move |element| element.name == name)
    }

    /// The concatenated text and CDATA content of the element.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(text) | XmlNode::CData(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replaces all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![XmlNode::Text(text.into())];
    }

    /// Follows a path of `children` indices down the tree.
    pub fn descendant(&self, path: &[usize]) -> Option<&Element> {
        path.iter().try_fold(self, |element, &index| {
            match element.children.get(index)? {
                XmlNode::Element(child) => Some(child),
                _ => None,
            }
        })
    }

    pub fn descendant_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        path.iter().try_fold(self, |element, &index| {
            match element.children.get_mut(index)? {
                XmlNode::Element(child) => Some(child),
                _ => None,
            }
        })
    }

    /// Finds the element with the given `id` attribute, depth-first. Returns its path.
    pub fn find_id(&self, id: &str) -> Option<Vec<usize>> {
        self.find(&|element| element.attribute("id") == Some(id))
    }

    /// Finds the element named `name` with the given `id` attribute, depth-first. Elements of
    /// other names that share the `id` are skipped.
    pub fn find_named_id(&self, name: &str, id: &str) -> Option<Vec<usize>> {
        self.find(&|element| element.name == name && element.attribute("id") == Some(id))
    }

    fn find(&self, predicate: &dyn Fn(&Element) -> bool) -> Option<Vec<usize>> {
        if predicate(self) {
            return Some(Vec::new());
        }
        self.elements().find_map(|(index, child)| {
            child.find(predicate).map(|mut path| {
                path.insert(0, index);
                path
            })
        })
    }
}

/// A parsed XML document: the root element plus the nodes around it (declaration, comments,
/// whitespace).
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub prolog: Vec<XmlNode>,
    pub root: Element,
    pub epilog: Vec<XmlNode>,
}

impl XmlDocument {
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        reader.trim_text(false);

        let mut nodes = Vec::new();
        let mut stack: Vec<Element> = Vec::new();

        loop {
            let node = match reader.read_event()? {
                Event::Start(start) => {
                    stack.push(start_element(&start)?);
                    continue;
                }
                Event::End(end) => match stack.pop() {
                    Some(element) => XmlNode::Element(element),
                    None => {
                        return Err(Error::UnbalancedXml(lossy(end.name().as_ref())));
                    }
                },
                Event::Empty(start) => XmlNode::Element(start_element(&start)?),
                Event::Text(text) => XmlNode::Text(text.unescape()?.into_owned()),
                Event::CData(data) => XmlNode::CData(lossy(&data)),
                Event::Comment(comment) => XmlNode::Comment(lossy(&comment)),
                Event::Decl(declaration) => XmlNode::Declaration(lossy(&declaration)),
                Event::PI(instruction) => XmlNode::Instruction(lossy(&instruction)),
                Event::DocType(doctype) => XmlNode::DocType(lossy(&doctype)),
                Event::Eof => break,
            };

            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => nodes.push(node),
            }
        }

        if let Some(element) = stack.pop() {
            return Err(Error::UnbalancedXml(element.name));
        }

        let position = nodes
            .iter()
            .position(|node| matches!(node, XmlNode::Element(_)))
            .ok_or(Error::MissingRootElement)?;
        let epilog = nodes.split_off(position + 1);
        let root = match nodes.pop() {
            Some(XmlNode::Element(root)) => root,
            _ => return Err(Error::MissingRootElement),
        };

        Ok(Self {
            prolog: nodes,
            root,
            epilog,
        })
    }

    pub fn write(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.prolog {
            write_node(&mut writer, node)?;
        }
        write_element(&mut writer, &self.root)?;
        for node in &self.epilog {
            write_node(&mut writer, node)?;
        }

        Ok(String::from_utf8(writer.into_inner())?)
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn start_element(start: &BytesStart) -> Result<Element> {
    let mut element = Element::new(lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute?;
        element.attributes.push((
            lossy(attribute.key.as_ref()),
            attribute.unescape_value()?.into_owned(),
        ));
    }

    Ok(element)
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
    } else {
        writer.write_event(Event::Start(start))?;
        for child in &element.children {
            write_node(writer, child)?;
        }
        writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    }

    Ok(())
}

fn write_node<W: Write>(writer: &mut Writer<W>, node: &XmlNode) -> Result<()> {
    match node {
        XmlNode::Element(element) => write_element(writer, element)?,
        XmlNode::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
        XmlNode::CData(data) => writer.write_event(Event::CData(BytesCData::new(data.as_str())))?,
        XmlNode::Comment(comment) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))?
        }
        XmlNode::Declaration(declaration) => writer.write_event(Event::Decl(
            BytesDecl::from_start(BytesStart::from_content(declaration.as_str(), 3)),
        ))?,
        XmlNode::Instruction(instruction) => {
            writer.write_event(Event::PI(BytesText::from_escaped(instruction.as_str())))?
        }
        XmlNode::DocType(doctype) => {
            writer.write_event(Event::DocType(BytesText::from_escaped(doctype.as_str())))?
        }
    }

    Ok(())
}
