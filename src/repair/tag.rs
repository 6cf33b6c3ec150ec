use std::ops::Range;

use super::SidTable;

/// An attribute of a [`StartTag`], borrowed from the markup token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: &'a str,
    /// The raw attribute value, without quotes. Entities are not decoded.
    pub value: &'a str,
    /// The byte range of the value within the markup token.
    pub span: Range<usize>,
}

/// An opening (or self-closing) tag split into its element name and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag<'a> {
    pub name: &'a str,
    pub attributes: Vec<Attribute<'a>>,
}

impl<'a> StartTag<'a> {
    /// Parses a markup token. Returns `None` for end tags, comments, declarations,
    /// processing instructions and anything with malformed attribute syntax.
    pub fn parse(markup: &'a str) -> Option<Self> {
        let inner = markup.strip_prefix('<')?.strip_suffix('>')?;
        let inner = inner.strip_suffix('/').unwrap_or(inner);

        let name_len = inner
            .find(|c: char| c.is_ascii_whitespace())
            .unwrap_or(inner.len());
        let name = &inner[..name_len];
        if !is_name(name) {
            return None;
        }

        let mut attributes = Vec::new();
        // Offsets are relative to `markup`, which has the leading `<`.
        let mut offset = 1 + name_len;
        let mut rest = &inner[name_len..];
        loop {
            let trimmed = rest.trim_start();
            offset += rest.len() - trimmed.len();
            rest = trimmed;
            if rest.is_empty() {
                break;
            }

            let equals = rest.find('=')?;
            let key = rest[..equals].trim_end();
            if !is_name(key) {
                return None;
            }

            let after_equals = &rest[equals + 1..];
            let value_part = after_equals.trim_start();
            let quote = value_part.chars().next()?;
            if quote != '"' && quote != '\'' {
                return None;
            }
            let value_len = value_part[1..].find(quote)?;

            let value_start =
                offset + equals + 1 + (after_equals.len() - value_part.len()) + quote.len_utf8();
            attributes.push(Attribute {
                name: key,
                value: &value_part[1..1 + value_len],
                span: value_start..value_start + value_len,
            });

            let consumed = rest.len() - value_part.len() + 1 + value_len + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }

        Some(Self { name, attributes })
    }

    /// Returns the first attribute with the given name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute<'a>> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }
}

fn is_name(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

/// The identifying attributes of a joint node, as found in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointAttributes {
    pub kind: String,
    pub id: String,
    pub name: String,
    pub sid: String,
}

/// The outcome of matching a markup token against the joint node shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JointTag {
    /// Not a `<node>` opening tag with `type="JOINT"`.
    NotAJoint,
    /// A joint node tag that lacks one of the attributes needed to repair it.
    MissingAttribute(&'static str),
    /// A joint node tag, with `id` and `sid` replaced by the value of `name`.
    Joint {
        attributes: JointAttributes,
        repaired: String,
    },
}

/// Matches a joint node opening tag and rewrites its `id` and `sid` values to its `name`.
///
/// Every other byte of the token is kept, including the `name` attribute itself.
pub fn parse_joint_tag(markup: &str) -> JointTag {
    let tag = match StartTag::parse(markup) {
        Some(tag) if tag.name == "node" => tag,
        _ => return JointTag::NotAJoint,
    };
    let kind = match tag.attribute("type") {
        Some(kind) if kind.value.eq_ignore_ascii_case("joint") => kind,
        _ => return JointTag::NotAJoint,
    };
    let (id, name, sid) = match (
        tag.attribute("id"),
        tag.attribute("name"),
        tag.attribute("sid"),
    ) {
        (Some(id), Some(name), Some(sid)) => (id, name, sid),
        (None, _, _) => return JointTag::MissingAttribute("id"),
        (_, None, _) => return JointTag::MissingAttribute("name"),
        (_, _, None) => return JointTag::MissingAttribute("sid"),
    };

    // Splice from the back so the earlier span stays valid.
    let mut spans = [id.span.clone(), sid.span.clone()];
    spans.sort_by(|a, b| b.start.cmp(&a.start));
    let mut repaired = markup.to_string();
    for span in spans {
        repaired.replace_range(span, name.value);
    }

    JointTag::Joint {
        attributes: JointAttributes {
            kind: kind.value.to_string(),
            id: id.value.to_string(),
            name: name.value.to_string(),
            sid: sid.value.to_string(),
        },
        repaired,
    }
}

/// A name array entry that has no joint with a matching sid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSid(pub String);

/// Rewrites the content of a `<name_array>` element through the sid table.
///
/// Returns `Ok(None)` if `markup` does not open a name array. Entries are joined with single
/// spaces; whitespace before the first and after the last entry is kept.
pub fn parse_name_array_tag(
    markup: &str,
    content: &str,
    table: &SidTable,
) -> Result<Option<String>, MissingSid> {
    match StartTag::parse(markup) {
        Some(tag) if tag.name.eq_ignore_ascii_case("name_array") => {}
        _ => return Ok(None),
    }

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(Some(content.to_string()));
    }
    let start = content.len() - content.trim_start().len();
    let end = start + trimmed.len();

    let names = trimmed
        .split_whitespace()
        .map(|sid| table.get(sid).ok_or_else(|| MissingSid(sid.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(format!(
        "{}{}{}",
        &content[..start],
        names.join(" "),
        &content[end..]
    )))
}
