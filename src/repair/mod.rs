//! Text-level repair of joint identifiers.
//!
//! The exporter gives joint nodes generated `id`/`sid` values that the import pipeline cannot
//! match against bone names. The repair rewrites every joint node so its `id` and `sid` equal
//! its `name`, then rewrites every `name_array` through the original `sid` to `name` mapping.
//!
//! The work is split in two passes over the text. The first pass rewrites the joint tags and
//! builds the [`SidTable`]; the second consumes the finished table, so a name array that comes
//! before the joints it lists still resolves.

use std::collections::HashMap;

use crate::error::{Error, Result};

pub use self::{
    tag::{parse_joint_tag, parse_name_array_tag, JointAttributes, JointTag, MissingSid, StartTag},
    token::{join, tokenize, Token},
};

mod tag;
mod token;

/// Maps the original `sid` of every joint node to its `name`. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SidTable {
    entries: HashMap<String, String>,
}

impl SidTable {
    pub fn builder() -> SidTableBuilder {
        SidTableBuilder::default()
    }

    /// Returns the joint name for a scoped identifier.
    pub fn get(&self, sid: &str) -> Option<&str> {
        self.entries.get(sid).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects joint entries while the first pass runs.
#[derive(Debug, Default)]
pub struct SidTableBuilder {
    entries: HashMap<String, String>,
}

impl SidTableBuilder {
    pub fn insert(&mut self, sid: impl Into<String>, name: impl Into<String>) {
        let (sid, name) = (sid.into(), name.into());
        if let Some(previous) = self.entries.get(&sid) {
            if *previous != name {
                tracing::warn!(
                    "Joint sid \"{}\" is declared twice (\"{}\", then \"{}\"); keeping the last one",
                    sid,
                    previous,
                    name
                );
            }
        }
        self.entries.insert(sid, name);
    }

    pub fn build(self) -> SidTable {
        SidTable {
            entries: self.entries,
        }
    }
}

/// The tokenized document, one token list per line.
pub type WorkingCopy = Vec<Vec<Token>>;

/// First pass: tokenizes every line, rewrites joint node tags and records each joint's sid.
pub fn scan_joints(text: &str) -> (WorkingCopy, SidTable) {
    let mut table = SidTable::builder();

    let lines = text
        .split_inclusive('\n')
        .enumerate()
        .map(|(index, line)| {
            tokenize(line)
                .into_iter()
                .map(|token| match token {
                    Token::Markup(markup) => match parse_joint_tag(&markup) {
                        JointTag::Joint {
                            attributes,
                            repaired,
                        } => {
                            tracing::debug!(
                                "Joint \"{}\": id \"{}\" and sid \"{}\" renamed",
                                attributes.name,
                                attributes.id,
                                attributes.sid
                            );
                            table.insert(attributes.sid, attributes.name);
                            Token::Markup(repaired)
                        }
                        JointTag::MissingAttribute(attribute) => {
                            tracing::debug!(
                                "Line {}: joint node without a {} attribute left as is",
                                index + 1,
                                attribute
                            );
                            Token::Markup(markup)
                        }
                        JointTag::NotAJoint => Token::Markup(markup),
                    },
                    content => content,
                })
                .collect()
        })
        .collect();

    (lines, table.build())
}

/// Second pass: rewrites the content that follows every `name_array` opening tag and joins the
/// lines back into text.
pub fn rewrite_name_arrays(lines: WorkingCopy, table: &SidTable) -> Result<String> {
    let mut output = String::new();

    for (index, mut tokens) in lines.into_iter().enumerate() {
        for position in 1..tokens.len() {
            let (head, tail) = tokens.split_at_mut(position);
            if let (Token::Markup(markup), Token::Content(content)) =
                (&head[position - 1], &mut tail[0])
            {
                let repaired = parse_name_array_tag(markup, content, table).map_err(
                    |MissingSid(sid)| Error::UnknownSid {
                        line: index + 1,
                        sid,
                    },
                )?;
                if let Some(repaired) = repaired {
                    *content = repaired;
                }
            }
        }
        output.push_str(&join(&tokens));
    }

    Ok(output)
}

/// Runs both repair passes over a whole document.
pub fn repair_document(text: &str) -> Result<String> {
    let (lines, table) = scan_joints(text);
    tracing::info!("Found {} joints across {} lines", table.len(), lines.len());

    rewrite_name_arrays(lines, &table)
}
