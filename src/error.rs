//! Error types for the repair pipeline.

use thiserror::Error;

/// The error type for document repair operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The input file is not valid UTF-8 text.
    #[error("the document is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Serialized output is not valid UTF-8.
    #[error("UTF-8 conversion error: {0}")]
    FromUtf8(#[from] std::string::FromUtf8Error),

    // ==================== Text Repair Errors ====================
    /// A name array lists a scoped identifier that no joint declares.
    #[error("line {line}: name array references unknown joint sid \"{sid}\"")]
    UnknownSid {
        /// The 1-based line of the name array.
        line: usize,
        /// The scoped identifier that was not found.
        sid: String,
    },

    // ==================== XML Errors ====================
    /// XML parsing or writing error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed XML attribute.
    #[error("XML attribute error: {0}")]
    XmlAttr(String),

    /// An end tag without a matching start tag, or an unclosed element.
    #[error("unbalanced XML element: {0}")]
    UnbalancedXml(String),

    /// The document has no root element.
    #[error("the document has no root element")]
    MissingRootElement,

    // ==================== COLLADA Errors ====================
    /// The document root is not a `<COLLADA>` element.
    #[error("not a COLLADA document (root element is <{0}>)")]
    NotCollada(String),

    /// The document does not contain a visual scene.
    #[error("the document has no visual scene")]
    MissingVisualScene,

    /// A `#id` reference points to an element that does not exist.
    #[error("unresolved {kind} reference \"{id}\"")]
    UnresolvedReference {
        /// The kind of element referenced.
        kind: &'static str,
        /// The referenced id, without the leading `#`.
        id: String,
    },

    /// A primitive does not declare a required input.
    #[error("{kind} {index} of geometry \"{geometry}\" has no {semantic} input")]
    MissingInput {
        /// The geometry that owns the primitive.
        geometry: String,
        /// The primitive element name.
        kind: String,
        /// The position of the primitive within the mesh.
        index: usize,
        /// The input semantic that is missing.
        semantic: &'static str,
    },

    /// A data source is missing its float array or holds unusable data.
    #[error("invalid data source \"{id}\": {message}")]
    InvalidSource {
        /// The source id.
        id: String,
        /// Description of what is invalid.
        message: String,
    },

    /// A transform element holds the wrong number of values or non-numeric values.
    #[error("invalid <{element}> transform: \"{text}\"")]
    InvalidTransform {
        /// The transform element name.
        element: String,
        /// The element text.
        text: String,
    },

    /// An element path no longer points into the document.
    #[error("element path {0:?} does not exist")]
    InvalidPath(Vec<usize>),

    // ==================== Math Errors ====================
    /// A matrix cannot be split into translation, rotation, scale and shear.
    #[error("matrix cannot be decomposed: {0}")]
    Decomposition(&'static str),
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlAttr(err.to_string())
    }
}

/// A specialized Result type for repair operations.
pub type Result<T> = std::result::Result<T, Error>;
