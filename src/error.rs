use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeclarationError {
    #[error("XML syntax error: {0}")]
    XmlSyntax(String),

    #[error("XML declaration is missing required section: {0}")]
    MissingXmlSection(&'static str),

    #[error("Unsupported XML declaration: only VAT and corporate-tax schemas are recognised")]
    UnsupportedXml,

    #[error("Expected a {expected} declaration but the document is a {found} declaration")]
    WrongDocumentKind { expected: String, found: String },

    #[error("Could not determine the declaration type of the document")]
    UnknownDocumentKind,

    #[error("Document does not contain any extractable text")]
    EmptyDocument,

    #[error("Invalid chart-of-accounts registry: {0}")]
    InvalidRegistry(String),

    #[error("Invalid configuration value for {field}: {details}")]
    InvalidConfig { field: &'static str, details: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DeclarationError>;
