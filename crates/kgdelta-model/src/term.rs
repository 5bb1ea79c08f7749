//! RDF-shaped term model, sufficient for comparison.
//!
//! Entities are identified by IRI or blank-node label; blank labels are only
//! meaningful within one dataset, so cross-dataset identity always goes
//! through the correspondence engine, never through label equality.

use serde::{Deserialize, Serialize};

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
pub const XSD_FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

/// Datatypes whose value space is a subset of xsd:decimal.
const XSD_DECIMAL_FAMILY: &[&str] = &[
    "http://www.w3.org/2001/XMLSchema#decimal",
    "http://www.w3.org/2001/XMLSchema#integer",
    "http://www.w3.org/2001/XMLSchema#nonNegativeInteger",
    "http://www.w3.org/2001/XMLSchema#nonPositiveInteger",
    "http://www.w3.org/2001/XMLSchema#negativeInteger",
    "http://www.w3.org/2001/XMLSchema#positiveInteger",
    "http://www.w3.org/2001/XMLSchema#long",
    "http://www.w3.org/2001/XMLSchema#int",
    "http://www.w3.org/2001/XMLSchema#short",
    "http://www.w3.org/2001/XMLSchema#byte",
    "http://www.w3.org/2001/XMLSchema#unsignedLong",
    "http://www.w3.org/2001/XMLSchema#unsignedInt",
    "http://www.w3.org/2001/XMLSchema#unsignedShort",
    "http://www.w3.org/2001/XMLSchema#unsignedByte",
];

/// A node that can carry identity: an IRI or a blank node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityTerm {
    Iri(String),
    Blank(String),
}

impl EntityTerm {
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::Iri(iri.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Self::Blank(label.into())
    }
}

impl std::fmt::Display for EntityTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityTerm::Iri(iri) => write!(f, "<{iri}>"),
            EntityTerm::Blank(label) => write!(f, "_:{label}"),
        }
    }
}

/// An RDF literal: lexical form plus datatype IRI or language tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub datatype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Literal {
    pub fn string(lexical: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: XSD_STRING.to_string(),
            language: None,
        }
    }

    pub fn lang_string(lexical: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: RDF_LANG_STRING.to_string(),
            language: Some(language.into()),
        }
    }

    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: datatype.into(),
            language: None,
        }
    }

    /// Language tag, or `""` for plain/typed strings without one.
    pub fn language_tag(&self) -> &str {
        self.language.as_deref().unwrap_or("")
    }

    /// xsd:string or rdf:langString.
    pub fn is_string_like(&self) -> bool {
        self.datatype == XSD_STRING || self.datatype == RDF_LANG_STRING
    }

    pub fn is_date(&self) -> bool {
        self.datatype == XSD_DATE
    }

    pub fn is_date_time(&self) -> bool {
        self.datatype == XSD_DATE_TIME
    }

    /// In the xsd:decimal family (arbitrary-precision value space).
    pub fn is_decimal_family(&self) -> bool {
        XSD_DECIMAL_FAMILY.contains(&self.datatype.as_str())
    }

    pub fn is_float(&self) -> bool {
        self.datatype == XSD_FLOAT
    }

    pub fn is_double(&self) -> bool {
        self.datatype == XSD_DOUBLE
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.language {
            Some(lang) => write!(f, "\"{}\"@{lang}", self.lexical),
            None if self.datatype == XSD_STRING => write!(f, "\"{}\"", self.lexical),
            None => write!(f, "\"{}\"^^<{}>", self.lexical, self.datatype),
        }
    }
}

/// A variable binding: either an entity reference or a literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Entity(EntityTerm),
    Literal(Literal),
}

impl Value {
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::Entity(EntityTerm::iri(iri))
    }

    pub fn as_entity(&self) -> Option<&EntityTerm> {
        match self {
            Value::Entity(term) => Some(term),
            Value::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Value::Entity(_) => None,
            Value::Literal(literal) => Some(literal),
        }
    }

    pub fn is_entity(&self) -> bool {
        matches!(self, Value::Entity(_))
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Entity(term) => term.fmt(f),
            Value::Literal(literal) => literal.fmt(f),
        }
    }
}

impl From<EntityTerm> for Value {
    fn from(term: EntityTerm) -> Self {
        Value::Entity(term)
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        Value::Literal(literal)
    }
}
