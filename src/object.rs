//! PDF object types.
//!
//! The value model for indirect objects: scalars, strings, names, arrays,
//! dictionaries, streams, and references. Dictionaries preserve insertion
//! order so that traversal and serialization are reproducible across runs.

use bytes::Bytes;
use indexmap::IndexMap;

/// A PDF dictionary with insertion-ordered keys.
pub type Dictionary = IndexMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// The null object
    Null,
    /// `true` or `false`
    Boolean(bool),
    /// Whole number
    Integer(i64),
    /// Floating-point number
    Real(f64),
    /// Byte string; serialized in literal or hex form depending on content
    String(Vec<u8>),
    /// Name token, written with a leading slash
    Name(String),
    /// Ordered sequence of objects
    Array(Vec<Object>),
    /// Key/value table with insertion-ordered keys
    Dictionary(Dictionary),
    /// A dictionary plus an opaque byte payload
    Stream {
        /// Stream dictionary
        dict: Dictionary,
        /// Stream payload
        data: Bytes,
    },
    /// Reference to an indirect object by number and generation
    Reference(ObjectRef),
}

/// Identity of an indirect object: object number plus generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Build a reference from its number and generation.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// Generates the checked payload accessors on [`Object`]. Each one answers
/// `None` when the object holds a different variant.
macro_rules! variant_accessors {
    ($($(#[$doc:meta])* $name:ident: $variant:pat => $payload:expr, $ret:ty;)+) => {
        $(
            $(#[$doc])*
            pub fn $name(&self) -> Option<$ret> {
                if let $variant = self {
                    Some($payload)
                } else {
                    None
                }
            }
        )+
    };
}

impl Object {
    /// Borrow the key/value table. Stream objects answer with their stream
    /// dictionary, so entries like `/Length` are reachable through the same
    /// call.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(dict) | Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Borrow a stream's dictionary and payload together.
    pub fn as_stream(&self) -> Option<(&Dictionary, &Bytes)> {
        match self {
            Object::Stream { dict, data } => Some((dict, data)),
            _ => None,
        }
    }

    /// Whether this is the null object.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    variant_accessors! {
        /// The value of a `Boolean`, or `None` for any other variant.
        as_bool: Object::Boolean(value) => *value, bool;
        /// The value of an `Integer`, or `None` for any other variant.
        as_integer: Object::Integer(value) => *value, i64;
        /// The value of a `Real`, or `None` for any other variant.
        as_real: Object::Real(value) => *value, f64;
        /// The raw bytes of a `String`, or `None` for any other variant.
        as_string: Object::String(bytes) => bytes.as_slice(), &[u8];
        /// The text of a `Name`, without the leading slash, or `None` for
        /// any other variant.
        as_name: Object::Name(text) => text.as_str(), &str;
        /// The elements of an `Array`, or `None` for any other variant.
        as_array: Object::Array(items) => items.as_slice(), &[Object];
        /// The target of a `Reference`, or `None` for any other variant.
        as_reference: Object::Reference(target) => *target, ObjectRef;
    }
}
