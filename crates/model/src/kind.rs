use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// The kind of an API tree node.
///
/// The discriminants are the ordinals used by index documents and by the
/// binary catalog; they must never be reordered.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiKind {
    Namespace = 0,
    Interface = 1,
    Delegate = 2,
    Enum = 3,
    Struct = 4,
    Class = 5,
    Field = 6,
    Constructor = 7,
    Destructor = 8,
    Property = 9,
    Method = 10,
    Operator = 11,
    Event = 12,
    PropertyGetter = 13,
    PropertySetter = 14,
    EventAdder = 15,
    EventRemover = 16,
    EventRaiser = 17,
}

impl ApiKind {
    pub const ALL: [ApiKind; 18] = [
        Self::Namespace,
        Self::Interface,
        Self::Delegate,
        Self::Enum,
        Self::Struct,
        Self::Class,
        Self::Field,
        Self::Constructor,
        Self::Destructor,
        Self::Property,
        Self::Method,
        Self::Operator,
        Self::Event,
        Self::PropertyGetter,
        Self::PropertySetter,
        Self::EventAdder,
        Self::EventRemover,
        Self::EventRaiser,
    ];

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal)).copied()
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn is_type(self) -> bool {
        matches!(self, Self::Interface | Self::Delegate | Self::Enum | Self::Struct | Self::Class)
    }

    /// Accessors are folded into their owning property or event.
    pub fn is_accessor(self) -> bool {
        matches!(
            self,
            Self::PropertyGetter | Self::PropertySetter | Self::EventAdder | Self::EventRemover | Self::EventRaiser
        )
    }

    /// Namespaces and every type except delegates contain other APIs.
    pub fn can_have_children(self) -> bool {
        self == Self::Namespace || (self.is_type() && self != Self::Delegate)
    }

    pub fn has_accessors(self) -> bool {
        matches!(self, Self::Property | Self::Event)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Interface => "interface",
            Self::Delegate => "delegate",
            Self::Enum => "enum",
            Self::Struct => "struct",
            Self::Class => "class",
            Self::Field => "field",
            Self::Constructor => "constructor",
            Self::Destructor => "destructor",
            Self::Property => "property",
            Self::Method => "method",
            Self::Operator => "operator",
            Self::Event => "event",
            Self::PropertyGetter => "getter",
            Self::PropertySetter => "setter",
            Self::EventAdder => "adder",
            Self::EventRemover => "remover",
            Self::EventRaiser => "raiser",
        }
    }
}

impl TryFrom<u8> for ApiKind {
    type Error = Error;
    fn try_from(ordinal: u8) -> Result<Self, Self::Error> {
        match Self::from_ordinal(ordinal) {
            Some(kind) => Ok(kind),
            None => exn::bail!(ErrorKind::InvalidApiKind(ordinal)),
        }
    }
}

impl Display for ApiKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.keyword())
    }
}
