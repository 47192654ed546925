//! Signal addresses (joins), values and panel identities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of signal slot an address refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Boolean,
    Numeric,
    String,
}

/// A numbered slot on a panel's signal interface
///
/// Feedback (controller → panel) and input (panel → controller) are separate
/// namespaces: the same `Address` written through the bus is feedback, the
/// same `Address` reported by a panel event is input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub kind: SignalKind,
    pub number: u32,
}

impl Address {
    pub const fn boolean(number: u32) -> Self {
        Self {
            kind: SignalKind::Boolean,
            number,
        }
    }

    pub const fn numeric(number: u32) -> Self {
        Self {
            kind: SignalKind::Numeric,
            number,
        }
    }

    pub const fn string(number: u32) -> Self {
        Self {
            kind: SignalKind::String,
            number,
        }
    }

    pub fn is_boolean(&self) -> bool {
        self.kind == SignalKind::Boolean
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            SignalKind::Boolean => "b",
            SignalKind::Numeric => "n",
            SignalKind::String => "s",
        };
        write!(f, "{}{}", prefix, self.number)
    }
}

/// Value carried by a signal slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Bool(bool),
    Numeric(u16),
    Text(String),
}

impl SignalValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SignalValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_numeric(&self) -> Option<u16> {
        match self {
            SignalValue::Numeric(n) => Some(*n),
            _ => None,
        }
    }

    /// Kind of slot this value belongs in
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalValue::Bool(_) => SignalKind::Boolean,
            SignalValue::Numeric(_) => SignalKind::Numeric,
            SignalValue::Text(_) => SignalKind::String,
        }
    }
}

/// Identity of a panel endpoint (its IP-ID or RF-ID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanelId(pub u32);

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Direction of a boolean input transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Edge {
    /// false → true
    Press,
    /// true → false
    Release,
}
