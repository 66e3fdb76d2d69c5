//! Property tree values and their mapping conversions.
//!
//! Requests and responses carry properties as trees of
//! [`wire::PropertyElement`]. Working with raw wire elements is clumsy, so
//! this module provides [`PropMap`], an insertion-ordered name/value mapping
//! that mirrors how the protocol consumers think about properties, plus the
//! conversions in both directions:
//!
//! - [`build_property_tree`]: mapping → wire elements
//! - [`property_tree_to_map`]: wire elements → mapping
//!
//! For any map without duplicate names at a level, lowering the built tree
//! yields the original map back, modulo the integer sign split (see
//! [`PropValue::from::<i64>`](PropValue)).

use indexmap::IndexMap;

use crate::wire;

/// Scalar property value, one variant per wire representation.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// Boolean.
    Bool(bool),
    /// Unsigned 64-bit integer.
    Uint64(u64),
    /// Signed 64-bit integer.
    Int64(i64),
    /// IEEE-754 double.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Opaque byte sequence.
    Bytes(Vec<u8>),
}

impl PropValue {
    /// Convert to the wire representation with exactly one field populated.
    #[must_use]
    pub fn to_wire(&self) -> wire::PropertyValue {
        let mut value = wire::PropertyValue::default();
        match self {
            Self::Bool(v) => value.v_bool = Some(*v),
            Self::Uint64(v) => value.v_uint64 = Some(*v),
            Self::Int64(v) => value.v_int64 = Some(*v),
            Self::Double(v) => value.v_double = Some(*v),
            Self::String(v) => value.v_string = Some(v.clone()),
            Self::Bytes(v) => value.v_bytes = Some(v.clone()),
        }
        value
    }

    /// Convert from the wire representation.
    ///
    /// Returns `None` when no field is populated (the absent value).
    /// When a peer populates several fields the first in declaration order
    /// wins.
    #[must_use]
    pub fn from_wire(value: &wire::PropertyValue) -> Option<Self> {
        if let Some(v) = value.v_bool {
            Some(Self::Bool(v))
        } else if let Some(v) = value.v_uint64 {
            Some(Self::Uint64(v))
        } else if let Some(v) = value.v_int64 {
            Some(Self::Int64(v))
        } else if let Some(v) = value.v_double {
            Some(Self::Double(v))
        } else if let Some(v) = &value.v_string {
            Some(Self::String(v.clone()))
        } else {
            value.v_bytes.as_ref().map(|v| Self::Bytes(v.clone()))
        }
    }

    /// Numeric coercion: integers widen, booleans map to 1.0/0.0, and
    /// numeric strings are parsed. `None` for bytes and non-numeric strings.
    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Uint64(v) => Some(*v as f64),
            Self::Int64(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::String(v) => v.trim().parse().ok(),
            Self::Bytes(_) => None,
        }
    }

    /// String view, `None` for non-string variants.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u64> for PropValue {
    fn from(value: u64) -> Self {
        Self::Uint64(value)
    }
}

/// Signed integers split by sign for wire compatibility: non-negative values
/// become [`PropValue::Uint64`], negative values [`PropValue::Int64`]. The
/// numeric value is preserved even though the variant tag is not.
impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        u64::try_from(value).map_or(Self::Int64(value), Self::Uint64)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<u8>> for PropValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// One entry of a [`PropMap`]: a scalar, a nested map, or nothing.
///
/// A node may carry a value, children, or neither; [`Prop::Empty`] keeps the
/// absent value distinguishable from every inhabited variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Prop {
    /// Scalar leaf.
    Value(PropValue),
    /// Nested mapping.
    Map(PropMap),
    /// Node without value or children.
    #[default]
    Empty,
}

impl From<PropValue> for Prop {
    fn from(value: PropValue) -> Self {
        Self::Value(value)
    }
}

impl From<PropMap> for Prop {
    fn from(map: PropMap) -> Self {
        Self::Map(map)
    }
}

impl From<bool> for Prop {
    fn from(value: bool) -> Self {
        Self::Value(value.into())
    }
}

impl From<u64> for Prop {
    fn from(value: u64) -> Self {
        Self::Value(value.into())
    }
}

impl From<i64> for Prop {
    fn from(value: i64) -> Self {
        Self::Value(value.into())
    }
}

impl From<f64> for Prop {
    fn from(value: f64) -> Self {
        Self::Value(value.into())
    }
}

impl From<&str> for Prop {
    fn from(value: &str) -> Self {
        Self::Value(value.into())
    }
}

impl From<String> for Prop {
    fn from(value: String) -> Self {
        Self::Value(value.into())
    }
}

impl From<Vec<u8>> for Prop {
    fn from(value: Vec<u8>) -> Self {
        Self::Value(value.into())
    }
}

/// Insertion-ordered name → property mapping.
///
/// Order is significant: siblings are emitted on the wire in insertion
/// order, and round-trips preserve it. Inserting an existing name replaces
/// the value but keeps the original position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropMap {
    entries: IndexMap<String, Prop>,
}

impl PropMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, name: impl Into<String>, prop: impl Into<Prop>) {
        self.entries.insert(name.into(), prop.into());
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, prop: impl Into<Prop>) -> Self {
        self.insert(name, prop);
        self
    }

    /// Entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Prop> {
        self.entries.get(name)
    }

    /// Scalar value by name; `None` if absent or not a scalar.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&PropValue> {
        match self.get(name)? {
            Prop::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Nested map by name; `None` if absent or not a map.
    #[must_use]
    pub fn map(&self, name: &str) -> Option<&PropMap> {
        match self.get(name)? {
            Prop::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Insert all entries of `other`, replacing on name collision.
    pub fn merge(&mut self, other: PropMap) {
        self.entries.extend(other.entries);
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Prop)> {
        self.entries.iter().map(|(name, prop)| (name.as_str(), prop))
    }
}

impl FromIterator<(String, Prop)> for PropMap {
    fn from_iter<I: IntoIterator<Item = (String, Prop)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for PropMap {
    type Item = (String, Prop);
    type IntoIter = indexmap::map::IntoIter<String, Prop>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Build wire elements from a mapping, preserving entry order.
#[must_use]
pub fn build_property_tree(map: &PropMap) -> Vec<wire::PropertyElement> {
    map.iter()
        .map(|(name, prop)| {
            let mut element = wire::PropertyElement {
                name: Some(name.to_owned()),
                ..wire::PropertyElement::default()
            };
            match prop {
                Prop::Value(value) => element.value = Some(value.to_wire()),
                Prop::Map(children) => element.elements = build_property_tree(children),
                Prop::Empty => {}
            }
            element
        })
        .collect()
}

/// Lower wire elements back into a mapping, preserving sibling order.
///
/// An element with children lowers to a nested map (its own value, if any,
/// is ignored); a childless element lowers to its scalar or [`Prop::Empty`].
#[must_use]
pub fn property_tree_to_map(elements: &[wire::PropertyElement]) -> PropMap {
    elements
        .iter()
        .map(|element| {
            let name = element.name.clone().unwrap_or_default();
            let prop = if element.elements.is_empty() {
                element
                    .value
                    .as_ref()
                    .and_then(PropValue::from_wire)
                    .map_or(Prop::Empty, Prop::Value)
            } else {
                Prop::Map(property_tree_to_map(&element.elements))
            };
            (name, prop)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_order_and_values() {
        let map = PropMap::new()
            .with("dSUID", "00AA")
            .with("name", "Living Room Light")
            .with(
                "output",
                PropMap::new().with("value", 75.0).with("mode", 1_u64),
            )
            .with("enabled", true);

        let tree = build_property_tree(&map);
        assert_eq!(tree.len(), 4);
        assert_eq!(tree[0].name.as_deref(), Some("dSUID"));
        assert_eq!(tree[2].name.as_deref(), Some("output"));
        assert_eq!(tree[2].elements.len(), 2);

        assert_eq!(property_tree_to_map(&tree), map);
    }

    #[test]
    fn signed_integers_split_by_sign() {
        assert_eq!(PropValue::from(5_i64), PropValue::Uint64(5));
        assert_eq!(PropValue::from(0_i64), PropValue::Uint64(0));
        assert_eq!(PropValue::from(-5_i64), PropValue::Int64(-5));
    }

    #[test]
    fn empty_node_survives_round_trip() {
        let map = PropMap::new().with("hole", Prop::Empty).with("after", 1_u64);
        let tree = build_property_tree(&map);

        assert!(tree[0].value.is_none());
        assert!(tree[0].elements.is_empty());
        assert_eq!(property_tree_to_map(&tree), map);
    }

    #[test]
    fn valueless_wire_value_lowers_to_empty() {
        let element = wire::PropertyElement {
            name: Some("blank".to_owned()),
            value: Some(wire::PropertyValue::default()),
            elements: Vec::new(),
        };

        let map = property_tree_to_map(&[element]);
        assert_eq!(map.get("blank"), Some(&Prop::Empty));
    }

    #[test]
    fn double_coercion_matches_loose_typing() {
        assert_eq!(PropValue::Double(4.5).as_double(), Some(4.5));
        assert_eq!(PropValue::Uint64(3).as_double(), Some(3.0));
        assert_eq!(PropValue::Int64(-3).as_double(), Some(-3.0));
        assert_eq!(PropValue::Bool(true).as_double(), Some(1.0));
        assert_eq!(PropValue::String(" 12.5 ".to_owned()).as_double(), Some(12.5));
        assert_eq!(PropValue::String("bright".to_owned()).as_double(), None);
        assert_eq!(PropValue::Bytes(vec![1]).as_double(), None);
    }

    #[test]
    fn insert_replaces_but_keeps_position() {
        let mut map = PropMap::new().with("a", 1_u64).with("b", 2_u64);
        map.insert("a", 9_u64);

        let names: Vec<_> = map.iter().map(|(name, _)| name.to_owned()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(map.value("a"), Some(&PropValue::Uint64(9)));
    }
}
