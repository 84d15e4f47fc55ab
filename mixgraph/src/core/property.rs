//! Typed stage properties.
//!
//! Each stage declares its properties as [`PropertySpec`]s and stores the
//! current values in a [`PropertyBag`]. Values are validated against the
//! declaration on every write. Integers are coerced to bytes, and integers
//! or nicks to enum variants, so `set("target-b", 255)` and
//! `set("method", "custom")` both work.

use crate::errors::PropertyError;
use std::fmt;

/// A registered enum value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumValue {
    /// Name of the enum type, e.g. `"Pattern"`.
    pub type_name: &'static str,
    /// Numeric value.
    pub value: i32,
    /// Short lower-case name.
    pub nick: &'static str,
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.nick)
    }
}

/// Enums usable as property values.
pub trait PropertyEnum: Copy + Sized + 'static {
    /// Name of the enum type.
    const TYPE_NAME: &'static str;

    /// All variants.
    fn variants() -> &'static [Self];

    /// Numeric value of the variant.
    fn value(self) -> i32;

    /// Short name of the variant.
    fn nick(self) -> &'static str;

    /// Converts the variant into a property value.
    fn to_enum_value(self) -> EnumValue {
        EnumValue {
            type_name: Self::TYPE_NAME,
            value: self.value(),
            nick: self.nick(),
        }
    }

    /// Looks up a variant by numeric value.
    fn from_value(value: i32) -> Option<Self> {
        Self::variants().iter().copied().find(|v| v.value() == value)
    }

    /// Looks up a variant by nick.
    fn from_nick(nick: &str) -> Option<Self> {
        Self::variants()
            .iter()
            .copied()
            .find(|v| v.nick().eq_ignore_ascii_case(nick))
    }

    /// Every variant as `(value, nick)`.
    fn table() -> Vec<(i32, &'static str)> {
        Self::variants().iter().map(|v| (v.value(), v.nick())).collect()
    }
}

/// A property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Single byte, used for colour channels.
    Byte(u8),
    /// Enum variant.
    Enum(EnumValue),
    /// String.
    Str(String),
}

impl PropertyValue {
    /// Short name of the value's type.
    #[must_use]
    pub const fn type_label(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Byte(_) => "byte",
            Self::Enum(_) => "enum",
            Self::Str(_) => "string",
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Enum(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for PropertyValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u8> for PropertyValue {
    fn from(v: u8) -> Self {
        Self::Byte(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<EnumValue> for PropertyValue {
    fn from(v: EnumValue) -> Self {
        Self::Enum(v)
    }
}

/// Declared type of a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    /// Boolean.
    Bool,
    /// Integer in an inclusive range.
    Int {
        /// Minimum value.
        min: i64,
        /// Maximum value.
        max: i64,
    },
    /// Byte.
    Byte,
    /// Enum with the listed `(value, nick)` variants.
    Enum {
        /// Name of the enum type.
        type_name: &'static str,
        /// Allowed variants.
        variants: Vec<(i32, &'static str)>,
    },
    /// String.
    Str,
}

impl PropertyType {
    const fn label(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int { .. } => "int",
            Self::Byte => "byte",
            Self::Enum { .. } => "enum",
            Self::Str => "string",
        }
    }
}

/// Declaration of a single property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    /// Property name.
    pub name: &'static str,
    /// One-line description.
    pub blurb: &'static str,
    /// Value type.
    pub ty: PropertyType,
    /// Value before any write.
    pub default: PropertyValue,
    /// Whether the value may change once the graph left Idle.
    pub mutable_when_active: bool,
}

impl PropertySpec {
    /// Declares a boolean property.
    #[must_use]
    pub const fn bool(name: &'static str, blurb: &'static str, default: bool) -> Self {
        Self {
            name,
            blurb,
            ty: PropertyType::Bool,
            default: PropertyValue::Bool(default),
            mutable_when_active: false,
        }
    }

    /// Declares an integer property.
    #[must_use]
    pub const fn int(
        name: &'static str,
        blurb: &'static str,
        min: i64,
        max: i64,
        default: i64,
    ) -> Self {
        Self {
            name,
            blurb,
            ty: PropertyType::Int { min, max },
            default: PropertyValue::Int(default),
            mutable_when_active: false,
        }
    }

    /// Declares a byte property.
    #[must_use]
    pub const fn byte(name: &'static str, blurb: &'static str, default: u8) -> Self {
        Self {
            name,
            blurb,
            ty: PropertyType::Byte,
            default: PropertyValue::Byte(default),
            mutable_when_active: false,
        }
    }

    /// Declares an enum property.
    #[must_use]
    pub fn enumeration<E: PropertyEnum>(name: &'static str, blurb: &'static str, default: E) -> Self {
        Self {
            name,
            blurb,
            ty: PropertyType::Enum {
                type_name: E::TYPE_NAME,
                variants: E::table(),
            },
            default: PropertyValue::Enum(default.to_enum_value()),
            mutable_when_active: false,
        }
    }

    /// Marks the property as writable while the graph is paused or active.
    #[must_use]
    pub const fn mutable_when_active(mut self) -> Self {
        self.mutable_when_active = true;
        self
    }

    /// Validates `value` and returns it normalized to the declared type.
    ///
    /// # Errors
    ///
    /// Returns an error if the value has the wrong type, is out of range, or
    /// names an unknown enum variant.
    pub fn coerce(&self, value: PropertyValue) -> Result<PropertyValue, PropertyError> {
        let mismatch = |found: &PropertyValue| PropertyError::TypeMismatch {
            property: self.name.to_string(),
            expected: self.ty.label(),
            found: found.type_label(),
        };

        match (&self.ty, value) {
            (PropertyType::Bool, PropertyValue::Bool(v)) => Ok(PropertyValue::Bool(v)),
            (PropertyType::Str, PropertyValue::Str(v)) => Ok(PropertyValue::Str(v)),
            (PropertyType::Int { min, max }, PropertyValue::Int(v)) => {
                if v < *min || v > *max {
                    return Err(PropertyError::OutOfRange {
                        property: self.name.to_string(),
                        value: v,
                        min: *min,
                        max: *max,
                    });
                }
                Ok(PropertyValue::Int(v))
            }
            (PropertyType::Int { .. }, PropertyValue::Byte(v)) => {
                self.coerce(PropertyValue::Int(i64::from(v)))
            }
            (PropertyType::Byte, PropertyValue::Byte(v)) => Ok(PropertyValue::Byte(v)),
            (PropertyType::Byte, PropertyValue::Int(v)) => u8::try_from(v)
                .map(PropertyValue::Byte)
                .map_err(|_| PropertyError::OutOfRange {
                    property: self.name.to_string(),
                    value: v,
                    min: 0,
                    max: 255,
                }),
            (PropertyType::Enum { type_name, variants }, value) => {
                let type_name: &'static str = *type_name;
                let found = match &value {
                    PropertyValue::Enum(e) if e.type_name == type_name => {
                        variants.iter().find(|(v, _)| *v == e.value)
                    }
                    PropertyValue::Int(i) => variants.iter().find(|(v, _)| i64::from(*v) == *i),
                    PropertyValue::Str(s) => {
                        variants.iter().find(|(_, nick)| nick.eq_ignore_ascii_case(s))
                    }
                    other => return Err(mismatch(other)),
                };
                found
                    .map(|&(value, nick)| {
                        PropertyValue::Enum(EnumValue {
                            type_name,
                            value,
                            nick,
                        })
                    })
                    .ok_or_else(|| PropertyError::InvalidEnum {
                        property: self.name.to_string(),
                        type_name,
                        value: value.to_string(),
                    })
            }
            (_, other) => Err(mismatch(&other)),
        }
    }
}

/// Property values of one stage, validated against its specs.
#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    specs: Vec<PropertySpec>,
    values: Vec<PropertyValue>,
}

impl PropertyBag {
    /// Creates a bag holding each spec's default.
    #[must_use]
    pub fn new(specs: Vec<PropertySpec>) -> Self {
        let values = specs.iter().map(|s| s.default.clone()).collect();
        Self { specs, values }
    }

    /// Returns the declared specs.
    #[must_use]
    pub fn specs(&self) -> &[PropertySpec] {
        &self.specs
    }

    /// Returns the spec for `name`.
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&PropertySpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Writes a property.
    ///
    /// # Errors
    ///
    /// Returns an error if the property is unknown or the value invalid.
    pub fn set(&mut self, name: &str, value: impl Into<PropertyValue>) -> Result<(), PropertyError> {
        let idx = self
            .specs
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| PropertyError::Unknown {
                property: name.to_string(),
            })?;
        self.values[idx] = self.specs[idx].coerce(value.into())?;
        Ok(())
    }

    /// Reads a property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.specs
            .iter()
            .position(|s| s.name == name)
            .map(|idx| &self.values[idx])
    }

    /// Reads an integer property.
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Reads a byte property.
    #[must_use]
    pub fn byte(&self, name: &str) -> Option<u8> {
        match self.get(name)? {
            PropertyValue::Byte(v) => Some(*v),
            _ => None,
        }
    }

    /// Reads a boolean property.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Reads an enum property as `E`.
    #[must_use]
    pub fn enumeration<E: PropertyEnum>(&self, name: &str) -> Option<E> {
        match self.get(name)? {
            PropertyValue::Enum(v) if v.type_name == E::TYPE_NAME => E::from_value(v.value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Shade {
        Light,
        Dark,
    }

    impl PropertyEnum for Shade {
        const TYPE_NAME: &'static str = "Shade";

        fn variants() -> &'static [Self] {
            &[Self::Light, Self::Dark]
        }

        fn value(self) -> i32 {
            self as i32
        }

        fn nick(self) -> &'static str {
            match self {
                Self::Light => "light",
                Self::Dark => "dark",
            }
        }
    }

    fn bag() -> PropertyBag {
        PropertyBag::new(vec![
            PropertySpec::int("count", "how many", -1, 100, -1),
            PropertySpec::byte("red", "red channel", 0),
            PropertySpec::bool("sync", "sync to clock", true),
            PropertySpec::enumeration("shade", "shade", Shade::Light),
        ])
    }

    #[test]
    fn test_defaults() {
        let bag = bag();
        assert_eq!(bag.int("count"), Some(-1));
        assert_eq!(bag.byte("red"), Some(0));
        assert_eq!(bag.bool("sync"), Some(true));
        assert_eq!(bag.enumeration::<Shade>("shade"), Some(Shade::Light));
    }

    #[test]
    fn test_int_coerced_to_byte() {
        let mut bag = bag();
        bag.set("red", 255).unwrap();
        assert_eq!(bag.byte("red"), Some(255));

        let err = bag.set("red", 256).unwrap_err();
        assert!(matches!(err, PropertyError::OutOfRange { max: 255, .. }));
    }

    #[test]
    fn test_enum_by_value_nick_and_variant() {
        let mut bag = bag();
        bag.set("shade", 1).unwrap();
        assert_eq!(bag.enumeration::<Shade>("shade"), Some(Shade::Dark));

        bag.set("shade", "LIGHT").unwrap();
        assert_eq!(bag.enumeration::<Shade>("shade"), Some(Shade::Light));

        bag.set("shade", Shade::Dark.to_enum_value()).unwrap();
        assert_eq!(bag.enumeration::<Shade>("shade"), Some(Shade::Dark));

        let err = bag.set("shade", 7).unwrap_err();
        assert!(matches!(err, PropertyError::InvalidEnum { .. }));
    }

    #[test]
    fn test_range_and_type_errors() {
        let mut bag = bag();
        assert!(matches!(
            bag.set("count", 101).unwrap_err(),
            PropertyError::OutOfRange { value: 101, .. }
        ));
        assert!(matches!(
            bag.set("sync", 1).unwrap_err(),
            PropertyError::TypeMismatch { expected: "bool", found: "int", .. }
        ));
        assert!(matches!(
            bag.set("missing", true).unwrap_err(),
            PropertyError::Unknown { .. }
        ));
    }

    #[test]
    fn test_failed_write_keeps_previous_value() {
        let mut bag = bag();
        bag.set("count", 10).unwrap();
        let _ = bag.set("count", 1000);
        assert_eq!(bag.int("count"), Some(10));
    }
}
