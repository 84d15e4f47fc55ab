//! Alpha keying filter.

use super::{Port, Stage, ALPHA_KEY};
use crate::core::{Caps, Frame, PropertyBag, PropertyEnum, PropertySpec, VideoFormat};
use crate::errors::StageError;
use serde::{Deserialize, Serialize};

/// How [`AlphaKey`] computes transparency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlphaMethod {
    /// Apply the `alpha` value to every pixel.
    Set = 0,
    /// Key out pure green.
    Green = 1,
    /// Key out pure blue.
    Blue = 2,
    /// Key out the colour given by `target-r`, `target-g` and `target-b`.
    Custom = 3,
}

impl PropertyEnum for AlphaMethod {
    const TYPE_NAME: &'static str = "AlphaMethod";

    fn variants() -> &'static [Self] {
        &[Self::Set, Self::Green, Self::Blue, Self::Custom]
    }

    fn value(self) -> i32 {
        self as i32
    }

    fn nick(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Custom => "custom",
        }
    }
}

impl std::str::FromStr for AlphaMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_nick(s).ok_or_else(|| format!("unknown alpha method '{s}'"))
    }
}

/// Filter marking a key colour as transparent.
#[derive(Debug)]
pub struct AlphaKey {
    name: String,
    ports: Vec<Port>,
    properties: PropertyBag,
}

impl AlphaKey {
    /// Creates a keyer using the `set` method.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ports: vec![
                Port::input(
                    "sink",
                    Caps::new([VideoFormat::Ayuv, VideoFormat::Rgba, VideoFormat::I420]),
                ),
                Port::output("src", Caps::new([VideoFormat::Ayuv, VideoFormat::Rgba])),
            ],
            properties: PropertyBag::new(vec![
                PropertySpec::enumeration("method", "How the alpha channel is computed", AlphaMethod::Set),
                PropertySpec::byte("alpha", "Opacity of the output", 255).mutable_when_active(),
                PropertySpec::byte("target-r", "Red channel of the key colour", 0),
                PropertySpec::byte("target-g", "Green channel of the key colour", 255),
                PropertySpec::byte("target-b", "Blue channel of the key colour", 0),
            ]),
        }
    }

    fn key_color(&self) -> Option<[u8; 3]> {
        match self.properties.enumeration::<AlphaMethod>("method")? {
            AlphaMethod::Set => None,
            AlphaMethod::Green => Some([0, 255, 0]),
            AlphaMethod::Blue => Some([0, 0, 255]),
            AlphaMethod::Custom => Some([
                self.properties.byte("target-r")?,
                self.properties.byte("target-g")?,
                self.properties.byte("target-b")?,
            ]),
        }
    }
}

impl Stage for AlphaKey {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        ALPHA_KEY
    }

    fn ports(&self) -> &[Port] {
        &self.ports
    }

    fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    fn process(&mut self, _port: &str, mut frame: Frame) -> Result<Vec<Frame>, StageError> {
        frame.key_color = self.key_color();
        Ok(vec![frame])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Framerate;

    fn frame() -> Frame {
        Frame::new("fg", 0, Framerate::default())
    }

    #[test]
    fn test_custom_key_colour() {
        let mut key = AlphaKey::new("alpha");
        let props = key.properties_mut();
        props.set("method", AlphaMethod::Custom.to_enum_value()).unwrap();
        props.set("target-r", 0).unwrap();
        props.set("target-g", 0).unwrap();
        props.set("target-b", 255).unwrap();

        let out = key.process("sink", frame()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].key_color, Some([0, 0, 255]));
    }

    #[test]
    fn test_set_method_keys_nothing() {
        let mut key = AlphaKey::new("alpha");
        let out = key.process("sink", frame()).unwrap();
        assert_eq!(out[0].key_color, None);
    }

    #[test]
    fn test_method_by_value() {
        let mut key = AlphaKey::new("alpha");
        key.properties_mut().set("method", 2).unwrap();
        assert_eq!(
            key.properties().enumeration::<AlphaMethod>("method"),
            Some(AlphaMethod::Blue)
        );
        assert!(key.properties_mut().set("method", 4).is_err());
    }

    #[test]
    fn test_alpha_mutable_when_active() {
        let key = AlphaKey::new("alpha");
        assert!(key.properties().spec("alpha").unwrap().mutable_when_active);
        assert!(!key.properties().spec("method").unwrap().mutable_when_active);
    }
}
