//! Pixel format converter.

use super::{Port, Stage, FORMAT_CONVERTER};
use crate::core::{Caps, PropertyBag};

/// Filter accepting any format and producing any format.
///
/// Sits between stages whose caps do not intersect. The outgoing format is
/// whatever was negotiated on the downstream link.
#[derive(Debug)]
pub struct FormatConverter {
    name: String,
    ports: Vec<Port>,
    properties: PropertyBag,
}

impl FormatConverter {
    /// Creates a converter.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ports: vec![Port::input("sink", Caps::any()), Port::output("src", Caps::any())],
            properties: PropertyBag::default(),
        }
    }
}

impl Stage for FormatConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        FORMAT_CONVERTER
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Frame, Framerate};
    use crate::stages::StageRole;

    #[test]
    fn test_passthrough() {
        let mut convert = FormatConverter::new("convert");
        assert_eq!(convert.role(), StageRole::Filter);
        let frame = Frame::new("mixer", 4, Framerate::default());
        let out = convert.process("sink", frame.clone()).unwrap();
        assert_eq!(out, vec![frame]);
    }
}
