use serde::{Deserialize, Serialize};

use crate::foundation::error::{ExpError, ExpResult};

/// Linear RGB color with components in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| f64::from((hex >> shift) & 0xff) / 255.0;
        Self::new(channel(16), channel(8), channel(0))
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.r, self.g, self.b]
    }

    pub fn from_slice(v: &[f64]) -> ExpResult<Self> {
        match v {
            [r, g, b] => Ok(Self::new(*r, *g, *b)),
            _ => Err(ExpError::validation(format!(
                "a color needs exactly 3 components, got {}",
                v.len()
            ))),
        }
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::from_hex(0x55aa55)
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Hex(String),
            Packed(u32),
            Obj { r: f64, g: f64, b: f64 },
            Arr(Vec<f64>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Hex(s) => parse_hex(&s).map_err(serde::de::Error::custom),
            Repr::Packed(v) => Ok(Self::from_hex(v)),
            Repr::Obj { r, g, b } => Ok(Self::new(r, g, b)),
            Repr::Arr(v) => Self::from_slice(&v).map_err(serde::de::Error::custom),
        }
    }
}

fn parse_hex(s: &str) -> Result<Rgb, String> {
    let digits = s.trim().trim_start_matches('#').trim_start_matches("0x");
    if digits.len() != 6 {
        return Err(format!("hex color '{s}' must have 6 digits"));
    }
    u32::from_str_radix(digits, 16)
        .map(Rgb::from_hex)
        .map_err(|_| format!("hex color '{s}' is not valid hexadecimal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_unpacks_channels() {
        let c = Rgb::from_hex(0xff0080);
        assert_eq!(c.r, 1.0);
        assert_eq!(c.g, 0.0);
        assert!((c.b - 128.0 / 255.0).abs() < 1e-12);
    }

    #[test]
    fn deserializes_all_forms() {
        let a: Rgb = serde_json::from_str("\"#55aa55\"").unwrap();
        let b: Rgb = serde_json::from_str("5614165").unwrap();
        let c: Rgb = serde_json::from_str("[0.5, 0.5, 0.5]").unwrap();
        assert_eq!(a, Rgb::default());
        assert_eq!(b, Rgb::default());
        assert_eq!(c, Rgb::new(0.5, 0.5, 0.5));
        assert!(serde_json::from_str::<Rgb>("[1.0, 2.0]").is_err());
    }
}
