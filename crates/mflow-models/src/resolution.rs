//! Frame resolution parsing.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A frame resolution. Accepts `"WxH"` strings or `{width, height}` maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = ResolutionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| ResolutionParseError(s.to_string()))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| ResolutionParseError(s.to_string()))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| ResolutionParseError(s.to_string()))?;
        if width == 0 || height == 0 {
            return Err(ResolutionParseError(s.to_string()));
        }
        Ok(Self { width, height })
    }
}

/// Resolution parsing error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid resolution '{0}', expected WxH")]
pub struct ResolutionParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wxh() {
        assert_eq!("1920x1080".parse::<Resolution>().unwrap(), Resolution::new(1920, 1080));
        assert_eq!("1280X720".parse::<Resolution>().unwrap(), Resolution::new(1280, 720));
    }

    #[test]
    fn rejects_bad_input() {
        assert!("1920".parse::<Resolution>().is_err());
        assert!("0x1080".parse::<Resolution>().is_err());
        assert!("axb".parse::<Resolution>().is_err());
    }

    #[test]
    fn deserializes_from_map() {
        let r: Resolution = serde_json::from_str(r#"{"width": 640, "height": 480}"#).unwrap();
        assert_eq!(r, Resolution::new(640, 480));
    }
}
