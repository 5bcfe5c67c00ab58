use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Basecalled output category of a single physical read: the two
/// complementary single-pass calls and the higher-confidence consensus call.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ReadType {
    Template,
    Complement,
    Consensus,
}

impl ReadType {
    pub fn all() -> [ReadType; 3] {
        [ReadType::Template, ReadType::Complement, ReadType::Consensus]
    }

    /// Subdirectory name holding this type's alignment files.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ReadType::Template => "template",
            ReadType::Complement => "complement",
            ReadType::Consensus => "consensus",
        }
    }
}

impl fmt::Display for ReadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for ReadType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "template" => Ok(ReadType::Template),
            "complement" => Ok(ReadType::Complement),
            "consensus" => Ok(ReadType::Consensus),
            _ => Err(format!(
                "Unknown read type '{}' (expected template, complement, or consensus)",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("template".parse::<ReadType>().unwrap(), ReadType::Template);
        assert_eq!("Consensus".parse::<ReadType>().unwrap(), ReadType::Consensus);
        assert!("2d".parse::<ReadType>().is_err());
    }

    #[test]
    fn test_round_trip_display() {
        for read_type in ReadType::all() {
            assert_eq!(
                read_type.to_string().parse::<ReadType>().unwrap(),
                read_type
            );
        }
    }
}
