use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Target processor architecture of the installer being built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    X86,
    X64,
    Arm64,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::X86 => "x86",
            Platform::X64 => "x64",
            Platform::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x86" | "intel" => Ok(Platform::X86),
            "x64" | "amd64" => Ok(Platform::X64),
            "arm64" => Ok(Platform::Arm64),
            _ => Err(format!(
                "invalid platform '{}', expected one of: x86, x64, arm64",
                s
            )),
        }
    }
}
