use serde::{Deserialize, Serialize};
use std::fmt;

/// Inventory collector a package was discovered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Dpkg,
    Pip,
    Wmic,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Dpkg => "dpkg",
            Source::Pip => "pip",
            Source::Wmic => "wmic",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Dpkg => "Debian packages",
            Source::Pip => "Python packages",
            Source::Wmic => "Windows products",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dpkg" | "deb" | "apt" => Ok(Source::Dpkg),
            "pip" | "python" => Ok(Source::Pip),
            "wmic" | "windows" => Ok(Source::Wmic),
            _ => Err(format!("Unknown source: {}. Use: dpkg, pip, wmic", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    MacOS,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        #[cfg(target_os = "linux")]
        return Platform::Linux;
        #[cfg(target_os = "macos")]
        return Platform::MacOS;
        #[cfg(target_os = "windows")]
        return Platform::Windows;
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Linux => "Linux",
            Platform::MacOS => "macOS",
            Platform::Windows => "Windows",
        }
    }
}

/// One installed unit of software.
///
/// Identity is the `(name, version)` pair. Records are produced by a
/// [`Scanner`](crate::scanner::Scanner) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_record_identity() {
        let a = PackageRecord::new("openssl", "1.1.1");
        let b = PackageRecord::new("openssl", "1.1.1");
        let c = PackageRecord::new("openssl", "3.0.2");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "openssl 1.1.1");
    }

    #[test]
    fn test_source_from_str() {
        assert_eq!("dpkg".parse::<Source>(), Ok(Source::Dpkg));
        assert_eq!("APT".parse::<Source>(), Ok(Source::Dpkg));
        assert_eq!("pip".parse::<Source>(), Ok(Source::Pip));
        assert_eq!("wmic".parse::<Source>(), Ok(Source::Wmic));
        assert!("homebrew".parse::<Source>().is_err());
    }

    #[test]
    fn test_source_serde_lowercase() {
        let json = serde_json::to_string(&Source::Pip).unwrap();
        assert_eq!(json, "\"pip\"");
        let parsed: Source = serde_json::from_str("\"wmic\"").unwrap();
        assert_eq!(parsed, Source::Wmic);
    }
}
