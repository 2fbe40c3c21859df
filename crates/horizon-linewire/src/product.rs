//! Product identity: name, version and banner.

use std::fmt;

/// Name and version of one of the Linewire tools.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductInfo {
    /// Display name, also used for the log file name.
    pub name: &'static str,
    pub major: u32,
    pub minor: u32,
    pub fix: u32,
    /// Release phase such as `beta`. Empty when not set.
    pub phase: &'static str,
    /// Build label. Empty when not set.
    pub build: &'static str,
    /// Empty when not set.
    pub manufacturer: &'static str,
}

impl ProductInfo {
    /// The line client.
    pub const CLIENT: ProductInfo = ProductInfo::new("TCP client");

    /// The line server.
    pub const SERVER: ProductInfo = ProductInfo::new("TCP server");

    /// Product with the workspace version and no phase or build.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            major: 0,
            minor: 3,
            fix: 0,
            phase: "",
            build: "",
            manufacturer: "Horizon Analytic Studios, LLC",
        }
    }

    /// `major.minor.fix[.phase][.build]`
    pub fn version(&self) -> String {
        let mut version = format!("{}.{}.{}", self.major, self.minor, self.fix);
        for part in [self.phase, self.build] {
            if !part.is_empty() {
                version.push('.');
                version.push_str(part);
            }
        }
        version
    }

    /// `<name> <version> by <manufacturer>`, or `<name> <version>` without one.
    pub fn banner(&self) -> String {
        if self.manufacturer.is_empty() {
            self.title()
        } else {
            format!("{} by {}", self.title(), self.manufacturer)
        }
    }

    /// `<name> <version>`, used as the terminal title.
    pub fn title(&self) -> String {
        format!("{} {}", self.name, self.version())
    }

    /// File-name friendly form of the name, e.g. `TCP-client`.
    pub fn file_stem(&self) -> String {
        self.name.replace(char::is_whitespace, "-")
    }
}

impl fmt::Display for ProductInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title())
    }
}
