//! The fixed configure feature set.
//!
//! Every architecture is configured with exactly this set. Artifacts built
//! with differing sets would not share an ABI and could not be merged.

/// Whether an optional upstream subsystem is compiled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Enabled,
    Disabled,
}

/// How a subsystem is spelled on the configure command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    /// `--enable-x` / `--disable-x`
    Enable,
    /// `--enable-x=yes` / `--enable-x=no`
    EnableValue,
    /// `--with-x` / `--without-x`
    With,
}

#[derive(Debug, Clone, Copy)]
struct Feature {
    name: &'static str,
    style: Style,
    toggle: Toggle,
}

const fn feature(name: &'static str, style: Style, toggle: Toggle) -> Feature {
    Feature { name, style, toggle }
}

use Style::{Enable, EnableValue, With};
use Toggle::{Disabled, Enabled};

const LIBXML2_FEATURES: &[Feature] = &[
    feature("static", Enable, Disabled),
    feature("ipv6", EnableValue, Disabled),
    feature("shared", Enable, Enabled),
    feature("sax1", With, Enabled),
    feature("threads", With, Enabled),
    feature("xpath", With, Enabled),
    feature("c14n", With, Disabled),
    feature("debug", With, Disabled),
    feature("ftp", With, Disabled),
    feature("iconv", With, Disabled),
    feature("iso8859x", With, Disabled),
    feature("legacy", With, Disabled),
    feature("lzma", With, Disabled),
    feature("modules", With, Disabled),
    feature("pattern", With, Disabled),
    feature("push", With, Disabled),
    feature("python", With, Disabled),
    feature("reader", With, Disabled),
    feature("regexps", With, Disabled),
    feature("schemas", With, Disabled),
    feature("schematron", With, Disabled),
    feature("valid", With, Disabled),
    feature("writer", With, Disabled),
    feature("xinclude", With, Disabled),
];

/// Mapping from upstream optional subsystems to their enabled state.
#[derive(Debug, Clone, Copy)]
pub struct FeatureFlags {
    features: &'static [Feature],
}

impl FeatureFlags {
    /// The feature set the libxml2 package is built with.
    pub fn libxml2() -> Self {
        FeatureFlags {
            features: LIBXML2_FEATURES,
        }
    }

    /// Enabled state of a subsystem, `None` if it is not part of the set.
    pub fn get(&self, name: &str) -> Option<Toggle> {
        self.features
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.toggle)
    }

    /// Render the set as configure arguments, in declaration order.
    pub fn configure_args(&self) -> Vec<String> {
        self.features
            .iter()
            .map(|f| match (f.style, f.toggle) {
                (Enable, Enabled) => format!("--enable-{}", f.name),
                (Enable, Disabled) => format!("--disable-{}", f.name),
                (EnableValue, Enabled) => format!("--enable-{}=yes", f.name),
                (EnableValue, Disabled) => format!("--enable-{}=no", f.name),
                (With, Enabled) => format!("--with-{}", f.name),
                (With, Disabled) => format!("--without-{}", f.name),
            })
            .collect()
    }
}
