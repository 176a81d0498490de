//! Grammar version gating.
//!
//! The stream carries a version identifier; productions consult it to
//! allow or reject syntax introduced in later language versions. Version
//! compatibility is the parser's concern, not the stream's.

/// Nabla grammar version, as a single minor-version number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GrammarVersion(pub u8);

impl GrammarVersion {
    /// The newest grammar this front-end understands.
    pub const LATEST: GrammarVersion = GrammarVersion(8);

    /// `try … else` blocks.
    pub const TRY_ELSE: GrammarVersion = GrammarVersion(8);
    /// `const x` without an initializer.
    pub const BARE_CONST: GrammarVersion = GrammarVersion(8);
    /// `import A as B` renaming.
    pub const IMPORT_AS: GrammarVersion = GrammarVersion(6);

    /// True when this version includes `feature`.
    #[inline]
    pub fn allows(self, feature: GrammarVersion) -> bool {
        self >= feature
    }
}

impl Default for GrammarVersion {
    fn default() -> Self {
        GrammarVersion::LATEST
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gating() {
        assert!(GrammarVersion::LATEST.allows(GrammarVersion::IMPORT_AS));
        assert!(GrammarVersion(6).allows(GrammarVersion::IMPORT_AS));
        assert!(!GrammarVersion(5).allows(GrammarVersion::IMPORT_AS));
        assert!(!GrammarVersion(7).allows(GrammarVersion::TRY_ELSE));
    }
}
