//! Normalization options.

/// Which path forms the normalizer accepts.
///
/// The default value accepts only plain absolute paths (`/a/b`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PathFlags {
    windows_path: bool,
    relative_path: bool,
    empty_path: bool,
    mount_name: bool,
    backslash: bool,
    all_characters: bool,
}

impl PathFlags {
    pub const fn new() -> Self {
        Self {
            windows_path: false,
            relative_path: false,
            empty_path: false,
            mount_name: false,
            backslash: false,
            all_characters: false,
        }
    }

    /// Accept drive (`C:`), UNC (`\\host\share`) and DOS device (`\\?\C:`) prefixes.
    pub const fn allow_windows_path(mut self) -> Self {
        self.windows_path = true;
        self
    }

    /// Accept paths that do not start with a separator.
    pub const fn allow_relative_path(mut self) -> Self {
        self.relative_path = true;
        self
    }

    /// Accept the empty path (normalized to itself).
    pub const fn allow_empty_path(mut self) -> Self {
        self.empty_path = true;
        self
    }

    /// Accept a leading `name:` mount prefix.
    pub const fn allow_mount_name(mut self) -> Self {
        self.mount_name = true;
        self
    }

    /// Treat `\` as a directory separator instead of rejecting it.
    pub const fn allow_backslash(mut self) -> Self {
        self.backslash = true;
        self
    }

    /// Skip the `: * ? < > |` component character check.
    pub const fn allow_all_characters(mut self) -> Self {
        self.all_characters = true;
        self
    }

    pub const fn is_windows_path_allowed(&self) -> bool {
        self.windows_path
    }

    pub const fn is_relative_path_allowed(&self) -> bool {
        self.relative_path
    }

    pub const fn is_empty_path_allowed(&self) -> bool {
        self.empty_path
    }

    pub const fn is_mount_name_allowed(&self) -> bool {
        self.mount_name
    }

    pub const fn is_backslash_allowed(&self) -> bool {
        self.backslash
    }

    pub const fn are_all_characters_allowed(&self) -> bool {
        self.all_characters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags_are_strict() {
        let flags = PathFlags::default();
        assert_eq!(flags, PathFlags::new());
        assert!(!flags.is_windows_path_allowed());
        assert!(!flags.is_relative_path_allowed());
        assert!(!flags.is_empty_path_allowed());
        assert!(!flags.is_mount_name_allowed());
        assert!(!flags.is_backslash_allowed());
        assert!(!flags.are_all_characters_allowed());
    }

    #[test]
    fn test_builder_sets_only_requested_flags() {
        let flags = PathFlags::new().allow_mount_name().allow_backslash();
        assert!(flags.is_mount_name_allowed());
        assert!(flags.is_backslash_allowed());
        assert!(!flags.is_windows_path_allowed());
        assert!(!flags.is_relative_path_allowed());
    }
}
