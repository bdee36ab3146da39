use bitflags::bitflags;
use serde::Serialize;
use std::fmt;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    IncludePath,
    Macro,
}

bitflags! {
    /// Properties attached to a detected entry.
    #[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntryFlags: u8 {
        const BUILTIN = 1 << 0;
        const READONLY = 1 << 1;
        /// found in the `#include "..."` search list
        const LOCAL = 1 << 2;
        /// Apple-style framework search directory
        const FRAMEWORKS_MAC = 1 << 3;
    }
}

/// A single fact parsed from one line of compiler output.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SettingsEntry {
    kind: EntryKind,
    name: String,
    value: Option<String>,
    flags: EntryFlags,
}

impl SettingsEntry {
    pub fn include_path(path: impl Into<String>, flags: EntryFlags) -> Self {
        SettingsEntry {
            kind: EntryKind::IncludePath,
            name: path.into(),
            value: None,
            flags,
        }
    }

    pub fn macro_def(name: impl Into<String>, value: impl Into<String>, flags: EntryFlags) -> Self {
        SettingsEntry {
            kind: EntryKind::Macro,
            name: name.into(),
            value: Some(value.into()),
            flags,
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn flags(&self) -> EntryFlags {
        self.flags
    }
}

// rendered as the compiler flag that would reproduce the entry
impl fmt::Display for SettingsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntryKind::IncludePath if self.flags.contains(EntryFlags::FRAMEWORKS_MAC) => {
                write!(f, "-F {}", self.name)
            }
            EntryKind::IncludePath if self.flags.contains(EntryFlags::LOCAL) => {
                write!(f, "-iquote {}", self.name)
            }
            EntryKind::IncludePath => write!(f, "-isystem {}", self.name),
            EntryKind::Macro => match self.value() {
                Some(value) if !value.is_empty() => write!(f, "-D{}={}", self.name, value),
                _ => write!(f, "-D{}", self.name),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILTIN: EntryFlags = EntryFlags::BUILTIN.union(EntryFlags::READONLY);

    #[test]
    fn include_path_has_no_value() {
        let entry = SettingsEntry::include_path("/usr/include", BUILTIN);
        assert_eq!(entry.kind(), EntryKind::IncludePath);
        assert_eq!(entry.name(), "/usr/include");
        assert_eq!(entry.value(), None);
    }

    #[test]
    fn display_as_compiler_flags() {
        let local = SettingsEntry::include_path("inc", BUILTIN | EntryFlags::LOCAL);
        let system = SettingsEntry::include_path("/usr/include", BUILTIN);
        let framework = SettingsEntry::include_path("/Library/Frameworks", BUILTIN | EntryFlags::FRAMEWORKS_MAC);
        let object = SettingsEntry::macro_def("FOO", "42", BUILTIN);
        let empty = SettingsEntry::macro_def("__STDC__", "", BUILTIN);

        assert_eq!(local.to_string(), "-iquote inc");
        assert_eq!(system.to_string(), "-isystem /usr/include");
        assert_eq!(framework.to_string(), "-F /Library/Frameworks");
        assert_eq!(object.to_string(), "-DFOO=42");
        assert_eq!(empty.to_string(), "-D__STDC__");
    }

    #[test]
    fn serializes_kind_in_snake_case() {
        let entry = SettingsEntry::macro_def("FOO", "1", BUILTIN);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "macro");
        assert_eq!(json["name"], "FOO");
        assert_eq!(json["value"], "1");
    }
}
