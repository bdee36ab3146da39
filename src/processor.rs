use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

use crate::context::ProcessingContext;
use crate::entry::{EntryFlags, SettingsEntry};

const LOCAL_SEARCH_START: &str = "#include \"...\" search starts here:";
const SYSTEM_SEARCH_START: &str = "#include <...> search starts here:";
const SEARCH_END: &str = "End of search list.";
const FRAMEWORK_SEARCH_START: &str = "Framework search starts here:";
const FRAMEWORK_SEARCH_END: &str = "End of framework search list.";

// clang on macOS lists frameworks inside the `<...>` block with this suffix
const FRAMEWORK_DIR_SUFFIX: &str = " (framework directory)";

/// Consumer of one line of compiler output at a time.
pub trait OutputProcessor {
    fn process_line(&mut self, line: &str, context: &mut dyn ProcessingContext);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParserState {
    #[default]
    None,
    ExpectingLocalInclude,
    ExpectingSystemInclude,
    ExpectingFramework,
}

fn make_path_regex() -> Regex {
    let indent = r"^\s+";
    let path = r"(\S.*)$";

    let re = format!("{indent}{path}");
    return Regex::new(re.as_str()).unwrap();
}

fn make_object_macro_regex() -> Regex {
    let define = r"^#define\s+";
    let name = r"([^\s(]+)";
    let value = r"(?:\s+(.*))?$";

    let re = format!("{define}{name}{value}");
    return Regex::new(re.as_str()).unwrap();
}

fn make_function_macro_regex() -> Regex {
    let define = r"^#define\s+";
    let name = r"([^\s(]+)";
    let params = r"\([^)]*\)";
    let value = r"\s*(.*)$";

    let re = format!("{define}{name}{params}{value}");
    return Regex::new(re.as_str()).unwrap();
}

lazy_static! {
    static ref PATH_REGEX: Regex = make_path_regex();
    // tried in order, first full match wins
    static ref MACRO_REGEXES: [Regex; 2] = [make_object_macro_regex(), make_function_macro_regex()];
}

const BUILTIN: EntryFlags = EntryFlags::BUILTIN.union(EntryFlags::READONLY);

/// Parses the output of `gcc -E -P -v -dD` (and compatible compilers).
#[derive(Default, Debug)]
pub struct GccOutputProcessor {
    state: ParserState,
}

impl GccOutputProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    fn sentinel(line: &str) -> Option<ParserState> {
        match line {
            LOCAL_SEARCH_START => Some(ParserState::ExpectingLocalInclude),
            SYSTEM_SEARCH_START => Some(ParserState::ExpectingSystemInclude),
            FRAMEWORK_SEARCH_START => Some(ParserState::ExpectingFramework),
            _ if line.starts_with(SEARCH_END) => Some(ParserState::None),
            _ if line.starts_with(FRAMEWORK_SEARCH_END) => Some(ParserState::None),
            _ => None,
        }
    }

    fn parse_path(line: &str, flags: EntryFlags) -> Option<SettingsEntry> {
        let captures = PATH_REGEX.captures(line)?;
        let path = captures.get(1)?.as_str();

        match path.strip_suffix(FRAMEWORK_DIR_SUFFIX) {
            Some(framework) => {
                let flags = (flags - EntryFlags::LOCAL) | EntryFlags::FRAMEWORKS_MAC;
                Some(SettingsEntry::include_path(framework, flags))
            }
            None => Some(SettingsEntry::include_path(path, flags)),
        }
    }

    fn parse_macro(line: &str) -> Option<SettingsEntry> {
        MACRO_REGEXES.iter().find_map(|re| {
            let captures = re.captures(line)?;
            let name = captures.get(1)?.as_str();
            let value = captures.get(2).map_or("", |m| m.as_str());
            Some(SettingsEntry::macro_def(name, value, BUILTIN))
        })
    }
}

impl OutputProcessor for GccOutputProcessor {
    fn process_line(&mut self, line: &str, context: &mut dyn ProcessingContext) {
        if let Some(state) = Self::sentinel(line) {
            trace!("{:?} -> {:?} on `{line}`", self.state, state);
            self.state = state;
            return;
        }

        let entry = match self.state {
            ParserState::ExpectingLocalInclude => Self::parse_path(line, BUILTIN | EntryFlags::LOCAL),
            ParserState::ExpectingSystemInclude => Self::parse_path(line, BUILTIN),
            ParserState::ExpectingFramework => {
                Self::parse_path(line, BUILTIN | EntryFlags::FRAMEWORKS_MAC)
            }
            ParserState::None => Self::parse_macro(line),
        };

        match entry {
            Some(entry) => {
                trace!("{:?}: {entry}", self.state);
                context.add_entry(entry);
            }
            None => trace!("{:?}: ignored `{line}`", self.state),
        }
    }
}
