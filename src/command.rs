use anyhow::{anyhow, Result};
use log::{debug, warn};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::args::Lang;
use crate::lazy_context;

pub const COMPILER_MACRO: &str = "${COMMAND}";
pub const SPEC_FILE_MACRO: &str = "${INPUTS}";
pub const SPEC_EXT_MACRO: &str = "${EXT}";

pub const DEFAULT_TEMPLATE: &str = "${COMMAND} -E -P -v -dD ${INPUTS}";

const SPEC_FILE_BASE: &str = "spec";

// sentinel lines are only recognized untranslated
const LOCALE_ENV: [(&str, &str); 2] = [("LANGUAGE", "en"), ("LC_ALL", "C.UTF-8")];

/// Empty input file handed to the compiler.
///
/// Removed on drop, unless it was already there before.
#[derive(Debug)]
pub struct SpecFile {
    path: PathBuf,
    preserve: bool,
}

impl SpecFile {
    pub fn create(dir: &Path, lang: Lang) -> Result<SpecFile> {
        let path = dir.join(format!("{SPEC_FILE_BASE}.{}", lang.extension()));
        let preserve = path.exists();
        if !preserve {
            lazy_context!(File::create(&path), "Failed to create spec file {}", path.display())?;
        }
        Ok(SpecFile { path, preserve })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SpecFile {
    fn drop(&mut self) {
        if self.preserve {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("failed to remove spec file {}: {e}", self.path.display());
        }
    }
}

#[derive(Debug)]
pub struct ResolvedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub spec_file: Option<SpecFile>,
}

impl ResolvedCommand {
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).envs(LOCALE_ENV);
        command
    }
}

/// Expands `${COMMAND}`, `${INPUTS}` and `${EXT}` in `template`.
///
/// The template is split into words first so substituted paths never get
/// re-split. `extra_flags` are placed right after the program name.
pub fn resolve(
    template: &str,
    compiler: &str,
    extra_flags: &[String],
    lang: Lang,
    spec_dir: &Path,
) -> Result<ResolvedCommand> {
    let words = shlex::split(template).ok_or(anyhow!("Failed to parse command template `{template}`"))?;

    let spec_file = if template.contains(SPEC_FILE_MACRO) {
        Some(SpecFile::create(spec_dir, lang)?)
    } else {
        None
    };
    let spec_path = spec_file
        .as_ref()
        .map(|f| f.path().to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut words = words.into_iter().map(|word| {
        word.replace(COMPILER_MACRO, compiler)
            .replace(SPEC_FILE_MACRO, &spec_path)
            .replace(SPEC_EXT_MACRO, lang.extension())
    });

    let program = words
        .next()
        .filter(|p| !p.is_empty())
        .ok_or(anyhow!("Command template `{template}` is empty"))?;
    let args: Vec<String> = extra_flags.iter().cloned().chain(words).collect();

    debug!("resolved command: {program} {}", args.join(" "));
    Ok(ResolvedCommand {
        program,
        args,
        spec_file,
    })
}
