use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Stdio};
use std::thread;
use tempfile::TempDir;

use crate::args::Lang;
use crate::command;
use crate::context::ProcessingResult;
use crate::entry::SettingsEntry;
use crate::lazy_context;
use crate::processor::GccOutputProcessor;
use crate::sniffer::OutputSniffer;

type GccSniffer = OutputSniffer<GccOutputProcessor, ProcessingResult>;

#[derive(Clone, Debug)]
pub struct Detector {
    pub compiler: String,
    pub lang: Lang,
    pub template: String,
    pub extra_flags: Vec<String>,
    /// mirror raw compiler output to our own stdout/stderr
    pub echo: bool,
    /// keep what was parsed even if the compiler exits with an error
    pub ignore_exit_status: bool,
    /// where the empty input file goes; a fresh scratch directory per run
    /// when unset, otherwise an input file already there is kept and used
    pub spec_dir: Option<PathBuf>,
}

impl Detector {
    pub fn new(compiler: impl Into<String>, lang: Lang) -> Self {
        Detector {
            compiler: compiler.into(),
            lang,
            template: command::DEFAULT_TEMPLATE.to_string(),
            extra_flags: Vec::new(),
            echo: false,
            ignore_exit_status: false,
            spec_dir: None,
        }
    }

    fn sniffer(&self, echo: impl Write + Send + 'static) -> GccSniffer {
        let (processor, result) = (GccOutputProcessor::new(), ProcessingResult::new());
        if self.echo {
            OutputSniffer::with_sink(processor, result, echo)
        } else {
            OutputSniffer::new(processor, result)
        }
    }

    /// Runs the compiler and collects its built-in include paths and macros.
    ///
    /// Entries from stderr (search lists) come first, then stdout (macros).
    pub fn detect(&self) -> Result<Vec<SettingsEntry>> {
        let path = lazy_context!(which::which(&self.compiler), "Failed to find compiler `{}`", self.compiler)?;
        debug!("using compiler {}", path.display());

        let scratch;
        let spec_dir = match &self.spec_dir {
            Some(dir) => dir.as_path(),
            None => {
                scratch = TempDir::new().context("Failed to create scratch directory")?;
                scratch.path()
            }
        };

        let resolved = command::resolve(&self.template, &self.compiler, &self.extra_flags, self.lang, spec_dir)?;
        let mut command = resolved.to_command();
        command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = lazy_context!(command.spawn(), "Failed to run {}", self.compiler)?;
        let (stdout, stderr) = (child.stdout.take(), child.stderr.take());
        let captured = stdout.zip(stderr).ok_or(anyhow!("compiler output was not captured"));
        let (stdout, stderr) = reap_on_error(&mut child, captured)?;

        let out_sniffer = self.sniffer(io::stdout());
        let err_sniffer = self.sniffer(io::stderr());

        let (out, err) = thread::scope(|s| {
            let out = s.spawn(move || pump(stdout, out_sniffer));
            let err = s.spawn(move || pump(stderr, err_sniffer));
            (joined(out.join(), "stdout"), joined(err.join(), "stderr"))
        });
        let (out, err) = reap_on_error(&mut child, out.and_then(|out| Ok((out, err?))))?;

        let status = lazy_context!(child.wait(), "Failed to wait for {}", self.compiler)?;
        if !status.success() {
            if !self.ignore_exit_status {
                bail!("{} exited with {status}", self.compiler);
            }
            warn!("{} exited with {status}, keeping parsed output", self.compiler);
        }

        let mut entries = err.into_entries();
        entries.extend(out.into_entries());
        info!("detected {} entries from {}", entries.len(), self.compiler);
        if entries.is_empty() {
            warn!("{} reported no built-ins", self.compiler);
        }
        Ok(entries)
    }
}

fn joined(pumped: thread::Result<Result<ProcessingResult>>, stream: &str) -> Result<ProcessingResult> {
    pumped.map_err(|_| anyhow!("{stream} pump panicked"))?
}

// a child whose output can no longer be read is killed, never left unreaped
fn reap_on_error<T>(child: &mut Child, result: Result<T>) -> Result<T> {
    if result.is_err() {
        if let Err(e) = child.kill() {
            warn!("failed to kill compiler: {e}");
        }
        if let Err(e) = child.wait() {
            warn!("failed to wait for compiler: {e}");
        }
    }
    result
}

fn pump(mut stream: impl Read, mut sniffer: GccSniffer) -> Result<ProcessingResult> {
    io::copy(&mut stream, &mut sniffer).context("Failed to read compiler output")?;
    let (_, result) = sniffer.finish()?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryFlags, EntryKind};
    use std::fs;
    use std::process::Command;
    use std::sync::{Arc, Mutex};

    const BOTH_STREAMS: &str = r#"${COMMAND} -c "echo '#define OUT 1'; echo '#include <...> search starts here:' >&2; echo ' /err/include' >&2; echo 'End of search list.' >&2; exit 3""#;

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn shell(template: &str) -> Detector {
        Detector {
            template: template.to_string(),
            ..Detector::new("sh", Lang::C)
        }
    }

    #[test]
    fn pump_reads_until_eof() {
        let output: &[u8] = b"#include \"...\" search starts here:\n .\nEnd of search list.\n#define A 1";
        let sniffer = OutputSniffer::new(GccOutputProcessor::new(), ProcessingResult::new());
        let result = pump(output, sniffer).unwrap();

        let kinds: Vec<_> = result.entries().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EntryKind::IncludePath, EntryKind::Macro]);
    }

    #[test]
    fn missing_compiler_is_an_error() {
        let detector = Detector::new("no-such-compiler-builtins-sniffer", Lang::C);
        let err = detector.detect().unwrap_err();
        assert!(err.to_string().contains("no-such-compiler-builtins-sniffer"));
    }

    #[test]
    fn defaults() {
        let detector = Detector::new("gcc", Lang::Cpp);
        assert_eq!(detector.template, command::DEFAULT_TEMPLATE);
        assert!(!detector.echo);
        assert!(!detector.ignore_exit_status);
        assert!(detector.spec_dir.is_none());
    }

    #[test]
    fn failing_compiler_is_an_error() {
        let err = shell(BOTH_STREAMS).detect().unwrap_err();
        assert!(err.to_string().contains("exit status: 3"), "{err}");
    }

    #[test_log::test]
    fn ignored_exit_status_keeps_entries_stderr_first() {
        let detector = Detector {
            ignore_exit_status: true,
            ..shell(BOTH_STREAMS)
        };
        let entries = detector.detect().unwrap();

        let builtin = EntryFlags::BUILTIN | EntryFlags::READONLY;
        assert_eq!(
            entries,
            vec![
                SettingsEntry::include_path("/err/include", builtin),
                SettingsEntry::macro_def("OUT", "1", builtin),
            ]
        );
    }

    #[test]
    fn echo_mirrors_raw_output() {
        let sink = SharedSink::default();
        let detector = Detector {
            echo: true,
            ..Detector::new("gcc", Lang::C)
        };
        let mut sniffer = detector.sniffer(sink.clone());
        sniffer.write_all(b"#define A 1\r\npartial").unwrap();
        let (_, result) = sniffer.finish().unwrap();

        assert_eq!(sink.0.lock().unwrap().as_slice(), b"#define A 1\r\npartial");
        assert_eq!(result.entries().len(), 1);
    }

    #[test]
    fn no_echo_leaves_sink_untouched() {
        let sink = SharedSink::default();
        let mut sniffer = Detector::new("gcc", Lang::C).sniffer(sink.clone());
        sniffer.write_all(b"#define A 1\n").unwrap();
        sniffer.finish().unwrap();
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn stale_spec_file_in_temp_dir_is_not_compiled() {
        let stale = std::env::temp_dir().join("spec.c");
        let planted = !stale.exists();
        if planted {
            fs::write(&stale, "#define INJECTED 1\n").unwrap();
        }

        let entries = shell(r#"${COMMAND} -c "cat ${INPUTS}""#).detect();
        if planted {
            fs::remove_file(&stale).unwrap();
        }
        assert!(entries.unwrap().is_empty());
    }

    #[test]
    fn explicit_spec_dir_keeps_existing_input() {
        let dir = TempDir::new().unwrap();
        let spec = dir.path().join("spec.c");
        fs::write(&spec, "#define KEPT 1\n").unwrap();

        let detector = Detector {
            spec_dir: Some(dir.path().to_path_buf()),
            ..shell(r#"${COMMAND} -c "cat ${INPUTS}""#)
        };
        let entries = detector.detect().unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name(), "KEPT");
        assert!(spec.exists());
    }

    #[test]
    fn failed_read_kills_the_compiler() {
        let mut child = Command::new("sh").args(["-c", "sleep 30"]).spawn().unwrap();
        let result: Result<()> = reap_on_error(&mut child, Err(anyhow!("stdout pump panicked")));

        assert!(result.is_err());
        assert!(child.try_wait().unwrap().is_some());
    }
}
