use anyhow::Result;
use builtins_sniffer::args::{Format, Lang};
use builtins_sniffer::command::DEFAULT_TEMPLATE;
use builtins_sniffer::{Detector, SettingsEntry};
use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(
    about = "detect the built-in include paths and macros of a C/C++ compiler",
    long_about = r#"
Detect the built-in include paths and macros of a C/C++ compiler

Runs <compiler> on an empty input file with flags that make it dump its
include search lists and predefined macros, and prints what was found.
"#
)]
struct Ops {
    #[arg(default_value = "gcc", short = 'c', long = "compiler")]
    compiler: String,

    #[arg(default_value = Lang::Cpp.as_str(), short = 'x', long = "lang", value_enum)]
    lang: Lang,

    #[arg(
        long = "command",
        default_value = DEFAULT_TEMPLATE,
        help = "command template, ${COMMAND} is the compiler, ${INPUTS} the empty input file and ${EXT} its extension"
    )]
    template: String,

    #[arg(default_value = Format::Text.as_str(), long = "format", value_enum)]
    format: Format,

    #[arg(long = "echo", help = "mirror the raw compiler output")]
    echo: bool,

    #[arg(
        long = "ignore-exit-status",
        help = "keep the detected entries even if the compiler fails"
    )]
    ignore_exit_status: bool,

    #[arg(
        help = r"additional flags for the compiler",
        last = true,
        action = ArgAction::Append,
    )]
    compiler_flags: Vec<String>,
}

fn print_entries(entries: &[SettingsEntry], format: Format) -> Result<()> {
    match format {
        Format::Text => entries.iter().for_each(|entry| println!("{entry}")),
        Format::Json => println!("{}", serde_json::to_string_pretty(entries)?),
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let ops = Ops::parse();

    let detector = Detector {
        template: ops.template,
        extra_flags: ops.compiler_flags,
        echo: ops.echo,
        ignore_exit_status: ops.ignore_exit_status,
        ..Detector::new(ops.compiler, ops.lang)
    };

    let entries = detector.detect()?;
    print_entries(&entries, ops.format)
}
