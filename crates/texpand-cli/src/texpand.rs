use clap::Parser;
use colored::Colorize;
use std::io::Write;
use std::path::PathBuf;
use texpand::context::InteractionMode;
use texpand::*;
use texpand_stdext::collections::groupingmap;
use texpand_stdlib::script;
use texpand_stdlib::StdLibState;

/// Texpand runs TeX macro code and prints the expanded output.
///
/// Only the expansion engine is implemented: characters that reach the
///   main loop are written to standard output instead of being typeset.
#[derive(Parser)]
#[clap(version)]
struct Cli {
    /// Log engine activity (source pushes, namespace imports) to standard error
    #[arg(long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    sub_command: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    Doc(Doc),
    Run(Run),
}

/// Print documentation for a TeX primitive
#[derive(Parser)]
struct Doc {
    /// Name of the control sequence, without the leading backslash
    name: Option<String>,
}

/// Run a TeX file and print the expanded output
#[derive(Parser)]
struct Run {
    /// Path to the TeX file to run
    file_path: PathBuf,

    /// How to react to errors: batch, nonstop, scroll or errorstop.
    ///
    /// The document can change the mode using \batchmode and friends.
    #[arg(long, default_value_t = InteractionMode::ErrorStop)]
    interaction: InteractionMode,

    /// Maximum number of nested expansions before the run fails
    #[arg(long)]
    max_expansion_depth: Option<usize>,
}

fn main() {
    let args: Cli = Cli::parse();
    init_logger(args.verbose);
    let mut vm = StdLibState::new_vm();
    match args.sub_command {
        SubCommand::Doc(d) => {
            if let Err(err) = doc(&vm, d.name) {
                println!["{err}"];
                std::process::exit(1);
            }
        }
        SubCommand::Run(run_args) => {
            let code = run(&mut vm, run_args);
            std::process::exit(code);
        }
    }
}

fn init_logger(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn run(vm: &mut vm::VM<StdLibState>, run_args: Run) -> i32 {
    let mut path = run_args.file_path;
    if path.extension().is_none() {
        path.set_extension("tex");
    }
    if let Some(max_expansion_depth) = run_args.max_expansion_depth {
        vm.limits.max_expansion_depth = max_expansion_depth;
    }
    vm.context
        .set_interaction_mode(run_args.interaction, groupingmap::Scope::Global);
    if let Err(err) = vm.push_file(&path) {
        println!["{err}"];
        return 1;
    }
    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let summary = run_with_error_policy(vm, &mut stdout.lock(), &mut stderr.lock());
    log::debug!(
        "maximum expansion depth reached: {}",
        vm.max_expansion_depth_reached()
    );
    if summary.aborted {
        return 1;
    }
    if summary.num_errors > 0 {
        eprintln![
            "{}",
            format!["run finished with {} error(s)", summary.num_errors].yellow()
        ];
    }
    0
}

/// Number of errors after which a run in batch or nonstop mode gives up.
const MAX_ERRORS: usize = 100;

struct Summary {
    num_errors: usize,
    aborted: bool,
}

/// Runs the VM until the input ends, applying the interaction mode's error policy.
///
/// In batch and nonstop mode the run resumes from the token after the error.
/// The mode is read from the context each time an error happens,
///     so a document that switches modes changes the policy from then on.
fn run_with_error_policy(
    vm: &mut vm::VM<StdLibState>,
    out: &mut dyn Write,
    err_out: &mut dyn Write,
) -> Summary {
    let mut num_errors = 0_usize;
    loop {
        let result = vm.run::<script::Handlers>();
        write_output(vm, out);
        let err = match result {
            Ok(()) => {
                return Summary {
                    num_errors,
                    aborted: false,
                }
            }
            Err(err) => err,
        };
        num_errors += 1;
        let mode = vm.context.interaction_mode();
        match mode {
            InteractionMode::Batch => {
                log::error!("{}", err.title());
            }
            InteractionMode::NonStop => {
                log::warn!("recovering from error {num_errors} in nonstop mode");
                _ = writeln![err_out, "{err}"];
            }
            InteractionMode::Scroll | InteractionMode::ErrorStop => {
                _ = writeln![err_out, "{err}"];
                return Summary {
                    num_errors,
                    aborted: true,
                };
            }
        }
        if num_errors >= MAX_ERRORS {
            _ = writeln![
                err_out,
                "{}",
                format!["giving up after {MAX_ERRORS} errors in {mode} mode"].red()
            ];
            return Summary {
                num_errors,
                aborted: true,
            };
        }
    }
}

fn write_output(vm: &mut vm::VM<StdLibState>, out: &mut dyn Write) {
    let tokens = script::take_output(vm);
    let output = token::write_tokens(&tokens, vm.cs_name_interner());
    if let Err(err) = out.write_all(output.as_bytes()).and_then(|()| out.flush()) {
        log::error!("failed to write the output: {err}");
    }
}

fn doc(vm: &vm::VM<StdLibState>, cs_name: Option<String>) -> Result<(), String> {
    match cs_name {
        None => {
            let mut names: Vec<(&str, Option<&'static str>)> = vm
                .commands_map
                .built_in_commands()
                .iter()
                .filter_map(|(cs_name, built_in)| {
                    vm.cs_name_interner()
                        .resolve(*cs_name)
                        .map(|name| (name, built_in.doc()))
                })
                .collect();
            names.sort();
            for (name, doc) in names {
                let first_line = doc.unwrap_or("").split('\n').next().unwrap_or("");
                println!["\\{}  {}", name.bold(), first_line];
            }
            Ok(())
        }
        Some(name) => {
            let name = name.trim_start_matches('\\');
            let built_in = vm
                .cs_name_interner()
                .get(name)
                .and_then(|cs_name| vm.commands_map.built_in_commands().get(&cs_name));
            match built_in {
                None => Err(format!("Unknown command \\{name}")),
                Some(built_in) => {
                    println!["\\{}  {}", name.bold(), built_in.doc().unwrap_or("")];
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use texpand::prelude as txl;

    fn run_source(vm: &mut vm::VM<StdLibState>, source: &str) -> txl::Result<(String, Summary, String)> {
        vm.push_source("input.tex", source)?;
        let mut out: Vec<u8> = vec![];
        let mut err_out: Vec<u8> = vec![];
        let summary = run_with_error_policy(vm, &mut out, &mut err_out);
        Ok((
            String::from_utf8_lossy(&out).into_owned(),
            summary,
            String::from_utf8_lossy(&err_out).into_owned(),
        ))
    }

    fn new_vm(mode: InteractionMode) -> Box<vm::VM<StdLibState>> {
        colored::control::set_override(false);
        let mut vm = StdLibState::new_vm();
        vm.context
            .set(context::Key::EndLineChar, context::Value::Int(-1), groupingmap::Scope::Global);
        vm.context
            .set_interaction_mode(mode, groupingmap::Scope::Global);
        vm
    }

    #[test]
    fn no_errors() {
        let mut vm = new_vm(InteractionMode::ErrorStop);
        let (output, summary, err_output) =
            run_source(&mut vm, r"\def\a{A}\iftrue\a\else B\fi").unwrap();
        assert_eq!(output, "A");
        assert_eq!(summary.num_errors, 0);
        assert!(!summary.aborted);
        assert_eq!(err_output, "");
    }

    #[test]
    fn errorstop_aborts_at_first_error() {
        let mut vm = new_vm(InteractionMode::ErrorStop);
        let (output, summary, err_output) = run_source(&mut vm, r"A\undefined B\fi C").unwrap();
        assert_eq!(output, "A");
        assert_eq!(summary.num_errors, 1);
        assert!(summary.aborted);
        assert!(err_output.contains("undefined control sequence"), "{err_output}");
    }

    #[test]
    fn nonstop_keeps_going() {
        let mut vm = new_vm(InteractionMode::NonStop);
        let (output, summary, err_output) = run_source(&mut vm, r"A\undefined B\fi C").unwrap();
        assert_eq!(output, "ABC");
        assert_eq!(summary.num_errors, 2);
        assert!(!summary.aborted);
        assert!(err_output.contains("undefined control sequence"), "{err_output}");
        assert!(err_output.contains("extra \\fi"), "{err_output}");
    }

    #[test]
    fn batch_keeps_going_silently() {
        let mut vm = new_vm(InteractionMode::Batch);
        let (output, summary, err_output) = run_source(&mut vm, r"A\fi B").unwrap();
        assert_eq!(output, "AB");
        assert_eq!(summary.num_errors, 1);
        assert_eq!(err_output, "");
    }

    #[test]
    fn document_can_change_the_mode() {
        let mut vm = new_vm(InteractionMode::ErrorStop);
        let (output, summary, _) =
            run_source(&mut vm, r"\nonstopmode A\fi B\errorstopmode\fi C").unwrap();
        assert_eq!(output, "AB");
        assert_eq!(summary.num_errors, 2);
        assert!(summary.aborted);
    }

    #[test]
    fn gives_up_after_too_many_errors() {
        let mut vm = new_vm(InteractionMode::Batch);
        let source = r"\fi".repeat(MAX_ERRORS + 5);
        let (_, summary, err_output) = run_source(&mut vm, &source).unwrap();
        assert_eq!(summary.num_errors, MAX_ERRORS);
        assert!(summary.aborted);
        assert!(err_output.contains("giving up"), "{err_output}");
    }

    #[test]
    fn cli_parses_run_options() {
        let cli = Cli::try_parse_from([
            "texpand",
            "run",
            "doc.tex",
            "--interaction",
            "nonstop",
            "--max-expansion-depth",
            "20",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.sub_command {
            SubCommand::Run(run) => {
                assert_eq!(run.file_path, PathBuf::from("doc.tex"));
                assert_eq!(run.interaction, InteractionMode::NonStop);
                assert_eq!(run.max_expansion_depth, Some(20));
            }
            SubCommand::Doc(_) => panic!("parsed the wrong subcommand"),
        }
        assert!(Cli::try_parse_from(["texpand", "run", "a.tex", "--interaction", "loud"]).is_err());
    }

    #[test]
    fn doc_of_unknown_command() {
        let vm = StdLibState::new_vm();
        assert!(doc(&vm, Some("iftrue".into())).is_ok());
        assert!(doc(&vm, Some(r"\ifnum".into())).is_ok());
        assert_eq!(
            doc(&vm, Some("elephant".into())),
            Err("Unknown command \\elephant".to_string())
        );
    }
}
