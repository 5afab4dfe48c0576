//! Command-line interface for weft
//! This binary compiles grammar descriptions into parse-table artifacts and
//! inspects compiled artifacts.
//!
//! Usage:
//!   weft compile `<grammar>` [-o `<artifact>`] [--glr]  - Compile a grammar
//!   weft check `<grammar>`                            - Compile and report diagnostics
//!   weft inspect `<artifact>` [--format `<format>`]     - Describe a compiled artifact

use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::process;

use weft::weft::compile_with_diagnostics;
use weft::weft::grammar::GrammarDescription;
use weft::weft::language::Language;

fn main() {
    let matches = Command::new("weft")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A grammar compiler and parse-table loader for markup languages")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("compile")
                .about("Compile a grammar into an artifact")
                .arg(
                    Arg::new("grammar")
                        .help("Path to the grammar description (.wg, .json, .yaml)")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .help("Artifact output path (defaults to the grammar path with .wfa)"),
                )
                .arg(
                    Arg::new("glr")
                        .long("glr")
                        .help("Enable GLR branching for conflicts that survive resolution")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Compile a grammar and report its conflict diagnostics")
                .arg(
                    Arg::new("grammar")
                        .help("Path to the grammar description")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Load a compiled artifact and describe it")
                .arg(
                    Arg::new("artifact")
                        .help("Path to the artifact file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .help("Output format ('summary' or 'json')")
                        .default_value("summary"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("compile", compile_matches)) => {
            let grammar = compile_matches.get_one::<String>("grammar").unwrap();
            let output = compile_matches.get_one::<String>("output").cloned();
            let glr = compile_matches.get_flag("glr");
            handle_compile(grammar, output, glr);
        }
        Some(("check", check_matches)) => {
            let grammar = check_matches.get_one::<String>("grammar").unwrap();
            handle_check(grammar);
        }
        Some(("inspect", inspect_matches)) => {
            let artifact = inspect_matches.get_one::<String>("artifact").unwrap();
            let format = inspect_matches.get_one::<String>("format").unwrap();
            handle_inspect(artifact, format);
        }
        _ => unreachable!("subcommand is required"),
    }
}

fn load_description(path: &str, glr: bool) -> GrammarDescription {
    let mut description = match GrammarDescription::from_path(path) {
        Ok(description) => description,
        Err(err) => {
            eprintln!("error: {}: {}", path, err);
            process::exit(1);
        }
    };
    if glr {
        description.glr = true;
    }
    description
}

fn handle_compile(grammar: &str, output: Option<String>, glr: bool) {
    let description = load_description(grammar, glr);
    let (artifact, diagnostics) = match compile_with_diagnostics(&description) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("error: {}", err);
            process::exit(1);
        }
    };

    let output = output
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(grammar).with_extension("wfa"));
    if let Err(err) = std::fs::write(&output, artifact.bytes()) {
        eprintln!("error: cannot write {}: {}", output.display(), err);
        process::exit(1);
    }
    println!(
        "compiled `{}` -> {} ({} bytes, {} conflict(s) resolved)",
        description.name,
        output.display(),
        artifact.len(),
        diagnostics.len()
    );
}

fn handle_check(grammar: &str) {
    let description = load_description(grammar, false);
    match compile_with_diagnostics(&description) {
        Ok((artifact, diagnostics)) => {
            println!(
                "ok: `{}` compiles to {} bytes",
                description.name,
                artifact.len()
            );
            if diagnostics.is_empty() {
                println!("no conflicts");
            } else {
                for record in &diagnostics {
                    println!("{}", record);
                }
            }
        }
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    }
}

fn handle_inspect(artifact_path: &str, format: &str) {
    let bytes = match std::fs::read(artifact_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("error: cannot read {}: {}", artifact_path, err);
            process::exit(1);
        }
    };
    let language = match Language::load(&bytes) {
        Ok(language) => language,
        Err(err) => {
            eprintln!("error: {}", err);
            process::exit(1);
        }
    };

    match format {
        "json" => {
            let kinds: Vec<&str> = language.node_kinds().collect();
            let value = serde_json::json!({
                "name": language.name(),
                "version": language.version(),
                "glr": language.glr(),
                "states": language.state_count(),
                "symbols": language.symbol_count(),
                "node_kinds": kinds,
            });
            match serde_json::to_string_pretty(&value) {
                Ok(rendered) => println!("{}", rendered),
                Err(err) => {
                    eprintln!("error: {}", err);
                    process::exit(1);
                }
            }
        }
        "summary" => {
            println!("grammar:  {}", language.name());
            println!("version:  {}", language.version());
            println!("glr:      {}", language.glr());
            println!("states:   {}", language.state_count());
            println!("symbols:  {}", language.symbol_count());
            println!(
                "kinds:    {}",
                language.node_kinds().collect::<Vec<_>>().join(", ")
            );
        }
        other => {
            eprintln!("error: unknown format `{}` (expected 'summary' or 'json')", other);
            process::exit(1);
        }
    }
}
