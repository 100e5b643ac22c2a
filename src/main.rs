use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config as EditorConfig, Editor, Helper};
use simplelog::{Config as LogConfig, LevelFilter, SimpleLogger};

mod lang;
mod repl;

use lang::runtime::Runtime;
use repl::{fixup_input, ReplHelper};

const HISTORY_FILE: &str = ".bsl_history";
const PROMPT: &str = "(bsl) ";

#[derive(Parser)]
#[command(version, about)]
struct Opt {
    /// Script to run. Starts an interactive session if omitted
    file: Option<PathBuf>,
    /// Show debug output
    #[arg(short, long)]
    debug: bool,
    /// Print the token stream before running
    #[arg(long)]
    tokens: bool,
    /// Print the syntax tree before running
    #[arg(long)]
    ast: bool,
}

fn init_logging(debug: bool) -> Result<()> {
    let filter = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Error
    };

    match SimpleLogger::init(filter, LogConfig::default()) {
        Ok(_) => Ok(()),
        Err(e) => bail!("Failed to init logger: {}", e),
    }
}

fn init_editor() -> Result<Editor<ReplHelper, DefaultHistory>> {
    let config = EditorConfig::builder().auto_add_history(true).build();
    let mut editor = Editor::with_config(config)?;
    let validator = ReplHelper::new();
    editor.set_helper(Some(validator));

    Ok(editor)
}

fn init_history<H: Helper>(editor: &mut Editor<H, DefaultHistory>) {
    let _ = editor.load_history(HISTORY_FILE);
}

fn save_history<H: Helper>(editor: &mut Editor<H, DefaultHistory>) -> Result<()> {
    match editor.save_history(HISTORY_FILE) {
        Ok(_) => Ok(()),
        Err(e) => bail!("Failed to save history: {}", e),
    }
}

fn welcome() {
    println!(r#"bsl v{}"#, env!("CARGO_PKG_VERSION"));
    println!("Type 'quit' to quit");
    println!();
}

fn run_file(runtime: &mut Runtime, path: &Path) -> Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    info!("running {}", path.display());

    runtime.run(&source)?;

    Ok(())
}

fn run_repl(runtime: &mut Runtime) -> Result<()> {
    let mut editor = init_editor()?;
    init_history(&mut editor);
    welcome();

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                info!("read: {}", &line);

                if line.trim() == "quit" {
                    break;
                }

                if let Err(e) = runtime.run(&fixup_input(&line)) {
                    eprintln!("{}", e);
                    continue;
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("Press Ctrl-D or type 'quit' to quit");
            }
            Err(ReadlineError::Eof) => {
                println!("quit");
                break;
            }
            Err(e) => {
                error!("Unexpected error: {}", e);
                println!("quit");
                break;
            }
        }
    }

    save_history(&mut editor)?;

    Ok(())
}

fn main() -> Result<()> {
    let opts = Opt::parse();
    init_logging(opts.debug)?;

    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let mut runtime = Runtime::new(&mut stdout, &mut stderr);
    runtime.set_dump_tokens(opts.tokens);
    runtime.set_dump_ast(opts.ast);

    match &opts.file {
        Some(path) => run_file(&mut runtime, path),
        None => run_repl(&mut runtime),
    }
}
