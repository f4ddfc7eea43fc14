//! `moor-emergency`: a wizard-permission stdin REPL over a database with no
//! network listener, for recovering a database a regular boot can't load
//! cleanly (spec §6 "Emergency mode").
//!
//! Usage: `moor-emergency -e DB [LOGFILE]`. Lines starting with `;` are
//! compiled as `return <expr>;` and run with wizard permissions; anything
//! else is echoed as unrecognized. `quit` checkpoints and exits.

use clap::Parser;
use moor_core::builtins::BuiltinRegistry;
use moor_core::compiler::compile_verb;
use moor_core::objstore::ObjectStore;
use moor_core::scheduler::task::{Task, TaskKind};
use moor_core::scheduler::{Scheduler, ServerOptions, TaskOutcome};
use moor_core::textdump::{read_textdump_file, write_textdump_file, DbVersion, LoadedDatabase};
use moor_core::value::ObjId;
use moor_core::vm::activation::Activation;
use moor_core::vm::interpreter::Vm;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "moor-emergency", about = "Emergency wizard REPL over a database")]
struct Args {
    #[arg(short = 'e', long = "db")]
    db: PathBuf,

    /// Optional path to append a transcript of the session to.
    log_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();

    let args = Args::parse();
    let LoadedDatabase { store: mut store, scheduler: mut scheduler, version } =
        read_textdump_file(&args.db)?;
    println!("moor-emergency: loaded {:?}, {} objects", version, store.iter_live().count());

    let mut log = args
        .log_file
        .as_ref()
        .map(|p| std::fs::OpenOptions::new().create(true).append(true).open(p))
        .transpose()?;

    let builtins = BuiltinRegistry::new();
    let opts = ServerOptions::read(&store);
    let wizard = ObjId::SYSTEM;

    let stdin = io::stdin();
    print!("; ");
    io::stdout().flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        if let Some(f) = log.as_mut() {
            writeln!(f, "{line}")?;
        }
        let trimmed = line.trim();
        if trimmed == "quit" {
            break;
        }
        if let Some(expr) = trimmed.strip_prefix(';') {
            eval(expr, wizard, &mut store, &mut scheduler, &builtins, &opts);
        } else if !trimmed.is_empty() {
            println!("I don't understand that (prefix evaluation lines with ';').");
        }
        print!("; ");
        io::stdout().flush()?;
    }

    write_textdump_file(&args.db, DbVersion::V17, &store, &scheduler)?;
    println!("moor-emergency: checkpoint written to {:?}", args.db);
    Ok(())
}

fn eval(
    expr: &str,
    wizard: ObjId,
    store: &mut ObjectStore,
    scheduler: &mut Scheduler,
    builtins: &BuiltinRegistry,
    opts: &ServerOptions,
) {
    let source = vec![format!("return {expr};")];
    let program = match compile_verb(&source) {
        Ok(p) => p,
        Err(e) => {
            println!("compile error: {e:?}");
            return;
        }
    };
    let act = Activation::new(
        Arc::new(program),
        wizard,
        wizard,
        ObjId::NOTHING,
        wizard,
        "eval".to_string(),
        wizard,
        Vec::new(),
    );
    let vm = Vm::with_limits(act, opts.fg_ticks, opts.max_stack_depth);
    let task = Task::new(0, TaskKind::Foreground, wizard, vm);
    scheduler.queues.ready.push_back(task);

    let mut done = false;
    scheduler.drain(store, builtins, opts, &mut |outcome| {
        done = true;
        match outcome {
            TaskOutcome::Complete { result, notifications, .. } => {
                for (_, text) in notifications {
                    println!("{}", String::from_utf8_lossy(&text));
                }
                println!("=> {result}");
            }
            TaskOutcome::Aborted { traceback, notifications, .. } => {
                for (_, text) in notifications {
                    println!("{}", String::from_utf8_lossy(&text));
                }
                println!("** {traceback}");
            }
            TaskOutcome::StillRunning => {}
        }
    });
    if !done {
        println!("(no result)");
    }
}
