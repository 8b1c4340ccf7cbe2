//! lc3-vmm: LC-3 virtual machine monitor with a virtio block device

use std::env;
use std::path::{Path, PathBuf};
use std::process;

use thiserror::Error;

use lc3_vmm::config::Config;
use lc3_vmm::device::{Console, StdConsole};
use lc3_vmm::interpreter::{Monitor, RunState};
use lc3_vmm::terminal::{self, RawModeGuard};

const USAGE: &str = "usage: lc3-vmm [--trace] [--sync-memory FILE] <image-file>
       lc3-vmm --sample-config";

/// Exit status for a bad command line.
const EXIT_USAGE: i32 = 2;

/// Exit status when the image cannot be loaded.
const EXIT_LOAD_FAILURE: i32 = 1;

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Help,
    SampleConfig,
    Run(Cli),
}

/// Options for running an image.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Cli {
    image: PathBuf,
    trace: bool,
    sync_memory: Option<String>,
}

impl Cli {
    /// Fold command-line options over the loaded configuration.
    fn apply(&self, config: &mut Config) {
        if self.trace {
            config.trace = Some(true);
        }
        if let Some(path) = &self.sync_memory {
            config.memory_sync = Some(path.clone());
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
enum UsageError {
    #[error("missing image file")]
    MissingImage,
    #[error("only one image file may be given, got extra {0:?}")]
    ExtraImage(String),
    #[error("unknown option: {0}")]
    UnknownOption(String),
    #[error("{0} needs a value")]
    MissingValue(&'static str),
}

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Code(i32),
    Abort,
}

/// Parse arguments, excluding the program name.
fn parse_args<I>(args: I) -> Result<Command, UsageError>
where
    I: IntoIterator<Item = String>,
{
    let mut image = None;
    let mut trace = false;
    let mut sync_memory = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--sample-config" => return Ok(Command::SampleConfig),
            "--trace" => trace = true,
            "--sync-memory" => {
                sync_memory = Some(iter.next().ok_or(UsageError::MissingValue("--sync-memory"))?);
            }
            other if other.starts_with('-') => {
                return Err(UsageError::UnknownOption(other.to_string()));
            }
            other if image.is_some() => return Err(UsageError::ExtraImage(other.to_string())),
            other => image = Some(PathBuf::from(other)),
        }
    }

    let image = image.ok_or(UsageError::MissingImage)?;
    Ok(Command::Run(Cli {
        image,
        trace,
        sync_memory,
    }))
}

/// Build the monitor and load `image` into it.
fn boot(config: &Config, image: &Path, console: Box<dyn Console>) -> Result<Monitor, Exit> {
    let mut vm = Monitor::with_config(config, console);
    match vm.load_image(image) {
        Ok(_) => Ok(vm),
        Err(e) => {
            eprintln!("failed to load image: {}", e);
            Err(Exit::Code(EXIT_LOAD_FAILURE))
        }
    }
}

/// Process outcome for the state the run loop stopped in.
fn exit_for(state: RunState) -> Exit {
    match state {
        RunState::Halted | RunState::Running => Exit::Code(0),
        RunState::Aborted => Exit::Abort,
    }
}

fn finish(exit: Exit) -> ! {
    match exit {
        Exit::Code(code) => process::exit(code),
        Exit::Abort => {
            eprintln!("aborted: unsupported opcode");
            process::abort()
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = match parse_args(env::args().skip(1)) {
        Ok(Command::Help) => {
            println!("{}", USAGE);
            return Ok(());
        }
        Ok(Command::SampleConfig) => {
            print!("{}", Config::sample_config());
            if let Some(path) = Config::user_config_path() {
                eprintln!("# user config location: {}", path.display());
            }
            return Ok(());
        }
        Ok(Command::Run(cli)) => cli,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            finish(Exit::Code(EXIT_USAGE));
        }
    };

    let mut config = Config::load();
    cli.apply(&mut config);

    let mut vm = match boot(&config, &cli.image, Box::new(StdConsole::new())) {
        Ok(vm) => vm,
        Err(exit) => finish(exit),
    };

    let guard = RawModeGuard::enable();
    terminal::install_interrupt_handler(guard.as_ref().map(|g| g.original()))?;

    let result = vm.run();
    drop(guard);

    let state = result?;
    log::info!(
        "stopped {:?} after {} instructions at 0x{:04X}",
        state,
        vm.cpu().steps(),
        vm.registers().pc
    );

    if let Some(path) = config.memory_sync() {
        vm.sync_memory(path)?;
    }

    match exit_for(state) {
        Exit::Code(0) => Ok(()),
        exit => finish(exit),
    }
}
