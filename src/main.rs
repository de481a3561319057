//! Synacor VM - CLI Entry Point
//!
//! Commands:
//! - `synacor-vm run <image>` - Run an image on the terminal
//! - `synacor-vm debug <image>` - Interactive debugger
//! - `synacor-vm disasm <image>` - Disassemble an image
//! - `synacor-vm decrypt <image> <output>` - Write a decrypted image
//! - `synacor-vm asm <source>` - Assemble to an image
//! - `synacor-vm inspect <checkpoint>` - Show a checkpoint as JSON
//! - `synacor-vm solve <puzzle>` - Run a puzzle solver

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use synacor::config::{LOAD_PATH_ENV, SAVE_PATH_ENV};
use synacor::image::{checkpoint, patch, program};
use synacor::{CpuError, IoConsole, Memory, RunConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synacor-vm")]
#[command(version)]
#[command(about = "A virtual machine and toolkit for the Synacor challenge")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an image until it halts
    Run(RunArgs),
    /// Interactive debugger
    Debug {
        /// Program image
        program: PathBuf,
        /// Resume from this checkpoint
        #[arg(long)]
        load: Option<PathBuf>,
        /// Apply the teleporter patch after loading
        #[arg(long)]
        patch_teleporter: bool,
    },
    /// Disassemble an image to readable text
    Disasm {
        /// Program image
        program: PathBuf,
        /// Decrypt the image before disassembling
        #[arg(long)]
        decrypt: bool,
        /// First address (decimal or 0x hex)
        #[arg(long, value_parser = parse_addr, default_value = "0")]
        start: u16,
        /// End address, exclusive (defaults to the image length)
        #[arg(long, value_parser = parse_addr)]
        end: Option<u16>,
        /// Write the listing here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decrypt an image and remove its own decryption step
    Decrypt {
        /// Encrypted image
        input: PathBuf,
        /// Where to write the decrypted image
        output: PathBuf,
    },
    /// Assemble source to an image
    Asm {
        /// Path to the source file
        source: PathBuf,
        /// Output image (defaults to the source path with a .bin extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a checkpoint's machine state as JSON
    Inspect {
        /// Checkpoint file
        checkpoint: PathBuf,
    },
    /// Solve one of the in-game puzzles
    Solve {
        #[command(subcommand)]
        puzzle: Puzzle,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Program image
    program: PathBuf,
    /// Checkpoint written after each input line
    #[arg(long, env = SAVE_PATH_ENV, default_value = synacor::config::DEFAULT_SAVE_PATH)]
    save: PathBuf,
    /// Checkpoint resumed at startup if it exists
    #[arg(long, env = LOAD_PATH_ENV, default_value = synacor::config::DEFAULT_LOAD_PATH)]
    load: PathBuf,
    /// Neither save nor resume checkpoints
    #[arg(long)]
    no_checkpoint: bool,
    /// Stop after this many instructions
    #[arg(long)]
    max_steps: Option<u64>,
    /// Log every instruction to stderr
    #[arg(short, long)]
    trace: bool,
    /// Apply the teleporter patch after loading
    #[arg(long)]
    patch_teleporter: bool,
    /// Print the final machine state as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Puzzle {
    /// Find the eighth-register value for the teleporter
    Teleporter,
    /// Find the route through the vault orb grid
    Orb,
    /// Find the coin order for the ruins door
    Coins,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let trace = matches!(&cli.command, Commands::Run(args) if args.trace);
    init_tracing(trace);

    let result = match cli.command {
        Commands::Run(args) => run_program(args),
        Commands::Debug {
            program,
            load,
            patch_teleporter,
        } => debug_program(program, load, patch_teleporter),
        Commands::Disasm {
            program,
            decrypt,
            start,
            end,
            output,
        } => disassemble_file(&program, decrypt, start, end, output.as_deref()),
        Commands::Decrypt { input, output } => decrypt_file(&input, &output),
        Commands::Asm { source, output } => assemble_file(&source, output),
        Commands::Inspect { checkpoint } => inspect_checkpoint(&checkpoint),
        Commands::Solve { puzzle } => solve(puzzle),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(trace: bool) {
    let filter = if trace {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_addr(text: &str) -> Result<u16, String> {
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    }
    .map_err(|e| e.to_string())?;

    if value > synacor::cpu::MEMORY_SIZE as u32 {
        return Err(format!("address {} is past the end of memory", value));
    }
    Ok(value as u16)
}

fn run_program(args: RunArgs) -> Result<()> {
    let mut config = RunConfig::new(&args.program);
    config.save_path = Some(args.save);
    config.load_path = Some(args.load);
    if args.no_checkpoint {
        config = config.without_checkpoints();
    }
    config.max_steps = args.max_steps;
    config.patch_teleporter = args.patch_teleporter;

    let mut cpu = config
        .boot()
        .with_context(|| format!("failed to start {}", config.program.display()))?;

    let mut console = IoConsole::stdio();
    let result = match config.max_steps {
        Some(limit) => cpu.run_limited(&mut console, limit),
        None => cpu.run(&mut console),
    };
    console
        .into_output()
        .flush()
        .context("failed to flush output")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&cpu.summary())?);
    }

    match result {
        Ok(_) if cpu.is_running() => {
            eprintln!("⚠️  Stopped after {} steps (--max-steps)", cpu.steps);
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(CpuError::Fault(fault)) => Err(anyhow::Error::new(fault).context("machine fault")),
        Err(e) => Err(e.into()),
    }
}

#[cfg(feature = "tui")]
fn debug_program(program: PathBuf, load: Option<PathBuf>, patch_teleporter: bool) -> Result<()> {
    let mut config = RunConfig::new(program).without_checkpoints();
    config.load_path = load;
    config.patch_teleporter = patch_teleporter;

    let cpu = config
        .boot()
        .with_context(|| format!("failed to start {}", config.program.display()))?;

    synacor::run_debugger(cpu).context("debugger error")
}

#[cfg(not(feature = "tui"))]
fn debug_program(_program: PathBuf, _load: Option<PathBuf>, _patch_teleporter: bool) -> Result<()> {
    bail!("this build does not include the debugger (enable the `tui` feature)")
}

fn disassemble_file(
    path: &Path,
    decrypt: bool,
    start: u16,
    end: Option<u16>,
    output: Option<&Path>,
) -> Result<()> {
    let image = program::load_image(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    let mut mem = Memory::from_image(&image)?;
    if decrypt {
        patch::decrypt(&mut mem);
    }

    let end = end.map_or(image.len(), usize::from);
    if (start as usize) > end {
        bail!("start {:#06x} is after end {:#06x}", start, end);
    }

    let mut listing = String::new();
    for line in synacor::asm::listing(&mem, start as usize, end) {
        listing.push_str(&line.to_string());
        listing.push('\n');
    }

    match output {
        Some(out) => {
            std::fs::write(out, listing)
                .with_context(|| format!("failed to write {}", out.display()))?;
            eprintln!("✓ Wrote listing to {}", out.display());
        }
        None => print!("{}", listing),
    }
    Ok(())
}

fn decrypt_file(input: &Path, output: &Path) -> Result<()> {
    let image = program::load_image(input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    let mut mem = Memory::from_image(&image)?;
    patch::decrypt(&mut mem);

    let len = image.len().max(patch::ENCRYPTED_RANGE.end as usize);
    program::save_image(output, &mem.cells()[..len])?;
    eprintln!("✓ Decrypted {} words to {}", len, output.display());
    Ok(())
}

fn assemble_file(source_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let out_path = output.unwrap_or_else(|| source_path.with_extension("bin"));

    let source = std::fs::read_to_string(source_path)
        .with_context(|| format!("failed to read {}", source_path.display()))?;
    let image = synacor::assemble(&source)
        .with_context(|| format!("failed to assemble {}", source_path.display()))?;

    program::save_image(&out_path, &image)?;
    eprintln!("✓ Assembled {} words to {}", image.len(), out_path.display());
    Ok(())
}

fn inspect_checkpoint(path: &Path) -> Result<()> {
    let cpu = checkpoint::load(path)?;
    println!("{}", serde_json::to_string_pretty(&cpu.summary())?);
    Ok(())
}

fn solve(puzzle: Puzzle) -> Result<()> {
    use synacor::puzzles;

    match puzzle {
        Puzzle::Teleporter => {
            eprintln!("Searching all 32768 register values...");
            match puzzles::find_r7() {
                Some(r7) => println!("{}", r7),
                None => bail!("no register value confirms the teleporter"),
            }
        }
        Puzzle::Orb => {
            let solution = puzzles::solve_orb().context("no route reaches the vault")?;
            for (dir, weight) in solution.moves.iter().zip(&solution.weights) {
                println!("{:<5}  weight {}", dir, weight);
            }
        }
        Puzzle::Coins => {
            let coins = puzzles::solve_coins().context("no coin order satisfies the equation")?;
            let values: Vec<String> = coins.iter().map(|c| c.value().to_string()).collect();
            println!("{}", values.join(" "));
            for coin in coins {
                println!("use {}", coin);
            }
        }
    }
    Ok(())
}
