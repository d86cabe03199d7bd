use anyhow::{bail, Context};
use clap::{ArgAction, Parser};
use disbridge::arch::Architecture;
use disbridge::config::{self, BridgeConfig, Syntax};
use disbridge::disasm::{Bridge, Disassembler, HighlightingDisassembler};
use disbridge::extension::custom_insn::{register_for_riscv, CustomInsnDisassembler};
use disbridge::host::{CapstoneDecoder, Host, ImageMemory, ProcessMemory, SymbolTable, TargetMemory};
use nix::unistd::Pid;
use object::{Object, ObjectSection};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Path to configuration file (default: ~/.config/disb/config.toml)
    #[arg(long, env = "DISB_CONFIG")]
    config: Option<PathBuf>,

    /// Target architecture name (default: architecture of TARGET)
    #[arg(long)]
    arch: Option<String>,

    /// Assembler syntax for x86 targets: att or intel
    #[arg(long)]
    syntax: Option<Syntax>,

    /// Custom instruction description file
    #[arg(long)]
    custom_insn: Option<PathBuf>,

    /// Disable custom instruction display
    #[arg(long)]
    no_custom: bool,

    /// Disable disassembly styling
    #[arg(long)]
    no_style: bool,

    /// Read instructions from memory of a running process instead of the TARGET file
    #[arg(long)]
    pid: Option<i32>,

    /// Address of the first instruction (hex with 0x prefix, or decimal)
    #[arg(long, value_parser = parse_address)]
    start: u64,

    /// Number of instructions to disassemble
    #[arg(long, default_value_t = 10)]
    count: usize,

    /// ELF file, source of symbols (and instructions if --pid is not set)
    target: PathBuf,
}

fn parse_address(raw: &str) -> Result<u64, String> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|e| format!("invalid address `{raw}`: {e}"))
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// True if `address` lies in `[start, start + size)`, sections that wrap past the end of
/// the address space contain nothing.
fn in_section(start: u64, size: u64, address: u64) -> bool {
    start <= address && start.checked_add(size).is_some_and(|end| address < end)
}

/// Memory image of the section that contains `address`.
fn section_image(file: &object::File, address: u64) -> anyhow::Result<ImageMemory> {
    let Some(section) = file
        .sections()
        .find(|s| in_section(s.address(), s.size(), address))
    else {
        bail!("no section contains address {address:#x}");
    };
    let data = section.data()?;
    Ok(ImageMemory::new(section.address(), data.to_vec()))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let mut cfg = BridgeConfig::load(args.config.as_deref());
    if let Some(syntax) = args.syntax {
        cfg.syntax = syntax;
    }
    if args.custom_insn.is_some() {
        cfg.custom_insn_file = args.custom_insn.clone();
    }
    if args.no_custom {
        cfg.custom_insn_display = false;
    }
    if args.no_style || !std::io::stdout().is_terminal() {
        cfg.style_disassembly = false;
    }
    let styled = cfg.style_disassembly;
    config::set(cfg);

    let data = std::fs::read(&args.target)
        .with_context(|| format!("read {}", args.target.display()))?;
    let file = object::File::parse(&*data).context("parse target file")?;

    let arch = match args.arch.as_deref() {
        Some(name) => Architecture::by_name(name)?,
        None => Architecture::from_object(file.architecture())?,
    };

    let memory: Rc<dyn TargetMemory> = match args.pid {
        Some(pid) => Rc::new(ProcessMemory::new(Pid::from_raw(pid))),
        None => Rc::new(section_image(&file, args.start)?),
    };
    let symbols = SymbolTable::from_object(&data)?;

    let host = Host::new(Rc::new(CapstoneDecoder::default()), memory)
        .with_symbols(Rc::new(symbols));
    let bridge = Bridge::new(host);
    if styled {
        let hook: Rc<dyn Disassembler> = Rc::new(HighlightingDisassembler::default());
        bridge.register_disassembler(Some(hook), None);
    }
    register_for_riscv(&bridge, Rc::new(CustomInsnDisassembler::new()));

    for line in bridge.disassemble_range(&arch, args.start, args.count) {
        match line {
            Ok(line) => println!(
                "{}:\t{}",
                bridge.host().format_address(&arch, line.address),
                line.text
            ),
            Err(err) => println!("{err}"),
        }
    }

    Ok(())
}
