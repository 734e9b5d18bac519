#![deny(unsafe_code)]

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing::{event, span, Level};
use tracing_subscriber::prelude::*;

use base::prelude::*;
use rp11::{
    ControlStatus, Controller, ControllerConfig, CoreMemory, DiskAddress, DriveType, Function,
    RegisterId, System, DEVICE_DESCRIPTION,
};

const ABOUT: &str = "Exercise an emulated RP11-C disk pack controller";

/// Run operations on an emulated RP11-C disk controller and its
/// RP02/RP03 drives, through the controller's registers.
#[derive(Parser, Debug)]
#[clap(version, about = ABOUT, long_about = None)]
struct Cli {
    /// Attach a disk image file to a drive, as UNIT=PATH.  May be
    /// repeated.  The file is created if it does not exist.
    #[clap(long = "attach", value_parser = parse_unit_assignment::<PathBuf>)]
    attach: Vec<(usize, PathBuf)>,

    /// Set the type of a drive, as UNIT=RP02 or UNIT=RP03.
    #[clap(long = "type", value_parser = parse_unit_assignment::<DriveType>)]
    drive_types: Vec<(usize, DriveType)>,

    /// Do not choose the drive type of UNIT from the size of its
    /// image.
    #[clap(long = "no-autosize", value_name = "UNIT")]
    no_autosize: Vec<usize>,

    /// Write-lock UNIT.
    #[clap(long = "lock", value_name = "UNIT")]
    lock: Vec<usize>,

    /// Write lockout setting, OFF or ON;<address> (for example
    /// "ON;0407").
    #[clap(long)]
    protect: Option<String>,

    /// Size of memory, in 16-bit words.
    #[clap(long = "memory-words", default_value_t = CoreMemory::MAX_WORDS)]
    memory_words: usize,

    /// Print registers as JSON.
    #[clap(long)]
    json: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Describe the controller, the drive types and the attached
    /// drives.
    Info,
    /// Read WORDS words starting at the given disk address into
    /// memory at address 0, and print them.
    Read {
        unit: usize,
        cylinder: u16,
        head: u16,
        sector: u16,
        words: usize,
    },
    /// Write WORDS words of a test pattern starting at the given disk
    /// address.
    Write {
        unit: usize,
        cylinder: u16,
        head: u16,
        sector: u16,
        words: usize,
        /// First word of the pattern.
        #[clap(long, default_value_t = 0)]
        seed: u16,
    },
    /// Move the heads of UNIT to CYLINDER.
    Seek { unit: usize, cylinder: u16 },
    /// Print the controller's registers.
    Dump,
}

#[derive(Debug)]
enum Fail {
    BadAssignment(String),
    BadWordCount(usize),
}

impl Display for Fail {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Fail::BadAssignment(s) => write!(f, "{s}"),
            Fail::BadWordCount(n) => write!(
                f,
                "cannot transfer {n} words; a transfer moves between 1 and 65536 words"
            ),
        }
    }
}

impl Error for Fail {}

/// Parse an option value of the form `UNIT=VALUE`.
fn parse_unit_assignment<T>(s: &str) -> Result<(usize, T), String>
where
    T: FromStr,
    T::Err: Display,
{
    let bad = |why: String| Fail::BadAssignment(format!("'{s}': {why}")).to_string();
    let (unit, value) = s
        .split_once('=')
        .ok_or_else(|| bad("expected UNIT=VALUE".to_string()))?;
    let unit: usize = unit
        .trim()
        .parse()
        .map_err(|e| bad(format!("bad unit number: {e}")))?;
    let value = value.parse::<T>().map_err(|e| bad(e.to_string()))?;
    Ok((unit, value))
}

fn configure(sys: &mut System, cli: &Cli) -> Result<(), Box<dyn Error>> {
    let controller = sys.controller_mut();
    for (n, drive_type) in cli.drive_types.iter() {
        controller.set_drive_type(Controller::unit(*n)?, *drive_type)?;
    }
    for n in cli.no_autosize.iter() {
        controller.set_autosize(Controller::unit(*n)?, false);
    }
    for (n, path) in cli.attach.iter() {
        controller.attach_file(Controller::unit(*n)?, path, false)?;
    }
    for n in cli.lock.iter() {
        controller.set_write_locked(Controller::unit(*n)?, true)?;
    }
    if let Some(setting) = cli.protect.as_deref() {
        controller.set_protect(setting)?;
    }
    Ok(())
}

fn print_registers(sys: &mut System, json: bool) -> Result<(), Box<dyn Error>> {
    let snapshot = sys.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("{snapshot}");
    }
    Ok(())
}

fn print_words(start: BusAddress, words: &[Word]) {
    for (i, chunk) in words.chunks(8).enumerate() {
        let addr = start.wrapping_add_words((i * 8) as u32);
        let text: Vec<String> = chunk.iter().map(|w| format!("{w:06o}")).collect();
        println!("{addr:o}: {}", text.join(" "));
    }
}

fn info(sys: &System) {
    println!("{DEVICE_DESCRIPTION}");
    println!();
    print!("{}", Controller::drive_table());
    println!();
    let controller = sys.controller();
    for unit in UnitNumber::all() {
        if let Some(name) = controller.image_name(unit) {
            println!(
                "{unit}: {} {name}{}",
                controller.drive_type(unit),
                if controller.is_write_locked(unit) {
                    " (write locked)"
                } else {
                    ""
                }
            );
        }
    }
    println!("{}", controller.protect());
}

/// Load the registers for a transfer and start it, then run until
/// it completes.  Returns the number of words transferred.
fn transfer(
    sys: &mut System,
    function: Function,
    unit: UnitNumber,
    cylinder: u16,
    head: u16,
    sector: u16,
    words: usize,
) -> Result<usize, Box<dyn Error>> {
    if !(1..=0x1_0000).contains(&words) {
        return Err(Box::new(Fail::BadWordCount(words)));
    }
    let span = span!(Level::INFO, "transfer", function = %function, unit = %unit);
    let _enter = span.enter();
    sys.write_register(RegisterId::Rpca, cylinder);
    sys.write_register(
        RegisterId::Rpda,
        DiskAddress::from_parts(head, sector).bits(),
    );
    // The word count is negative; zero means 65536.
    sys.write_register(RegisterId::Rpwc, ((0x1_0000 - words) & 0xFFFF) as Word);
    sys.write_register(RegisterId::Rpba, 0);
    sys.write_register(RegisterId::Rpcs, ControlStatus::command(function, unit));
    let finished = sys.run_until_idle();
    event!(Level::INFO, "finished at {finished:?}");

    let cs = sys.read_register(RegisterId::Rpcs);
    let ba = sys.read_register(RegisterId::Rpba);
    Ok(words_moved(BusAddress::ZERO, cs, ba))
}

/// How many words a transfer which began at `start` moved, judged by
/// how far the bus address (RPBA with the extension bits from RPCS)
/// advanced.  RPWC cannot tell a full 65536-word transfer from one
/// which never started.
fn words_moved(start: BusAddress, rpcs: Word, rpba: Word) -> usize {
    let extension = ControlStatus::from_bits(rpcs).memory_extension();
    let end = BusAddress::from_parts(extension, rpba);
    end.word_index().saturating_sub(start.word_index())
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    // See
    // https://docs.rs/tracing-subscriber/0.3/tracing_subscriber/fmt/index.html#filtering-events-with-environment-variables
    // for instructions on how to select which trace messages get
    // printed.
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let filter_layer = match tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
    {
        Err(e) => {
            return Err(Box::new(e));
        }
        Ok(layer) => layer,
    };
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let mut sys = System::new(ControllerConfig::default(), cli.memory_words);
    configure(&mut sys, &cli)?;

    match cli.command {
        Command::Info => {
            info(&sys);
            Ok(())
        }
        Command::Dump => print_registers(&mut sys, cli.json),
        Command::Seek { unit, cylinder } => {
            let unit = Controller::unit(unit)?;
            sys.write_register(RegisterId::Rpca, cylinder);
            sys.write_register(RegisterId::Rpcs, ControlStatus::command(Function::Seek, unit));
            let finished = sys.run_until_idle();
            event!(Level::INFO, "seek finished at {finished:?}");
            print_registers(&mut sys, cli.json)
        }
        Command::Read {
            unit,
            cylinder,
            head,
            sector,
            words,
        } => {
            let unit = Controller::unit(unit)?;
            let done = transfer(&mut sys, Function::Read, unit, cylinder, head, sector, words)?;
            if !cli.json {
                print_words(BusAddress::ZERO, sys.memory().slice(BusAddress::ZERO, done));
            }
            print_registers(&mut sys, cli.json)
        }
        Command::Write {
            unit,
            cylinder,
            head,
            sector,
            words,
            seed,
        } => {
            let unit = Controller::unit(unit)?;
            let data: Vec<Word> = (0..words)
                .map(|i| seed.wrapping_add((i & 0xFFFF) as Word))
                .collect();
            sys.memory_mut().load(BusAddress::ZERO, &data);
            let done = transfer(&mut sys, Function::Write, unit, cylinder, head, sector, words)?;
            event!(Level::INFO, "{done} of {words} words written");
            print_registers(&mut sys, cli.json)
        }
    }
}

fn main() {
    match run() {
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
        Ok(()) => {
            std::process::exit(0);
        }
    }
}

#[test]
fn test_parse_unit_assignment() {
    assert_eq!(
        parse_unit_assignment::<DriveType>("1=rp02"),
        Ok((1, DriveType::Rp02))
    );
    assert_eq!(
        parse_unit_assignment::<PathBuf>("0=/tmp/pack.dsk"),
        Ok((0, PathBuf::from("/tmp/pack.dsk")))
    );
    assert!(parse_unit_assignment::<DriveType>("1").is_err());
    assert!(parse_unit_assignment::<DriveType>("x=RP03").is_err());
    assert!(parse_unit_assignment::<DriveType>("2=RP04").is_err());
}

#[test]
fn test_words_moved() {
    // Rejected before anything moved.
    assert_eq!(words_moved(BusAddress::ZERO, 0o100_200, 0), 0);
    assert_eq!(words_moved(BusAddress::ZERO, 0o200, 0o1000), 256);
    // A full 65536-word transfer carries into the extension bits.
    assert_eq!(words_moved(BusAddress::ZERO, 0o240, 0), 0x1_0000);
}

#[test]
fn test_cli_options() {
    let cli = Cli::try_parse_from([
        "rp11sim",
        "--attach",
        "0=pack.dsk",
        "--type",
        "0=RP02",
        "--lock",
        "0",
        "--protect",
        "ON;0407",
        "read",
        "0",
        "10",
        "2",
        "3",
        "256",
    ])
    .expect("valid command line");
    assert_eq!(cli.attach, vec![(0, PathBuf::from("pack.dsk"))]);
    assert_eq!(cli.drive_types, vec![(0, DriveType::Rp02)]);
    assert_eq!(cli.lock, vec![0]);
    assert!(matches!(
        cli.command,
        Command::Read {
            unit: 0,
            cylinder: 10,
            head: 2,
            sector: 3,
            words: 256
        }
    ));
}
