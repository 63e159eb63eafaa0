//! `htcode <FILE>` writes `<FILE>.ht` (tree) and `<FILE>.htcode` (payload).
//! `htcode <TREE> <CODE> <OUTPUT>` restores the original into `<OUTPUT>`.

use std::error::Error;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process;

use clap::{CommandFactory, Parser};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use htcode::{bit_io, decode, encode};

const TREE_EXTENSION: &str = ".ht";
const CODE_EXTENSION: &str = ".htcode";

#[derive(Parser, Debug)]
#[command(name = "htcode")]
#[command(version)]
#[command(about = "Static Huffman encoder and decoder", long_about = None)]
struct Args {
    /// FILE to encode, or TREE CODE OUTPUT to decode
    #[arg(value_name = "PATH", required_unless_present = "dump")]
    paths: Vec<PathBuf>,

    /// Print the bits of a file instead
    #[arg(long, value_name = "FILE", conflicts_with = "paths")]
    dump: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: Level,
}

fn with_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(extension);
    PathBuf::from(name)
}

fn run_encode(input: &Path) -> Result<(), Box<dyn Error>> {
    let tree_path = with_extension(input, TREE_EXTENSION);
    let code_path = with_extension(input, CODE_EXTENSION);
    let source = BufReader::new(File::open(input)?);
    let summary = encode(
        source,
        || File::create(&tree_path).map(BufWriter::new),
        || File::create(&code_path).map(BufWriter::new),
    )?;
    match summary {
        Some(summary) => {
            info!(
                input = %input.display(),
                bytes = summary.input_len,
                symbols = summary.distinct_symbols,
                tree_bits = summary.tree_bits,
                payload_bits = summary.payload_bits,
                "encoded"
            );
            println!("Done.");
        }
        None => println!("{} is empty, nothing written.", input.display()),
    }
    Ok(())
}

fn run_decode(
    tree: &Path,
    code: &Path,
    output: &Path,
) -> Result<(), Box<dyn Error>> {
    let tree = BufReader::new(File::open(tree)?);
    let code = BufReader::new(File::open(code)?);
    let out = BufWriter::new(File::create(output)?);
    let summary = decode(tree, code, out)?;
    info!(output = %output.display(), bytes = summary.bytes_written, "decoded");
    println!("Done.");
    Ok(())
}

fn run_dump(path: &Path) -> Result<(), Box<dyn Error>> {
    let source = BufReader::new(File::open(path)?);
    let stdout = io::stdout();
    bit_io::dump_bits(source, stdout.lock())?;
    Ok(())
}

fn main() {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_writer(io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("htcode: could not install logger: {}", e);
    }

    let result = match (&args.dump, args.paths.as_slice()) {
        (Some(path), _) => run_dump(path),
        (None, [input]) => run_encode(input),
        (None, [tree, code, output]) => run_decode(tree, code, output),
        _ => {
            let _ = Args::command().print_help();
            process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("htcode: {}", e);
        process::exit(1);
    }
}
