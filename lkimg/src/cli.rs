//! Command line interface for lkimg

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use crate::VERSION;
use crate::error::{LkImageError, Result};
use crate::image::{LkImage, NewPartition};
use crate::image_types::CertType;

/// Command line arguments for lkimg
#[derive(Parser, Debug)]
#[command(name = "lkimg")]
#[command(version = VERSION)]
#[command(about = "Parse, edit and patch MediaTek LK bootloader images", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - only output errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the partitions in an image
    List(ListArgs),
    /// Add a new partition to an image
    Add(AddArgs),
    /// Remove a partition from an image
    Remove(RemoveArgs),
    /// Attach a certificate to a partition
    Cert(CertArgs),
    /// Apply a binary patch to an image or a single partition
    Patch(PatchArgs),
    /// Extract partition payloads to files
    Extract(ExtractArgs),
}

/// Arguments for listing partitions
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Image file to examine
    pub image: PathBuf,

    /// Print the full header details for every partition
    #[arg(long)]
    pub headers: bool,
}

/// Arguments for adding a partition
#[derive(Parser, Debug)]
pub struct AddArgs {
    /// Image file to modify
    pub image: PathBuf,

    /// Name for the new partition
    pub name: String,

    /// File containing the partition payload
    pub data_file: PathBuf,

    /// Load address (hexadecimal or decimal)
    #[arg(short = 'a', long, value_parser = parse_hex_u64, default_value = "0")]
    pub address: u64,

    /// Addressing mode field
    #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
    pub mode: u32,

    /// Use the legacy header format (default: extended)
    #[arg(long)]
    pub legacy: bool,

    /// Payload alignment boundary
    #[arg(long, default_value_t = crate::LEGACY_ALIGNMENT)]
    pub alignment: u32,

    /// Insert position in the partition order (default: append)
    #[arg(long)]
    pub position: Option<usize>,

    /// Output path (default: the input path with a _modified suffix)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for removing a partition
#[derive(Parser, Debug)]
pub struct RemoveArgs {
    /// Image file to modify
    pub image: PathBuf,

    /// Name of the partition to remove
    pub name: String,

    /// Output path (default: the input path with a _modified suffix)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for attaching a certificate
#[derive(Parser, Debug)]
pub struct CertArgs {
    /// Image file to modify
    pub image: PathBuf,

    /// Name of the partition to attach the certificate to
    pub partition: String,

    /// File containing the certificate data
    pub cert_file: PathBuf,

    /// Certificate type
    #[arg(long, value_enum, default_value = "cert1")]
    pub cert_type: CertTypeArg,

    /// Output path (default: the input path with a _modified suffix)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for applying a binary patch
#[derive(Parser, Debug)]
pub struct PatchArgs {
    /// Image file to modify
    pub image: PathBuf,

    /// Byte sequence to replace, as a hex string
    pub needle: String,

    /// Replacement byte sequence, as a hex string
    pub patch: String,

    /// Confine the search to this partition's payload
    #[arg(short, long)]
    pub partition: Option<String>,

    /// Output path (default: the input path with a _modified suffix)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for extracting partition payloads
#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// Image file to read
    pub image: PathBuf,

    /// Extract only this partition (default: all partitions)
    #[arg(short, long)]
    pub partition: Option<String>,

    /// Directory to write the payload files into
    #[arg(short = 'd', long, default_value = ".")]
    pub dir: PathBuf,
}

/// Certificate type argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum CertTypeArg {
    Cert1,
    Cert2,
}

impl From<CertTypeArg> for CertType {
    fn from(arg: CertTypeArg) -> Self {
        match arg {
            CertTypeArg::Cert1 => Self::Cert1,
            CertTypeArg::Cert2 => Self::Cert2,
        }
    }
}

/// Parse hexadecimal string to u32
fn parse_hex_u32(s: &str) -> std::result::Result<u32, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse::<u32>()
    }
}

/// Parse hexadecimal string to u64
fn parse_hex_u64(s: &str) -> std::result::Result<u64, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse::<u64>()
    }
}

/// Decode a user-supplied hex byte string
fn decode_hex(value: &str) -> Result<Vec<u8>> {
    hex::decode(value.trim()).map_err(|_| LkImageError::invalid_hex(value))
}

/// Default output path: the input name with a _modified suffix
fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let mut name = format!("{stem}_modified");
    if let Some(ext) = input.extension().and_then(|s| s.to_str()) {
        name.push('.');
        name.push_str(ext);
    }
    input.with_file_name(name)
}

/// Main CLI handler
pub fn run_cli(args: Args) -> Result<()> {
    let verbose = args.verbose && !args.quiet;
    let quiet = args.quiet;

    match args.command {
        Commands::List(list_args) => handle_list(list_args, verbose),
        Commands::Add(add_args) => handle_add(add_args, verbose, quiet),
        Commands::Remove(remove_args) => handle_remove(remove_args, verbose, quiet),
        Commands::Cert(cert_args) => handle_cert(cert_args, verbose, quiet),
        Commands::Patch(patch_args) => handle_patch(patch_args, verbose, quiet),
        Commands::Extract(extract_args) => handle_extract(extract_args, verbose, quiet),
    }
}

fn handle_list(args: ListArgs, verbose: bool) -> Result<()> {
    if verbose {
        eprintln!("Reading image: {}", args.image.display());
    }

    let image = LkImage::from_file(&args.image)?;

    println!(
        "LK image version {} with {} partition(s)",
        image.version(),
        image.len()
    );
    println!("{:-<52}", "");
    for (index, partition) in image.partitions().iter().enumerate() {
        let certs = partition.certs().len();
        let certs_info = if certs > 0 {
            format!(" ({certs} certs)")
        } else {
            String::new()
        };
        println!(
            "{:2}. {:<20} {:>10} bytes{}",
            index + 1,
            partition.name(),
            partition.data().len(),
            certs_info
        );
        if args.headers {
            println!("{}", partition.summary());
            println!("{:-<52}", "");
        }
    }
    if !args.headers {
        println!("{:-<52}", "");
    }

    Ok(())
}

fn handle_add(args: AddArgs, verbose: bool, quiet: bool) -> Result<()> {
    let data = std::fs::read(&args.data_file)?;
    if verbose {
        eprintln!(
            "Loaded {} bytes of payload from: {}",
            data.len(),
            args.data_file.display()
        );
    }

    let mut image = LkImage::from_file(&args.image)?;

    let mut spec = NewPartition::new(&args.name, data)
        .load_address(args.address)
        .mode(args.mode)
        .extended(!args.legacy)
        .alignment(args.alignment);
    if let Some(position) = args.position {
        spec = spec.position(position);
    }
    image.add_partition(spec)?;

    let output = args.output.unwrap_or_else(|| default_output(&args.image));
    image.save(&output)?;

    if !quiet {
        eprintln!("Added partition '{}'", args.name);
        eprintln!("Modified image saved: {}", output.display());
    }
    Ok(())
}

fn handle_remove(args: RemoveArgs, verbose: bool, quiet: bool) -> Result<()> {
    let mut image = LkImage::from_file(&args.image)?;
    if verbose {
        eprintln!("Loaded image with {} partition(s)", image.len());
    }

    image.remove_partition(&args.name)?;

    let output = args.output.unwrap_or_else(|| default_output(&args.image));
    image.save(&output)?;

    if !quiet {
        eprintln!("Removed partition '{}'", args.name);
        eprintln!("Modified image saved: {}", output.display());
    }
    Ok(())
}

fn handle_cert(args: CertArgs, verbose: bool, quiet: bool) -> Result<()> {
    let data = std::fs::read(&args.cert_file)?;
    if verbose {
        eprintln!(
            "Loaded {} bytes of certificate data from: {}",
            data.len(),
            args.cert_file.display()
        );
    }

    let cert_type: CertType = args.cert_type.into();
    let mut image = LkImage::from_file(&args.image)?;

    image.add_certificate(&args.partition, data, cert_type)?;
    // Attaching a certificate does not regenerate the byte stream on its
    // own; rebuild before saving.
    image.rebuild();

    let output = args.output.unwrap_or_else(|| default_output(&args.image));
    image.save(&output)?;

    if !quiet {
        eprintln!("Added {} to partition '{}'", cert_type, args.partition);
        eprintln!("Modified image saved: {}", output.display());
    }
    Ok(())
}

fn handle_patch(args: PatchArgs, verbose: bool, quiet: bool) -> Result<()> {
    let needle = decode_hex(&args.needle)?;
    let patch = decode_hex(&args.patch)?;

    let mut image = LkImage::from_file(&args.image)?;
    if verbose {
        match &args.partition {
            Some(name) => eprintln!("Patching partition '{name}'"),
            None => eprintln!("Patching whole image ({} bytes)", image.as_bytes().len()),
        }
    }

    image.apply_patch(&needle, &patch, args.partition.as_deref())?;
    if args.partition.is_some() {
        // A partition-scoped patch may have changed the payload size; the
        // offsets of everything behind it are only valid after a rebuild.
        image.rebuild();
    }

    let output = args.output.unwrap_or_else(|| default_output(&args.image));
    image.save(&output)?;

    if !quiet {
        eprintln!(
            "Replaced {} byte(s) with {} byte(s)",
            needle.len(),
            patch.len()
        );
        eprintln!("Patched image saved: {}", output.display());
    }
    Ok(())
}

fn handle_extract(args: ExtractArgs, verbose: bool, quiet: bool) -> Result<()> {
    let image = LkImage::from_file(&args.image)?;
    if verbose {
        eprintln!("Loaded image with {} partition(s)", image.len());
    }

    std::fs::create_dir_all(&args.dir)?;

    let selected: Vec<&crate::partition::LkPartition> = match &args.partition {
        Some(name) => {
            let partition = image
                .partition(name)
                .ok_or_else(|| LkImageError::partition_not_found(name))?;
            vec![partition]
        }
        None => image.partitions().iter().collect(),
    };

    for partition in selected {
        let path = args.dir.join(format!("{}.bin", partition.name()));
        std::fs::write(&path, partition.data())?;
        if !quiet {
            eprintln!(
                "Extracted '{}' ({} bytes) to {}",
                partition.name(),
                partition.data().len(),
                path.display()
            );
        }
    }
    Ok(())
}
