//! A CLI tool for inspecting and decoding
//! DICOM files with HTJ2K encapsulated pixel data.
use clap::{Parser, Subcommand};
use dicom_core::Tag;
use dicom_dictionary_std::uids;
use dicom_encoding::TransferSyntaxIndex;
use dicom_htj2k::object::{fragmented_stream, put_native_pixel_data};
use dicom_htj2k::ops::apply_ops;
use dicom_htj2k::{
    resolve, CodecParameters, CodecRegistry, DecodeOptions, Endianness, GeometryDescriptor,
    Htj2kVariant, PlanarConfigurationPolicy, UidCreation,
};
use dicom_object::{open_file, DefaultDicomObject};
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use snafu::{OptionExt, Report, ResultExt, Whatever};
use std::path::{Path, PathBuf};
use tracing::{warn, Level};

/// Exit code for when an error emerged while reading the DICOM file.
const ERROR_READ: i32 = -2;
/// Exit code for when an error emerged while decoding the pixel data.
const ERROR_DECODE: i32 = -3;
/// Exit code for when an error emerged while writing the file.
const ERROR_WRITE: i32 = -4;
/// Exit code for any other error.
const ERROR_OTHER: i32 = -128;

/// Inspect and decode DICOM files with HTJ2K pixel data
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    #[command(subcommand)]
    command: Command,

    /// Do not trust the basic offset table
    #[arg(long, global = true)]
    ignore_offset_table: bool,

    /// Verbose mode
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the fragments holding each frame
    Frames {
        /// The DICOM file to inspect
        file: PathBuf,
    },
    /// Decode the pixel data into a native transfer syntax
    Decode {
        /// The DICOM file to decode
        file: PathBuf,

        /// The output file (default is to change the extension to .new.dcm)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Write to Explicit VR Big Endian
        #[arg(long = "big-endian")]
        big_endian: bool,

        /// Planar configuration of color images:
        /// restore, auto, by-pixel or by-plane
        #[arg(long = "planar", default_value = "restore")]
        planar_configuration: PlanarConfigurationPolicy,

        /// Whether to create a new SOP instance UID:
        /// default, always or never
        #[arg(long = "uid", default_value = "default")]
        uid_creation: UidCreation,
    },
}

fn main() {
    run().unwrap_or_else(|e| {
        eprintln!("{}", Report::from_error(e));
        std::process::exit(ERROR_OTHER);
    });
}

fn run() -> Result<(), Whatever> {
    let App {
        command,
        ignore_offset_table,
        verbose,
    } = App::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
            .finish(),
    )
    .unwrap_or_else(|e| {
        eprintln!("{}", Report::from_error(e));
    });

    match command {
        Command::Frames { file } => {
            let obj = open(&file);
            list_frames(&obj, !ignore_offset_table)
        }
        Command::Decode {
            file,
            output,
            big_endian,
            planar_configuration,
            uid_creation,
        } => {
            let output = output.unwrap_or_else(|| {
                let mut file = file.clone();
                file.set_extension("new.dcm");
                file
            });
            let params = CodecParameters::new()
                .with_ignore_offset_table(ignore_offset_table)
                .with_planar_configuration(planar_configuration)
                .with_uid_creation(uid_creation);

            let mut obj = open(&file);
            decode(&mut obj, params, big_endian).unwrap_or_else(|e| {
                eprintln!("{}", Report::from_error(e));
                std::process::exit(ERROR_DECODE);
            });
            obj.write_to_file(output).unwrap_or_else(|e| {
                eprintln!("{}", Report::from_error(e));
                std::process::exit(ERROR_WRITE);
            });
            Ok(())
        }
    }
}

fn open(file: &Path) -> DefaultDicomObject {
    open_file(file).unwrap_or_else(|e| {
        eprintln!("{}", Report::from_error(e));
        std::process::exit(ERROR_READ);
    })
}

fn variant_of(obj: &DefaultDicomObject) -> Result<Htj2kVariant, Whatever> {
    let ts = obj.meta().transfer_syntax();
    Htj2kVariant::from_uid(ts)
        .with_whatever_context(|| format!("Transfer syntax {} is not HTJ2K", ts))
}

fn list_frames(obj: &DefaultDicomObject, trust_offset_table: bool) -> Result<(), Whatever> {
    let variant = variant_of(obj)?;
    let geometry =
        GeometryDescriptor::from_document(&**obj).whatever_context("Unsupported image")?;
    let stream = fragmented_stream(&**obj).whatever_context("Could not read pixel data")?;

    println!("{}", variant.name());
    println!(
        "{}x{}, {} samples per pixel, {} bits stored",
        geometry.columns, geometry.rows, geometry.samples_per_pixel, geometry.bits_stored
    );
    println!(
        "{} frame(s) in {} fragment(s), offset table with {} entries",
        geometry.number_of_frames,
        stream.num_fragments(),
        stream.offset_table_entries().len()
    );

    let frames = geometry
        .number_of_frames
        .min(stream.num_fragments() as u32)
        .max(1);
    let mut start = 1;
    for frame in 0..frames {
        let range = resolve(frame, frames, start, &stream, trust_offset_table)
            .whatever_context("Could not locate frame")?;
        let size: usize = stream.fragments()[range.first - 1..range.end() - 1]
            .iter()
            .map(Vec::len)
            .sum();
        println!(
            "#{}: fragments {}..{} ({} bytes)",
            frame,
            range.first,
            range.end(),
            size
        );
        start = range.end();
    }
    Ok(())
}

#[cfg(any(feature = "openjp2", feature = "openjpeg-sys"))]
fn registry(params: CodecParameters) -> Result<CodecRegistry, Whatever> {
    Ok(CodecRegistry::with_codecs(
        params,
        dicom_htj2k::adapters::jpeg2k::Jpeg2kCodestream,
    ))
}

#[cfg(not(any(feature = "openjp2", feature = "openjpeg-sys")))]
fn registry(_params: CodecParameters) -> Result<CodecRegistry, Whatever> {
    snafu::whatever!("No HTJ2K codestream library was enabled in this build")
}

fn decode(
    obj: &mut DefaultDicomObject,
    params: CodecParameters,
    big_endian: bool,
) -> Result<(), Whatever> {
    let variant = variant_of(obj)?;
    let (target, byte_order) = if big_endian {
        (uids::EXPLICIT_VR_BIG_ENDIAN, Endianness::Big)
    } else {
        (uids::EXPLICIT_VR_LITTLE_ENDIAN, Endianness::Little)
    };
    let ts = TransferSyntaxRegistry
        .get(target)
        .whatever_context("Missing native transfer syntax")?;

    let registry = registry(params)?;
    let codec = registry
        .transcoder(variant.uid(), target)
        .whatever_context("No decoder available")?;

    let stream = fragmented_stream(&**obj).whatever_context("Could not read pixel data")?;
    let geometry =
        GeometryDescriptor::from_document(&**obj).whatever_context("Unsupported image")?;
    let decoded = codec
        .decode(&**obj, &stream, &DecodeOptions::new().with_byte_order(byte_order))
        .whatever_context("Could not decode pixel data")?;

    put_native_pixel_data(&mut **obj, decoded.data, geometry.bits_allocated);
    apply_ops(&mut **obj, decoded.attribute_ops)
        .whatever_context("Could not update image attributes")?;
    // Encapsulated Pixel Data Value Total Length
    obj.remove_element(Tag(0x7FE0, 0x0003));
    if decoded.new_instance_required {
        warn!("The decoded object should be given a new SOP Instance UID");
    }

    obj.update_meta(|meta| meta.set_transfer_syntax(ts));
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::App;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        App::command().debug_assert();
    }
}
