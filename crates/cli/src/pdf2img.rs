//! pdf2img - Render PDF pages to image files
//!
//! Converts every page of each input PDF (or a single page with `--page`)
//! to BMP or PPM files named `<stem>_page_<index>.<ext>` (zero-based index),
//! reporting progress on stderr and the written files on stdout.

mod common;

use clap::{ArgAction, Parser, ValueEnum};
use pdftoolkit_core::api::{Progress, RenderOptions, render_all_parallel, render_page};
use pdftoolkit_core::error::{PdfError, Result};
use pdftoolkit_core::image::{write_bmp, write_ppm};
use pdftoolkit_core::raster::PixelBuffer;
use pdftoolkit_core::{PDFDocument, file_name, file_stem};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Image file format written for each page.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum ImageFormat {
    /// 24-bit Windows bitmap (default)
    #[default]
    Bmp,
    /// Binary portable pixmap
    Ppm,
}

impl ImageFormat {
    const fn extension(self) -> &'static str {
        match self {
            Self::Bmp => "bmp",
            Self::Ppm => "ppm",
        }
    }
}

/// Render PDF pages to image files.
#[derive(Parser, Debug)]
#[command(name = "pdf2img")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// One or more paths to PDF files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,

    /// Pixels per PDF point
    #[arg(short = 's', long, default_value = "1.0")]
    scale: f64,

    /// Compression quality (0..=1), kept for encoders that use it
    #[arg(short = 'q', long, default_value = "0.7")]
    quality: f64,

    /// Output image format
    #[arg(short = 't', long = "format", value_enum, default_value = "bmp")]
    format: ImageFormat,

    /// Directory for the images (default: the system temp directory)
    #[arg(short = 'o', long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// Render only this page (1-based), as a thumbnail
    #[arg(short = 'p', long)]
    page: Option<usize>,

    /// Anti-alias edges
    #[arg(short = 'a', long = "anti-alias", action = ArgAction::SetTrue)]
    anti_alias: bool,

    /// Number of worker threads (1 renders sequentially)
    #[arg(short = 'j', long, default_value = "1")]
    threads: usize,
}

/// `index` is zero-based, unlike `--page` and the progress lines.
fn output_path(dir: &Path, stem: &str, index: usize, format: ImageFormat) -> PathBuf {
    dir.join(format!("{stem}_page_{index}.{}", format.extension()))
}

fn write_image(path: &Path, buffer: &PixelBuffer, format: ImageFormat) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    match format {
        ImageFormat::Bmp => write_bmp(&mut out, buffer),
        ImageFormat::Ppm => write_ppm(&mut out, buffer),
    }
}

fn report(name: &str, progress: Progress) {
    eprintln!(
        "{name}: page {}/{} ({:.0}%)",
        progress.page,
        progress.total,
        progress.progress * 100.0
    );
}

struct Job<'a> {
    args: &'a Args,
    options: RenderOptions,
    outdir: PathBuf,
}

impl Job<'_> {
    /// Convert one file. Pages that fail are logged and skipped; the
    /// written paths are returned.
    fn convert(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let doc = common::open_document(path)?;
        let path_str = path.to_string_lossy();
        let name = file_name(&path_str);
        let stem = file_stem(&path_str);
        let total = doc.page_count();

        if let Some(page) = self.args.page {
            let index = page
                .checked_sub(1)
                .ok_or_else(|| PdfError::InvalidOption("page numbers start at 1".into()))?;
            let buffer = render_page(&doc, index, &self.options)?;
            let out = output_path(&self.outdir, &stem, index, self.args.format);
            write_image(&out, &buffer, self.args.format)?;
            report(&name, Progress { progress: 1.0, page, total });
            return Ok(vec![out]);
        }

        if self.args.threads > 1 {
            let results = render_all_parallel(&doc, &self.options, self.args.threads)?;
            let mut written = Vec::new();
            for (index, result) in results.into_iter().enumerate() {
                if let Some(out) = self.save_page(&stem, index, result) {
                    written.push(out);
                }
                report(&name, Progress::after_page(index, total));
            }
            return Ok(written);
        }

        Ok(self.convert_sequential(&doc, &name, &stem))
    }

    fn convert_sequential(&self, doc: &PDFDocument, name: &str, stem: &str) -> Vec<PathBuf> {
        let total = doc.page_count();
        let mut written = Vec::new();
        for index in 0..total {
            let result = render_page(doc, index, &self.options);
            if let Some(out) = self.save_page(stem, index, result) {
                written.push(out);
            }
            report(name, Progress::after_page(index, total));
        }
        written
    }

    fn save_page(&self, stem: &str, index: usize, result: Result<PixelBuffer>) -> Option<PathBuf> {
        let out = output_path(&self.outdir, stem, index, self.args.format);
        match result.and_then(|buffer| write_image(&out, &buffer, self.args.format)) {
            Ok(()) => Some(out),
            Err(e) => {
                tracing::warn!(page = index + 1, error = %e, "page conversion failed, continuing");
                None
            }
        }
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    common::init_logging(args.debug);

    if !(0.0..=1.0).contains(&args.quality) {
        eprintln!("Error: quality must be between 0 and 1, got {}", args.quality);
        std::process::exit(1);
    }
    tracing::debug!(quality = args.quality, "quality is not used by BMP/PPM output");

    let options = RenderOptions::new()
        .scale(args.scale)
        .anti_alias(args.anti_alias);
    if let Err(e) = options.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let outdir = args.output_dir.clone().unwrap_or_else(std::env::temp_dir);
    fs::create_dir_all(&outdir)?;
    let job = Job {
        args: &args,
        options,
        outdir,
    };

    let mut failed = false;
    for path in &args.files {
        if !path.exists() {
            eprintln!("Error: File not found: {}", path.display());
            std::process::exit(1);
        }
        match job.convert(path) {
            Ok(written) if written.is_empty() => {
                eprintln!("Error: no pages of {} could be converted", path.display());
                failed = true;
            }
            Ok(written) => {
                for out in written {
                    let abs = fs::canonicalize(&out).unwrap_or(out);
                    println!("file://{}", abs.display());
                }
            }
            Err(e) => {
                eprintln!("Error processing {}: {e}", path.display());
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
