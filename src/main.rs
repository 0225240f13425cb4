use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use indicatif::ParallelProgressIterator;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;
use rayon::prelude::*;
use rootcause::Report;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use splatbake::bake::assemble::Progress;
use splatbake::error::Error;
use splatbake::export;
use splatbake::manifest::Manifest;
use splatbake::manifest::ManifestError;
use splatbake::manifest::load_image;
use splatbake::profile::ClassRebuild;
use splatbake::profile::Profile;
use splatbake::texture::ArrayClass;
use splatbake::texture::ColorSpace;
use splatbake::texture::ImageRef;

/// Bake a terrain layer manifest into albedo and normal texture arrays
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON manifest describing settings, layers and global layers
    manifest: PathBuf,

    /// Directory the slices (and DDS arrays) are written to
    #[clap(short, long, default_value = "out")]
    out: PathBuf,

    /// Also write each array as a DDS container
    #[clap(long)]
    dds: bool,

    /// Write into an output directory that already has files in it
    #[clap(short, long)]
    force: bool,
}

fn bar_style(template: &str) -> Option<ProgressStyle> {
    ProgressStyle::default_bar()
        .template(template)
        .ok()
        .map(|style| style.progress_chars("█▉▊▋▌▍▎▏"))
}

fn decode_images(manifest: &Manifest, base: &Path) -> Result<HashMap<(PathBuf, ColorSpace), ImageRef>, Report<ManifestError>> {
    let paths = manifest.image_paths(base);
    let bar = ProgressBar::new(paths.len() as u64);
    if let Some(style) = bar_style("[{bar:40.green/blue}] {pos}/{len} images") {
        bar.set_style(style);
    }

    let images = paths
        .into_par_iter()
        .progress_with(bar.clone())
        .map(|(path, color_space)| {
            let image = load_image(&path, color_space)?;
            Ok(((path, color_space), image))
        })
        .collect::<Result<HashMap<_, _>, Report<ManifestError>>>()?;
    bar.finish_and_clear();
    Ok(images)
}

fn format_index(index: Option<u32>) -> String {
    index.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string())
}

fn print_index_table(profile: &Profile) {
    println!("{:<24} {:>7} {:>7} {:>7}", "layer", "albedo", "hao", "normal");
    for layer in profile.registry().layers() {
        let baked = layer.baked();
        println!(
            "{:<24} {:>7} {:>7} {:>7}",
            layer.name(),
            format_index(baked.albedo_index()),
            format_index(baked.height_ao_index()),
            format_index(baked.normal_index()),
        );
    }

    let globals = profile.registry().globals();
    let snow = globals.snow.baked();
    println!(
        "{:<24} {:>7} {:>7} {:>7}",
        "snow",
        format_index(snow.albedo_index()),
        format_index(snow.height_ao_index()),
        format_index(snow.normal_index()),
    );
    println!("{:<24} {:>7}", "snow noise", format_index(snow.noise_index()));
    println!(
        "{:<24} {:>7} {:>7} {:>7}",
        "detail normal",
        "-",
        "-",
        format_index(globals.detail_normal.index())
    );
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let occupied = std::fs::read_dir(&args.out)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    if occupied && !args.force {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{:?} is not empty, pass --force to write into it", args.out),
        )
        .into());
    }

    let manifest = Manifest::load(&args.manifest)?;
    let base = args.manifest.parent().unwrap_or(Path::new(".")).to_path_buf();
    let images = decode_images(&manifest, &base)?;
    info!(images = images.len(), "decoded source images");

    let mut profile = manifest.into_profile(&base, |path, color_space| {
        images
            .get(&(path.to_path_buf(), color_space))
            .cloned()
            .ok_or_else(|| Report::new(ManifestError::MissingImage).attach(format!("path: {}", path.display())))
    })?;

    let bar = ProgressBar::new(0);
    if let Some(style) = bar_style("[{bar:40.green/blue}] {pos}/{len} {msg}") {
        bar.set_style(style);
    }
    let report = {
        let record: &mut dyn FnMut(Progress<'_>) = &mut |progress| {
            bar.set_length(progress.total as u64);
            bar.set_position(progress.completed as u64);
            bar.set_message(format!("{}: {}", progress.class, progress.item));
        };
        profile.rebuild(Some(record))
    };
    bar.finish_and_clear();

    for class in [ArrayClass::Albedo, ArrayClass::Normal] {
        if let ClassRebuild::Failed(err) = report.get(class) {
            warn!(%class, %err, "array was not built");
            continue;
        }
        let Some(array) = profile.array(class) else {
            continue;
        };
        let written = export::write_slices_png(array, &args.out, profile.name())?;
        info!(%class, slices = written.len(), "wrote slices");
        if args.dds {
            let path = args.out.join(format!("{}_{class}.dds", profile.name()));
            export::write_array_dds(array, &path)?;
        }
    }

    print_index_table(&profile);
    Ok(())
}
