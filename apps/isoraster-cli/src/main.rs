use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use isoraster_common::PixelSurface;
use isoraster_palette::TextureSource;
use isoraster_raster::{
    AlphaRecord, FlatRecord, FrameStats, GouraudRecord, PackedRecord, ParallelBackend,
    RasterConfig, Rasterizer, TexturedRecord, TriangleKind,
};
use isoraster_scene::{DEMO_TEXTURES, DemoScene, FlushStats, SceneBatcher, SceneConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "isoraster-cli", about = "CLI tool for the isoraster software rasterizer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, crate info and the default configuration
    Info,
    /// Render the demo scene and optionally write it as PNG
    Render {
        #[arg(short, long, value_enum, default_value_t = Backend::Sequential)]
        backend: Backend,
        /// YAML rasterizer configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output PNG path
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Demo scene size in tiles per side
        #[arg(short, long, default_value = "8")]
        tiles: u32,
        /// Frames to render; the last one is kept
        #[arg(short, long, default_value = "1")]
        frames: u32,
    },
    /// Render with both backends and check the frames are identical
    Compare {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, default_value = "8")]
        tiles: u32,
    },
    /// Print the packed record words queued for one demo frame
    Dump {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, default_value = "8")]
        tiles: u32,
        /// Only dump this triangle kind
        #[arg(short, long, value_enum)]
        kind: Option<Kind>,
        /// Records printed per kind
        #[arg(short, long, default_value = "4")]
        limit: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Flat,
    Gouraud,
    Textured,
    Alpha,
}

impl From<Kind> for TriangleKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Flat => TriangleKind::Flat,
            Kind::Gouraud => TriangleKind::Gouraud,
            Kind::Textured => TriangleKind::Textured,
            Kind::Alpha => TriangleKind::Alpha,
        }
    }
}

fn record_words(kind: TriangleKind) -> usize {
    match kind {
        TriangleKind::Flat => FlatRecord::WORDS,
        TriangleKind::Gouraud => GouraudRecord::WORDS,
        TriangleKind::Textured => TexturedRecord::WORDS,
        TriangleKind::Alpha => AlphaRecord::WORDS,
    }
}

fn load_config(path: Option<&Path>) -> Result<RasterConfig> {
    match path {
        Some(path) => RasterConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(RasterConfig::default()),
    }
}

fn demo_textures() -> [TextureSource; 4] {
    [
        TextureSource::checker(0x8a5a2b, 0x6b4420, 8, false),
        TextureSource::checker(0x7a3b1c, 0x40200c, 16, false),
        TextureSource::checker(0xc8b080, 0x000000, 4, true),
        TextureSource::checker(0x506070, 0x304050, 32, false),
    ]
}

fn make_rasterizer(config: RasterConfig, backend: Backend) -> Result<Rasterizer> {
    let mut raster = match backend {
        Backend::Sequential => Rasterizer::new(config),
        Backend::Parallel => {
            let workers = config.worker_count();
            Rasterizer::with_backend(config, Box::new(ParallelBackend::new(workers)))
        }
    }
    .context("creating rasterizer")?;
    for (id, source) in DEMO_TEXTURES.zip(demo_textures()) {
        raster
            .set_texture(id, source)
            .with_context(|| format!("loading demo texture {id}"))?;
    }
    Ok(raster)
}

/// Batch and rasterize `frames` frames of the demo scene. The queue of the
/// last frame is left in `raster` for inspection.
fn render_demo(raster: &mut Rasterizer, tiles: u32, frames: u32) -> Result<(FrameStats, FlushStats)> {
    let scene = DemoScene::build(tiles).context("building demo scene")?;
    let mut batcher = SceneBatcher::new(SceneConfig::default())?;
    scene.load_into(&mut batcher);
    let projection = scene.camera(raster.viewport());

    let mut flush = FlushStats::default();
    for _ in 0..frames.max(1) {
        scene
            .draw(&mut batcher, projection.camera)
            .context("batching demo frame")?;
        raster.start_scene();
        flush = batcher.flush(&projection, raster);
        raster.end_scene().context("rasterizing demo frame")?;
        batcher.end_frame();
    }
    tracing::debug!(
        cache_hits = batcher.cache().stats().hits,
        cached = batcher.cache().len(),
        "demo render finished"
    );
    Ok((raster.last_frame().clone(), flush))
}

fn write_png(surface: &PixelSurface, path: &Path) -> Result<()> {
    let image = image::RgbImage::from_raw(surface.width(), surface.height(), surface.to_rgb8())
        .context("surface size does not match its pixel data")?;
    image
        .save(path)
        .with_context(|| format!("writing {}", path.display()))
}

fn print_frame(stats: &FrameStats, flush: &FlushStats, surface: &PixelSurface) {
    println!(
        "frame {} on {}: opaque={} alpha={} skipped={} rejected={} in {:?}",
        stats.frame,
        stats.backend,
        stats.opaque,
        stats.alpha,
        stats.skipped,
        stats.rejected,
        stats.elapsed
    );
    println!(
        "batch: commands={} triangles={} culled={} legacy={}",
        flush.commands, flush.triangles, flush.culled, flush.legacy
    );
    println!(
        "surface {}x{} digest={}",
        surface.width(),
        surface.height(),
        surface.digest()
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("isoraster-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", isoraster_common::crate_info());
            println!("palette: {}", isoraster_palette::crate_info());
            println!("batch: {}", isoraster_batch::crate_info());
            println!("cache: {}", isoraster_cache::crate_info());
            println!("raster: {}", isoraster_raster::crate_info());
            println!("scene: {}", isoraster_scene::crate_info());
            println!("default config:\n{}", RasterConfig::default().to_yaml()?);
        }
        Commands::Render {
            backend,
            config,
            out,
            tiles,
            frames,
        } => {
            let config = load_config(config.as_deref())?;
            let mut raster = make_rasterizer(config, backend)?;
            let (stats, flush) = render_demo(&mut raster, tiles, frames)?;
            print_frame(&stats, &flush, raster.surface());
            if let Some(out) = out {
                write_png(raster.surface(), &out)?;
                println!("wrote {}", out.display());
            }
        }
        Commands::Compare { config, tiles } => {
            let config = load_config(config.as_deref())?;
            let mut digests = Vec::new();
            for backend in [Backend::Sequential, Backend::Parallel] {
                let mut raster = make_rasterizer(config.clone(), backend)?;
                let (stats, flush) = render_demo(&mut raster, tiles, 1)?;
                print_frame(&stats, &flush, raster.surface());
                digests.push(raster.surface().digest());
            }
            if digests[0] != digests[1] {
                anyhow::bail!("backends disagree: {} vs {}", digests[0], digests[1]);
            }
            println!("Match: OK");
        }
        Commands::Dump {
            config,
            tiles,
            kind,
            limit,
        } => {
            let config = load_config(config.as_deref())?;
            let mut raster = make_rasterizer(config, Backend::Sequential)?;
            render_demo(&mut raster, tiles, 1)?;
            let kinds = match kind {
                Some(kind) => vec![kind.into()],
                None => TriangleKind::ALL.to_vec(),
            };
            let queue = raster.queue();
            for kind in kinds {
                let words = queue.as_words(kind);
                let stride = record_words(kind);
                println!("{}: {} records", kind.name(), queue.count(kind));
                for record in words.chunks_exact(stride).take(limit) {
                    let line: Vec<String> = record.iter().map(|w| format!("{w:#010x}")).collect();
                    println!("  {}", line.join(" "));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> RasterConfig {
        RasterConfig {
            workers: Some(2),
            ..RasterConfig::with_size(128, 96)
        }
    }

    #[test]
    fn parses_render_arguments() {
        let cli = Cli::try_parse_from(["isoraster-cli", "render", "--backend", "parallel", "-t", "4"])
            .unwrap();
        match cli.command {
            Commands::Render { backend, tiles, .. } => {
                assert_eq!(backend, Backend::Parallel);
                assert_eq!(tiles, 4);
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn backends_render_the_same_demo_frame() {
        let mut digests = Vec::new();
        for backend in [Backend::Sequential, Backend::Parallel] {
            let mut raster = make_rasterizer(small_config(), backend).unwrap();
            let (stats, flush) = render_demo(&mut raster, 6, 2).unwrap();
            assert_eq!(stats.frame, 2);
            assert!(flush.triangles > 0);
            digests.push(raster.surface().digest());
        }
        assert_eq!(digests[0], digests[1]);
    }

    #[test]
    fn png_export_round_trips_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut raster = make_rasterizer(small_config(), Backend::Sequential).unwrap();
        render_demo(&mut raster, 4, 1).unwrap();
        write_png(raster.surface(), &path).unwrap();
        let image = image::open(&path).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (128, 96));
        let px = raster.surface().get(10, 80).unwrap();
        let [r, g, b] = image.get_pixel(10, 80).0;
        assert_eq!(px & 0xff_ffff, (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b));
    }

    #[test]
    fn dumped_words_match_record_stride() {
        let mut raster = make_rasterizer(small_config(), Backend::Sequential).unwrap();
        render_demo(&mut raster, 4, 1).unwrap();
        for kind in TriangleKind::ALL {
            let words = raster.queue().as_words(kind);
            assert_eq!(words.len(), raster.queue().count(kind) * record_words(kind));
        }
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = load_config(Some(Path::new("/nonexistent/isoraster.yaml"))).unwrap_err();
        assert!(format!("{err:#}").contains("loading config"));
    }
}
