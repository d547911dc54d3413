use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use trinet_core::annotate::draw_detections;
use trinet_core::{
    retouch, rotate_bilinear, BoundingBox, DetectorConfig, FaceDetector, Frame, Layout,
    OnnxEvaluator, Rgb,
};

#[derive(Parser)]
#[command(name = "trinet", about = "Cascaded face detection, red-eye removal and pose levelling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect faces and print their boxes and landmarks
    Detect {
        /// Directory holding det1.onnx, det2.onnx and det3.onnx
        model_dir: PathBuf,
        /// Image to scan
        image: PathBuf,
        /// Smallest face side to look for, in pixels
        #[arg(long)]
        min_face: Option<u32>,
        /// TOML file with detector settings (otherwise TRINET_* env vars apply)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print detections as JSON
        #[arg(long)]
        json: bool,
    },
    /// Detect faces, fix red eyes, level the last face's eyes and save the result
    Retouch {
        model_dir: PathBuf,
        image: PathBuf,
        /// Output path (default: <image stem>_done.jpg next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        min_face: Option<u32>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Do not draw boxes and landmarks on the output
        #[arg(long)]
        no_annotate: bool,
    },
    /// Rotate an image about its centre, filling uncovered corners with white
    Rotate {
        image: PathBuf,
        /// Counter-clockwise angle in degrees
        #[arg(long, allow_negative_numbers = true)]
        degrees: f32,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect {
            model_dir,
            image,
            min_face,
            config,
            json,
        } => {
            let frame = load_frame(&image)?;
            let faces = detect(&model_dir, &frame, config.as_deref(), min_face)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&faces)?);
            } else {
                print_faces(&faces);
            }
        }
        Commands::Retouch {
            model_dir,
            image,
            output,
            min_face,
            config,
            no_annotate,
        } => {
            let mut frame = load_frame(&image)?;
            let faces = detect(&model_dir, &frame, config.as_deref(), min_face)?;
            print_faces(&faces);

            if !no_annotate {
                draw_detections(&mut frame, &faces);
            }
            let report = retouch(&mut frame, &faces);
            println!(
                "eyes corrected: {}, roll: {:.2} degrees",
                report.eyes_corrected, report.roll_degrees
            );

            let output = output.unwrap_or_else(|| done_path(&image));
            save_frame(frame, &output)?;
            println!("saved {}", output.display());
        }
        Commands::Rotate { image, degrees, output } => {
            let src = load_frame(&image)?;
            let layout = Layout::packed(
                src.width as usize,
                src.height as usize,
                src.channels as usize,
            );
            let mut dst = Frame::filled(src.width, src.height, src.channels, 0);
            rotate_bilinear(&src.data, layout, &mut dst.data, layout, degrees, Rgb::WHITE);

            let output = output.unwrap_or_else(|| done_path(&image));
            save_frame(dst, &output)?;
            println!("saved {}", output.display());
        }
    }

    Ok(())
}

fn detect(
    model_dir: &Path,
    frame: &Frame,
    config: Option<&Path>,
    min_face: Option<u32>,
) -> Result<Vec<BoundingBox>> {
    let config = match config {
        Some(path) => DetectorConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DetectorConfig::from_env(),
    };
    let evaluator = OnnxEvaluator::load(model_dir)
        .with_context(|| format!("loading models from {}", model_dir.display()))?;
    let mut detector = FaceDetector::new(evaluator, config)?;
    if let Some(min_face) = min_face {
        detector.set_min_face(min_face);
    }

    let start = Instant::now();
    let faces = detector.detect(frame)?;
    tracing::info!(
        faces = faces.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "detection finished"
    );
    Ok(faces)
}

fn print_faces(faces: &[BoundingBox]) {
    println!("face num: {}", faces.len());
    for (i, face) in faces.iter().enumerate() {
        println!(
            "  [{i}] ({}, {}) - ({}, {}) score {:.3}",
            face.x1, face.y1, face.x2, face.y2, face.score
        );
        if let Some(landmarks) = face.landmarks {
            let points: Vec<String> = landmarks
                .iter()
                .map(|(x, y)| format!("({x:.1}, {y:.1})"))
                .collect();
            println!("      landmarks {}", points.join(" "));
        }
    }
}

fn load_frame(path: &Path) -> Result<Frame> {
    let img = image::open(path).with_context(|| format!("reading {}", path.display()))?;
    let frame = Frame::from_image(&img);
    tracing::debug!(
        path = %path.display(),
        width = frame.width,
        height = frame.height,
        channels = frame.channels,
        "image loaded"
    );
    Ok(frame)
}

fn save_frame(frame: Frame, path: &Path) -> Result<()> {
    let img = frame.into_image().context("frame does not describe a supported image")?;
    let is_jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));
    // JPEG has no alpha channel.
    let img = if is_jpeg && img.color().has_alpha() {
        image::DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img
    };
    img.save(path).with_context(|| format!("writing {}", path.display()))
}

/// `<dir>/<stem>_done.jpg` for an input path.
fn done_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
    input.with_file_name(format!("{stem}_done.jpg"))
}
