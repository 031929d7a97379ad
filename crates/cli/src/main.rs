use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use serde::Serialize;

use facechain_core::detection::domain::detector_options::{
    DetectorKind, DetectorOptions, MtcnnOptions, SsdMobilenetV1Options, TinyFaceDetectorOptions,
    TinyYolov2Options,
};
use facechain_core::detection::infrastructure::replay_nets::ReplayNets;
use facechain_core::shared::constants::{
    DEFAULT_INPUT_SIZE, DEFAULT_MAX_RESULTS, DEFAULT_MIN_CONFIDENCE, DEFAULT_MTCNN_SCORE_THRESHOLDS,
    DEFAULT_SCORE_THRESHOLD,
};
use facechain_core::shared::frame::Frame;
use facechain_core::shared::net_input::NetInput;
use facechain_core::tasks::composable_task::ComposableTask;
use facechain_core::tasks::detect_faces_tasks::{detect_all_faces, detect_single_face};
use facechain_core::tasks::selection::SelectionPolicy;

/// Run a face detection chain against a recorded inference pass.
#[derive(Parser)]
#[command(name = "facechain")]
struct Cli {
    /// Recording (JSON) the detector and landmark nets replay.
    recording: PathBuf,

    /// Image to pass as input. Defaults to a blank frame of the recorded size.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Detector: mtcnn, tiny_face_detector, ssd_mobilenet_v1 or tiny_yolov2.
    #[arg(long, default_value = "ssd_mobilenet_v1")]
    detector: String,

    /// JSON options document; overrides --detector and the tuning flags.
    #[arg(long)]
    options: Option<PathBuf>,

    /// Detection score threshold (0.0-1.0, exclusive).
    #[arg(long)]
    min_confidence: Option<f64>,

    /// Input size for the tiny detectors (multiple of 32).
    #[arg(long)]
    input_size: Option<u32>,

    /// Keep only one face.
    #[arg(long)]
    single: bool,

    /// With --single, keep the least confident face instead of the most.
    #[arg(long, requires = "single")]
    lowest_score: bool,

    /// Add 68-point landmarks to each face.
    #[arg(long)]
    landmarks: bool,

    /// Use the lightweight landmark net (implies --landmarks).
    #[arg(long)]
    tiny_landmarks: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let replay = ReplayNets::from_path(&cli.recording)?;
    let options = build_options(&cli)?;
    let input = load_input(cli.image.as_deref(), &replay)?;
    let nets = replay.to_nets();
    let with_landmarks = cli.landmarks || cli.tiny_landmarks;

    log::info!(
        "Running {} on {}x{} {} input",
        options.kind(),
        input.width(),
        input.height(),
        input.kind()
    );

    if cli.single {
        let selection = if cli.lowest_score {
            SelectionPolicy::LowestScore
        } else {
            SelectionPolicy::HighestScore
        };
        let task = detect_single_face(&nets, input, options).with_selection(selection);
        if with_landmarks {
            print_result(&task.with_face_landmarks(cli.tiny_landmarks))?;
        } else {
            print_result(&task)?;
        }
    } else {
        let task = detect_all_faces(&nets, input, options);
        if with_landmarks {
            print_result(&task.with_face_landmarks(cli.tiny_landmarks))?;
        } else {
            print_result(&task)?;
        }
    }

    log::info!("Replayed {} backend calls", replay.hits());
    Ok(())
}

fn print_result<T>(task: &T) -> Result<(), Box<dyn std::error::Error>>
where
    T: ComposableTask,
    T::Output: Serialize,
{
    let output = pollster::block_on(task.run())?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_input(
    image: Option<&Path>,
    replay: &ReplayNets,
) -> Result<NetInput, Box<dyn std::error::Error>> {
    if let Some(path) = image {
        return Ok(NetInput::open(path)?);
    }
    let recording = replay.recording();
    let (w, h) = (recording.image_width, recording.image_height);
    let blank = Frame::try_new(vec![0u8; (w as usize) * (h as usize) * 3], w, h, 3)?;
    Ok(NetInput::from(blank))
}

fn build_options(cli: &Cli) -> Result<DetectorOptions, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.options {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read options {}: {e}", path.display()))?;
        return Ok(DetectorOptions::from_json(&json)?);
    }

    let kind: DetectorKind = cli.detector.parse()?;
    let options: DetectorOptions = match kind {
        DetectorKind::SsdMobilenetV1 => SsdMobilenetV1Options::new(
            cli.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
            DEFAULT_MAX_RESULTS,
        )?
        .into(),
        DetectorKind::TinyFaceDetector => TinyFaceDetectorOptions::new(
            cli.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            cli.min_confidence.unwrap_or(DEFAULT_SCORE_THRESHOLD),
        )?
        .into(),
        DetectorKind::TinyYolov2 => TinyYolov2Options::new(
            cli.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            cli.min_confidence.unwrap_or(DEFAULT_SCORE_THRESHOLD),
        )?
        .into(),
        DetectorKind::Mtcnn => {
            let [pnet, rnet, onet] = DEFAULT_MTCNN_SCORE_THRESHOLDS;
            MtcnnOptions::builder()
                .score_thresholds([pnet, rnet, cli.min_confidence.unwrap_or(onet)])
                .build()?
                .into()
        }
    };
    Ok(options)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.recording.exists() {
        return Err(format!("Recording not found: {}", cli.recording.display()).into());
    }
    if let Some(image) = &cli.image {
        if !image.exists() {
            return Err(format!("Image not found: {}", image.display()).into());
        }
    }
    if cli.input_size.is_some() && !cli.detector.contains("tiny") && cli.options.is_none() {
        log::warn!("--input-size only applies to the tiny detectors");
    }
    Ok(())
}
