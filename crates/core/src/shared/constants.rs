pub const SSD_MOBILENET_V1_NET: &str = "ssd_mobilenet_v1";
pub const TINY_FACE_DETECTOR_NET: &str = "tiny_face_detector";
pub const TINY_YOLOV2_NET: &str = "tiny_yolov2";
pub const MTCNN_NET: &str = "mtcnn";
pub const FACE_LANDMARK_68_NET: &str = "face_landmark_68";
pub const FACE_LANDMARK_68_TINY_NET: &str = "face_landmark_68_tiny";

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_MAX_RESULTS: usize = 100;

pub const DEFAULT_INPUT_SIZE: u32 = 416;
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.5;
/// Tiny detectors downsample by 32; input sizes must be a multiple of it.
pub const INPUT_SIZE_STRIDE: u32 = 32;

pub const DEFAULT_MIN_FACE_SIZE: u32 = 20;
pub const DEFAULT_SCALE_FACTOR: f64 = 0.709;
pub const DEFAULT_MAX_NUM_SCALES: usize = 10;
/// Score thresholds for the P-Net, R-Net and O-Net stages.
pub const DEFAULT_MTCNN_SCORE_THRESHOLDS: [f64; 3] = [0.6, 0.7, 0.7];
