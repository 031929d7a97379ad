//! Lazy, composable face detection chains.
//!
//! A chain starts at [`tasks::detect_faces_tasks::detect_all_faces`] or
//! [`tasks::detect_faces_tasks::detect_single_face`], may be extended with a
//! landmark stage, and does nothing until its last task is run.
pub mod detection;
pub mod shared;
pub mod tasks;
