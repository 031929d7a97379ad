pub mod composable_task;
pub mod detect_faces_tasks;
pub mod detect_landmarks_tasks;
pub mod error;
pub mod selection;

#[cfg(test)]
pub(crate) mod test_support;
