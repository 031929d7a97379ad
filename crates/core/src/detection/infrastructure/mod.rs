pub mod math;
pub mod replay_nets;
