pub mod cancellation;
pub mod constants;
pub mod frame;
pub mod net_input;
