pub mod planner;
pub mod worker;

pub use planner::{plan, Strategy};
pub use worker::FanoutWorker;
