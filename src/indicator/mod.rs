pub mod line;
pub mod sma;

pub use line::Line;
pub use sma::{sma, SimpleMovingAverage};
