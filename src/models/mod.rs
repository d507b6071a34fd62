// Data contracts exchanged between the pipeline stages

pub mod alert;
pub mod feature;
pub mod landmark;
pub mod message;
pub mod movement;
pub mod timestamp;
pub mod training;

pub use alert::*;
pub use feature::*;
pub use landmark::*;
pub use message::*;
pub use movement::*;
pub use training::*;
