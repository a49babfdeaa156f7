#![doc = "Drift-corrected steady timer for the steadytick workspace."]

pub mod clock;
pub mod schedule;
pub mod sim;
pub mod timer;

pub use clock::*;
pub use schedule::*;
pub use sim::*;
pub use timer::*;
