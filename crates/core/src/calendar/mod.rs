//! Date arithmetic for pregnancy and cycle tracking.

mod cycle;
mod fetal;
mod pregnancy;

pub use cycle::*;
pub use fetal::*;
pub use pregnancy::*;
