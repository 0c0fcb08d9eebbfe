mod observation;
mod station;
mod variance;

pub use observation::*;
pub use station::*;
pub use variance::*;
