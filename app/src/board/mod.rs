//! Board bring-up: pins, timer backend and engine construction.

#[cfg(feature = "hrtim")]
mod g474;
#[cfg(feature = "hrtim")]
pub use g474::run;

#[cfg(feature = "tim")]
mod h743;
#[cfg(feature = "tim")]
pub use h743::run;
