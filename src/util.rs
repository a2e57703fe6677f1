mod caches;
mod clock;
mod shutdown_signal;
mod wrapper;

pub use caches::Caches;
pub use clock::Clock;
pub use shutdown_signal::shutdown_signal;
pub use wrapper::Wrapper;
