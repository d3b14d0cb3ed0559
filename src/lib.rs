//! Tray icon that animates a small spinner and shows current CPU usage as its tooltip.
//! The busier the machine, the faster the spinner turns.
//!

pub mod animation;
pub mod cpu;
pub mod frames;
pub mod timer;
pub mod tray;
pub mod utils;
