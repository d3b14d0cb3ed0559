use std::time::Duration;

use anyhow::Result;
use context::{AnimationContext, INITIAL_TOOLTIP};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    cpu::{CpuCounter, SystemCpuCounter},
    frames::{FrameCounter, FrameSet},
    timer::IntervalTimer,
    tray::{GenericTray, TrayIcon},
    utils::clock::{Clock, DefaultClock},
};

pub mod args;
pub mod context;
pub mod shutdown;

/// Represents the starting point for the tray application. Returns once the user picks Exit or
/// the process is interrupted.
pub async fn start_tray_app(initial_interval: Duration) -> Result<()> {
    let shutdown_token = CancellationToken::new();

    let counter = SystemCpuCounter::new()
        .inspect_err(|e| error!("Failed to acquire CPU counter {e:?}"))?;
    let frames = FrameSet::bundled();
    let frame_count = frames.len();
    let tray = GenericTray::new(frames, INITIAL_TOOLTIP, shutdown_token.clone())
        .inspect_err(|e| error!("Failed to create tray icon {e:?}"))?;

    let context = create_context(
        tray,
        counter,
        initial_interval,
        frame_count,
        DefaultClock,
    )?;

    let (_, animation_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        context.run(shutdown_token),
    );

    if let Err(animation_result) = &animation_result {
        error!("Animation loop got an error {:?}", animation_result);
    }
    info!("Exiting");
    animation_result
}

fn create_context(
    tray: impl TrayIcon + 'static,
    counter: impl CpuCounter + 'static,
    initial_interval: Duration,
    frame_count: usize,
    clock: impl Clock,
) -> Result<AnimationContext> {
    AnimationContext::new(
        Box::new(tray),
        Box::new(counter),
        Box::new(IntervalTimer::new(initial_interval)),
        Box::new(clock),
        FrameCounter::new(frame_count),
    )
}
