use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace};

use crate::{
    cpu::CpuCounter,
    frames::FrameCounter,
    timer::Timer,
    tray::TrayIcon,
    utils::{clock::Clock, percentage::Percentage},
};

/// Tooltip shown until the first tick replaces it.
pub const INITIAL_TOOLTIP: &str = "CPU Parrot";
/// Tick delay at 0% load. Every percent of load shortens it by a millisecond.
pub const MAX_TIMER_LIMIT_MS: f64 = 102.;
const CPU_DIGITS: i32 = 2;

/// Delay until the next tick. Busier machines animate faster.
pub fn next_interval(cpu: Percentage) -> Duration {
    let ms = MAX_TIMER_LIMIT_MS - *cpu.clamped();
    // Fractional milliseconds are truncated.
    Duration::from_millis(ms as u64)
}

pub fn tooltip_text(cpu: Percentage) -> String {
    format!("CPU Usage: {cpu}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    Terminated,
}

/// What a single tick did, mostly useful for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub frame: usize,
    pub cpu: Percentage,
    pub tooltip: String,
    pub interval: Duration,
}

/// Owns everything the animation needs. Nothing here is shared, the tick loop is the only
/// mutator.
pub struct AnimationContext {
    tray: Box<dyn TrayIcon>,
    counter: Box<dyn CpuCounter>,
    timer: Box<dyn Timer>,
    clock: Box<dyn Clock>,
    frames: FrameCounter,
    tooltip: String,
    state: LifecycleState,
}

impl AnimationContext {
    /// Puts the tray into its initial state: first frame, initial tooltip, visible.
    pub fn new(
        mut tray: Box<dyn TrayIcon>,
        counter: Box<dyn CpuCounter>,
        timer: Box<dyn Timer>,
        clock: Box<dyn Clock>,
        frames: FrameCounter,
    ) -> Result<Self> {
        tray.set_frame(frames.current())?;
        tray.set_tooltip(INITIAL_TOOLTIP)?;
        tray.set_visible(true)?;
        debug!("Tray initialized, first tick in {:?}", timer.interval());
        Ok(Self {
            tray,
            counter,
            timer,
            clock,
            frames,
            tooltip: INITIAL_TOOLTIP.into(),
            state: LifecycleState::Running,
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn frame(&self) -> usize {
        self.frames.current()
    }

    /// Samples the counter, reschedules the timer and moves to the next frame. The frame index
    /// only moves once the tray actually shows the new frame.
    pub fn tick(&mut self) -> Result<TickReport> {
        if self.state == LifecycleState::Terminated {
            return Err(anyhow!("Tick after the animation was terminated"));
        }

        let raw = self.counter.next_value()?;
        let cpu = Percentage::new_opt(raw)
            .ok_or_else(|| anyhow!("Counter returned invalid CPU usage {raw}"))?
            .rounded(CPU_DIGITS);
        let interval = next_interval(cpu);
        self.timer.set_interval(interval);

        let frame = self.frames.peek_next();
        self.tray.set_frame(frame)?;
        self.frames.advance();

        // The counter repeats itself between refreshes, no need to push the same text again.
        let tooltip = tooltip_text(cpu);
        if tooltip != self.tooltip {
            self.tray.set_tooltip(&tooltip)?;
            self.tooltip.clone_from(&tooltip);
        }

        Ok(TickReport {
            frame,
            cpu,
            tooltip,
            interval,
        })
    }

    /// Executes the tick loop until `shutdown` is cancelled, then tears everything down.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        let started = self.clock.instant();
        let mut ticks = 0u64;
        info!("Starting animation");

        while self.timer.is_enabled() {
            let interval = self.timer.interval();
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = self.clock.sleep(interval) => (),
            }

            match self.tick() {
                Ok(report) => {
                    ticks += 1;
                    trace!("Tick {:?}", report);
                }
                Err(e) => {
                    error!("Encountered an error during tick {:?}", e)
                }
            }
        }

        self.shutdown();
        info!(
            "Animation stopped after {ticks} ticks, ran for {:?}",
            self.clock.instant() - started
        );
        Ok(())
    }

    /// Hides the icon, then releases the timer, the counter and the tray, in that order.
    /// Calling it again does nothing.
    #[instrument(skip(self))]
    pub fn shutdown(&mut self) {
        if self.state == LifecycleState::Terminated {
            return;
        }
        // Otherwise the icon lingers in the notification area until hovered.
        if let Err(e) = self.tray.set_visible(false) {
            error!("Failed to hide tray icon {e:?}");
        }
        self.timer.stop();
        self.counter.release();
        self.tray.release();
        self.state = LifecycleState::Terminated;
        debug!("Released animation resources");
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::{anyhow, Result};
    use mockall::{predicate::eq, Sequence};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::{
        cpu::MockCpuCounter,
        frames::{FrameCounter, FRAME_COUNT},
        timer::{IntervalTimer, MockTimer},
        tray::MockTrayIcon,
        utils::{clock::DefaultClock, logging::TEST_LOGGING},
    };

    fn percentage(value: f64) -> Percentage {
        Percentage::new_opt(value).unwrap()
    }

    fn tray_accepting_everything() -> MockTrayIcon {
        let mut tray = MockTrayIcon::new();
        tray.expect_set_frame().returning(|_| Ok(()));
        tray.expect_set_tooltip().returning(|_| Ok(()));
        tray.expect_set_visible().returning(|_| Ok(()));
        tray.expect_release().return_const(());
        tray
    }

    fn constant_counter(value: f64) -> MockCpuCounter {
        let mut counter = MockCpuCounter::new();
        counter.expect_next_value().returning(move || Ok(value));
        counter.expect_release().return_const(());
        counter
    }

    fn context_with(
        tray: MockTrayIcon,
        counter: MockCpuCounter,
        start_frame: usize,
    ) -> AnimationContext {
        AnimationContext::new(
            Box::new(tray),
            Box::new(counter),
            Box::new(IntervalTimer::default()),
            Box::new(DefaultClock),
            FrameCounter::starting_at(start_frame, FRAME_COUNT),
        )
        .unwrap()
    }

    #[test]
    fn interval_bounds() {
        assert_eq!(next_interval(percentage(100.)), Duration::from_millis(2));
        assert_eq!(next_interval(percentage(0.)), Duration::from_millis(102));
        assert_eq!(next_interval(percentage(37.46)), Duration::from_millis(64));
    }

    #[test]
    fn interval_is_clamped_for_out_of_range_readings() {
        assert_eq!(next_interval(percentage(130.)), Duration::from_millis(2));
        assert_eq!(next_interval(percentage(100.01)), Duration::from_millis(2));
    }

    #[test]
    fn interval_matches_formula_across_range() {
        for step in 0..=10_000 {
            let cpu = percentage(step as f64 / 100.);
            let expected = (102. - *cpu) as u64;
            assert_eq!(next_interval(cpu), Duration::from_millis(expected));
            assert!((2..=102).contains(&expected));
        }
    }

    #[test]
    fn tooltip_format() {
        assert_eq!(tooltip_text(percentage(37.46)), "CPU Usage: 37.46%");
        assert_eq!(tooltip_text(percentage(100.)), "CPU Usage: 100%");
        assert_eq!(tooltip_text(percentage(0.5)), "CPU Usage: 0.5%");
    }

    #[test]
    fn initialize_shows_first_frame() {
        let mut tray = MockTrayIcon::new();
        let mut seq = Sequence::new();
        tray.expect_set_frame()
            .with(eq(0))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        tray.expect_set_tooltip()
            .withf(|text: &str| text == INITIAL_TOOLTIP)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        tray.expect_set_visible()
            .with(eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let context = context_with(tray, MockCpuCounter::new(), 0);
        assert_eq!(context.state(), LifecycleState::Running);
        assert_eq!(context.frame(), 0);
    }

    #[test]
    fn failing_tray_is_a_startup_error() {
        let mut tray = MockTrayIcon::new();
        tray.expect_set_frame()
            .returning(|_| Err(anyhow!("no notification area")));
        let result = AnimationContext::new(
            Box::new(tray),
            Box::new(MockCpuCounter::new()),
            Box::new(IntervalTimer::default()),
            Box::new(DefaultClock),
            FrameCounter::new(FRAME_COUNT),
        );
        assert!(result.is_err());
    }

    #[test]
    fn tick_rounds_reading_and_reschedules() -> Result<()> {
        let mut tray = MockTrayIcon::new();
        tray.expect_set_frame().returning(|_| Ok(()));
        tray.expect_set_visible().returning(|_| Ok(()));
        tray.expect_set_tooltip()
            .withf(|text: &str| text == INITIAL_TOOLTIP)
            .times(1)
            .returning(|_| Ok(()));
        tray.expect_set_tooltip()
            .withf(|text: &str| text == "CPU Usage: 37.46%")
            .times(1)
            .returning(|_| Ok(()));

        let mut timer = MockTimer::new();
        timer
            .expect_interval()
            .return_const(Duration::from_millis(50));
        timer
            .expect_set_interval()
            .with(eq(Duration::from_millis(64)))
            .times(1)
            .return_const(());

        let mut context = AnimationContext::new(
            Box::new(tray),
            Box::new(constant_counter(37.456)),
            Box::new(timer),
            Box::new(DefaultClock),
            FrameCounter::new(FRAME_COUNT),
        )?;

        let report = context.tick()?;
        assert_eq!(report.frame, 1);
        assert_eq!(*report.cpu, 37.46);
        assert_eq!(report.tooltip, "CPU Usage: 37.46%");
        assert_eq!(report.interval, Duration::from_millis(64));
        Ok(())
    }

    #[test]
    fn eleven_ticks_from_last_frame_wrap_once() -> Result<()> {
        let shown = Arc::new(Mutex::new(Vec::new()));
        let mut tray = MockTrayIcon::new();
        let recorded = shown.clone();
        tray.expect_set_frame().returning(move |index| {
            recorded.lock().unwrap().push(index);
            Ok(())
        });
        tray.expect_set_tooltip().returning(|_| Ok(()));
        tray.expect_set_visible().returning(|_| Ok(()));

        let mut context = context_with(tray, constant_counter(12.), 9);
        let frames = (0..11)
            .map(|_| context.tick().map(|report| report.frame))
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(frames, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0]);
        // The first entry is the initial frame shown during initialization.
        assert_eq!(shown.lock().unwrap()[0], 9);
        assert_eq!(&shown.lock().unwrap()[1..], frames.as_slice());
        Ok(())
    }

    #[test]
    fn counter_failure_leaves_frame_untouched() {
        let mut counter = MockCpuCounter::new();
        counter
            .expect_next_value()
            .returning(|| Err(anyhow!("counter unavailable")));
        let mut context = context_with(tray_accepting_everything(), counter, 4);

        assert!(context.tick().is_err());
        assert_eq!(context.frame(), 4);
    }

    #[test]
    fn failed_frame_update_keeps_index_but_reschedules() {
        let mut tray = MockTrayIcon::new();
        tray.expect_set_frame().with(eq(2)).returning(|_| Ok(()));
        tray.expect_set_frame()
            .with(eq(3))
            .times(1)
            .returning(|_| Err(anyhow!("icon rejected")));
        tray.expect_set_tooltip().returning(|_| Ok(()));
        tray.expect_set_visible().returning(|_| Ok(()));

        let mut timer = MockTimer::new();
        timer
            .expect_interval()
            .return_const(Duration::from_millis(50));
        timer
            .expect_set_interval()
            .with(eq(Duration::from_millis(12)))
            .times(1)
            .return_const(());

        let mut context = AnimationContext::new(
            Box::new(tray),
            Box::new(constant_counter(90.)),
            Box::new(timer),
            Box::new(DefaultClock),
            FrameCounter::starting_at(2, FRAME_COUNT),
        )
        .unwrap();

        assert!(context.tick().is_err());
        assert_eq!(context.frame(), 2);
    }

    #[test]
    fn unchanged_tooltip_is_not_pushed_again() -> Result<()> {
        let readings = Arc::new(Mutex::new(vec![20., 20., 20., 35.5].into_iter()));
        let mut counter = MockCpuCounter::new();
        counter
            .expect_next_value()
            .returning(move || Ok(readings.lock().unwrap().next().unwrap()));

        let mut tray = MockTrayIcon::new();
        tray.expect_set_frame().returning(|_| Ok(()));
        tray.expect_set_visible().returning(|_| Ok(()));
        tray.expect_set_tooltip()
            .withf(|text: &str| text == INITIAL_TOOLTIP)
            .times(1)
            .returning(|_| Ok(()));
        tray.expect_set_tooltip()
            .withf(|text: &str| text == "CPU Usage: 20%")
            .times(1)
            .returning(|_| Ok(()));
        tray.expect_set_tooltip()
            .withf(|text: &str| text == "CPU Usage: 35.5%")
            .times(1)
            .returning(|_| Ok(()));

        let mut context = context_with(tray, counter, 0);
        let frames = (0..4)
            .map(|_| context.tick().map(|report| report.frame))
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(frames, vec![1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn negative_reading_is_rejected() {
        let mut context = context_with(tray_accepting_everything(), constant_counter(-1.), 0);
        assert!(context.tick().is_err());
        assert_eq!(context.frame(), 0);
    }

    #[test]
    fn shutdown_hides_icon_before_releasing_handles() {
        let mut seq = Sequence::new();
        let mut tray = MockTrayIcon::new();
        let mut timer = MockTimer::new();
        let mut counter = MockCpuCounter::new();

        tray.expect_set_frame().returning(|_| Ok(()));
        tray.expect_set_tooltip().returning(|_| Ok(()));
        tray.expect_set_visible()
            .with(eq(true))
            .times(1)
            .returning(|_| Ok(()));
        timer
            .expect_interval()
            .return_const(Duration::from_millis(50));

        tray.expect_set_visible()
            .with(eq(false))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        timer
            .expect_stop()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        counter
            .expect_release()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        tray.expect_release()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let mut context = AnimationContext::new(
            Box::new(tray),
            Box::new(counter),
            Box::new(timer),
            Box::new(DefaultClock),
            FrameCounter::new(FRAME_COUNT),
        )
        .unwrap();

        context.shutdown();
        assert_eq!(context.state(), LifecycleState::Terminated);
        // Second call must not reach any of the handles again.
        context.shutdown();
        assert!(context.tick().is_err());
    }

    #[test]
    fn shutdown_continues_when_hiding_fails() {
        let mut tray = MockTrayIcon::new();
        tray.expect_set_frame().returning(|_| Ok(()));
        tray.expect_set_tooltip().returning(|_| Ok(()));
        tray.expect_set_visible()
            .with(eq(true))
            .returning(|_| Ok(()));
        tray.expect_set_visible()
            .with(eq(false))
            .returning(|_| Err(anyhow!("bus went away")));
        tray.expect_release().times(1).return_const(());

        let mut counter = MockCpuCounter::new();
        counter.expect_release().times(1).return_const(());

        let mut context = context_with(tray, counter, 0);
        context.shutdown();
        assert_eq!(context.state(), LifecycleState::Terminated);
    }

    /// Runs the loop on a paused clock: 50ms for the first tick, then 52ms per tick at 50% load.
    #[tokio::test(start_paused = true)]
    async fn run_ticks_until_cancelled() -> Result<()> {
        *TEST_LOGGING;
        let frames_shown = Arc::new(Mutex::new(0usize));
        let mut tray = MockTrayIcon::new();
        let recorded = frames_shown.clone();
        tray.expect_set_frame().returning(move |_| {
            *recorded.lock().unwrap() += 1;
            Ok(())
        });
        tray.expect_set_tooltip().returning(|_| Ok(()));
        tray.expect_set_visible().returning(|_| Ok(()));
        tray.expect_release().times(1).return_const(());

        let mut counter = MockCpuCounter::new();
        counter.expect_next_value().times(9).returning(|| Ok(50.));
        counter.expect_release().times(1).return_const(());

        let context = context_with(tray, counter, 0);
        let shutdown = CancellationToken::new();

        let (_, result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                shutdown.cancel();
            },
            context.run(shutdown.clone()),
        );
        result?;

        // Initial frame plus one per tick at 50, 102, 154, ..., 466ms.
        assert_eq!(*frames_shown.lock().unwrap(), 10);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn run_survives_failing_ticks() -> Result<()> {
        *TEST_LOGGING;
        let mut counter = MockCpuCounter::new();
        let mut failures = 0;
        counter.expect_next_value().returning(move || {
            failures += 1;
            if failures <= 2 {
                Err(anyhow!("not ready"))
            } else {
                Ok(1.)
            }
        });
        counter.expect_release().times(1).return_const(());

        let context = context_with(tray_accepting_everything(), counter, 0);
        let shutdown = CancellationToken::new();
        let (_, result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(1000)).await;
                shutdown.cancel();
            },
            context.run(shutdown.clone()),
        );
        result
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_first_tick_never_samples() -> Result<()> {
        let mut counter = MockCpuCounter::new();
        counter.expect_next_value().never();
        counter.expect_release().times(1).return_const(());

        let context = context_with(tray_accepting_everything(), counter, 0);
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        context.run(shutdown).await
    }
}
