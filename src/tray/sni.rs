use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use ksni::{menu::StandardItem, Handle, TrayService};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::frames::FrameSet;

use super::{TrayIcon, EXIT_LABEL};

/// State published over D-Bus. ksni reads it from its own thread whenever the host asks.
struct ParrotItem {
    frames: FrameSet,
    frame: usize,
    tooltip: String,
    visible: bool,
    exit: CancellationToken,
}

impl ksni::Tray for ParrotItem {
    fn id(&self) -> String {
        env!("CARGO_PKG_NAME").into()
    }

    fn title(&self) -> String {
        self.tooltip.clone()
    }

    fn status(&self) -> ksni::Status {
        if self.visible {
            ksni::Status::Active
        } else {
            ksni::Status::Passive
        }
    }

    fn icon_pixmap(&self) -> Vec<ksni::Icon> {
        self.frames
            .get(self.frame)
            .map(|frame| {
                vec![ksni::Icon {
                    width: frame.width as i32,
                    height: frame.height as i32,
                    data: frame.argb.clone(),
                }]
            })
            .unwrap_or_default()
    }

    fn tool_tip(&self) -> ksni::ToolTip {
        ksni::ToolTip {
            title: self.tooltip.clone(),
            ..Default::default()
        }
    }

    fn menu(&self) -> Vec<ksni::MenuItem<Self>> {
        vec![StandardItem {
            label: EXIT_LABEL.into(),
            activate: Box::new(|item: &mut Self| {
                info!("Exit requested from tray menu");
                item.exit.cancel();
            }),
            ..Default::default()
        }
        .into()]
    }
}

/// StatusNotifierItem tray, works on KDE, most Wayland compositors and anything with an SNI host.
pub struct SniTray {
    handle: Option<Handle<ParrotItem>>,
    service: Option<JoinHandle<Result<(), dbus::Error>>>,
    frame_count: usize,
    exit: CancellationToken,
}

impl SniTray {
    #[instrument(skip(frames, exit))]
    pub fn new(frames: FrameSet, tooltip: &str, exit: CancellationToken) -> Result<Self> {
        if frames.is_empty() {
            return Err(anyhow!("Tray needs at least one frame"));
        }
        // ksni only connects once its thread is running, so a missing session bus would
        // otherwise surface as a panic on that thread long after startup.
        dbus::blocking::Connection::new_session()
            .context("Failed to connect to the D-Bus session bus")?;

        let frame_count = frames.len();
        let service = TrayService::new(ParrotItem {
            frames,
            frame: 0,
            tooltip: tooltip.into(),
            visible: true,
            exit: exit.clone(),
        });
        let handle = service.handle();
        let service = thread::Builder::new()
            .name("sni-tray".into())
            .spawn(move || service.run())
            .context("Failed to spawn tray service thread")?;
        debug!("Spawned StatusNotifierItem service");
        Ok(Self {
            handle: Some(handle),
            service: Some(service),
            frame_count,
            exit,
        })
    }

    fn update(&mut self, f: impl FnOnce(&mut ParrotItem)) -> Result<()> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| anyhow!("Tray was already released"))?;
        if self.service.as_ref().is_some_and(|s| s.is_finished()) {
            let reason = match self.service.take().map(JoinHandle::join) {
                Some(Ok(Err(e))) => anyhow!("Tray service stopped {e}"),
                _ => anyhow!("Tray service stopped unexpectedly"),
            };
            error!("{reason}, shutting down");
            // Without a tray there is no Exit entry left to stop the animation.
            self.exit.cancel();
            return Err(reason);
        }
        handle.update(f);
        Ok(())
    }
}

impl TrayIcon for SniTray {
    fn set_frame(&mut self, index: usize) -> Result<()> {
        if index >= self.frame_count {
            return Err(anyhow!(
                "Frame {index} is out of range, only {} frames exist",
                self.frame_count
            ));
        }
        self.update(|item| item.frame = index)
    }

    fn set_tooltip(&mut self, text: &str) -> Result<()> {
        self.update(|item| item.tooltip = text.into())
    }

    fn set_visible(&mut self, visible: bool) -> Result<()> {
        self.update(|item| item.visible = visible)
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown();
            debug!("Shut down StatusNotifierItem service");
        }
    }
}

impl Drop for SniTray {
    fn drop(&mut self) {
        self.release();
    }
}
