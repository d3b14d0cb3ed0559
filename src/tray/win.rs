use std::{
    sync::mpsc::{self, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use tray_icon::{
    menu::{Menu, MenuEvent, MenuItem},
    Icon, TrayIcon as ShellIcon, TrayIconBuilder,
};
use windows::Win32::{
    Foundation::HWND,
    UI::WindowsAndMessaging::{DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE},
};

use crate::frames::FrameSet;

use super::{TrayIcon, EXIT_LABEL};

/// How long the tray thread waits for a command before pumping window messages again.
const PUMP_INTERVAL: Duration = Duration::from_millis(10);

enum Command {
    Frame(usize),
    Tooltip(String),
    Visible(bool),
    Release,
}

/// Notification area icon. The shell icon is bound to the thread that created it, so it lives
/// on a dedicated thread running a message pump and takes commands over a channel.
pub struct WinTray {
    commands: Option<Sender<Command>>,
    thread: Option<JoinHandle<()>>,
    frame_count: usize,
    exit: CancellationToken,
}

impl WinTray {
    #[instrument(skip(frames, exit))]
    pub fn new(frames: FrameSet, tooltip: &str, exit: CancellationToken) -> Result<Self> {
        if frames.is_empty() {
            return Err(anyhow!("Tray needs at least one frame"));
        }
        let frame_count = frames.len();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let (commands, receiver) = mpsc::channel();
        let tooltip = tooltip.to_string();
        let menu_exit = exit.clone();

        let thread = thread::Builder::new()
            .name("win-tray".into())
            .spawn(move || {
                let (shell_icon, icons) = match create_shell_icon(&frames, &tooltip, menu_exit) {
                    Ok(v) => {
                        let _ = ready_tx.send(Ok(()));
                        v
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                pump(&shell_icon, &icons, receiver);
                debug!("Tray thread finished");
            })
            .context("Failed to spawn tray thread")?;

        ready_rx
            .recv()
            .context("Tray thread exited before creating the icon")??;
        debug!("Created notification area icon");

        Ok(Self {
            commands: Some(commands),
            thread: Some(thread),
            frame_count,
            exit,
        })
    }

    fn send(&mut self, command: Command) -> Result<()> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| anyhow!("Tray was already released"))?;
        commands.send(command).map_err(|_| {
            error!("Tray thread stopped, shutting down");
            // Without a tray there is no Exit entry left to stop the animation.
            self.exit.cancel();
            anyhow!("Tray thread stopped unexpectedly")
        })
    }
}

fn create_shell_icon(
    frames: &FrameSet,
    tooltip: &str,
    exit: CancellationToken,
) -> Result<(ShellIcon, Vec<Icon>)> {
    let icons = (0..frames.len())
        .filter_map(|index| frames.get(index))
        .map(|frame| {
            Icon::from_rgba(frame.rgba(), frame.width, frame.height)
                .with_context(|| format!("Invalid icon {}", frame.name))
        })
        .collect::<Result<Vec<_>>>()?;

    let exit_item = MenuItem::new(EXIT_LABEL, true, None);
    let menu = Menu::new();
    menu.append(&exit_item)?;
    let exit_id = exit_item.id().clone();
    MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
        if event.id == exit_id {
            info!("Exit requested from tray menu");
            exit.cancel();
        }
    }));

    let shell_icon = TrayIconBuilder::new()
        .with_menu(Box::new(menu))
        .with_tooltip(tooltip)
        .with_icon(icons[0].clone())
        .build()?;
    Ok((shell_icon, icons))
}

fn pump(shell_icon: &ShellIcon, icons: &[Icon], receiver: mpsc::Receiver<Command>) {
    loop {
        unsafe {
            let mut message = MSG::default();
            while PeekMessageW(&mut message, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
                let _ = TranslateMessage(&message);
                DispatchMessageW(&message);
            }
        }

        let result = match receiver.recv_timeout(PUMP_INTERVAL) {
            Ok(Command::Frame(index)) => shell_icon.set_icon(icons.get(index).cloned()),
            Ok(Command::Tooltip(text)) => shell_icon.set_tooltip(Some(text)),
            Ok(Command::Visible(visible)) => shell_icon.set_visible(visible),
            Ok(Command::Release) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => Ok(()),
        };
        if let Err(e) = result {
            error!("Failed to update tray icon {e:?}");
        }
    }
}

impl TrayIcon for WinTray {
    fn set_frame(&mut self, index: usize) -> Result<()> {
        if index >= self.frame_count {
            return Err(anyhow!(
                "Frame {index} is out of range, only {} frames exist",
                self.frame_count
            ));
        }
        self.send(Command::Frame(index))
    }

    fn set_tooltip(&mut self, text: &str) -> Result<()> {
        self.send(Command::Tooltip(text.into()))
    }

    fn set_visible(&mut self, visible: bool) -> Result<()> {
        self.send(Command::Visible(visible))
    }

    fn release(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(Command::Release);
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Tray thread panicked");
            }
            debug!("Removed notification area icon");
        }
    }
}

impl Drop for WinTray {
    fn drop(&mut self) {
        self.release();
    }
}
