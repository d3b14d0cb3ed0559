//! Contains the platform tray surfaces the animation draws onto.
//! [GenericTray] is the main artifact of this module that abstracts the backends.

#[cfg(feature = "sni")]
pub mod sni;

#[cfg(all(feature = "win", windows))]
pub mod win;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::frames::FrameSet;

/// Label of the single context menu entry.
pub const EXIT_LABEL: &str = "Exit";

/// Contract every tray backend implements.
#[cfg_attr(test, mockall::automock)]
pub trait TrayIcon {
    /// Shows the frame with the given index from the set the tray was created with.
    fn set_frame(&mut self, index: usize) -> Result<()>;

    fn set_tooltip(&mut self, text: &str) -> Result<()>;

    fn set_visible(&mut self, visible: bool) -> Result<()>;

    /// Removes the icon from the notification area for good.
    fn release(&mut self);
}

/// Serves as a cross-compatible TrayIcon implementation.
pub struct GenericTray {
    inner: Box<dyn TrayIcon>,
}

impl GenericTray {
    /// Creates a visible tray showing the first frame. Choosing the exit entry cancels `exit`.
    pub fn new(frames: FrameSet, tooltip: &str, exit: CancellationToken) -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "sni")] {
                use sni::SniTray;
                Ok(Self {
                    inner: Box::new(SniTray::new(frames, tooltip, exit)?),
                })
            }
            else if #[cfg(all(feature = "win", windows))] {
                use win::WinTray;
                Ok(Self {
                    inner: Box::new(WinTray::new(frames, tooltip, exit)?),
                })
            }
            else {
                let _ = (frames, tooltip, exit);
                Err(anyhow::anyhow!(
                    "No tray backend was enabled, build with the `sni` or `win` feature"
                ))
            }
        }
    }
}

impl TrayIcon for GenericTray {
    fn set_frame(&mut self, index: usize) -> Result<()> {
        self.inner.set_frame(index)
    }

    fn set_tooltip(&mut self, text: &str) -> Result<()> {
        self.inner.set_tooltip(text)
    }

    fn set_visible(&mut self, visible: bool) -> Result<()> {
        self.inner.set_visible(visible)
    }

    fn release(&mut self) {
        self.inner.release()
    }
}
