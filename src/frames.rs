//! The fixed animation the tray cycles through.
//!
//! Frames are drawn once at startup into ARGB32 pixmaps (alpha first, big endian per pixel),
//! which is the layout StatusNotifierItem hosts expect. Each frame shows the same spinner arc
//! rotated by `360 / FRAME_COUNT` degrees relative to the previous one.

use std::f64::consts::TAU;

/// Number of frames in the bundled set: `frame_00` through `frame_09`.
pub const FRAME_COUNT: usize = 10;
pub const FRAME_SIZE: u32 = 32;

const OUTER_RADIUS: f64 = 14.5;
const INNER_RADIUS: f64 = 8.5;
/// Portion of the ring covered by the fading tail, in turns.
const TAIL_LENGTH: f64 = 0.7;
const SPINNER_RGB: [u8; 3] = [0x3d, 0xb8, 0x6a];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// ARGB32, row major, `width * height * 4` bytes.
    pub argb: Vec<u8>,
}

impl Frame {
    /// Same pixels reordered to RGBA, the layout Windows icon construction takes.
    pub fn rgba(&self) -> Vec<u8> {
        self.argb
            .chunks_exact(4)
            .flat_map(|pixel| [pixel[1], pixel[2], pixel[3], pixel[0]])
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct FrameSet {
    frames: Vec<Frame>,
}

impl FrameSet {
    /// Renders the bundled spinner frames.
    pub fn bundled() -> Self {
        let frames = (0..FRAME_COUNT)
            .map(|index| render_frame(index, FRAME_SIZE))
            .collect();
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }
}

fn render_frame(index: usize, size: u32) -> Frame {
    let head = index as f64 / FRAME_COUNT as f64;
    let center = size as f64 / 2.;
    let mut argb = Vec::with_capacity((size * size * 4) as usize);

    for y in 0..size {
        for x in 0..size {
            let dx = x as f64 + 0.5 - center;
            let dy = y as f64 + 0.5 - center;
            let distance = (dx * dx + dy * dy).sqrt();

            let alpha = if (INNER_RADIUS..=OUTER_RADIUS).contains(&distance) {
                // Angle in turns, clockwise from twelve o'clock.
                let angle = (dx.atan2(-dy) / TAU).rem_euclid(1.);
                let behind_head = (head - angle).rem_euclid(1.);
                if behind_head <= TAIL_LENGTH {
                    (255. * (1. - behind_head / TAIL_LENGTH)).round() as u8
                } else {
                    0
                }
            } else {
                0
            };

            argb.push(alpha);
            argb.extend_from_slice(&SPINNER_RGB);
        }
    }

    Frame {
        name: format!("frame_{index:02}"),
        width: size,
        height: size,
        argb,
    }
}

/// Index into the frame set. Advancing past the last frame wraps to the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCounter {
    current: usize,
    max_index: usize,
}

impl FrameCounter {
    /// `len` must be at least 1.
    pub fn new(len: usize) -> Self {
        Self::starting_at(0, len)
    }

    pub fn starting_at(current: usize, len: usize) -> Self {
        assert!(len > 0, "Frame counter needs at least one frame");
        Self {
            current: current % len,
            max_index: len - 1,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Index the next [advance](Self::advance) will move to.
    pub fn peek_next(&self) -> usize {
        if self.current >= self.max_index {
            0
        } else {
            self.current + 1
        }
    }

    pub fn advance(&mut self) -> usize {
        self.current += 1;
        if self.current > self.max_index {
            self.current = 0;
        }
        self.current
    }
}
