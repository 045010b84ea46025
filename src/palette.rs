//! Indexed color table and color model: RGB↔HSV conversion, the color-wheel
//! mapping, nearest-slot search and palette cycling ranges.
//!
//! Canvases store palette indices, never colors, so multiple frames share one
//! `Palette` and a palette edit recolors every frame at once. Cycling rotates
//! the color table inside a range; pixel index values are never touched.

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};

pub const MAX_PALETTE_SIZE: usize = 256;

// ============================================================================
// COLOR TYPES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub fn to_hsv(self) -> Hsv {
        rgb_to_hsv(self)
    }

    /// Max-channel distance, the metric used for fill tolerance matching.
    pub fn distance(self, other: Rgb) -> f32 {
        let dr = (self.r as f32 - other.r as f32).abs();
        let dg = (self.g as f32 - other.g as f32).abs();
        let db = (self.b as f32 - other.b as f32).abs();
        dr.max(dg).max(db)
    }

    /// Decode to linear RGB (the space all soft-brush blending happens in).
    pub fn to_linear(self) -> [f32; 3] {
        [
            srgb_to_linear(self.r),
            srgb_to_linear(self.g),
            srgb_to_linear(self.b),
        ]
    }

    pub fn from_linear(linear: [f32; 3]) -> Self {
        Rgb::new(
            linear_to_srgb(linear[0]),
            linear_to_srgb(linear[1]),
            linear_to_srgb(linear[2]),
        )
    }
}

/// HSV triple with all components in `[0, 1]` (hue is a turn fraction, not
/// degrees).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

impl Hsv {
    pub fn new(h: f32, s: f32, v: f32) -> Self {
        Self { h, s, v }
    }

    pub fn to_rgb(self) -> Rgb {
        hsv_to_rgb(self)
    }
}

// ============================================================================
// RGB <-> HSV — six-sector hue computation
// ============================================================================

pub fn rgb_to_hsv(color: Rgb) -> Hsv {
    let r = color.r as f32 / 255.0;
    let g = color.g as f32 / 255.0;
    let b = color.b as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;

    let h = if d == 0.0 {
        0.0
    } else if max == r {
        ((g - b) / d % 6.0) / 6.0
    } else if max == g {
        (((b - r) / d) + 2.0) / 6.0
    } else {
        (((r - g) / d) + 4.0) / 6.0
    };
    let h = if h < 0.0 { h + 1.0 } else { h };
    let s = if max == 0.0 { 0.0 } else { d / max };
    Hsv { h, s, v: max }
}

pub fn hsv_to_rgb(hsv: Hsv) -> Rgb {
    let h6 = hsv.h.clamp(0.0, 1.0) * 6.0;
    let c = hsv.v * hsv.s;
    let x = c * (1.0 - ((h6 % 2.0) - 1.0).abs());
    let m = hsv.v - c;
    let (r, g, b) = match h6 as i32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    // Round-to-nearest keeps RGB -> HSV -> RGB within ±1 per channel.
    Rgb::new(
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    )
}

/// Map a point on the unit disk to a wheel color: hue by angle, saturation
/// by radius. Points outside the disk clamp saturation to 1.0 rather than
/// being rejected. `value` is supplied by the brightness control (1.0 when
/// there is none).
pub fn wheel_to_hsv(dx: f32, dy: f32, value: f32) -> Hsv {
    use std::f32::consts::TAU;
    // Screen y grows downward, so negate dy to keep hue 0 at 3 o'clock
    // running counter-clockwise (matches the classic wheel requestor).
    let h = (-dy).atan2(dx).rem_euclid(TAU) / TAU;
    let s = dx.hypot(dy).min(1.0);
    Hsv { h, s, v: value.clamp(0.0, 1.0) }
}

// ---- sRGB transfer ---------------------------------------------------------

pub fn srgb_to_linear(v: u8) -> f32 {
    let c = v as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub fn linear_to_srgb(c: f32) -> u8 {
    let c = c.clamp(0.0, 1.0);
    let s = if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (s * 255.0).round() as u8
}

// ============================================================================
// PALETTE CYCLING
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleDirection {
    /// Colors move to higher indices each step (classic DPaint "forward").
    Forward,
    Reverse,
}

/// A contiguous index span whose colors rotate over time. Ranges never
/// overlap and always lie inside the palette.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CycleRange {
    pub name: String,
    pub low: usize,
    pub high: usize,
    /// Steps per second while active.
    pub rate: f32,
    pub direction: CycleDirection,
    pub active: bool,
    /// Fractional step accumulator for `tick`.
    phase: f32,
}

impl CycleRange {
    pub fn span(&self) -> usize {
        self.high - self.low + 1
    }
}

// ============================================================================
// PALETTE
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    colors: Vec<Rgb>,
    cycles: Vec<CycleRange>,
}

impl Palette {
    pub fn new(colors: Vec<Rgb>) -> Result<Self> {
        if colors.is_empty() || colors.len() > MAX_PALETTE_SIZE {
            return Err(EditorError::InvalidPaletteIndex {
                index: colors.len().saturating_sub(1),
                len: MAX_PALETTE_SIZE,
            });
        }
        Ok(Self { colors, cycles: Vec::new() })
    }

    /// The classic 16-color EGA table most indexed editors boot with.
    pub fn default_16() -> Self {
        let colors = vec![
            Rgb::new(0x00, 0x00, 0x00),
            Rgb::new(0x00, 0x00, 0xAA),
            Rgb::new(0x00, 0xAA, 0x00),
            Rgb::new(0x00, 0xAA, 0xAA),
            Rgb::new(0xAA, 0x00, 0x00),
            Rgb::new(0xAA, 0x00, 0xAA),
            Rgb::new(0xAA, 0x55, 0x00),
            Rgb::new(0xAA, 0xAA, 0xAA),
            Rgb::new(0x55, 0x55, 0x55),
            Rgb::new(0x55, 0x55, 0xFF),
            Rgb::new(0x55, 0xFF, 0x55),
            Rgb::new(0x55, 0xFF, 0xFF),
            Rgb::new(0xFF, 0x55, 0x55),
            Rgb::new(0xFF, 0x55, 0xFF),
            Rgb::new(0xFF, 0xFF, 0x55),
            Rgb::new(0xFF, 0xFF, 0xFF),
        ];
        Self { colors, cycles: Vec::new() }
    }

    /// `n`-entry ramp from black to white.
    pub fn grayscale(n: usize) -> Result<Self> {
        let n = n.clamp(2, MAX_PALETTE_SIZE);
        let colors = (0..n)
            .map(|i| {
                let v = (i as f32 / (n - 1) as f32 * 255.0).round() as u8;
                Rgb::new(v, v, v)
            })
            .collect();
        Self::new(colors)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn color(&self, index: usize) -> Result<Rgb> {
        self.colors
            .get(index)
            .copied()
            .ok_or(EditorError::InvalidPaletteIndex { index, len: self.colors.len() })
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    /// Overwrite the color table from a history snapshot without touching
    /// cycle ranges. The palette never shrinks during a session, so slots
    /// added after the snapshot keep their current colors.
    pub(crate) fn restore_colors(&mut self, table: &[Rgb]) {
        for (slot, &color) in self.colors.iter_mut().zip(table) {
            *slot = color;
        }
    }

    pub fn set_color(&mut self, index: usize, rgb: Rgb) -> Result<()> {
        let len = self.colors.len();
        match self.colors.get_mut(index) {
            Some(slot) => {
                *slot = rgb;
                Ok(())
            }
            None => Err(EditorError::InvalidPaletteIndex { index, len }),
        }
    }

    /// Append a color; fails once the 256-slot table is full.
    pub fn push(&mut self, rgb: Rgb) -> Result<usize> {
        if self.colors.len() >= MAX_PALETTE_SIZE {
            return Err(EditorError::InvalidPaletteIndex {
                index: MAX_PALETTE_SIZE,
                len: MAX_PALETTE_SIZE,
            });
        }
        self.colors.push(rgb);
        Ok(self.colors.len() - 1)
    }

    /// Nearest slot by squared distance in linear RGB. Ties resolve to the
    /// lowest index so results are deterministic.
    pub fn nearest_index(&self, rgb: Rgb) -> u8 {
        let target = rgb.to_linear();
        let mut best = 0usize;
        let mut best_dist = f32::INFINITY;
        for (i, color) in self.colors.iter().enumerate() {
            let lin = color.to_linear();
            let d = (lin[0] - target[0]).powi(2)
                + (lin[1] - target[1]).powi(2)
                + (lin[2] - target[2]).powi(2);
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        best as u8
    }

    // ---- cycling ranges -----------------------------------------------------

    pub fn cycle_ranges(&self) -> &[CycleRange] {
        &self.cycles
    }

    /// Register a cycling range. Bounds must lie inside the palette and must
    /// not overlap any existing range.
    pub fn add_cycle_range(
        &mut self,
        name: impl Into<String>,
        low: usize,
        high: usize,
        rate: f32,
        direction: CycleDirection,
    ) -> Result<usize> {
        if low > high || high >= self.colors.len() {
            return Err(EditorError::InvalidCycleRange { low, high });
        }
        for existing in &self.cycles {
            if low <= existing.high && high >= existing.low {
                return Err(EditorError::InvalidCycleRange { low, high });
            }
        }
        self.cycles.push(CycleRange {
            name: name.into(),
            low,
            high,
            rate,
            direction,
            active: true,
            phase: 0.0,
        });
        Ok(self.cycles.len() - 1)
    }

    pub fn remove_cycle_range(&mut self, index: usize) -> Result<CycleRange> {
        if index >= self.cycles.len() {
            return Err(EditorError::InvalidCycleRange { low: index, high: index });
        }
        Ok(self.cycles.remove(index))
    }

    pub fn set_cycle_active(&mut self, index: usize, active: bool) -> Result<()> {
        match self.cycles.get_mut(index) {
            Some(range) => {
                range.active = active;
                Ok(())
            }
            None => Err(EditorError::InvalidCycleRange { low: index, high: index }),
        }
    }

    /// Rotate the colors of range `index` by `steps`. Positive steps follow
    /// the range's configured direction, negative steps run it backwards;
    /// `steps` is taken modulo the range length, so +N then −N is always an
    /// exact restore.
    pub fn step_cycle(&mut self, index: usize, steps: i64) -> Result<()> {
        let range = self
            .cycles
            .get(index)
            .ok_or(EditorError::InvalidCycleRange { low: index, high: index })?
            .clone();
        let span = range.span() as i64;
        let signed = match range.direction {
            CycleDirection::Forward => steps,
            CycleDirection::Reverse => -steps,
        };
        let k = signed.rem_euclid(span) as usize;
        if k != 0 {
            self.colors[range.low..=range.high].rotate_right(k);
        }
        Ok(())
    }

    /// Advance all active ranges by `dt_ms` of wall time. Whole steps are
    /// applied as rotations; the fractional remainder is carried in each
    /// range's phase accumulator, so tick granularity never skews the rate.
    pub fn tick(&mut self, dt_ms: u32) {
        for i in 0..self.cycles.len() {
            let (active, rate) = {
                let r = &self.cycles[i];
                (r.active, r.rate)
            };
            if !active || rate <= 0.0 {
                continue;
            }
            let phase = self.cycles[i].phase + rate * dt_ms as f32 / 1000.0;
            let whole = phase.floor();
            self.cycles[i].phase = phase - whole;
            if whole >= 1.0
                && let Err(err) = self.step_cycle(i, whole as i64)
            {
                log::warn!("palette cycle {} failed to step: {}", i, err);
            }
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::default_16()
    }
}
