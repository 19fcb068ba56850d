use fixed::types::I32F32;

/// Millimetres as a binary fixed-point value. All arithmetic routes through
/// integer milli-mm so page geometry is identical across runs and platforms.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Mm(I32F32);

impl Mm {
    pub const ZERO: Mm = Mm(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Mm {
        if !value.is_finite() {
            return Mm::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Mm::from_milli_i64(milli)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    /// Milli-pt for the PDF writer: 1 in = 25.4 mm = 72 pt, so pt = mm * 360/127.
    pub fn to_pt_milli_i64(self) -> i64 {
        div_round_i128(self.to_milli_i64() as i128 * 360, 127) as i64
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn max(self, other: Mm) -> Mm {
        if self >= other { self } else { other }
    }

    pub fn min(self, other: Mm) -> Mm {
        if self <= other { self } else { other }
    }

    /// Scale by an exact integer ratio, rounding at milli-mm precision.
    pub fn mul_ratio(self, num: i32, denom: i32) -> Mm {
        if denom == 0 {
            return Mm::ZERO;
        }
        let milli = self.to_milli_i64() as i128;
        let num = num as i128;
        let denom = denom as i128;
        let value = div_round_i128(milli.saturating_mul(num), denom);
        Mm::from_milli_i128(value)
    }

    pub fn from_milli_i64(milli: i64) -> Mm {
        Mm::from_milli_i128(milli as i128)
    }

    fn from_milli_i128(milli: i128) -> Mm {
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Mm(I32F32::from_bits(bits))
    }
}

impl std::ops::Add for Mm {
    type Output = Mm;
    fn add(self, rhs: Mm) -> Mm {
        Mm::from_milli_i128(self.to_milli_i64() as i128 + rhs.to_milli_i64() as i128)
    }
}

impl std::ops::Sub for Mm {
    type Output = Mm;
    fn sub(self, rhs: Mm) -> Mm {
        Mm::from_milli_i128(self.to_milli_i64() as i128 - rhs.to_milli_i64() as i128)
    }
}

impl std::ops::Mul<i32> for Mm {
    type Output = Mm;
    fn mul(self, rhs: i32) -> Mm {
        let milli = self.to_milli_i64() as i128;
        Mm::from_milli_i128(milli.saturating_mul(rhs as i128))
    }
}

impl std::ops::Mul<f32> for Mm {
    type Output = Mm;
    fn mul(self, rhs: f32) -> Mm {
        if !rhs.is_finite() {
            return Mm::ZERO;
        }
        Mm::from_f32(self.to_f32() * rhs)
    }
}

fn div_round_i128(num: i128, den: i128) -> i128 {
    if den == 0 {
        return 0;
    }
    let den_abs = den.abs();
    if num >= 0 {
        (num + (den_abs / 2)) / den
    } else {
        -(((-num) + (den_abs / 2)) / den)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmRect {
    pub x: Mm,
    pub y: Mm,
    pub width: Mm,
    pub height: Mm,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFormat {
    pub width: Mm,
    pub height: Mm,
}

impl PageFormat {
    pub fn a4_portrait() -> Self {
        Self {
            width: Mm::from_f32(210.0),
            height: Mm::from_f32(297.0),
        }
    }
}

/// Fixed page frame shared by every page of one export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub page: PageFormat,
    pub margin: Mm,
    pub safety_buffer: Mm,
}

/// Placement of one section raster on its page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePlan {
    pub page: PageFormat,
    pub image: MmRect,
}

impl PageGeometry {
    pub fn content_max_width(&self) -> Mm {
        self.page.width - self.margin * 2
    }

    /// Usable height: both margins plus the safety buffer that keeps tall
    /// rasters clear of the physical page edge.
    pub fn effective_max_height(&self) -> Mm {
        self.page.height - self.margin * 2 - self.safety_buffer
    }

    /// Aspect-preserving fit: full content width first, clamped to the
    /// effective height with the width scaled back down when the raster is
    /// taller than the page allows.
    pub fn plan_page(&self, width_px: u32, height_px: u32) -> PagePlan {
        let mut width = Mm::ZERO;
        let mut height = Mm::ZERO;
        if width_px > 0 && height_px > 0 {
            width = self.content_max_width();
            height = width.mul_ratio(height_px as i32, width_px as i32);
            if height > self.effective_max_height() {
                height = self.effective_max_height();
                width = height.mul_ratio(width_px as i32, height_px as i32);
            }
        }
        PagePlan {
            page: self.page,
            image: MmRect {
                x: self.margin,
                y: self.margin,
                width,
                height,
            },
        }
    }
}
