use smart_leds::RGB8;
use thiserror::Error;

/// Index of a range within its [`Palette`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(usize);

impl ClassId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One recognised color: an inclusive band of sensor readings and what to
/// show when it is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorRange {
    pub name: String,
    pub low: u16,
    pub high: u16,
    /// Servo angle in degrees, `0..=180`.
    pub angle: u8,
    pub rgb: RGB8,
}

impl ColorRange {
    pub fn contains(&self, value: u16) -> bool {
        (self.low..=self.high).contains(&value)
    }

    /// Midpoint of the band.
    pub fn set_point(&self) -> u16 {
        ((u32::from(self.low) + u32::from(self.high)) / 2) as u16
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaletteError {
    #[error("palette has no ranges")]
    Empty,

    #[error("range {name} has low {low} above high {high}")]
    Inverted { name: String, low: u16, high: u16 },

    #[error("range {name} has angle {angle}, above 180")]
    Angle { name: String, angle: u8 },

    #[error("ranges {first} and {second} overlap")]
    Overlap { first: String, second: String },
}

/// A validated, non-overlapping set of color ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    ranges: Vec<ColorRange>,
}

fn range(name: &str, low: u16, high: u16, angle: u8, rgb: RGB8) -> ColorRange {
    ColorRange {
        name: name.to_string(),
        low,
        high,
        angle,
        rgb,
    }
}

impl Default for Palette {
    /// The four colors of the sorting rig.
    fn default() -> Self {
        Self {
            ranges: vec![
                range("ROSA", 500, 540, 0, RGB8::new(255, 0, 80)),
                range("ROJO", 560, 590, 60, RGB8::new(255, 0, 0)),
                range("AMARILLO", 600, 630, 120, RGB8::new(255, 255, 0)),
                range("VERDE", 640, 680, 180, RGB8::new(0, 255, 0)),
            ],
        }
    }
}

impl Palette {
    pub fn new(ranges: Vec<ColorRange>) -> Result<Self, PaletteError> {
        if ranges.is_empty() {
            return Err(PaletteError::Empty);
        }
        for r in &ranges {
            if r.low > r.high {
                return Err(PaletteError::Inverted {
                    name: r.name.clone(),
                    low: r.low,
                    high: r.high,
                });
            }
            if r.angle > 180 {
                return Err(PaletteError::Angle {
                    name: r.name.clone(),
                    angle: r.angle,
                });
            }
        }

        let mut order: Vec<&ColorRange> = ranges.iter().collect();
        order.sort_by_key(|r| r.low);
        for pair in order.windows(2) {
            if pair[1].low <= pair[0].high {
                return Err(PaletteError::Overlap {
                    first: pair[0].name.clone(),
                    second: pair[1].name.clone(),
                });
            }
        }

        Ok(Self { ranges })
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The range containing `value`, if any.
    pub fn classify(&self, value: u16) -> Option<ClassId> {
        self.ranges.iter().position(|r| r.contains(value)).map(ClassId)
    }

    pub fn get(&self, id: ClassId) -> &ColorRange {
        &self.ranges[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColorRange> {
        self.ranges.iter()
    }

    pub fn find(&self, name: &str) -> Option<ClassId> {
        self.ranges.iter().position(|r| r.name == name).map(ClassId)
    }
}
