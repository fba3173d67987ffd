use serde::Serialize;

/// Axis-aligned bounding box in viewport projection units (EPSG:3857).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extent {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl Extent {
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Extent {
            minx,
            miny,
            maxx,
            maxy,
        }
    }

    /// An extent is only usable when all four components are finite. Empty
    /// vector sources report `[inf, inf, -inf, -inf]` and must not be fitted.
    pub fn is_valid(&self) -> bool {
        self.as_array().iter().all(|c| c.is_finite())
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.minx, self.miny, self.maxx, self.maxy]
    }

    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.minx + self.maxx) / 2.0,
            (self.miny + self.maxy) / 2.0,
        )
    }

    /// Smallest extent containing both. Invalid inputs are skipped.
    pub fn union(&self, other: &Extent) -> Extent {
        match (self.is_valid(), other.is_valid()) {
            (true, true) => Extent {
                minx: self.minx.min(other.minx),
                miny: self.miny.min(other.miny),
                maxx: self.maxx.max(other.maxx),
                maxy: self.maxy.max(other.maxy),
            },
            (true, false) => *self,
            _ => *other,
        }
    }

    /// The "no features yet" extent.
    pub fn empty() -> Self {
        Extent {
            minx: f64::INFINITY,
            miny: f64::INFINITY,
            maxx: f64::NEG_INFINITY,
            maxy: f64::NEG_INFINITY,
        }
    }
}

impl From<(f64, f64, f64, f64)> for Extent {
    fn from(extent: (f64, f64, f64, f64)) -> Self {
        Extent {
            minx: extent.0, // minx
            miny: extent.1, // miny
            maxx: extent.2, // maxx
            maxy: extent.3, // maxy
        }
    }
}

impl From<[f64; 4]> for Extent {
    fn from(e: [f64; 4]) -> Self {
        Extent::new(e[0], e[1], e[2], e[3])
    }
}
