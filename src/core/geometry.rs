use serde::{Deserialize, Serialize};

/// A WGS84 coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and within the usual latitude/longitude ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat.abs() <= 90.0
            && self.lng.abs() <= 180.0
    }

    /// Point at `fraction` of the way along the great circle from `self` to `other`.
    ///
    /// `fraction` is clamped to `[0, 1]`; the endpoints are returned untouched.
    pub fn interpolate(self, other: LatLng, fraction: f64) -> LatLng {
        let t = fraction.clamp(0.0, 1.0);
        if t == 0.0 {
            return self;
        }
        if t == 1.0 {
            return other;
        }

        let a = self.to_unit();
        let b = other.to_unit();
        let dot = (a[0] * b[0] + a[1] * b[1] + a[2] * b[2]).clamp(-1.0, 1.0);
        let omega = dot.acos();
        let sin_omega = omega.sin();

        // Coincident or antipodal: no unique great circle, fall back to a plain lerp
        if sin_omega.abs() < 1e-9 {
            return LatLng::new(
                self.lat + (other.lat - self.lat) * t,
                self.lng + (other.lng - self.lng) * t,
            );
        }

        let a_scale = ((1.0 - t) * omega).sin() / sin_omega;
        let b_scale = (t * omega).sin() / sin_omega;
        LatLng::from_unit([
            a_scale * a[0] + b_scale * b[0],
            a_scale * a[1] + b_scale * b[1],
            a_scale * a[2] + b_scale * b[2],
        ])
    }

    fn to_unit(self) -> [f64; 3] {
        let lat = self.lat.to_radians();
        let lng = self.lng.to_radians();
        let cos_lat = lat.cos();
        [cos_lat * lng.cos(), cos_lat * lng.sin(), lat.sin()]
    }

    fn from_unit(u: [f64; 3]) -> LatLng {
        let lat = u[2].clamp(-1.0, 1.0).asin().to_degrees();
        let lng = u[1].atan2(u[0]).to_degrees();
        LatLng::new(lat, lng)
    }
}

/// Geometry carried by a sample, decided once at parse time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(LatLng),
    Path(Vec<LatLng>),
}

impl Geometry {
    pub fn as_point(&self) -> Option<LatLng> {
        match self {
            Geometry::Point(pt) => Some(*pt),
            Geometry::Path(_) => None,
        }
    }

    /// Position a trace passes through for this geometry (the path's last vertex)
    pub fn anchor(&self) -> Option<LatLng> {
        match self {
            Geometry::Point(pt) => Some(*pt),
            Geometry::Path(pts) => pts.last().copied(),
        }
    }
}
