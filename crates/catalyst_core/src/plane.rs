use glam::{DVec3, DVec4};

/// Which side of a plane something lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneIntersectionType {
    Front,
    Back,
    Intersecting,
}

/// A plane in Hessian form: every point `p` with `normal.dot(p) + d == 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: DVec3,
    pub d: f64,
}

impl Plane {
    pub fn new(normal: DVec3, d: f64) -> Self {
        Self { normal, d }
    }

    pub fn from_vec4(value: DVec4) -> Self {
        Self::new(value.truncate(), value.w)
    }

    /// Plane through three points, oriented by the winding `a -> b -> c`.
    pub fn from_points(a: DVec3, b: DVec3, c: DVec3) -> Self {
        let normal = (b - a).cross(c - a).normalize();
        Self {
            normal,
            d: -normal.dot(a),
        }
    }

    pub fn dot(&self, value: DVec4) -> f64 {
        self.normal.dot(value.truncate()) + self.d * value.w
    }

    /// Signed distance (scaled by the normal's length) of a point.
    pub fn dot_coordinate(&self, value: DVec3) -> f64 {
        self.normal.dot(value) + self.d
    }

    pub fn dot_normal(&self, value: DVec3) -> f64 {
        self.normal.dot(value)
    }

    /// Rescales the plane so that its normal has unit length.
    pub fn normalize(&mut self) {
        *self = self.normalized();
    }

    pub fn normalized(&self) -> Self {
        let length = self.normal.length();
        if length == 0.0 {
            return *self;
        }
        Self {
            normal: self.normal / length,
            d: self.d / length,
        }
    }

    /// Greater than zero in front of the plane, less than zero behind it.
    pub fn classify_point(&self, point: DVec3) -> f64 {
        self.dot_coordinate(point)
    }

    /// Distance from the point to the plane, ignoring `d` the same way the
    /// old engine helper did: only the projection onto the normal counts.
    pub fn perpendicular_distance(&self, point: DVec3) -> f64 {
        (self.normal.dot(point) / self.normal.length()).abs()
    }

    pub fn intersects_point(&self, point: DVec3) -> PlaneIntersectionType {
        let distance = self.dot_coordinate(point);
        if distance > 0.0 {
            PlaneIntersectionType::Front
        } else if distance < 0.0 {
            PlaneIntersectionType::Back
        } else {
            PlaneIntersectionType::Intersecting
        }
    }
}

impl std::fmt::Display for Plane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{Normal:{} D:{}}}", self.normal, self.d)
    }
}
