pub mod plane;
pub mod transform;

pub use plane::{Plane, PlaneIntersectionType};
pub use transform::Transform;
