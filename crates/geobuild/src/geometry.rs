// Geometry primitives for the collision refinement pass.
//
// Deliberately minimal: the pipeline only ever needs points, axis
// aligned boxes, triangles and a sphere proxy for the slide simulation.

/// 3-component vector, Y-up inside the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    pub fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn normalized(self) -> Self {
        let len = self.length();
        if len > 0.0 { self.scale(1.0 / len) } else { self }
    }

    /// Vertical component of the normalized vector, i.e. the cosine of
    /// the angle between the vector and the up axis.
    pub fn vertical_slope(self) -> f32 {
        self.normalized().y
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    /// Grow the box to contain `p`.
    pub fn merge(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Swap the Y and Z components of both corners. Source assets are
    /// Z-up; the pipeline works Y-up.
    pub fn swap_y_with_z(&self) -> Aabb {
        Aabb {
            min: Vec3::new(self.min.x, self.min.z, self.min.y),
            max: Vec3::new(self.max.x, self.max.z, self.max.y),
        }
    }
}

/// Contact data for a sphere-vs-triangle test.
#[derive(Clone, Copy, Debug, Default)]
pub struct Intersection {
    pub normal: Vec3,
    pub depth: f32,
}

/// A single mesh triangle.
#[derive(Clone, Copy, Debug)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }

    /// Normalized face normal for counter-clockwise winding.
    pub fn normal(&self) -> Vec3 {
        self.b.sub(self.a).cross(self.c.sub(self.a)).normalized()
    }

    pub fn bounding_box(&self) -> Aabb {
        let mut bb = Aabb::from_point(self.a);
        bb.merge(self.b);
        bb.merge(self.c);
        bb
    }

    // Copy-pasted from the Real-Time Collision Detection book
    pub fn closest_point_to(&self, point: Vec3) -> Vec3 {
        // Check if P in vertex region outside A
        let ab = self.b.sub(self.a);
        let ac = self.c.sub(self.a);
        let ap = point.sub(self.a);
        let d1 = ab.dot(ap);
        let d2 = ac.dot(ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return self.a;
        }

        // Check if P in vertex region outside B
        let bp = point.sub(self.b);
        let d3 = ab.dot(bp);
        let d4 = ac.dot(bp);
        if d3 >= 0.0 && d4 <= d3 {
            return self.b; // barycentric coordinates (0, 1, 0)
        }

        // Check if P in edge region of AB, if so return projection of P onto AB
        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return self.a.add(ab.scale(v)); // barycentric coordinates (1-v, v, 0)
        }

        // Check if P in vertex region outside C
        let cp = point.sub(self.c);
        let d5 = ab.dot(cp);
        let d6 = ac.dot(cp);
        if d6 >= 0.0 && d5 <= d6 {
            return self.c; // barycentric coordinates (0, 0, 1)
        }

        // Check if P in edge region of AC, if so return projection of P onto AC
        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return self.a.add(ac.scale(w)); // barycentric coordinates (1-w, 0, w)
        }

        // Check if P in edge region of BC, if so return projection of P onto BC
        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return self.b.add(self.c.sub(self.b).scale(w)); // barycentric coordinates (0, 1-w, w)
        }

        // P inside face region. Compute Q through its barycentric
        // coordinates (u, v, w)
        let denom = 1.0 / (va + vb + vc);
        let v = vb * denom;
        let w = vc * denom;
        self.a.add(ab.scale(v)).add(ac.scale(w))
    }
}

/// Sphere proxy used by the slide-collision simulation.
#[derive(Clone, Copy, Debug)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Test against a single triangle. On contact, `intersection` holds
    /// the contact normal (from the closest surface point towards the
    /// sphere center) and the penetration depth.
    pub fn intersects(&self, triangle: &Triangle, intersection: &mut Intersection) -> bool {
        let closest_point = triangle.closest_point_to(self.center);
        let vector = self.center.sub(closest_point);
        let length = vector.length();

        intersection.normal = vector.normalized();
        intersection.depth = self.radius - length;

        length <= self.radius
    }

    /// True if the sphere touches any triangle of the slice.
    pub fn intersects_any(&self, triangles: &[Triangle]) -> bool {
        let mut intersection = Intersection::default();
        triangles
            .iter()
            .any(|triangle| self.intersects(triangle, &mut intersection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ground_triangle() -> Triangle {
        Triangle::new(
            Vec3::new(-10.0, 0.0, -10.0),
            Vec3::new(10.0, 0.0, -10.0),
            Vec3::new(0.0, 0.0, 10.0),
        )
    }

    #[test]
    fn test_face_normal_ccw_points_up() {
        let tri = Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
        );
        assert!(tri.normal().y > 0.99);
    }

    #[test]
    fn test_closest_point_inside_face() {
        let tri = ground_triangle();
        let p = tri.closest_point_to(Vec3::new(0.0, 5.0, 0.0));
        assert!((p.x).abs() < 1e-5);
        assert!((p.y).abs() < 1e-5);
        assert!((p.z).abs() < 1e-5);
    }

    #[test]
    fn test_closest_point_clamps_to_vertex() {
        let tri = ground_triangle();
        let p = tri.closest_point_to(Vec3::new(-50.0, 0.0, -50.0));
        assert_eq!(p, tri.a);
    }

    #[test]
    fn test_sphere_triangle_contact() {
        let tri = ground_triangle();
        let mut contact = Intersection::default();

        let touching = Sphere::new(Vec3::new(0.0, 3.0, 0.0), 4.0);
        assert!(touching.intersects(&tri, &mut contact));
        assert!(contact.depth > 0.0);
        assert!(contact.normal.y > 0.99);

        let clear = Sphere::new(Vec3::new(0.0, 10.0, 0.0), 4.0);
        assert!(!clear.intersects(&tri, &mut contact));
    }

    #[test]
    fn test_aabb_intersects() {
        let a = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 2.0, 2.0));
        let b = Aabb::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 3.0, 3.0));
        let c = Aabb::new(Vec3::new(5.0, 5.0, 5.0), Vec3::new(6.0, 6.0, 6.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
