use glam::DVec2;

/// Axis-aligned region described by its center and half-extents.
///
/// Bounds follow screen convention: `top` is `y - h` and `bottom` is `y + h`.
/// The four derived bounds are computed once at construction.
///
/// # Examples
///
/// ```
/// use glam::DVec2;
/// use rs_nbody::utils::Rectangle;
///
/// let rect = Rectangle::new(0.0, 0.0, 1.0, 1.0);
/// assert!(rect.contains(DVec2::new(1.0, -1.0))); // edges are inclusive
/// assert!(!rect.contains(DVec2::new(1.5, 0.0)));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rectangle {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    top: f64,
    right: f64,
    bottom: f64,
    left: f64,
}

impl Rectangle {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            x,
            y,
            w,
            h,
            top: y - h,
            right: x + w,
            bottom: y + h,
            left: x - w,
        }
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    pub fn half_width(&self) -> f64 {
        self.w
    }

    pub fn half_height(&self) -> f64 {
        self.h
    }

    pub fn top(&self) -> f64 {
        self.top
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    /// Returns true if `point` lies inside the rectangle or on one of its edges.
    pub fn contains(&self, point: DVec2) -> bool {
        point.x >= self.left && point.x <= self.right && point.y >= self.top && point.y <= self.bottom
    }

    /// Returns true if the two rectangles overlap or touch.
    pub fn intersects(&self, other: &Rectangle) -> bool {
        !(self.top > other.bottom
            || self.right < other.left
            || self.left > other.right
            || self.bottom < other.top)
    }

    /// Splits the rectangle into its four equal quadrants, ordered NW, NE, SW, SE.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_nbody::utils::Rectangle;
    ///
    /// let [nw, ne, sw, se] = Rectangle::new(0.0, 0.0, 2.0, 2.0).quadrants();
    /// assert_eq!((nw.center().x, nw.center().y), (-1.0, -1.0));
    /// assert_eq!((ne.center().x, ne.center().y), (1.0, -1.0));
    /// assert_eq!((sw.center().x, sw.center().y), (-1.0, 1.0));
    /// assert_eq!((se.center().x, se.center().y), (1.0, 1.0));
    /// ```
    pub fn quadrants(&self) -> [Rectangle; 4] {
        let w = self.w * 0.5;
        let h = self.h * 0.5;
        [
            Rectangle::new(self.x - w, self.y - h, w, h),
            Rectangle::new(self.x + w, self.y - h, w, h),
            Rectangle::new(self.x - w, self.y + h, w, h),
            Rectangle::new(self.x + w, self.y + h, w, h),
        ]
    }

    /// Index into [`Rectangle::quadrants`] of the quadrant that owns `point`.
    ///
    /// Points on the vertical center line belong to the east half and points on the
    /// horizontal center line to the south half, so every point maps to exactly one quadrant.
    pub fn quadrant_index(&self, point: DVec2) -> usize {
        let east = (point.x >= self.x) as usize;
        let south = (point.y >= self.y) as usize;
        south * 2 + east
    }

    /// Closest point inside the rectangle.
    pub fn clamp(&self, point: DVec2) -> DVec2 {
        DVec2::new(point.x.clamp(self.left, self.right), point.y.clamp(self.top, self.bottom))
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.w > 0.0 && self.h > 0.0 && self.w.is_finite() && self.h.is_finite())
    }
}
