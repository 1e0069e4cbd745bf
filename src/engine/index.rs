use crate::map::{EdgePolicy, MapModel, Point, Rect, ZoneScope};

/// Uniform grid of tile-sized buckets holding rectangle indices.
///
/// Rectangles reaching outside the grid go to an overflow list that every
/// query scans.
#[derive(Debug)]
struct Grid {
    cols: i32,
    rows: i32,
    cell_w: i32,
    cell_h: i32,
    cells: Vec<Vec<usize>>,
    overflow: Vec<usize>,
    rects: Vec<Rect>,
}

impl Grid {
    fn new(map: &MapModel) -> Self {
        let cols = map.width as i32;
        let rows = map.height as i32;
        Grid {
            cols,
            rows,
            cell_w: map.tile_width.max(1) as i32,
            cell_h: map.tile_height.max(1) as i32,
            cells: vec![Vec::new(); (cols.max(0) * rows.max(0)) as usize],
            overflow: Vec::new(),
            rects: Vec::new(),
        }
    }

    /// Inclusive cell span covered by `rect`, unclamped.
    fn span(&self, rect: &Rect) -> (i32, i32, i32, i32) {
        (
            rect.x.div_euclid(self.cell_w),
            rect.y.div_euclid(self.cell_h),
            (rect.right() - 1).div_euclid(self.cell_w),
            (rect.bottom() - 1).div_euclid(self.cell_h),
        )
    }

    fn insert(&mut self, rect: Rect) {
        let id = self.rects.len();
        self.rects.push(rect);

        if !rect.has_positive_extent() {
            return;
        }

        let (x0, y0, x1, y1) = self.span(&rect);
        if x0 < 0 || y0 < 0 || x1 >= self.cols || y1 >= self.rows {
            self.overflow.push(id);
            return;
        }

        for cy in y0..=y1 {
            for cx in x0..=x1 {
                self.cells[(cy * self.cols + cx) as usize].push(id);
            }
        }
    }

    fn query(&self, rect: &Rect, hits: &mut Vec<usize>) {
        if !rect.has_positive_extent() {
            return;
        }

        let (x0, y0, x1, y1) = self.span(rect);
        let (x0, y0) = (x0.max(0), y0.max(0));
        let (x1, y1) = (x1.min(self.cols - 1), y1.min(self.rows - 1));

        for cy in y0..=y1 {
            for cx in x0..=x1 {
                hits.extend(
                    self.cells[(cy * self.cols + cx) as usize]
                        .iter()
                        .copied()
                        .filter(|&i| self.rects[i].intersects(rect)),
                );
            }
        }

        hits.extend(
            self.overflow
                .iter()
                .copied()
                .filter(|&i| self.rects[i].intersects(rect)),
        );
    }
}

fn sorted_unique(mut hits: Vec<usize>) -> Vec<usize> {
    hits.sort_unstable();
    hits.dedup();
    hits
}

/// Static lookup structure over one map's zones and collision rectangles.
///
/// Built once per map load. Zone results are indices into `MapModel::zones`,
/// always in declared map order.
#[derive(Debug)]
pub struct SpatialIndex {
    zones: Grid,
    collisions: Grid,
    global_zones: Vec<usize>,
    bounds: Rect,
    clamped: bool,
}

impl SpatialIndex {
    pub fn build(map: &MapModel) -> Self {
        let mut zones = Grid::new(map);
        let mut global_zones = Vec::new();

        for (i, zone) in map.zones.iter().enumerate() {
            zones.insert(zone.rect);
            if zone.scope == ZoneScope::Global {
                global_zones.push(i);
            }
        }

        let mut collisions = Grid::new(map);
        for c in &map.collisions {
            collisions.insert(c.rect);
        }

        SpatialIndex {
            zones,
            collisions,
            global_zones,
            bounds: map.bounds(),
            clamped: map.edges == EdgePolicy::Clamped,
        }
    }

    pub fn zones_overlapping(&self, point: Point) -> Vec<usize> {
        self.zones_overlapping_rect(&Rect::new(point.x, point.y, 1, 1))
    }

    pub fn zones_overlapping_rect(&self, rect: &Rect) -> Vec<usize> {
        let mut hits = Vec::new();
        self.zones.query(rect, &mut hits);
        sorted_unique(hits)
    }

    /// Zones whose conditions never consult the player's position.
    pub fn global_zones(&self) -> &[usize] {
        &self.global_zones
    }

    /// Every zone that could be eligible for a player occupying `anchor` and facing `facing`.
    pub fn candidates(&self, anchor: &Rect, facing: &Rect) -> Vec<usize> {
        let mut hits = self.global_zones.clone();
        self.zones.query(anchor, &mut hits);
        self.zones.query(facing, &mut hits);
        sorted_unique(hits)
    }

    /// True if `rect` overlaps a collision rectangle, or leaves a clamped map.
    pub fn collides(&self, rect: &Rect) -> bool {
        if self.clamped && !self.bounds.contains_rect(rect) {
            return true;
        }
        let mut hits = Vec::new();
        self.collisions.query(rect, &mut hits);
        !hits.is_empty()
    }
}
