//! 合成的盆腔体模: 参考 CT, 结构集, 以及一个带已知刚性位移的 CBCT.

use ndarray::Array3;
use rt_berry::geometry::{Grid, Point3};
use rt_berry::registration::{RegistrationRecord, RigidTransform};
use rt_berry::structure::{Contour, Structure, StructureSet};
use rt_berry::GeoResult;

/// 体模中定义的全部结构名.
pub const STRUCTURE_NAMES: [&str; 4] = ["Body", "Bladder", "Rectum", "PTV45_1"];

/// 体模 CT 的 Series Instance UID.
pub const CT_SERIES_UID: &str = "1.2.826.0.1.3680043.8.498.1";

/// 体模 CBCT 的 Series Instance UID.
pub const CBCT_SERIES_UID: &str = "1.2.826.0.1.3680043.8.498.2";

const CT_FRAME_UID: &str = "1.2.826.0.1.3680043.8.498.10";
const CBCT_FRAME_UID: &str = "1.2.826.0.1.3680043.8.498.20";

/// 视野宽度, 毫米.
const FOV_MM: f64 = 500.0;

/// 层厚, 毫米.
const SLICE_MM: f64 = 2.5;

/// 每个轮廓的顶点数.
const VERTICES: usize = 72;

/// 平面上的椭圆 `(中心 x, 中心 y, 半轴 x, 半轴 y)`, 毫米.
type Ellipse = (f64, f64, f64, f64);

const BODY: Ellipse = (0.0, 0.0, 180.0, 120.0);
const BLADDER: Ellipse = (0.0, -40.0, 40.0, 30.0);
const RECTUM_WALL: Ellipse = (0.0, 60.0, 20.0, 20.0);
const RECTUM_LUMEN: Ellipse = (0.0, 60.0, 10.0, 10.0);
const PTV_LEFT: Ellipse = (-90.0, 0.0, 15.0, 15.0);
const PTV_RIGHT: Ellipse = (90.0, 0.0, 15.0, 15.0);

#[inline]
fn inside((cx, cy, rx, ry): Ellipse, p: Point3) -> bool {
    let (dx, dy) = ((p[0] - cx) / rx, (p[1] - cy) / ry);
    dx * dx + dy * dy < 1.0
}

/// 逆时针采样的椭圆轮廓. `reversed` 为真时顺时针.
fn ellipse_contour((cx, cy, rx, ry): Ellipse, z: f64, reversed: bool) -> Contour {
    let mut points: Vec<Point3> = (0..VERTICES)
        .map(|k| {
            let t = k as f64 / VERTICES as f64 * std::f64::consts::TAU;
            [cx + rx * t.cos(), cy + ry * t.sin(), z]
        })
        .collect();
    if reversed {
        points.reverse();
    }
    Contour::new(points)
}

/// 体模 HU 值. 含一个沿 x 方向的缓慢梯度, 使线性插值与最近邻插值的结果可区分.
fn hu_at(p: Point3, mid_slab: bool) -> f64 {
    if !inside(BODY, p) {
        return -1000.0;
    }
    let base = if inside(RECTUM_LUMEN, p) {
        -800.0
    } else if inside(RECTUM_WALL, p) {
        45.0
    } else if mid_slab && inside(BLADDER, p) {
        10.0
    } else if inside(PTV_LEFT, p) || inside(PTV_RIGHT, p) {
        700.0
    } else {
        30.0
    };
    base + 0.05 * p[0]
}

/// 合成体模.
pub struct Phantom {
    /// 参考 CT 网格.
    pub grid: Grid,
    /// 参考 CT 数据, `(z, y, x)`.
    pub ct: Array3<i16>,
    /// 引用参考 CT 的结构集.
    pub structures: StructureSet,
    /// CBCT 网格.
    pub cbct_grid: Grid,
    /// CBCT 数据, `(z, y, x)`.
    pub cbct: Array3<i16>,
    /// CBCT -> CT 的配准记录.
    pub registration: RegistrationRecord,
}

impl Phantom {
    /// 构建切片边长为 `n` 的体模. 切片数为 `max(n / 8, 8)`.
    pub fn new(n: usize) -> GeoResult<Self> {
        let nz = (n / 8).max(8);
        let s = FOV_MM / n as f64;
        let half_z = (nz - 1) as f64 * SLICE_MM / 2.0;
        let grid = Grid::new([-FOV_MM / 2.0 + s / 2.0, -FOV_MM / 2.0 + s / 2.0, -half_z], [s, s, SLICE_MM], [n, n, nz])?;

        let z_locs = grid.slice_positions();
        let mid = |z: f64| z.abs() < half_z / 2.0;

        let mut structures = StructureSet::new(CT_SERIES_UID);
        for (number, name) in (1u32..).zip(STRUCTURE_NAMES) {
            structures.define_roi(number, name);
        }
        let on_slices = |e: Ellipse, keep: &dyn Fn(f64) -> bool, reversed: bool| -> Vec<Contour> {
            z_locs
                .iter()
                .filter(|z| keep(**z))
                .map(|z| ellipse_contour(e, *z, reversed))
                .collect()
        };
        let all = |_: f64| true;
        structures
            .push_contours(1, on_slices(BODY, &all, false))
            .push_contours(2, on_slices(BLADDER, &mid, false))
            // 环形: 外壁与反向绕行的内腔在同一切片上.
            .push_contours(3, on_slices(RECTUM_WALL, &all, false))
            .push_contours(3, on_slices(RECTUM_LUMEN, &all, true))
            // 两个孤岛.
            .push_contours(4, on_slices(PTV_LEFT, &mid, false))
            .push_contours(4, on_slices(PTV_RIGHT, &mid, false));

        let ct = Array3::from_shape_fn(grid.shape(), |(z, y, x)| {
            let p = grid.voxel_to_physical([x as f64, y as f64, z as f64]);
            hu_at(p, mid(p[2])).round() as i16
        });

        // CBCT 视野更小, 体素更大, 并带有已知的刚性位移.
        let cbct_n = n * 4 / 5;
        let cs = s * 1.1;
        let cbct_grid = Grid::new(
            [-(cbct_n as f64) * cs / 2.0, -(cbct_n as f64) * cs / 2.0, -half_z],
            [cs, cs, SLICE_MM],
            [cbct_n, cbct_n, nz],
        )?;
        let (sin, cos) = 3f64.to_radians().sin_cos();
        // 移动 (CBCT) -> 固定 (CT).
        let moving_to_fixed = RigidTransform::from_parts(
            [[cos, -sin, 0.0], [sin, cos, 0.0], [0.0, 0.0, 1.0]],
            [4.0, -6.0, 2.5],
        );
        let cbct = Array3::from_shape_fn(cbct_grid.shape(), |(z, y, x)| {
            let q = cbct_grid.voxel_to_physical([x as f64, y as f64, z as f64]);
            let p = moving_to_fixed.transform_point(q);
            // CBCT 的 HU 标定偏差.
            (hu_at(p, mid(p[2])) - 24.0).round() as i16
        });

        let mut registration = RegistrationRecord::new(CT_FRAME_UID);
        registration
            .push_item(CT_FRAME_UID, RigidTransform::identity().to_homogeneous())
            .push_item(CBCT_FRAME_UID, moving_to_fixed.to_homogeneous());

        Ok(Self {
            grid,
            ct,
            structures,
            cbct_grid,
            cbct,
            registration,
        })
    }
}
