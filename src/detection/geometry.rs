//! 轮廓几何: 面积与最小外接圆

use imageproc::point::Point;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// 打乱顺序使用的固定种子 (结果可复现)
const SHUFFLE_SEED: u64 = 0x6261_6c6c;

const EPS: f64 = 1e-7;

/// 圆 (像素坐标, 可为小数)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
    pub cx: f64,
    pub cy: f64,
    pub radius: f64,
}

impl Circle {
    fn from_point(p: (f64, f64)) -> Self {
        Self {
            cx: p.0,
            cy: p.1,
            radius: 0.0,
        }
    }

    fn from_diameter(a: (f64, f64), b: (f64, f64)) -> Self {
        let cx = (a.0 + b.0) / 2.0;
        let cy = (a.1 + b.1) / 2.0;
        Self {
            cx,
            cy,
            radius: ((a.0 - cx).powi(2) + (a.1 - cy).powi(2)).sqrt(),
        }
    }

    /// 三点外接圆; 三点共线时退化为最远两点的直径圆
    fn circumscribe(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Self {
        let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
        if d.abs() < EPS {
            return [
                Self::from_diameter(a, b),
                Self::from_diameter(a, c),
                Self::from_diameter(b, c),
            ]
            .into_iter()
            .fold(Self::from_point(a), |best, cand| {
                if cand.radius > best.radius {
                    cand
                } else {
                    best
                }
            });
        }

        let a2 = a.0 * a.0 + a.1 * a.1;
        let b2 = b.0 * b.0 + b.1 * b.1;
        let c2 = c.0 * c.0 + c.1 * c.1;
        let cx = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
        let cy = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;
        Self {
            cx,
            cy,
            radius: ((a.0 - cx).powi(2) + (a.1 - cy).powi(2)).sqrt(),
        }
    }

    pub fn contains(&self, p: (f64, f64)) -> bool {
        let dist = ((p.0 - self.cx).powi(2) + (p.1 - self.cy).powi(2)).sqrt();
        dist <= self.radius + EPS * self.radius.max(1.0)
    }
}

/// 多边形面积 (鞋带公式, 取绝对值)
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64)
        .sum();
    twice.abs() as f64 / 2.0
}

/// 最小外接圆 (Welzl 增量算法, 期望线性时间)
///
/// 空点集返回 `None`。
pub fn min_enclosing_circle(points: &[Point<i32>]) -> Option<Circle> {
    let mut pts: Vec<(f64, f64)> = points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    if pts.is_empty() {
        return None;
    }
    pts.shuffle(&mut StdRng::seed_from_u64(SHUFFLE_SEED));

    let mut circle = Circle::from_point(pts[0]);
    for i in 1..pts.len() {
        if circle.contains(pts[i]) {
            continue;
        }
        circle = Circle::from_point(pts[i]);
        for j in 0..i {
            if circle.contains(pts[j]) {
                continue;
            }
            circle = Circle::from_diameter(pts[i], pts[j]);
            for k in 0..j {
                if !circle.contains(pts[k]) {
                    circle = Circle::circumscribe(pts[i], pts[j], pts[k]);
                }
            }
        }
    }
    Some(circle)
}
