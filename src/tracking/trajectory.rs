//! 轨迹缓冲 (Trajectory Buffer)
//!
//! 固定容量的滚动历史, 记录最近的检测位置。`None` 表示该周期未检测到球,
//! 保留时间对齐, 缺口可见而不是被跳过。

use std::collections::VecDeque;

/// 默认轨迹容量
pub const DEFAULT_TRAJECTORY_CAPACITY: usize = 50;

/// 像素坐标
pub type PixelPoint = (i32, i32);

#[derive(Clone, Debug)]
pub struct Trajectory {
    points: VecDeque<Option<PixelPoint>>,
    capacity: usize,
}

impl Default for Trajectory {
    fn default() -> Self {
        Self::new(DEFAULT_TRAJECTORY_CAPACITY)
    }
}

impl Trajectory {
    /// 容量至少为 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 追加到尾部, 超出容量时从头部淘汰
    pub fn push(&mut self, point: Option<PixelPoint>) {
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// 按插入顺序复制一份
    pub fn snapshot(&self) -> Vec<Option<PixelPoint>> {
        self.points.iter().copied().collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Option<PixelPoint>> + '_ {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 非缺口位置 (按时间顺序)
    pub fn valid_points(&self) -> Vec<PixelPoint> {
        self.points.iter().flatten().copied().collect()
    }

    /// 已追踪到的位置数量
    pub fn positions_tracked(&self) -> usize {
        self.points.iter().filter(|p| p.is_some()).count()
    }

    /// 相邻且都非缺口的线段, 用于绘制轨迹
    pub fn segments(&self) -> Vec<(PixelPoint, PixelPoint)> {
        self.points
            .iter()
            .zip(self.points.iter().skip(1))
            .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut traj = Trajectory::new(5);
        for i in 0..20 {
            traj.push(if i % 3 == 0 { None } else { Some((i, i)) });
            assert!(traj.len() <= traj.capacity());
        }
        assert_eq!(traj.len(), 5);
    }

    #[test]
    fn test_oldest_entry_is_evicted() {
        let mut traj = Trajectory::new(3);
        traj.push(Some((1, 1)));
        traj.push(None);
        traj.push(Some((3, 3)));
        assert_eq!(traj.snapshot(), vec![Some((1, 1)), None, Some((3, 3))]);

        traj.push(Some((4, 4)));
        assert_eq!(traj.snapshot(), vec![None, Some((3, 3)), Some((4, 4))]);
    }

    #[test]
    fn test_gaps_are_kept() {
        let mut traj = Trajectory::default();
        traj.push(Some((10, 10)));
        traj.push(None);
        traj.push(Some((12, 14)));
        assert_eq!(traj.len(), 3);
        assert_eq!(traj.positions_tracked(), 2);
        assert_eq!(traj.valid_points(), vec![(10, 10), (12, 14)]);
        assert!(traj.segments().is_empty());
    }

    #[test]
    fn test_segments_skip_gaps() {
        let mut traj = Trajectory::default();
        for p in [Some((0, 0)), Some((1, 1)), None, Some((3, 3)), Some((4, 4))] {
            traj.push(p);
        }
        assert_eq!(traj.segments(), vec![((0, 0), (1, 1)), ((3, 3), (4, 4))]);
    }

    #[test]
    fn test_clear_empty_is_noop() {
        let mut traj = Trajectory::default();
        traj.clear();
        assert_eq!(traj.len(), 0);
        assert!(traj.is_empty());
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut traj = Trajectory::new(4);
        traj.push(Some((1, 2)));
        traj.push(None);
        traj.clear();
        assert!(traj.snapshot().is_empty());
        assert_eq!(traj.capacity(), 4);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut traj = Trajectory::new(0);
        traj.push(Some((1, 1)));
        traj.push(Some((2, 2)));
        assert_eq!(traj.snapshot(), vec![Some((2, 2))]);
    }
}
