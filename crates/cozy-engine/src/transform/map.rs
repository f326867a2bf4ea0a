/// Which side a position sticks to when content is inserted exactly at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Assoc {
    /// Stay before inserted content.
    Before,
    /// Move past inserted content.
    #[default]
    After,
}

/// Result of mapping a position, recording whether the content on the
/// association side was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    pub deleted: bool,
}

/// The position changes made by one step: a list of replaced ranges, each
/// `(start, old_size, new_size)` in the coordinates before the step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepMap {
    ranges: Vec<(usize, usize, usize)>,
}

impl StepMap {
    pub fn new(ranges: Vec<(usize, usize, usize)>) -> Self {
        Self { ranges }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn ranges(&self) -> &[(usize, usize, usize)] {
        &self.ranges
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_result(pos, assoc).pos
    }

    pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut diff: isize = 0;
        for &(start, old_size, new_size) in &self.ranges {
            if start > pos {
                break;
            }
            let end = start + old_size;
            if pos <= end {
                let before = if old_size == 0 {
                    assoc == Assoc::Before
                } else if pos == start {
                    true
                } else if pos == end {
                    false
                } else {
                    assoc == Assoc::Before
                };
                let base = (start as isize + diff) as usize;
                let result = if before { base } else { base + new_size };
                let deleted = match assoc {
                    Assoc::Before => pos != start,
                    Assoc::After => pos != end,
                };
                return MapResult {
                    pos: result,
                    deleted,
                };
            }
            diff += new_size as isize - old_size as isize;
        }
        MapResult {
            pos: (pos as isize + diff) as usize,
            deleted: false,
        }
    }

    /// Call `f(old_start, old_end, new_start, new_end)` for every range.
    pub fn for_each(&self, mut f: impl FnMut(usize, usize, usize, usize)) {
        let mut diff: isize = 0;
        for &(start, old_size, new_size) in &self.ranges {
            let new_start = (start as isize + diff) as usize;
            f(start, start + old_size, new_start, new_start + new_size);
            diff += new_size as isize - old_size as isize;
        }
    }
}

/// A sequence of step maps, mapping positions through several steps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    /// The mapping made of the maps from index `from` on.
    pub fn slice(&self, from: usize) -> Mapping {
        Mapping {
            maps: self.maps.get(from..).map(<[StepMap]>::to_vec).unwrap_or_default(),
        }
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.maps.iter().fold(pos, |pos, map| map.map(pos, assoc))
    }

    pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut deleted = false;
        let mut pos = pos;
        for map in &self.maps {
            let result = map.map_result(pos, assoc);
            deleted |= result.deleted;
            pos = result.pos;
        }
        MapResult { pos, deleted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, Assoc::After, 0)]
    #[case(4, Assoc::After, 4)]
    #[case(5, Assoc::After, 4)]
    #[case(8, Assoc::Before, 4)]
    #[case(8, Assoc::After, 4)]
    #[case(10, Assoc::After, 6)]
    fn test_deletion_map(#[case] pos: usize, #[case] assoc: Assoc, #[case] expected: usize) {
        let map = StepMap::new(vec![(4, 4, 0)]);
        assert_eq!(map.map(pos, assoc), expected);
    }

    #[test]
    fn test_insertion_respects_assoc() {
        let map = StepMap::new(vec![(3, 0, 2)]);
        assert_eq!(map.map(3, Assoc::Before), 3);
        assert_eq!(map.map(3, Assoc::After), 5);
        assert!(!map.map_result(3, Assoc::After).deleted);
    }

    #[test]
    fn test_deleted_flag() {
        let map = StepMap::new(vec![(4, 4, 0)]);
        assert!(map.map_result(6, Assoc::After).deleted);
        assert!(!map.map_result(8, Assoc::After).deleted);
        assert!(!map.map_result(4, Assoc::Before).deleted);
    }

    #[test]
    fn test_mapping_composes_in_order() {
        let mut mapping = Mapping::new();
        mapping.push(StepMap::new(vec![(0, 0, 2)]));
        mapping.push(StepMap::new(vec![(5, 3, 0)]));
        assert_eq!(mapping.map(1, Assoc::After), 3);
        assert_eq!(mapping.map(4, Assoc::After), 5);
        assert_eq!(mapping.slice(1).map(9, Assoc::After), 6);
    }

    #[test]
    fn test_for_each_reports_new_ranges() {
        let map = StepMap::new(vec![(2, 1, 3), (10, 2, 0)]);
        let mut seen = Vec::new();
        map.for_each(|a, b, c, d| seen.push((a, b, c, d)));
        assert_eq!(seen, vec![(2, 3, 2, 5), (10, 12, 12, 12)]);
    }
}
