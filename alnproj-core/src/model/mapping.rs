//! Coordinate mappings between sequences

use super::{MappingId, SeqId};

/// Paired range lists mapping positions on one sequence to another.
///
/// `from_ratio`/`to_ratio` give the unit lengths on each side, e.g. 3:1 for
/// codon to amino acid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapList {
    pub from_ranges: Vec<[i32; 2]>,
    pub to_ranges: Vec<[i32; 2]>,
    pub from_ratio: i32,
    pub to_ratio: i32,
}

impl MapList {
    pub fn new(from_ranges: Vec<[i32; 2]>, to_ranges: Vec<[i32; 2]>, from_ratio: i32, to_ratio: i32) -> Self {
        Self {
            from_ranges,
            to_ranges,
            from_ratio,
            to_ratio,
        }
    }

    pub fn from_lowest(&self) -> Option<i32> {
        self.from_ranges.iter().map(|r| r[0].min(r[1])).min()
    }

    pub fn from_highest(&self) -> Option<i32> {
        self.from_ranges.iter().map(|r| r[0].max(r[1])).max()
    }

    pub fn to_lowest(&self) -> Option<i32> {
        self.to_ranges.iter().map(|r| r[0].min(r[1])).min()
    }

    pub fn to_highest(&self) -> Option<i32> {
        self.to_ranges.iter().map(|r| r[0].max(r[1])).max()
    }
}

/// A map list plus the sequence it maps onto.
///
/// `to` stays `None` until the target sequence is known; readers fill it
/// in through the forward reference queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub map: MapList,
    pub to: Option<SeqId>,
}

impl Mapping {
    pub fn new(map: MapList, to: Option<SeqId>) -> Self {
        Self { map, to }
    }
}

/// One nucleotide sequence and the mapping onto its protein product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodonMapping {
    pub dna: SeqId,
    pub mapping: MappingId,
}

/// Codon correspondences held by a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodonFrame {
    pub mappings: Vec<CodonMapping>,
}

impl CodonFrame {
    pub fn add(&mut self, dna: SeqId, mapping: MappingId) {
        let entry = CodonMapping { dna, mapping };
        if !self.mappings.contains(&entry) {
            self.mappings.push(entry);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maplist_bounds() {
        let map = MapList::new(vec![[10, 4], [20, 30]], vec![[1, 7]], 3, 1);
        assert_eq!(map.from_lowest(), Some(4));
        assert_eq!(map.from_highest(), Some(30));
        assert_eq!(map.to_lowest(), Some(1));
        assert_eq!(map.to_highest(), Some(7));
    }
}
