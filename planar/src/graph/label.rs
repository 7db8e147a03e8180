use serde::Serialize;

/// Which of (up to) two source geometries an element of the planar graph
/// came from.
///
/// For polygon boundaries only the parity of the occurrence count matters:
/// an edge traversed twice by the same polygon cancels out. For open
/// linework, "used at all" is what counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TopologyLabel {
    occurrences: [u32; 2],
}

impl TopologyLabel {
    /// A label recording a single use by `source`.
    pub fn single(source: usize) -> Self {
        let mut ret = Self::default();
        ret.mark(source);
        ret
    }

    pub fn mark(&mut self, source: usize) {
        self.occurrences[source] += 1;
    }

    pub fn merge(&mut self, other: &TopologyLabel) {
        self.occurrences[0] += other.occurrences[0];
        self.occurrences[1] += other.occurrences[1];
    }

    pub fn is_used(&self, source: usize) -> bool {
        self.occurrences[source] > 0
    }

    pub fn occurrences(&self, source: usize) -> u32 {
        self.occurrences[source]
    }

    /// Used an odd number of times, so it survives parity cancellation.
    pub fn is_odd(&self, source: usize) -> bool {
        self.occurrences[source] % 2 == 1
    }

    pub fn used_by_both(&self) -> bool {
        self.is_used(0) && self.is_used(1)
    }

    /// The one source using this element, if exactly one does.
    pub fn sole_user(&self) -> Option<usize> {
        match (self.is_used(0), self.is_used(1)) {
            (true, false) => Some(0),
            (false, true) => Some(1),
            _ => None,
        }
    }
}
