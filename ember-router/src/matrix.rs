//! Matrix connection state
//!
//! Holds the live crosspoint state of one matrix element and applies
//! connection edits under the matrix type's fan-out discipline. A connect
//! that changes nothing yields no change set, so no notification goes out
//! for it.

use std::collections::{BTreeMap, BTreeSet};

use ember_glow::{ConnectionOperation, MatrixType};

use crate::error::{EmberError, EmberResult};

/// Lower bound of a crosspoint gain in dB
pub const MINIMUM_GAIN: i64 = -128;
/// Upper bound of a crosspoint gain in dB
pub const MAXIMUM_GAIN: i64 = 15;

/// One target's source set after an applied edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionChange {
    pub target: u32,
    pub sources: Vec<u32>,
}

#[derive(Debug)]
pub struct MatrixState {
    matrix_type: MatrixType,
    targets: Vec<u32>,
    sources: Vec<u32>,
    connections: BTreeMap<u32, BTreeSet<u32>>,
    gains: BTreeMap<(u32, u32), i64>,
}

impl MatrixState {
    pub fn new(matrix_type: MatrixType) -> Self {
        Self {
            matrix_type,
            targets: Vec::new(),
            sources: Vec::new(),
            connections: BTreeMap::new(),
            gains: BTreeMap::new(),
        }
    }

    pub fn matrix_type(&self) -> MatrixType {
        self.matrix_type
    }

    pub fn targets(&self) -> &[u32] {
        &self.targets
    }

    pub fn sources(&self) -> &[u32] {
        &self.sources
    }

    pub fn add_target(&mut self, number: u32) -> EmberResult<()> {
        if self.targets.contains(&number) {
            return Err(EmberError::InvalidData(format!(
                "duplicate target {}",
                number
            )));
        }
        self.targets.push(number);
        Ok(())
    }

    pub fn add_source(&mut self, number: u32) -> EmberResult<()> {
        if self.sources.contains(&number) {
            return Err(EmberError::InvalidData(format!(
                "duplicate source {}",
                number
            )));
        }
        self.sources.push(number);
        Ok(())
    }

    /// The sources currently feeding `target`
    pub fn sources_of(&self, target: u32) -> Vec<u32> {
        self.connections
            .get(&target)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every target that currently has at least one source
    pub fn active_targets(&self) -> Vec<u32> {
        self.connections
            .iter()
            .filter(|(_, sources)| !sources.is_empty())
            .map(|(&target, _)| target)
            .collect()
    }

    /// Apply a connection edit.
    ///
    /// Returns the per-target changes the edit produced, or `None` when the
    /// edit was rejected or changed nothing. Unknown target or source
    /// numbers reject the whole edit.
    pub fn connect(
        &mut self,
        target: u32,
        sources: &[u32],
        operation: ConnectionOperation,
    ) -> Option<Vec<ConnectionChange>> {
        if !self.targets.contains(&target) {
            log::warn!("connect to unknown target {} rejected", target);
            return None;
        }
        if let Some(&unknown) = sources.iter().find(|s| !self.sources.contains(s)) {
            log::warn!("connect with unknown source {} rejected", unknown);
            return None;
        }

        let mut touched: BTreeSet<u32> = BTreeSet::new();

        match self.matrix_type {
            MatrixType::NToN => self.edit_n_to_n(target, sources, operation, &mut touched),
            MatrixType::OneToN => self.edit_single_source(target, sources, operation, &mut touched),
            MatrixType::OneToOne => {
                // a source feeds at most one target, so taking it for this
                // target releases it everywhere else
                if operation != ConnectionOperation::Disconnect {
                    if let Some(&source) = sources.first() {
                        for (&other, set) in self.connections.iter_mut() {
                            if other != target && set.remove(&source) {
                                touched.insert(other);
                            }
                        }
                    }
                }
                self.edit_single_source(target, sources, operation, &mut touched);
            }
        }

        let changes: Vec<ConnectionChange> = touched
            .into_iter()
            .map(|target| ConnectionChange {
                target,
                sources: self.sources_of(target),
            })
            .collect();

        if changes.is_empty() {
            None
        } else {
            Some(changes)
        }
    }

    /// A target holds at most one source; connect and absolute both take
    /// the first requested source
    fn edit_single_source(
        &mut self,
        target: u32,
        sources: &[u32],
        operation: ConnectionOperation,
        touched: &mut BTreeSet<u32>,
    ) {
        let set = self.connections.entry(target).or_default();
        match operation {
            ConnectionOperation::Absolute | ConnectionOperation::Connect => {
                let wanted: BTreeSet<u32> = sources.iter().take(1).copied().collect();
                if *set != wanted {
                    *set = wanted;
                    touched.insert(target);
                }
            }
            ConnectionOperation::Disconnect => {
                let mut changed = false;
                for source in sources {
                    changed |= set.remove(source);
                }
                if changed {
                    touched.insert(target);
                }
            }
        }
    }

    fn edit_n_to_n(
        &mut self,
        target: u32,
        sources: &[u32],
        operation: ConnectionOperation,
        touched: &mut BTreeSet<u32>,
    ) {
        let set = self.connections.entry(target).or_default();
        match operation {
            ConnectionOperation::Absolute => {
                let wanted: BTreeSet<u32> = sources.iter().copied().collect();
                if *set != wanted {
                    *set = wanted;
                    touched.insert(target);
                }
            }
            ConnectionOperation::Connect => {
                let mut changed = false;
                for &source in sources {
                    changed |= set.insert(source);
                }
                if changed {
                    touched.insert(target);
                }
            }
            ConnectionOperation::Disconnect => {
                let mut changed = false;
                for source in sources {
                    changed |= set.remove(source);
                }
                if changed {
                    touched.insert(target);
                }
            }
        }
    }

    /// Whether the crosspoint addresses known signals
    pub fn has_xpoint(&self, target: u32, source: u32) -> bool {
        self.targets.contains(&target) && self.sources.contains(&source)
    }

    /// The crosspoint's gain; an unwritten crosspoint reads as 0 dB
    pub fn gain(&self, target: u32, source: u32) -> Option<i64> {
        if !self.has_xpoint(target, source) {
            return None;
        }
        Some(self.gains.get(&(target, source)).copied().unwrap_or(0))
    }

    /// Store a crosspoint gain, clamped into the supported dB range.
    ///
    /// Returns the stored value.
    pub fn set_gain(&mut self, target: u32, source: u32, value: i64) -> Option<i64> {
        if !self.has_xpoint(target, source) {
            return None;
        }
        let clamped = value.clamp(MINIMUM_GAIN, MAXIMUM_GAIN);
        self.gains.insert((target, source), clamped);
        Some(clamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(matrix_type: MatrixType) -> MatrixState {
        let mut state = MatrixState::new(matrix_type);
        for n in 0..4 {
            state.add_target(n).unwrap();
            state.add_source(n).unwrap();
        }
        state
    }

    #[test]
    fn test_one_to_n_takes_first_source() {
        let mut state = matrix(MatrixType::OneToN);
        let changes = state
            .connect(0, &[2, 3], ConnectionOperation::Connect)
            .unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].target, 0);
        assert_eq!(changes[0].sources, vec![2]);
        assert_eq!(state.sources_of(0), vec![2]);

        // a second source may feed another target
        state.connect(1, &[2], ConnectionOperation::Connect).unwrap();
        assert_eq!(state.sources_of(0), vec![2]);
        assert_eq!(state.sources_of(1), vec![2]);
    }

    #[test]
    fn test_one_to_one_source_exclusivity() {
        let mut state = matrix(MatrixType::OneToOne);
        state.connect(0, &[1], ConnectionOperation::Connect).unwrap();

        let changes = state
            .connect(2, &[1], ConnectionOperation::Connect)
            .unwrap();
        assert_eq!(changes.len(), 2);
        assert!(changes
            .iter()
            .any(|c| c.target == 0 && c.sources.is_empty()));
        assert!(changes.iter().any(|c| c.target == 2 && c.sources == [1]));
        assert_eq!(state.sources_of(0), Vec::<u32>::new());
        assert_eq!(state.sources_of(2), vec![1]);
    }

    #[test]
    fn test_n_to_n_set_operations() {
        let mut state = matrix(MatrixType::NToN);
        state
            .connect(1, &[0, 2], ConnectionOperation::Connect)
            .unwrap();
        state.connect(1, &[3], ConnectionOperation::Connect).unwrap();
        assert_eq!(state.sources_of(1), vec![0, 2, 3]);

        state
            .connect(1, &[2], ConnectionOperation::Disconnect)
            .unwrap();
        assert_eq!(state.sources_of(1), vec![0, 3]);

        let changes = state
            .connect(1, &[1], ConnectionOperation::Absolute)
            .unwrap();
        assert_eq!(changes[0].sources, vec![1]);
        assert_eq!(state.sources_of(1), vec![1]);
    }

    #[test]
    fn test_no_change_yields_no_notification() {
        let mut state = matrix(MatrixType::OneToN);
        state.connect(0, &[1], ConnectionOperation::Absolute).unwrap();
        assert!(state
            .connect(0, &[1], ConnectionOperation::Absolute)
            .is_none());
        assert!(state
            .connect(0, &[2], ConnectionOperation::Disconnect)
            .is_none());
    }

    #[test]
    fn test_unknown_signals_rejected() {
        let mut state = matrix(MatrixType::NToN);
        assert!(state.connect(9, &[0], ConnectionOperation::Connect).is_none());
        assert!(state.connect(0, &[9], ConnectionOperation::Connect).is_none());
        assert_eq!(state.sources_of(0), Vec::<u32>::new());
    }

    #[test]
    fn test_gain_materializes_and_clamps() {
        let mut state = matrix(MatrixType::OneToN);
        assert_eq!(state.gain(0, 1), Some(0));
        assert_eq!(state.set_gain(0, 1, 99), Some(MAXIMUM_GAIN));
        assert_eq!(state.set_gain(0, 1, -500), Some(MINIMUM_GAIN));
        assert_eq!(state.set_gain(0, 1, -6), Some(-6));
        assert_eq!(state.gain(0, 1), Some(-6));
        assert_eq!(state.gain(9, 1), None);
        assert_eq!(state.set_gain(0, 9, 3), None);
    }
}
