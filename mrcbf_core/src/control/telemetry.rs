// mrcbf_core/src/control/telemetry.rs

use crate::types::{Control, State};

/// One record per controller update.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugEntry {
    pub time: f64,
    pub true_state: State,
    pub ref_state: State,
    /// The input handed back to the caller.
    pub input: Control,
    /// Planned input before the safety filter. `None` for single-stage controllers.
    pub input_slow: Option<Control>,
    /// Filter correction `input - input_slow`. `None` for single-stage controllers.
    pub input_fast: Option<Control>,
}

/// Append-only telemetry of a controller run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugLog {
    entries: Vec<DebugEntry>,
}

impl DebugLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: DebugEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DebugEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&DebugEntry> {
        self.entries.last()
    }

    // --- Column accessors ---

    pub fn times(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.time).collect()
    }

    pub fn true_states(&self) -> Vec<&State> {
        self.entries.iter().map(|e| &e.true_state).collect()
    }

    pub fn ref_states(&self) -> Vec<&State> {
        self.entries.iter().map(|e| &e.ref_state).collect()
    }

    pub fn inputs(&self) -> Vec<&Control> {
        self.entries.iter().map(|e| &e.input).collect()
    }

    pub fn slow_inputs(&self) -> Vec<Option<&Control>> {
        self.entries.iter().map(|e| e.input_slow.as_ref()).collect()
    }

    pub fn fast_inputs(&self) -> Vec<Option<&Control>> {
        self.entries.iter().map(|e| e.input_fast.as_ref()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    fn entry(time: f64, staged: bool) -> DebugEntry {
        DebugEntry {
            time,
            true_state: DVector::from_element(12, time),
            ref_state: DVector::zeros(12),
            input: DVector::from_element(4, 2.0),
            input_slow: staged.then(|| DVector::from_element(4, 2.5)),
            input_fast: staged.then(|| DVector::from_element(4, -0.5)),
        }
    }

    #[test]
    fn columns_follow_insertion_order() {
        let mut log = DebugLog::new();
        log.push(entry(0.0, true));
        log.push(entry(0.01, true));

        assert_eq!(log.len(), 2);
        assert_eq!(log.times(), vec![0.0, 0.01]);
        assert_eq!(log.true_states()[1][3], 0.01);
        assert_eq!(log.fast_inputs()[0].unwrap()[0], -0.5);
    }
}
