use std::ops::Range;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::InvalidInput;

/// One labeled example: an input vector and the output the network should produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub input: Vec<f32>,
    pub desired_output: Vec<f32>,
}

impl TrainingExample {
    pub fn new(input: Vec<f32>, desired_output: Vec<f32>) -> TrainingExample {
        TrainingExample { input, desired_output }
    }
}

/// The full set of examples a training run walks through in minibatches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSuite {
    pub examples: Vec<TrainingExample>,
}

impl TrainingSuite {
    pub fn new(examples: Vec<TrainingExample>) -> TrainingSuite {
        TrainingSuite { examples }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// The examples in `range`, or an error if it does not fit the suite.
    pub fn minibatch(&self, range: Range<usize>) -> Result<&[TrainingExample], InvalidInput> {
        if range.start > range.end || range.end > self.examples.len() {
            return Err(InvalidInput::RangeOutOfBounds {
                begin: range.start,
                end: range.end,
                len: self.examples.len(),
            });
        }
        Ok(&self.examples[range])
    }

    /// Consecutive ranges of at most `size` examples covering the whole suite.
    pub fn minibatch_ranges(&self, size: usize) -> impl Iterator<Item = Range<usize>> {
        let len = self.examples.len();
        (0..len).step_by(size.max(1)).map(move |start| start..(start + size.max(1)).min(len))
    }

    pub fn shuffle(&mut self, rng: &mut impl Rng) {
        self.examples.shuffle(rng);
    }
}
