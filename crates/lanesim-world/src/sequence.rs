//! Timestamped sample sequences.

use std::iter::{Copied, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::error::WorldError;

/// An ordered list of `(timestamp, value)` samples with strictly increasing timestamps.
///
/// Between two samples a sequence holds the earlier value ("sample and hold"),
/// which is how command sequences are interpreted by the trajectory builder.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SampledSequence<T> {
    timestamps: Vec<f64>,
    values: Vec<T>,
}

// Deserialized sequences are checked like constructed ones.
#[cfg(feature = "serde")]
impl<'de, T: Deserialize<'de>> Deserialize<'de> for SampledSequence<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct RawSequence<T> {
            timestamps: Vec<f64>,
            values: Vec<T>,
        }

        let raw = RawSequence::<T>::deserialize(deserializer)?;
        SampledSequence::new(raw.timestamps, raw.values).map_err(de::Error::custom)
    }
}

impl<T> SampledSequence<T> {
    /// Builds a sequence from parallel timestamp and value vectors.
    ///
    /// # Returns
    /// * `Result<Self, WorldError>` - `LengthMismatch` or `UnorderedTimestamps` on invalid input
    pub fn new(timestamps: Vec<f64>, values: Vec<T>) -> Result<Self, WorldError> {
        if timestamps.len() != values.len() {
            return Err(WorldError::LengthMismatch("timestamps and values must have the same length"));
        }
        if timestamps.iter().any(|t| !t.is_finite()) {
            return Err(WorldError::UnorderedTimestamps("timestamps must be finite"));
        }
        if timestamps.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(WorldError::UnorderedTimestamps("timestamps must be strictly increasing"));
        }
        Ok(SampledSequence { timestamps, values })
    }

    /// Builds a sequence from `(timestamp, value)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, WorldError>
    where
        I: IntoIterator<Item = (f64, T)>,
    {
        let (timestamps, values) = pairs.into_iter().unzip();
        SampledSequence::new(timestamps, values)
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the sequence has no samples.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Sample times, strictly increasing.
    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// Sample values, parallel to [`timestamps`](Self::timestamps).
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Timestamp of the first sample.
    pub fn start(&self) -> Option<f64> {
        self.timestamps.first().copied()
    }

    /// Timestamp of the last sample.
    pub fn end(&self) -> Option<f64> {
        self.timestamps.last().copied()
    }

    /// Iterates `(timestamp, &value)` pairs in time order.
    pub fn iter(&self) -> Zip<Copied<std::slice::Iter<'_, f64>>, std::slice::Iter<'_, T>> {
        self.timestamps.iter().copied().zip(self.values.iter())
    }

    /// Maps every value, keeping the timestamps.
    pub fn transform_values<U, F>(&self, f: F) -> SampledSequence<U>
    where
        F: FnMut(&T) -> U,
    {
        SampledSequence {
            timestamps: self.timestamps.clone(),
            values: self.values.iter().map(f).collect(),
        }
    }
}

impl<T: Clone> SampledSequence<T> {
    /// Inserts `factor - 1` evenly spaced samples inside every gap, each
    /// holding the value of the sample that opens the gap.
    ///
    /// A sequence of `n` samples becomes `(n - 1) * factor + 1` samples; a
    /// factor of one returns an identical sequence.
    pub fn upsample(&self, factor: usize) -> Result<Self, WorldError> {
        if factor == 0 {
            return Err(WorldError::InvalidUpsampleFactor("must be at least one"));
        }
        let Some(&last_t) = self.timestamps.last() else {
            return Ok(self.clone());
        };

        let capacity = (self.len() - 1) * factor + 1;
        let mut timestamps = Vec::with_capacity(capacity);
        let mut values = Vec::with_capacity(capacity);

        for (pair, value) in self.timestamps.windows(2).zip(&self.values) {
            let step = (pair[1] - pair[0]) / factor as f64;
            for k in 0..factor {
                timestamps.push(pair[0] + step * k as f64);
                values.push(value.clone());
            }
        }
        timestamps.push(last_t);
        values.extend(self.values.last().cloned());

        Ok(SampledSequence { timestamps, values })
    }
}

impl<'a, T> IntoIterator for &'a SampledSequence<T> {
    type Item = (f64, &'a T);
    type IntoIter = Zip<Copied<std::slice::Iter<'a, f64>>, std::slice::Iter<'a, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> IntoIterator for SampledSequence<T> {
    type Item = (f64, T);
    type IntoIter = Zip<std::vec::IntoIter<f64>, std::vec::IntoIter<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.timestamps.into_iter().zip(self.values)
    }
}
