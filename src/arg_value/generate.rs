//! Synthesis of argument values from a [`ValuePolicy`] or caller-supplied inputs

use super::{GlobalArg, LocalArg, ScalarArg};
use crate::config::ValuePolicy;
use crate::error::{CldriveError, Result};
use crate::opencl_type::{OpenClType, Value, element_size, parse_element, write_element};
use ocl::Queue;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Random seeds stay below this bound so they fit every type, `char` included
const RANDOM_SEED_BOUND: i64 = 128;

/// Produces argument values for one input set
///
/// Two generators built from the same policy yield the same sequence of
/// values, so every configuration of a kernel sees identical inputs.
///
/// A generator built with [`ValueGenerator::from_inputs`] parses one entry
/// per non-local parameter instead, in declared order.
pub struct ValueGenerator {
    policy: ValuePolicy,
    rng: Option<StdRng>,
    inputs: Option<Inputs>,
}

struct Inputs {
    pending: VecDeque<Vec<String>>,
    provided: usize,
}

impl ValueGenerator {
    pub fn new(policy: ValuePolicy) -> Self {
        let rng = match policy {
            ValuePolicy::Constant(_) => None,
            ValuePolicy::Random { seed } => Some(StdRng::seed_from_u64(seed)),
        };
        Self {
            policy,
            rng,
            inputs: None,
        }
    }

    /// Values parsed from `inputs`: a scalar takes a one-element entry, a
    /// buffer takes one element per entry item
    pub fn from_inputs(inputs: &[Vec<String>]) -> Self {
        Self {
            policy: ValuePolicy::default(),
            rng: None,
            inputs: Some(Inputs {
                pending: inputs.iter().cloned().collect(),
                provided: inputs.len(),
            }),
        }
    }

    pub fn policy(&self) -> ValuePolicy {
        self.policy
    }

    pub fn is_explicit(&self) -> bool {
        self.inputs.is_some()
    }

    fn next_seed(&mut self) -> i64 {
        match (&self.policy, self.rng.as_mut()) {
            (ValuePolicy::Random { .. }, Some(rng)) => rng.gen_range(0..RANDOM_SEED_BOUND),
            (ValuePolicy::Constant(value), _) => *value,
            (ValuePolicy::Random { seed }, None) => *seed as i64,
        }
    }

    /// Next caller-supplied entry, or `None` when values are generated
    fn next_input(&mut self) -> Result<Option<Vec<String>>> {
        let Some(inputs) = self.inputs.as_mut() else {
            return Ok(None);
        };
        match inputs.pending.pop_front() {
            Some(entry) => Ok(Some(entry)),
            None => Err(CldriveError::InputCount {
                expected: inputs.provided + 1,
                provided: inputs.provided,
            }),
        }
    }

    pub fn scalar(&mut self, ty: OpenClType) -> Result<ScalarArg> {
        let value = match self.next_input()? {
            None => Value::construct(ty, self.next_seed()),
            Some(entry) => match entry.as_slice() {
                [text] => Value::parse(ty, text)?,
                _ => {
                    return Err(CldriveError::ParseValue {
                        text: entry.join(" "),
                        type_name: ty.to_string(),
                    });
                }
            },
        };
        Ok(ScalarArg::new(value))
    }

    /// Encoded contents for a buffer of `len` generated elements
    pub fn buffer_contents(&mut self, ty: OpenClType, len: usize) -> Vec<u8> {
        let size = element_size(ty);
        let mut host = vec![0u8; len * size];
        for element in host.chunks_exact_mut(size) {
            write_element(ty, self.next_seed(), element);
        }
        host
    }

    /// Parsed entry padded with zeros to at least `len` elements
    fn explicit_contents(ty: OpenClType, entry: &[String], len: usize) -> Result<Vec<u8>> {
        let mut host = Vec::with_capacity(len.max(entry.len()) * element_size(ty));
        for text in entry {
            host.extend(parse_element(ty, text)?);
        }
        let zero = Value::zero(ty);
        for _ in entry.len()..len {
            host.extend_from_slice(zero.as_bytes());
        }
        Ok(host)
    }

    /// A global buffer with a device mirror allocated on `queue`
    pub fn global(
        &mut self,
        ty: OpenClType,
        len: usize,
        read_only: bool,
        queue: &Queue,
    ) -> Result<GlobalArg> {
        let host = match self.next_input()? {
            None => self.buffer_contents(ty, len),
            Some(entry) => Self::explicit_contents(ty, &entry, len)?,
        };
        GlobalArg::with_access(ty, host, read_only, queue)
    }

    pub fn local(&self, ty: OpenClType, len: usize) -> LocalArg {
        LocalArg::new(ty, len)
    }
}
