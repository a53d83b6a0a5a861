//! Ordered set of argument values for one kernel invocation

use super::KernelArgValue;
use crate::error::Result;
use crate::profiling::ProfilingData;
use ocl::Queue;
use ocl::core::Kernel as KernelCore;
use std::fmt;

/// Argument values in the kernel's declared parameter order
///
/// Index `i` of the set is bound to argument slot `i`; every bulk operation
/// preserves that order.
#[derive(Debug, Default)]
pub struct KernelArgValuesSet {
    values: Vec<KernelArgValue>,
}

impl KernelArgValuesSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the value for the next parameter slot
    pub fn add_value(&mut self, value: impl Into<KernelArgValue>) {
        self.values.push(value.into());
    }

    pub fn values(&self) -> &[KernelArgValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has_local_memory(&self) -> bool {
        self.values.iter().any(KernelArgValue::is_local)
    }

    /// Copy every buffer to the device, in index order
    pub fn copy_to_device(&self, queue: &Queue, profiling: &mut ProfilingData) -> Result<()> {
        for value in &self.values {
            value.copy_to_device(queue, profiling)?;
        }
        Ok(())
    }

    /// Read every value back into a new, independent set
    ///
    /// Fails if the set holds local memory, which cannot be read back.
    pub fn copy_from_device_to_new_set(
        &self,
        queue: &Queue,
        profiling: &mut ProfilingData,
    ) -> Result<KernelArgValuesSet> {
        let values = self
            .values
            .iter()
            .map(|value| value.copy_from_device_to_new_value(queue, profiling))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { values })
    }

    /// Read back the kernel outputs, keeping positions aligned
    ///
    /// Same as [`copy_from_device_to_new_set`](Self::copy_from_device_to_new_set)
    /// except that local memory slots carry over as size-only placeholders.
    pub fn copy_outputs_from_device(
        &self,
        queue: &Queue,
        profiling: &mut ProfilingData,
    ) -> Result<KernelArgValuesSet> {
        let values = self
            .values
            .iter()
            .map(|value| match value {
                KernelArgValue::Local(local) => Ok(KernelArgValue::Local(*local)),
                other => other.copy_from_device_to_new_value(queue, profiling),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { values })
    }

    /// Bind every value to its positional slot
    pub fn bind(&self, kernel: &KernelCore) -> Result<()> {
        for (index, value) in self.values.iter().enumerate() {
            value.bind(kernel, index as u32)?;
        }
        Ok(())
    }

    /// Release all values; device buffers are freed on drop
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl PartialEq for KernelArgValuesSet {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self.values.iter().zip(&other.values).all(|(a, b)| a == b)
    }
}

impl fmt::Display for KernelArgValuesSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, value) in self.values.iter().enumerate() {
            writeln!(f, "Value[{}] = {}", index, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arg_value::{GlobalArg, LocalArg, ScalarArg};
    use crate::opencl_type::{OpenClType, Value};

    fn sample_set(seed: i64) -> KernelArgValuesSet {
        let mut set = KernelArgValuesSet::new();
        set.add_value(ScalarArg::new(Value::construct(OpenClType::INT, seed)));
        set.add_value(GlobalArg::filled(OpenClType::INT, 5, seed));
        set
    }

    #[test]
    #[allow(clippy::eq_op)]
    fn test_equality_is_reflexive() {
        let set = sample_set(3);
        assert_eq!(set, set);
        assert_eq!(sample_set(3), sample_set(3));
    }

    #[test]
    fn test_different_values_are_not_equal() {
        assert_ne!(sample_set(3), sample_set(4));
    }

    #[test]
    fn test_different_lengths_are_not_equal() {
        let mut longer = sample_set(3);
        longer.add_value(LocalArg::new(OpenClType::INT, 1));
        assert_ne!(sample_set(3), longer);
        assert_ne!(KernelArgValuesSet::new(), sample_set(3));
    }

    #[test]
    fn test_order_matters() {
        let mut a = KernelArgValuesSet::new();
        a.add_value(ScalarArg::new(Value::construct(OpenClType::INT, 1)));
        a.add_value(ScalarArg::new(Value::construct(OpenClType::INT, 2)));
        let mut b = KernelArgValuesSet::new();
        b.add_value(ScalarArg::new(Value::construct(OpenClType::INT, 2)));
        b.add_value(ScalarArg::new(Value::construct(OpenClType::INT, 1)));
        assert_ne!(a, b);
    }

    #[test]
    fn test_clear_then_re_add_restores_equality() {
        let reference = sample_set(3);
        let mut set = sample_set(3);
        set.clear();
        assert!(set.is_empty());
        assert_ne!(set, reference);

        set.add_value(ScalarArg::new(Value::construct(OpenClType::INT, 3)));
        set.add_value(GlobalArg::filled(OpenClType::INT, 5, 3));
        assert_eq!(set, reference);
    }

    #[test]
    fn test_to_string() {
        assert_eq!(
            sample_set(3).to_string(),
            "Value[0] = 3\nValue[1] = [3, 3, 3, 3, 3]\n"
        );
    }

    #[test]
    fn test_has_local_memory() {
        let mut set = sample_set(0);
        assert!(!set.has_local_memory());
        set.add_value(LocalArg::new(OpenClType::FLOAT, 2));
        assert!(set.has_local_memory());
    }
}
