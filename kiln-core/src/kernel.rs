//! Kernel objects and argument blocks.

use crate::types::KernelId;

/// A compiled kernel.
#[derive(Debug)]
pub struct Kernel {
    id: KernelId,
    name: String,
    num_args: usize,
    num_locals: usize,
}

impl Kernel {
    /// Create a kernel with `num_args` explicit and `num_locals` automatic local arguments.
    pub fn new(name: impl Into<String>, num_args: usize, num_locals: usize) -> Self {
        Self {
            id: KernelId::next(),
            name: name.into(),
            num_args,
            num_locals,
        }
    }

    /// Kernel identifier.
    pub fn id(&self) -> KernelId {
        self.id
    }

    /// Kernel function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of explicit arguments.
    pub fn num_args(&self) -> usize {
        self.num_args
    }

    /// Number of automatic local-memory arguments.
    pub fn num_locals(&self) -> usize {
        self.num_locals
    }

    /// Total argument slots a launch carries.
    pub fn arg_slots(&self) -> usize {
        self.num_args + self.num_locals
    }
}

/// One argument value captured at enqueue time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelArg {
    /// Argument bytes; `None` for local-memory arguments sized at launch.
    pub value: Option<Box<[u8]>>,
    /// Size in bytes (for local arguments, the local allocation size).
    pub size: usize,
    /// Whether this is a local-memory argument.
    pub is_local: bool,
}

impl KernelArg {
    /// A by-value argument.
    pub fn value(bytes: impl Into<Box<[u8]>>) -> Self {
        let value: Box<[u8]> = bytes.into();
        Self {
            size: value.len(),
            value: Some(value),
            is_local: false,
        }
    }

    /// A local-memory argument of `size` bytes.
    pub fn local(size: usize) -> Self {
        Self {
            value: None,
            size,
            is_local: true,
        }
    }

    /// Heap bytes owned by this argument.
    pub fn heap_bytes(&self) -> usize {
        self.value.as_ref().map_or(0, |v| v.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arg_slots_include_locals() {
        let kernel = Kernel::new("vadd", 3, 1);
        assert_eq!(kernel.arg_slots(), 4);
        assert_eq!(kernel.name(), "vadd");
    }

    #[test]
    fn arg_constructors() {
        let by_value = KernelArg::value(vec![1u8, 2, 3, 4]);
        assert_eq!(by_value.size, 4);
        assert_eq!(by_value.heap_bytes(), 4);
        assert!(!by_value.is_local);

        let local = KernelArg::local(256);
        assert!(local.is_local);
        assert_eq!(local.heap_bytes(), 0);
    }
}
