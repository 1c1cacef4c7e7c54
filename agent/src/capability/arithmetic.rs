//! Integer arithmetic capabilities.

use serde_json::Value;

use super::{
    Arguments, Capability, CapabilityRegistry, FailureCategory, FailureDescriptor, ParamSpec,
    ParamType,
};

const OPERANDS: &[ParamSpec] = &[
    ParamSpec::new("a", ParamType::Integer, "The first integer."),
    ParamSpec::new("b", ParamType::Integer, "The second integer."),
];

/// Binary operation over two integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
        Operation::Power,
    ];

    fn name(self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
            Operation::Power => "power",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Operation::Add => "Adds two integers.",
            Operation::Subtract => "Subtracts the second integer from the first.",
            Operation::Multiply => "Multiplies two integers.",
            Operation::Divide => {
                "Divides the first integer by the second. The quotient may be fractional."
            }
            Operation::Power => "Raises the first integer to the power of the second.",
        }
    }

    /// Apply the operation, formatting the result as text.
    pub fn apply(self, a: i64, b: i64) -> Result<String, FailureDescriptor> {
        let overflow = || {
            FailureDescriptor::new(
                FailureCategory::Arithmetic,
                format!("{} overflowed", self.name()),
            )
        };
        match self {
            Operation::Add => a.checked_add(b).map(|v| v.to_string()).ok_or_else(overflow),
            Operation::Subtract => a.checked_sub(b).map(|v| v.to_string()).ok_or_else(overflow),
            Operation::Multiply => a.checked_mul(b).map(|v| v.to_string()).ok_or_else(overflow),
            Operation::Divide => {
                if b == 0 {
                    return Err(FailureDescriptor::new(
                        FailureCategory::Arithmetic,
                        "division by zero",
                    ));
                }
                match a.checked_rem(b) {
                    None => Err(overflow()),
                    Some(0) => a.checked_div(b).map(|v| v.to_string()).ok_or_else(overflow),
                    Some(_) => Ok(format_float(a as f64 / b as f64)),
                }
            }
            Operation::Power => {
                if b >= 0 {
                    let exp = u32::try_from(b).map_err(|_| overflow())?;
                    return a.checked_pow(exp).map(|v| v.to_string()).ok_or_else(overflow);
                }
                if a == 0 {
                    return Err(FailureDescriptor::new(
                        FailureCategory::Arithmetic,
                        "zero cannot be raised to a negative power",
                    ));
                }
                let exp = i32::try_from(b).map_err(|_| overflow())?;
                Ok(format_float((a as f64).powi(exp)))
            }
        }
    }
}

fn format_float(value: f64) -> String {
    let text = format!("{value:.10}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Capability wrapper around an [`Operation`].
#[derive(Debug, Clone, Copy)]
pub struct Arithmetic {
    op: Operation,
}

impl Arithmetic {
    pub fn new(op: Operation) -> Self {
        Self { op }
    }
}

impl Capability for Arithmetic {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    fn parameters(&self) -> &[ParamSpec] {
        OPERANDS
    }

    fn invoke(&self, args: &Arguments) -> Result<String, FailureDescriptor> {
        let a = integer_arg(args, "a")?;
        let b = integer_arg(args, "b")?;
        self.op.apply(a, b)
    }
}

fn integer_arg(args: &Arguments, name: &str) -> Result<i64, FailureDescriptor> {
    args.get(name).and_then(Value::as_i64).ok_or_else(|| {
        FailureDescriptor::new(
            FailureCategory::InvalidArguments,
            format!("argument '{name}' must be a 64-bit integer"),
        )
    })
}

/// Register all five operations.
pub fn register_all(registry: &mut CapabilityRegistry) {
    for op in Operation::ALL {
        registry.register(Arithmetic::new(op));
    }
}
