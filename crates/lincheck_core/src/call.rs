use {
    crate::Value,
    std::fmt::{Display, Formatter},
};

/// A named capability exposed by a subject under test.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Operation {
    name: String,
    arity: usize,
}

impl Operation {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Operation {
            name: name.into(),
            arity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// An [`Operation`] bound to concrete arguments. Immutable once built.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct OperationCall {
    operation: Operation,
    args: Vec<Value>,
}

impl OperationCall {
    pub fn new(operation: Operation, args: Vec<Value>) -> Self {
        OperationCall { operation, args }
    }

    /// Builds a call whose operation arity is inferred from the arguments.
    pub fn named(name: impl Into<String>, args: impl IntoIterator<Item = Value>) -> Self {
        let args: Vec<Value> = args.into_iter().collect();
        OperationCall {
            operation: Operation::new(name, args.len()),
            args,
        }
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn name(&self) -> &str {
        self.operation.name()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn arg(&self, i: usize) -> Option<&Value> {
        self.args.get(i)
    }
}

impl Display for OperationCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name())?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            Display::fmt(arg, f)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn can_display() {
        let call = OperationCall::named("put", [Value::from("k"), Value::from(2)]);
        assert_eq!(call.to_string(), "put(\"k\", 2)");
        assert_eq!(call.operation().to_string(), "put/2");
        assert_eq!(OperationCall::named("poll", []).to_string(), "poll()");
    }

    #[test]
    fn infers_arity() {
        let call = OperationCall::named("offer", [Value::from(1)]);
        assert_eq!(call.operation().arity(), 1);
        assert_eq!(call.arg(0), Some(&Value::Int(1)));
        assert_eq!(call.arg(1), None);
    }
}
