use parser::{ParseError, ScopeError};

use crate::value::Value;

/// Failure while evaluating a program.
#[derive(Debug, Clone)]
pub enum RuntimeError {
    /// A private accessor's target was never registered with the
    /// resolved class.
    PrivateAccess { construct: String, receiver: String },
    TypeError { message: String },
    ReferenceError { name: String },
    AssertionFailed { message: String },
    StackOverflow,
    /// A value raised by `throw`.
    Thrown(Value),
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::TypeError {
            message: message.into(),
        }
    }

    /// Error name as seen by a script's `catch` (`e.name`).
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeError::PrivateAccess { .. } => "PrivateAccessError",
            RuntimeError::TypeError { .. } => "TypeError",
            RuntimeError::ReferenceError { .. } => "ReferenceError",
            RuntimeError::AssertionFailed { .. } => "AssertionError",
            RuntimeError::StackOverflow => "RangeError",
            RuntimeError::Thrown(_) => "Error",
        }
    }

    /// Message without the name prefix (`e.message`).
    pub fn message(&self) -> String {
        match self {
            RuntimeError::PrivateAccess {
                construct,
                receiver,
            } => format!("{} was not constructed by class {}", receiver, construct),
            RuntimeError::TypeError { message } => message.clone(),
            RuntimeError::ReferenceError { name } => format!("`{}` is not defined", name),
            RuntimeError::AssertionFailed { message } => message.clone(),
            RuntimeError::StackOverflow => "maximum call depth exceeded".to_string(),
            RuntimeError::Thrown(value) => value.to_string(),
        }
    }

    pub fn is_private_access(&self) -> bool {
        matches!(self, RuntimeError::PrivateAccess { .. })
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeError::Thrown(value) => write!(f, "uncaught {}", value.describe()),
            other => write!(f, "{}: {}", other.name(), other.message()),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Everything [`Interpreter::run`](crate::Interpreter::run) can fail with.
#[derive(Debug, Clone)]
pub enum Error {
    Parse(Vec<ParseError>),
    /// Accessors with no enclosing class; nothing in the unit ran.
    Scope(Vec<ScopeError>),
    Runtime(RuntimeError),
}

impl Error {
    pub fn as_runtime(&self) -> Option<&RuntimeError> {
        match self {
            Error::Runtime(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Parse(errors) => {
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "parse error at {}", err)?;
                }
                Ok(())
            }
            Error::Scope(errors) => {
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "scope error at {}", err)?;
                }
                Ok(())
            }
            Error::Runtime(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<RuntimeError> for Error {
    fn from(err: RuntimeError) -> Self {
        Error::Runtime(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_access_display() {
        let err = RuntimeError::PrivateAccess {
            construct: "A".into(),
            receiver: "object #7".into(),
        };
        assert_eq!(
            err.to_string(),
            "PrivateAccessError: object #7 was not constructed by class A"
        );
        assert!(err.is_private_access());
    }

    #[test]
    fn thrown_values_keep_their_payload() {
        let err = RuntimeError::Thrown(Value::string("boom"));
        assert_eq!(err.message(), "boom");
        assert_eq!(err.to_string(), "uncaught \"boom\"");
    }
}
