/// Interpreter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Nested calls allowed before [`RuntimeError::StackOverflow`] is
    /// raised (a `RangeError` to scripts). Every script call costs a
    /// handful of native frames, so keep this well below what the host
    /// thread's stack can take.
    ///
    /// [`RuntimeError::StackOverflow`]: crate::RuntimeError::StackOverflow
    pub max_call_depth: usize,
    /// Print the value of each REPL input.
    pub echo_results: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_call_depth: 128,
            echo_results: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Interpreter, RuntimeError};

    #[test]
    fn call_depth_limit_raises_stack_overflow() {
        let settings = Settings {
            max_call_depth: 8,
            ..Settings::default()
        };
        let mut interp = Interpreter::with_settings(settings);
        interp
            .run("function down(n) { if (n == 0) { return 0; } return down(n - 1); }")
            .expect("declares");
        assert_eq!(interp.run("down(4)").ok(), Some(crate::Value::Number(0.0)));
        match interp.run("down(50)") {
            Err(Error::Runtime(err @ RuntimeError::StackOverflow)) => assert_eq!(err.name(), "RangeError"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
