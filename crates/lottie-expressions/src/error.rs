//! Error taxonomy shared by the splitter, parser and interpreter.

use thiserror::Error;

/// Coarse classification of an [`ExpressionError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    Reference,
    Type,
    Arity,
    Unsupported,
    MissingArgument,
    UnexpectedEndOfInput,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("SyntaxError: {message} (at {position}, near `{token}`)")]
    Syntax {
        message: String,
        token: String,
        position: usize,
    },

    #[error("ReferenceError: {0} is not defined")]
    Reference(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("ArityError: `{name}` expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("UnsupportedError: `{0}` is not supported")]
    Unsupported(String),

    #[error("'{parameter}' argument of '{function}' function is missing")]
    MissingArgument { parameter: String, function: String },

    #[error("unexpected end of input after `{0}`")]
    UnexpectedEndOfInput(String),
}

impl ExpressionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExpressionError::Syntax { .. } => ErrorKind::Syntax,
            ExpressionError::Reference(_) => ErrorKind::Reference,
            ExpressionError::Type(_) => ErrorKind::Type,
            ExpressionError::Arity { .. } => ErrorKind::Arity,
            ExpressionError::Unsupported(_) => ErrorKind::Unsupported,
            ExpressionError::MissingArgument { .. } => ErrorKind::MissingArgument,
            ExpressionError::UnexpectedEndOfInput(_) => ErrorKind::UnexpectedEndOfInput,
        }
    }

    /// Syntax error that is not tied to a token, such as a malformed declaration.
    pub fn syntax(message: impl Into<String>) -> Self {
        ExpressionError::Syntax {
            message: message.into(),
            token: String::new(),
            position: 0,
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        ExpressionError::Type(message.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        ExpressionError::Reference(name.into())
    }
}

pub type Result<T, E = ExpressionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_culprit() {
        let err = ExpressionError::reference("fun2");
        assert_eq!(err.to_string(), "ReferenceError: fun2 is not defined");
        assert_eq!(err.kind(), ErrorKind::Reference);

        let err = ExpressionError::Arity {
            name: "clamp".into(),
            expected: "3".into(),
            found: 2,
        };
        assert!(err.to_string().contains("clamp"));
        assert!(err.to_string().contains('3'));

        let err = ExpressionError::MissingArgument {
            parameter: "b".into(),
            function: "test".into(),
        };
        assert_eq!(err.to_string(), "'b' argument of 'test' function is missing");
    }
}
