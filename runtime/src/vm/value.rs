use std::fmt;
use crate::bytecode::Constant;

/// Represents a value in the VM
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Nil,
}

impl Value {
    /// Falsy values are numeric zero and empty text; Nil is not falsy
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Number(n) => *n == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::Nil => false,
        }
    }

    /// Name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Nil => "nil",
        }
    }
}

impl From<&Constant> for Value {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Integer(i) => Value::Number(*i as f64),
            Constant::Float(f) => Value::Number(*f),
            Constant::String(s) => Value::Text(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // f64's Display never uses an exponent and drops a zero fraction
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Nil => write!(f, "nil"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_display() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(-12.0).to_string(), "-12");
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(Value::Number(1e21).to_string(), "1000000000000000000000");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "inf");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
    }

    #[test]
    fn test_text_and_nil_display() {
        assert_eq!(Value::Text("a b\n".to_string()).to_string(), "a b\n");
        assert_eq!(Value::Nil.to_string(), "nil");
    }

    #[test]
    fn test_falsy() {
        assert!(Value::Number(0.0).is_falsy());
        assert!(Value::Number(-0.0).is_falsy());
        assert!(!Value::Number(f64::NAN).is_falsy());
        assert!(Value::Text(String::new()).is_falsy());
        assert!(!Value::Text("0".to_string()).is_falsy());
        assert!(!Value::Nil.is_falsy());
    }

    #[test]
    fn test_from_constant() {
        assert_eq!(Value::from(&Constant::Integer(7)), Value::Number(7.0));
        assert_eq!(Value::from(&Constant::Float(1.5)), Value::Number(1.5));
        assert_eq!(Value::from(&Constant::String("x".to_string())), Value::Text("x".to_string()));
    }
}
