//! Names visible inside an equation: the time `t`, the state `y1..yN` and the alias `v` for `y1`.
use crate::symbolic::symbolic_engine::Expr;
use std::collections::HashMap;

pub const TIME: &str = "t";
/// alias of the first state variable
pub const ALIAS: &str = "v";

/// `y1`, `y2`, ... for the zero-based position `i`
pub fn state_name(i: usize) -> String {
    format!("y{}", i + 1)
}

/// Name -> value mapping of one evaluation. `T` is `f64` when the equations are evaluated and
/// [`Expr`] when they are turned into symbolic expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableBinding<T> {
    scope: HashMap<String, T>,
}

impl<T: Clone> VariableBinding<T> {
    pub fn bind(time: T, state: &[T]) -> Self {
        let mut scope = HashMap::with_capacity(state.len() + 2);
        scope.insert(TIME.to_string(), time);
        for (i, value) in state.iter().enumerate() {
            scope.insert(state_name(i), value.clone());
        }
        if let Some(first) = state.first() {
            scope.insert(ALIAS.to_string(), first.clone());
        }
        VariableBinding { scope }
    }

    pub fn scope(&self) -> &HashMap<String, T> {
        &self.scope
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.scope.get(name)
    }

    pub fn len(&self) -> usize {
        self.scope.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scope.is_empty()
    }
}

impl VariableBinding<f64> {
    pub fn numeric(t: f64, y: &[f64]) -> Self {
        VariableBinding::bind(t, y)
    }
}

impl VariableBinding<Expr> {
    /// `t` stays a variable, `yi` becomes the unknown function `yi(t)`
    pub fn symbolic(n: usize) -> Self {
        let time = Expr::Var(TIME.to_string());
        let unknowns = unknown_functions(n);
        VariableBinding::bind(time, &unknowns)
    }
}

/// `y1(t), .., yN(t)`
pub fn unknown_functions(n: usize) -> Vec<Expr> {
    (0..n)
        .map(|i| Expr::function(&state_name(i), Expr::Var(TIME.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_binding() {
        let binding = VariableBinding::numeric(0.5, &[1.0, 2.0, 3.0]);
        assert_eq!(binding.len(), 5);
        assert_eq!(binding.get("t"), Some(&0.5));
        assert_eq!(binding.get("y3"), Some(&3.0));
        assert_eq!(binding.get("v"), Some(&1.0));
        assert_eq!(binding.get("y4"), None);
    }

    #[test]
    fn test_alias_follows_first_state_variable() {
        let binding = VariableBinding::numeric(0.0, &[7.0]);
        assert_eq!(binding.get("v"), binding.get("y1"));
        let empty = VariableBinding::numeric(0.0, &[]);
        assert_eq!(empty.get("v"), None);
        assert_eq!(empty.len(), 1);
    }

    #[test]
    fn test_symbolic_binding() {
        let binding = VariableBinding::symbolic(2);
        assert_eq!(binding.get("t"), Some(&Expr::Var("t".to_string())));
        assert_eq!(binding.get("y2").unwrap().to_string(), "y2(t)");
        assert_eq!(binding.get("v").unwrap().to_string(), "y1(t)");
    }
}
