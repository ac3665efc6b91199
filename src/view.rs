use serde_json::{Map, Value};

use crate::expression::{Data, EvalError, Evaluator, Scope};

/// A template (a file path or inline markup) plus the data it is
/// rendered with. The data is what `$this` refers to in expressions.
pub trait View {
    fn path(&self) -> &str;

    fn data(&self) -> &Map<String, Value>;

    /// Evaluate `expr` with `$this` bound to the view's data and
    /// `locals` as the other variables.
    fn eval(&self, expr: &str, locals: &Data, evaluator: &dyn Evaluator)
            -> Result<Value, EvalError> {
        evaluator.eval(expr, &Scope::new(Some(self.data()), locals))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericView {
    path: String,
    data: Map<String, Value>,
}

impl GenericView {
    /// `path` ending in the template suffix (".html" by default) is
    /// loaded from the discovery locations, anything else is taken as
    /// markup.
    pub fn new(path: impl Into<String>) -> Self {
        GenericView { path: path.into(), data: Map::new() }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data.extend(data);
        self
    }
}

impl View for GenericView {
    fn path(&self) -> &str {
        &self.path
    }

    fn data(&self) -> &Map<String, Value> {
        &self.data
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ExpressionEvaluator;
    use serde_json::json;

    #[test]
    fn t_eval_this() {
        let view = GenericView::new("<p/>")
            .with("name", "World")
            .with("items", json!([1, 2]));
        assert_eq!(view.path(), "<p/>");
        let no_locals = Data::new();
        assert_eq!(view.eval("$this->name", &no_locals, &ExpressionEvaluator),
                   Ok(json!("World")));
        assert_eq!(view.eval("count($this->items)", &no_locals, &ExpressionEvaluator),
                   Ok(json!(2)));
        assert_eq!(view.eval("$name", &no_locals, &ExpressionEvaluator), Ok(Value::Null));

        let mut locals = Data::new();
        locals.insert("i".into(), json!(1));
        assert_eq!(view.eval("$this->items[$i]", &locals, &ExpressionEvaluator),
                   Ok(json!(2)));
    }
}
