use crate::vars::VarMap;
use anyhow::{Context, Result};
use minijinja::Environment;
use once_cell::sync::Lazy;
use regex::Regex;

static TEMPLATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\{\{.+?}}|\{%.+?%})").unwrap());

/// Thin wrapper around the template engine. Expands variable references in
/// task arguments, handler names and vars_files paths, and evaluates
/// `only_if` conditionals.
pub struct Templar {
    env: Environment<'static>,
}

impl Default for Templar {
    fn default() -> Self {
        Self::new()
    }
}

impl Templar {
    pub fn new() -> Self {
        Templar {
            env: Environment::new(),
        }
    }

    pub fn is_template(&self, text: &str) -> bool {
        TEMPLATE_REGEX.is_match(text)
    }

    /// Expands a template string against the given variables. Plain text
    /// passes through untouched; undefined variables render as empty.
    pub fn render(&self, text: &str, vars: &VarMap) -> Result<String> {
        if !self.is_template(text) {
            return Ok(text.to_string());
        }

        let ctx = minijinja::Value::from_serialize(vars);
        self.env
            .render_str(text, ctx)
            .with_context(|| format!("failed to expand template ({text})"))
    }

    /// Evaluates a conditional expression to a boolean using template
    /// truthiness rules; undefined variables are falsy.
    pub fn evaluate(&self, expr: &str, vars: &VarMap) -> Result<bool> {
        let compiled = self
            .env
            .compile_expression(expr)
            .with_context(|| format!("failed to compile conditional ({expr})"))?;
        let ctx = minijinja::Value::from_serialize(vars);
        let value = compiled
            .eval(ctx)
            .with_context(|| format!("failed to evaluate conditional ({expr})"))?;
        Ok(value.is_true())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::variable::Variable;

    fn vars() -> VarMap {
        let mut vars = VarMap::new();
        vars.insert("name".to_string(), Variable::String("web1".to_string()));
        vars.insert("port".to_string(), Variable::Int(80));
        vars
    }

    #[test]
    fn plain_text_is_untouched() {
        let templar = Templar::new();
        assert_eq!(
            templar.render("restart apache", &VarMap::new()).unwrap(),
            "restart apache"
        );
    }

    #[test]
    fn variables_are_expanded() {
        let templar = Templar::new();
        assert_eq!(
            templar.render("host {{ name }}:{{ port }}", &vars()).unwrap(),
            "host web1:80"
        );
    }

    #[test]
    fn undefined_variables_render_empty() {
        let templar = Templar::new();
        assert_eq!(templar.render("{{ missing }}.yml", &vars()).unwrap(), ".yml");
    }

    #[test]
    fn conditionals_follow_truthiness() {
        let templar = Templar::new();
        assert!(templar.evaluate("port == 80", &vars()).unwrap());
        assert!(!templar.evaluate("port == 81", &vars()).unwrap());
        assert!(!templar.evaluate("missing", &vars()).unwrap());
        assert!(templar.evaluate("name", &vars()).unwrap());
    }

    #[test]
    fn is_template_detection() {
        let templar = Templar::new();
        assert!(templar.is_template("{{ name }}"));
        assert!(templar.is_template("{% if x %}y{% endif %}"));
        assert!(!templar.is_template("no braces here"));
    }
}
