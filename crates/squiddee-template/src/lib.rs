//! Text templates for generated files
//!
//! Templates use `{{ name }}` placeholders that are substituted from a flat
//! [`TemplateVars`] map. Two templates ship with squiddee: the proxy
//! configuration ([`SQUID_CONF`]) and the CA install script
//! ([`CACERT_INSTALL`]).

use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

/// Name of the built-in proxy configuration template
pub const SQUID_CONF: &str = "squid.conf";

/// Name of the built-in CA install script template
pub const CACERT_INSTALL: &str = "cacert.sh";

const SQUID_CONF_SOURCE: &str = include_str!("../templates/squid.conf");
const CACERT_INSTALL_SOURCE: &str = include_str!("../templates/cacert.sh");

/// Template errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Template {template} references undefined variable `{name}`")]
    MissingVariable { template: String, name: String },

    #[error("Template {template} has an unterminated placeholder at byte {offset}")]
    Unterminated { template: String, offset: usize },
}

/// Flat key/value map consumed by templates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    values: BTreeMap<String, String>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        self.values.insert(name.into(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Renders a named template with a set of variables
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, vars: &TemplateVars) -> Result<String, TemplateError>;
}

/// Registry of named templates
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    templates: HashMap<String, String>,
}

impl TemplateEngine {
    /// An engine with no templates registered
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// An engine holding the built-in templates
    pub fn new() -> Self {
        Self::empty()
            .with_template(SQUID_CONF, SQUID_CONF_SOURCE)
            .with_template(CACERT_INSTALL, CACERT_INSTALL_SOURCE)
    }

    /// Register (or replace) a template
    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.insert(name.into(), source.into());
        self
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer for TemplateEngine {
    fn render(&self, template: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
        let source = self
            .templates
            .get(template)
            .ok_or_else(|| TemplateError::UnknownTemplate(template.to_string()))?;

        debug!("Rendering template {}", template);
        substitute(template, source, vars)
    }
}

fn substitute(template: &str, source: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    let mut consumed = 0;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);

        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or_else(|| TemplateError::Unterminated {
                template: template.to_string(),
                offset: consumed + start,
            })?;

        let name = after_open[..end].trim();
        let value = vars
            .get(name)
            .ok_or_else(|| TemplateError::MissingVariable {
                template: template.to_string(),
                name: name.to_string(),
            })?;
        out.push_str(value);

        let advance = start + 2 + end + 2;
        consumed += advance;
        rest = &rest[advance..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_placeholders() {
        let engine = TemplateEngine::empty().with_template("t", "hello {{ name }}, {{name}}!");
        let vars = TemplateVars::new().with("name", "squid");

        let rendered = engine.render("t", &vars).unwrap();

        assert_eq!(rendered, "hello squid, squid!");
    }

    #[test]
    fn test_text_without_placeholders_is_untouched() {
        let engine = TemplateEngine::empty().with_template("plain", "echo ${HOME} {not a var}");

        let rendered = engine.render("plain", &TemplateVars::new()).unwrap();

        assert_eq!(rendered, "echo ${HOME} {not a var}");
    }

    #[test]
    fn test_missing_variable() {
        let engine = TemplateEngine::empty().with_template("t", "port {{ port }}");

        let err = engine.render("t", &TemplateVars::new()).unwrap_err();

        assert_eq!(
            err,
            TemplateError::MissingVariable {
                template: "t".to_string(),
                name: "port".to_string(),
            }
        );
    }

    #[test]
    fn test_unterminated_placeholder() {
        let engine = TemplateEngine::empty().with_template("t", "ok {{ a }} then {{ broken");
        let vars = TemplateVars::new().with("a", 1);

        let err = engine.render("t", &vars).unwrap_err();

        assert_eq!(
            err,
            TemplateError::Unterminated {
                template: "t".to_string(),
                offset: 16,
            }
        );
    }

    #[test]
    fn test_unknown_template() {
        let engine = TemplateEngine::empty();
        let err = engine.render("missing", &TemplateVars::new()).unwrap_err();
        assert_eq!(err, TemplateError::UnknownTemplate("missing".to_string()));
    }

    #[test]
    fn test_builtin_templates_registered() {
        let engine = TemplateEngine::new();
        assert!(engine.has_template(SQUID_CONF));
        assert!(engine.has_template(CACERT_INSTALL));
    }

    #[test]
    fn test_builtin_install_script_embeds_certificate() {
        let engine = TemplateEngine::new();
        let pem = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";
        let vars = TemplateVars::new().with("ca_cert", pem);

        let script = engine.render(CACERT_INSTALL, &vars).unwrap();

        assert!(script.starts_with("#!/bin/sh"));
        assert!(script.contains(pem));
        assert!(!script.contains("{{"));
    }
}
