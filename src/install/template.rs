//! `{name}` / `${name}` placeholder substitution for catalog command
//! templates.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\$?\{([a-z_][a-z0-9_]*)\}").expect("placeholder pattern is valid");
}

pub type TemplateVars = BTreeMap<String, String>;

/// Replace known placeholders. Unknown ones are left untouched so shell
/// syntax such as `${HOME}` or `{print $1}` survives.
pub fn render(template: &str, vars: &TemplateVars) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
