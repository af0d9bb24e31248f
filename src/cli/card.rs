use std::error::Error;
use std::io::Read;

use crate::cards::render::{CardRenderer, HostConfig, TextRenderer};
use crate::cards::{extract, TemplateStore, VariableMap};

/// Parses `key=value` arguments. Values may contain `=`; keys may not be empty.
pub fn parse_variables<S: AsRef<str>>(pairs: &[S]) -> Result<VariableMap, String> {
    let mut variables = VariableMap::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let Some((key, value)) = pair.split_once('=') else {
            return Err(format!("Expected key=value, got '{pair}'"));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Missing variable name in '{pair}'"));
        }
        variables.insert(key.to_string(), value.to_string());
    }
    Ok(variables)
}

pub fn list_templates() {
    let store = TemplateStore::builtin();
    println!("Built-in card templates:");
    for name in store.names() {
        let placeholders = store
            .lookup(name)
            .map(|template| template.placeholders())
            .unwrap_or_default();
        if placeholders.is_empty() {
            println!("  {name}");
        } else {
            println!("  {name} ({})", placeholders.join(", "));
        }
    }
}

pub fn print_template<S: AsRef<str>>(name: &str, pairs: &[S]) -> Result<(), Box<dyn Error>> {
    let variables = parse_variables(pairs)?;
    let card = TemplateStore::builtin()
        .resolve(name, &variables)
        .ok_or_else(|| format!("Unknown card template: {name}"))?;
    println!("{}", card.to_pretty_json());
    Ok(())
}

/// Prints the card found in stdin as JSON followed by its outline. Returns
/// `false` when the input carries no card.
pub fn extract_from_stdin() -> Result<bool, Box<dyn Error>> {
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;

    let Some(card) = extract(&text) else {
        eprintln!("No card found in input");
        return Ok(false);
    };
    println!("{}", card.to_pretty_json());
    println!();
    println!("{}", TextRenderer.render(&card, &HostConfig::default()).text());
    Ok(true)
}
