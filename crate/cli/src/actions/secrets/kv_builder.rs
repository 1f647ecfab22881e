//! Builds the data map of a secret from command line arguments.
//!
//! Accepted arguments:
//! - `key=value`, where the value follows the input argument conventions
//!   (`@file`, `-` for stdin, `\@` for a literal `@`);
//! - `-`, a JSON object read from stdin;
//! - a single JSON object given inline.

use serde_json::{Map, Value};

use crate::{
    actions::args::{Input, MAX_INPUT_SIZE},
    cli_bail, cli_ensure,
    error::result::{KmsCliResult, KmsCliResultHelper},
};

fn parse_object(bytes: &[u8]) -> KmsCliResult<Map<String, Value>> {
    match serde_json::from_slice(bytes).context("Invalid JSON data")? {
        Value::Object(map) => Ok(map),
        other => cli_bail!("JSON data must be an object, not {other}"),
    }
}

/// Build the secret data from `args`, failing on the first invalid one
pub fn parse_args_data(args: &[String]) -> KmsCliResult<Map<String, Value>> {
    build(args).context("Failed to parse K=V data")
}

fn build(args: &[String]) -> KmsCliResult<Map<String, Value>> {
    if let [single] = args {
        if single.trim_start().starts_with('{') {
            return parse_object(single.as_bytes());
        }
    }
    let mut data = Map::new();
    for arg in args {
        if arg == "-" {
            let stdin = Input::Stdin.read_all_max(MAX_INPUT_SIZE)?;
            data.extend(parse_object(&stdin)?);
            continue;
        }
        let Some((key, value)) = arg.split_once('=') else {
            cli_bail!("format must be key=value, got {arg:?}");
        };
        cli_ensure!(!key.is_empty(), "empty key in {arg:?}");
        let value = match value.parse::<Input>() {
            Ok(Input::Literal(text)) => text,
            Ok(input) => input.read_string_max(MAX_INPUT_SIZE)?,
            Err(never) => match never {},
        };
        insert(&mut data, key, Value::String(value));
    }
    Ok(data)
}

/// Insert `value` at `key`. A repeated key collects its values in a list
fn insert(data: &mut Map<String, Value>, key: &str, value: Value) {
    match data.get_mut(key) {
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            data.insert(key.to_owned(), value);
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_args_data;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[test]
    fn test_key_values() {
        let data = parse_args_data(&args(&["user=admin", "password=p=ss", "mail=\\@home"])).unwrap();
        assert_eq!(
            serde_json::Value::Object(data),
            json!({"user": "admin", "password": "p=ss", "mail": "@home"})
        );
    }

    #[test]
    fn test_value_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.txt");
        std::fs::write(&path, "s3cr3t").unwrap();
        let arg = format!("token=@{}", path.display());
        let data = parse_args_data(&[arg]).unwrap();
        assert_eq!(data["token"], "s3cr3t");
    }

    #[test]
    fn test_inline_json() {
        let data = parse_args_data(&args(&[r#"{"a": 1, "b": {"c": true}}"#])).unwrap();
        assert_eq!(data["a"], 1);
        assert_eq!(data["b"]["c"], true);
    }

    #[test]
    fn test_repeated_key_becomes_list() {
        let data = parse_args_data(&args(&["a=1", "b=x", "a=2", "a=3"])).unwrap();
        assert_eq!(
            serde_json::Value::Object(data),
            json!({"a": ["1", "2", "3"], "b": "x"})
        );
    }

    #[test]
    fn test_invalid_args() {
        let err = parse_args_data(&args(&["novalue"])).unwrap_err();
        assert!(
            err.to_string()
                .starts_with("Failed to parse K=V data: format must be key=value"),
            "{err}"
        );
        assert!(parse_args_data(&args(&["[1, 2]"])).is_err());
        assert!(parse_args_data(&args(&["=value"])).is_err());
    }
}
