//! `#{param}` substitution over configuration text.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("Parameter '{0}' is not defined. All pipelines using this parameter directly or via a template must define it.")]
    Undefined(String),
    #[error("Error when processing params. '#' must be followed by a parameter pattern or escaped by another '#'")]
    IllegalHash,
}

/// Substitutes `#{name}` patterns in `input` with values from `params`.
///
/// Runs of `#` collapse in pairs to literal hashes. An odd hash left over
/// substitutes when directly followed by `{name}` and is an error otherwise.
/// Parameter names are matched case-insensitively (`params` keys must be
/// lowercase) and substituted values are not scanned again.
pub fn substitute(input: &str, params: &BTreeMap<String, String>) -> Result<String, ParamError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '#' {
            output.push(c);
            continue;
        }
        let mut hashes = 1;
        while chars.peek() == Some(&'#') {
            chars.next();
            hashes += 1;
        }
        for _ in 0..hashes / 2 {
            output.push('#');
        }
        if hashes % 2 == 0 {
            continue;
        }
        // The unpaired hash must open a parameter reference.
        if chars.peek() != Some(&'{') {
            return Err(ParamError::IllegalHash);
        }
        chars.next();
        let mut name = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(c) => name.push(c),
                None => return Err(ParamError::IllegalHash),
            }
        }
        match params.get(&name.to_lowercase()) {
            Some(value) => output.push_str(value),
            None => return Err(ParamError::Undefined(name)),
        }
    }
    Ok(output)
}

#[cfg(test)]
mod test {
    use super::*;

    fn params() -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("foo".to_string(), "pavan".to_string());
        map.insert("bar".to_string(), "jj".to_string());
        map
    }

    #[test]
    fn replaces_a_reference_with_its_value() {
        assert_eq!(substitute("#{foo}", &params()).unwrap(), "pavan");
        assert_eq!(
            substitute("before #{foo} after", &params()).unwrap(),
            "before pavan after"
        );
    }

    #[test]
    fn replaces_several_references() {
        assert_eq!(substitute("#{foo}/#{bar}", &params()).unwrap(), "pavan/jj");
    }

    #[test]
    fn lookup_ignores_reference_case() {
        assert_eq!(substitute("#{FOO}", &params()).unwrap(), "pavan");
    }

    #[test]
    fn double_hash_escapes_the_pattern() {
        assert_eq!(substitute("##{foo}", &params()).unwrap(), "#{foo}");
    }

    #[test]
    fn odd_hashes_collapse_then_substitute() {
        assert_eq!(substitute("###{foo}", &params()).unwrap(), "#pavan");
        assert_eq!(substitute("#######{foo}", &params()).unwrap(), "###pavan");
    }

    #[test]
    fn even_hashes_collapse_and_leave_the_braces_alone() {
        assert_eq!(substitute("####{foo}", &params()).unwrap(), "##{foo}");
    }

    #[test]
    fn substituted_values_are_not_scanned_again() {
        let mut map = params();
        map.insert("nested".to_string(), "#{foo}".to_string());
        assert_eq!(substitute("#{nested}", &map).unwrap(), "#{foo}");
    }

    #[test]
    fn undefined_parameter_is_an_error() {
        assert_eq!(
            substitute("#{missing}", &params()).unwrap_err(),
            ParamError::Undefined("missing".to_string())
        );
        assert_eq!(
            substitute("#{missing}", &params()).unwrap_err().to_string(),
            "Parameter 'missing' is not defined. All pipelines using this parameter \
             directly or via a template must define it."
        );
    }

    #[test]
    fn stray_hash_is_an_error() {
        assert_eq!(substitute("#", &params()).unwrap_err(), ParamError::IllegalHash);
        assert_eq!(substitute("12#abc", &params()).unwrap_err(), ParamError::IllegalHash);
        assert_eq!(
            substitute("#{open", &params()).unwrap_err(),
            ParamError::IllegalHash
        );
        assert_eq!(
            substitute("#", &params()).unwrap_err().to_string(),
            "Error when processing params. '#' must be followed by a parameter pattern \
             or escaped by another '#'"
        );
    }

    #[test]
    fn text_without_hashes_passes_through() {
        assert_eq!(substitute("plain text", &params()).unwrap(), "plain text");
    }
}
