use std::collections::BTreeMap;

/// Validation messages attached to the node that failed, keyed by field.
///
/// Serialized as a plain object; nodes skip the field entirely while it is
/// empty, so valid entities carry no `errors` key.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConfigErrors(BTreeMap<String, Vec<String>>);

impl ConfigErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn on(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All messages, in field order.
    pub fn flatten(&self) -> Vec<String> {
        self.0.values().flatten().cloned().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_errors_serialize_to_an_empty_object() {
        let errors = ConfigErrors::default();
        assert_eq!(serde_json::to_string(&errors).unwrap(), "{}");
        assert!(errors.is_empty());
    }

    #[test]
    fn messages_group_under_their_field() {
        let mut errors = ConfigErrors::default();
        errors.add("name", "first");
        errors.add("name", "second");
        errors.add("url", "third");
        assert_eq!(errors.on("name"), ["first", "second"]);
        assert_eq!(
            serde_json::to_string(&errors).unwrap(),
            r#"{"name":["first","second"],"url":["third"]}"#
        );
    }

    #[test]
    fn flatten_walks_fields_in_order() {
        let mut errors = ConfigErrors::default();
        errors.add("url", "b");
        errors.add("name", "a");
        assert_eq!(errors.flatten(), ["a", "b"]);
    }
}
