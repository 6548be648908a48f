use serde::{Deserialize, Serialize};

/// A config value that may be absent, explicitly null, a single item, or a list.
#[derive(Default, Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum NoneOrSome<T> {
    #[serde(skip_deserializing)]
    #[default]
    Unspecified,
    None,
    One(T),
    Some(Vec<T>),
}

impl<T> NoneOrSome<T> {
    pub fn is_unspecified(&self) -> bool {
        matches!(self, NoneOrSome::Unspecified)
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            NoneOrSome::Unspecified | NoneOrSome::None => vec![],
            NoneOrSome::One(item) => vec![item],
            NoneOrSome::Some(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default)]
        value: NoneOrSome<String>,
    }

    #[test]
    fn test_none_or_some_forms() {
        let missing: Holder = serde_yaml::from_str("{}").unwrap();
        assert!(missing.value.is_unspecified());

        let null: Holder = serde_yaml::from_str("value: null").unwrap();
        assert!(!null.value.is_unspecified());
        assert!(null.value.into_vec().is_empty());

        let one: Holder = serde_yaml::from_str("value: h2").unwrap();
        assert_eq!(one.value.into_vec(), vec!["h2".to_string()]);

        let some: Holder = serde_yaml::from_str("value: [h2, http/1.1]").unwrap();
        assert_eq!(
            some.value.into_vec(),
            vec!["h2".to_string(), "http/1.1".to_string()]
        );
    }
}
