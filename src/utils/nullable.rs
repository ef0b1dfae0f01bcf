use serde::{Deserialize, Deserializer};

/// For `Option<Option<T>>` fields with `#[serde(default)]`: a missing key stays
/// `None`, an explicit `null` becomes `Some(None)`.
pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "super::deserialize")]
        image_url: Option<Option<String>>,
    }

    #[test]
    fn test_missing_null_and_value_are_distinct() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.image_url, None);

        let cleared: Patch = serde_json::from_str(r#"{"image_url": null}"#).unwrap();
        assert_eq!(cleared.image_url, Some(None));

        let set: Patch = serde_json::from_str(r#"{"image_url": "https://example.com/a.png"}"#).unwrap();
        assert_eq!(set.image_url, Some(Some("https://example.com/a.png".to_string())));
    }
}
