// ABOUTME: Provider-namespaced extra data attached to messages.
// ABOUTME: Each provider reads and writes only its own key in the bag.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::Message;

/// The open extra bag: namespace key to opaque JSON value.
pub type Extra = serde_json::Map<String, serde_json::Value>;

/// A typed view of one namespace inside [`Extra`].
pub trait ExtraNamespace: Serialize + DeserializeOwned + Default {
    /// Key under which this namespace is stored.
    const KEY: &'static str;
}

impl Message {
    /// Read the namespace `T`, if present.
    pub fn extra_ns<T: ExtraNamespace>(&self) -> Result<Option<T>, serde_json::Error> {
        match self.extra.as_ref().and_then(|e| e.get(T::KEY)) {
            Some(value) => serde_json::from_value(value.clone()).map(Some),
            None => Ok(None),
        }
    }

    /// Modify the namespace `T`, creating the bag and the namespace on first write.
    ///
    /// Keys other than `T::KEY` are left untouched.
    pub fn update_extra_ns<T, F>(&mut self, f: F) -> Result<(), serde_json::Error>
    where
        T: ExtraNamespace,
        F: FnOnce(&mut T),
    {
        let mut ns: T = self.extra_ns()?.unwrap_or_default();
        f(&mut ns);
        let value = serde_json::to_value(ns)?;
        self.extra
            .get_or_insert_with(Extra::new)
            .insert(T::KEY.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Notes {
        #[serde(default)]
        items: Vec<String>,
    }

    impl ExtraNamespace for Notes {
        const KEY: &'static str = "notes";
    }

    #[test]
    fn test_read_missing_namespace() {
        let msg = Message::assistant("hi");
        assert_eq!(msg.extra_ns::<Notes>().unwrap(), None);
    }

    #[test]
    fn test_update_initializes_lazily() {
        let mut msg = Message::assistant("hi");
        msg.update_extra_ns::<Notes, _>(|n| n.items.push("a".into()))
            .unwrap();
        msg.update_extra_ns::<Notes, _>(|n| n.items.push("b".into()))
            .unwrap();

        let notes = msg.extra_ns::<Notes>().unwrap().unwrap();
        assert_eq!(notes.items, vec!["a", "b"]);
    }

    #[test]
    fn test_update_preserves_other_namespaces() {
        let mut msg = Message::assistant("hi");
        let mut extra = Extra::new();
        extra.insert("other".into(), serde_json::json!({"keep": true}));
        msg.extra = Some(extra);

        msg.update_extra_ns::<Notes, _>(|n| n.items.push("x".into()))
            .unwrap();

        let extra = msg.extra.as_ref().unwrap();
        assert_eq!(extra["other"], serde_json::json!({"keep": true}));
        assert_eq!(extra["notes"], serde_json::json!({"items": ["x"]}));
    }
}
