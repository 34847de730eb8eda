/*
 * Copyright 2025 Oxide Computer Company
 */

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::update::Update;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("unexpected data at {path}: {msg}")]
    Decode { path: String, msg: String },
    #[error("connection: {0}")]
    Connection(String),
}

/*
 * The read side of the device: just enough for the compiler to validate
 * references to objects it is not itself configuring.
 */
#[async_trait]
pub trait Oracle: Send + Sync {
    /*
     * Fetch the subtree at "path".  A missing node is reported as
     * ClientError::NotFound so that it can be told apart from a failure to
     * talk to the device at all.
     */
    async fn get(&self, path: &str) -> Result<Value, ClientError>;

    async fn exists(&self, path: &str) -> Result<bool, ClientError> {
        match self.get(path).await {
            Ok(_) => Ok(true),
            Err(ClientError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/*
 * Fetch a subtree and decode it into a typed value.
 */
pub async fn get_as<T: DeserializeOwned>(
    o: &dyn Oracle,
    path: &str,
) -> Result<T, ClientError> {
    let v = o.get(path).await?;
    serde_json::from_value(v).map_err(|e| ClientError::Decode {
        path: path.to_string(),
        msg: e.to_string(),
    })
}

#[async_trait]
pub trait Client: Oracle {
    /*
     * Apply the updates, in order, as a single transaction.  Either all of
     * them take effect or none do.
     */
    async fn apply(&self, updates: &[Update]) -> Result<(), ClientError>;
}

/*
 * The certificate management side channel.  This does not go through the
 * configuration tree at all.
 */
#[async_trait]
pub trait CertificateClient: Send + Sync {
    async fn load_certificate(
        &self,
        trust_anchor: &str,
        cert_pem: &[u8],
        key_pem: &[u8],
    ) -> Result<(), ClientError>;
}

#[cfg(test)]
pub mod test {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    /*
     * An oracle that knows about a fixed set of paths.  When "down" is set,
     * every query fails as if the device could not be reached.
     */
    #[derive(Default)]
    pub struct MockOracle {
        nodes: BTreeMap<String, Value>,
        down: bool,
        queries: Mutex<Vec<String>>,
    }

    impl MockOracle {
        pub fn new() -> MockOracle {
            Default::default()
        }

        pub fn with(paths: &[&str]) -> MockOracle {
            let mut o = MockOracle::new();
            for p in paths {
                o.insert(p, Value::Object(Default::default()));
            }
            o
        }

        pub fn down() -> MockOracle {
            MockOracle { down: true, ..Default::default() }
        }

        pub fn insert(&mut self, path: &str, v: Value) {
            self.nodes.insert(path.to_string(), v);
        }

        pub fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Oracle for MockOracle {
        async fn get(&self, path: &str) -> Result<Value, ClientError> {
            self.queries.lock().unwrap().push(path.to_string());

            if self.down {
                return Err(ClientError::Connection(
                    "device unreachable".into(),
                ));
            }

            self.nodes
                .get(path)
                .cloned()
                .ok_or_else(|| ClientError::NotFound(path.to_string()))
        }
    }

    #[tokio::test]
    async fn exists_distinguishes_missing_from_failure() {
        let o = MockOracle::with(&["System/a"]);
        assert_eq!(o.exists("System/a").await, Ok(true));
        assert_eq!(o.exists("System/b").await, Ok(false));

        let o = MockOracle::down();
        assert!(matches!(
            o.exists("System/a").await,
            Err(ClientError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn typed_get() {
        #[derive(serde::Deserialize)]
        struct Node {
            mtu: u16,
        }

        let mut o = MockOracle::new();
        o.insert("System/a", serde_json::json!({ "mtu": 9000 }));
        o.insert("System/b", serde_json::json!({ "mtu": "big" }));

        let n: Node = get_as(&o, "System/a").await.unwrap();
        assert_eq!(n.mtu, 9000);

        let r: Result<Node, _> = get_as(&o, "System/b").await;
        assert!(matches!(r, Err(ClientError::Decode { .. })));
    }
}
