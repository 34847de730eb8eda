/*
 * Copyright 2025 Oxide Computer Company
 */

/*
 * A device configuration tree held in memory as JSON.  Paths address nodes
 * with a sequence of "/"-separated segments, where a segment is either a
 * container name or a list name with one or more keys, e.g.
 * "PhysIf-list[id=eth1/1]".  Lists are stored as JSON arrays of objects and
 * an entry is found by comparing its key fields.
 */

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::{CertificateClient, Client, ClientError, Oracle};
use crate::path;
use crate::trustpoint::CertificateMaterial;
use crate::update::Update;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCertificate {
    pub cert_pem: String,
    pub key_pem: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    config: Value,
    #[serde(default)]
    certificates: BTreeMap<String, StoredCertificate>,
}

#[derive(Debug, Clone, PartialEq)]
struct Segment {
    name: String,
    keys: Vec<(String, String)>,
}

impl Segment {
    fn parse(s: &str) -> Result<Segment, ClientError> {
        let malformed = || ClientError::Rejected(format!("bad segment {s:?}"));

        let Some(open) = s.find('[') else {
            if s.is_empty() || s.contains(']') {
                return Err(malformed());
            }
            return Ok(Segment { name: s.to_string(), keys: Vec::new() });
        };

        let name = &s[..open];
        if name.is_empty() {
            return Err(malformed());
        }

        let mut keys = Vec::new();
        let mut rest = &s[open..];
        while !rest.is_empty() {
            let Some(inner) = rest.strip_prefix('[') else {
                return Err(malformed());
            };
            let Some(close) = inner.find(']') else {
                return Err(malformed());
            };
            let Some((k, v)) = inner[..close].split_once('=') else {
                return Err(malformed());
            };
            let v = v
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .unwrap_or(v);
            if k.is_empty() {
                return Err(malformed());
            }
            keys.push((k.to_string(), v.to_string()));
            rest = &inner[close + 1..];
        }

        Ok(Segment { name: name.to_string(), keys })
    }

    fn is_list(&self) -> bool {
        !self.keys.is_empty()
    }

    fn matches(&self, entry: &Value) -> bool {
        self.keys.iter().all(|(k, want)| match entry.get(k) {
            Some(Value::String(s)) => s == want,
            Some(v @ (Value::Number(_) | Value::Bool(_))) => {
                v.to_string() == *want
            }
            _ => false,
        })
    }

    /*
     * List entries always carry their own keys, whatever the value written
     * to them says.
     */
    fn insert_keys(&self, entry: &mut Value) -> Result<(), ClientError> {
        if !self.is_list() {
            return Ok(());
        }
        let Value::Object(m) = entry else {
            return Err(ClientError::Rejected(format!(
                "list entry {} must be an object",
                self.name
            )));
        };
        for (k, v) in &self.keys {
            m.entry(k.clone()).or_insert_with(|| Value::String(v.clone()));
        }
        Ok(())
    }
}

/*
 * Split a path at each "/" that is not inside a list key.
 */
fn parse_path(p: &str) -> Result<Vec<Segment>, ClientError> {
    let p = p.trim_start_matches('/');
    if p.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in p.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    ClientError::Rejected(format!("unbalanced path {p:?}"))
                })?;
            }
            '/' if depth == 0 => {
                out.push(Segment::parse(&p[start..i])?);
                start = i + 1;
            }
            _ => (),
        }
    }
    if depth != 0 {
        return Err(ClientError::Rejected(format!("unbalanced path {p:?}")));
    }
    out.push(Segment::parse(&p[start..])?);

    Ok(out)
}

fn child<'a>(v: &'a Value, s: &Segment) -> Option<&'a Value> {
    let c = v.as_object()?.get(&s.name)?;
    if !s.is_list() {
        return Some(c);
    }
    c.as_array()?.iter().find(|e| s.matches(e))
}

fn child_mut<'a>(v: &'a mut Value, s: &Segment) -> Option<&'a mut Value> {
    let c = v.as_object_mut()?.get_mut(&s.name)?;
    if !s.is_list() {
        return Some(c);
    }
    c.as_array_mut()?.iter_mut().find(|e| s.matches(e))
}

/*
 * Like child_mut(), but create the node (and the list holding it) if it is
 * not there yet.
 */
fn child_create<'a>(
    v: &'a mut Value,
    s: &Segment,
) -> Result<&'a mut Value, ClientError> {
    if v.is_null() {
        *v = Value::Object(Map::new());
    }
    let Value::Object(m) = v else {
        return Err(ClientError::Rejected(format!(
            "cannot create {} inside a leaf",
            s.name
        )));
    };

    let c = m.entry(s.name.clone()).or_insert_with(|| {
        if s.is_list() {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        }
    });
    if !s.is_list() {
        return Ok(c);
    }

    let Value::Array(list) = c else {
        return Err(ClientError::Rejected(format!("{} is not a list", s.name)));
    };
    let i = match list.iter().position(|e| s.matches(e)) {
        Some(i) => i,
        None => {
            let mut e = Value::Object(Map::new());
            s.insert_keys(&mut e)?;
            list.push(e);
            list.len() - 1
        }
    };
    Ok(&mut list[i])
}

fn lookup<'a>(root: &'a Value, segs: &[Segment]) -> Option<&'a Value> {
    segs.iter().try_fold(root, child)
}

fn create<'a>(
    root: &'a mut Value,
    segs: &[Segment],
) -> Result<&'a mut Value, ClientError> {
    let mut cur = root;
    for s in segs {
        cur = child_create(cur, s)?;
    }
    Ok(cur)
}

fn merge(dst: &mut Value, src: &Value) {
    match (dst, src) {
        (Value::Object(d), Value::Object(s)) => {
            for (k, v) in s {
                merge(d.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
        (d, s) => *d = s.clone(),
    }
}

fn remove(root: &mut Value, path: &str) -> Result<(), ClientError> {
    let segs = parse_path(path)?;
    let notfound = || ClientError::NotFound(path.to_string());

    let Some((last, parents)) = segs.split_last() else {
        return Err(ClientError::Rejected("cannot delete the root".into()));
    };
    let mut cur = root;
    for s in parents {
        cur = child_mut(cur, s).ok_or_else(notfound)?;
    }
    let m = cur.as_object_mut().ok_or_else(notfound)?;

    if !last.is_list() {
        return m.remove(&last.name).map(|_| ()).ok_or_else(notfound);
    }

    let list = m
        .get_mut(&last.name)
        .and_then(Value::as_array_mut)
        .ok_or_else(notfound)?;
    let i = list.iter().position(|e| last.matches(e)).ok_or_else(notfound)?;
    list.remove(i);
    if list.is_empty() {
        m.remove(&last.name);
    }
    Ok(())
}

fn apply_one(root: &mut Value, u: &Update) -> Result<(), ClientError> {
    match u {
        Update::Replace { path, value } => {
            let segs = parse_path(path)?;
            let node = create(root, &segs)?;
            *node = value.clone();
            if let Some(last) = segs.last() {
                last.insert_keys(node)?;
            }
            Ok(())
        }
        Update::Merge { path, value } => {
            let segs = parse_path(path)?;
            let node = create(root, &segs)?;
            merge(node, value);
            if let Some(last) = segs.last() {
                last.insert_keys(node)?;
            }
            Ok(())
        }
        Update::Delete { path } => remove(root, path),
    }
}

#[derive(Debug, Default)]
pub struct DeviceTree {
    inner: Mutex<Snapshot>,
}

impl DeviceTree {
    pub fn new() -> DeviceTree {
        Default::default()
    }

    pub fn from_value(config: Value) -> DeviceTree {
        DeviceTree {
            inner: Mutex::new(Snapshot { config, ..Default::default() }),
        }
    }

    pub fn load<P: AsRef<Path>>(p: P) -> anyhow::Result<DeviceTree> {
        let p = p.as_ref();
        let f = std::fs::read_to_string(p)
            .map_err(|e| anyhow!("reading {p:?}: {e}"))?;
        let s: Snapshot = serde_json::from_str(&f)
            .with_context(|| format!("parsing snapshot {p:?}"))?;
        Ok(DeviceTree { inner: Mutex::new(s) })
    }

    pub fn save<P: AsRef<Path>>(&self, p: P) -> anyhow::Result<()> {
        let p = p.as_ref();
        let out = serde_json::to_string_pretty(&*self.lock()?)?;
        std::fs::write(p, format!("{out}\n"))
            .map_err(|e| anyhow!("writing {p:?}: {e}"))?;
        Ok(())
    }

    /*
     * A copy of the whole configuration tree.
     */
    pub fn config(&self) -> Value {
        self.lock().map(|s| s.config.clone()).unwrap_or(Value::Null)
    }

    pub fn certificate(
        &self,
        trust_anchor: &str,
    ) -> Option<StoredCertificate> {
        self.lock().ok()?.certificates.get(trust_anchor).cloned()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Snapshot>, ClientError> {
        self.inner
            .lock()
            .map_err(|_| ClientError::Connection("device tree poisoned".into()))
    }
}

#[async_trait]
impl Oracle for DeviceTree {
    async fn get(&self, path: &str) -> Result<Value, ClientError> {
        let segs = parse_path(path)?;
        let s = self.lock()?;
        lookup(&s.config, &segs)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(path.to_string()))
    }
}

#[async_trait]
impl Client for DeviceTree {
    async fn apply(&self, updates: &[Update]) -> Result<(), ClientError> {
        let mut s = self.lock()?;

        let mut work = s.config.clone();
        for u in updates {
            trace!("apply {u}");
            apply_one(&mut work, u)?;
        }

        s.config = work;
        debug!("committed {} updates", updates.len());
        Ok(())
    }
}

#[async_trait]
impl CertificateClient for DeviceTree {
    async fn load_certificate(
        &self,
        trust_anchor: &str,
        cert_pem: &[u8],
        key_pem: &[u8],
    ) -> Result<(), ClientError> {
        CertificateMaterial::from_pem(cert_pem, key_pem)
            .map_err(|e| ClientError::Rejected(e.to_string()))?;

        let tp = path::trust_point(trust_anchor);
        let segs = parse_path(&tp)?;
        let mut s = self.lock()?;
        if lookup(&s.config, &segs).is_none() {
            return Err(ClientError::NotFound(tp));
        }

        s.certificates.insert(
            trust_anchor.to_string(),
            StoredCertificate {
                cert_pem: String::from_utf8_lossy(cert_pem).into_owned(),
                key_pem: String::from_utf8_lossy(key_pem).into_owned(),
            },
        );
        Ok(())
    }
}
