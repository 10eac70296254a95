use ahash::AHashMap as HashMap;
use ngress_controller_k8s_api::{ResourceId, Secret, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// The desired contents of the certificate directory, keyed by file path.
pub type Certs = BTreeMap<PathBuf, Vec<u8>>;

/// Holds TLS material by secret identity.
///
/// Each rebuild clears all write marks, marks the secrets that rendered hosts
/// actually use, and then collects only the marked secrets. Secrets that are
/// no longer referenced are thereby dropped from the certificate directory
/// while remaining in the store.
#[derive(Debug, Default)]
pub struct Secrets {
    by_id: HashMap<ResourceId, Entry>,
}

#[derive(Debug)]
struct Entry {
    secret: Secret,
    marked: bool,
}

/// On-disk locations of a secret's certificate and key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

// === impl Secrets ===

impl Secrets {
    /// Stores `secret`, replacing any secret with the same identity.
    pub fn add(&mut self, secret: Secret) {
        let id = ResourceId::of(&secret);
        tracing::info!(secret = %id, data = %summary(&secret), "Added secret");
        self.by_id.insert(
            id,
            Entry {
                secret,
                marked: false,
            },
        );
    }

    pub fn remove(&mut self, id: &ResourceId) {
        if let Some(Entry { secret, .. }) = self.by_id.remove(id) {
            tracing::info!(secret = %id, data = %summary(&secret), "Removed secret");
        }
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Secret> {
        self.by_id.get(id).map(|e| &e.secret)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn reset_marks(&mut self) {
        for entry in self.by_id.values_mut() {
            entry.marked = false;
        }
    }

    /// Marks a secret for export in the current rebuild. Returns false if the
    /// secret is unknown.
    pub fn mark_for_write(&mut self, id: &ResourceId) -> bool {
        match self.by_id.get_mut(id) {
            Some(entry) => {
                entry.marked = true;
                true
            }
            None => false,
        }
    }

    pub fn is_marked(&self, id: &ResourceId) -> bool {
        self.by_id.get(id).is_some_and(|e| e.marked)
    }

    /// Returns the paths at which the secret's certificate and key will be
    /// written, if the secret exists and holds both.
    pub fn tls_paths(&self, id: &ResourceId, certs_dir: &Path) -> Option<TlsPaths> {
        let secret = self.get(id)?;
        let data = secret.data.as_ref();
        let has = |key: &str| data.is_some_and(|d| d.contains_key(key));
        for key in [TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY] {
            if !has(key) {
                tracing::error!(secret = %id, %key, "Secret is missing TLS material");
                return None;
            }
        }
        Some(TlsPaths {
            cert: material_path(certs_dir, id, TLS_CERT_KEY),
            key: material_path(certs_dir, id, TLS_PRIVATE_KEY_KEY),
        })
    }

    /// Returns the complete set of certificate files that must exist after
    /// this rebuild.
    pub fn collect_marked(&self, certs_dir: &Path) -> Certs {
        self.by_id
            .iter()
            .filter(|(_, e)| e.marked)
            .flat_map(|(id, e)| {
                e.secret
                    .data
                    .iter()
                    .flatten()
                    .map(move |(key, data)| (material_path(certs_dir, id, key), data.0.clone()))
            })
            .collect()
    }
}

/// `<certs_dir>/<namespace>/<name>/<key>`
pub fn material_path(certs_dir: &Path, id: &ResourceId, key: &str) -> PathBuf {
    certs_dir.join(&id.namespace).join(&id.name).join(key)
}

/// Describes a secret's material without exposing it.
fn summary(secret: &Secret) -> String {
    secret
        .data
        .iter()
        .flatten()
        .map(|(key, data)| format!("{key}:{}", data.0.len()))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mk_secret;

    #[test]
    fn add_overwrites() {
        let mut secrets = Secrets::default();
        secrets.add(mk_secret("ns-0", "sec-0", b"cert-a", b"key-a"));
        secrets.add(mk_secret("ns-0", "sec-0", b"cert-b", b"key-b"));
        assert_eq!(secrets.len(), 1);

        let id = ResourceId::new("ns-0", "sec-0");
        let data = secrets.get(&id).unwrap().data.as_ref().unwrap();
        assert_eq!(data[TLS_CERT_KEY].0, b"cert-b");

        secrets.remove(&id);
        assert!(secrets.is_empty());
        // Removing an absent secret is a no-op.
        secrets.remove(&id);
    }

    #[test]
    fn collects_only_marked() {
        let mut secrets = Secrets::default();
        secrets.add(mk_secret("ns-0", "used", b"cert-0", b"key-0"));
        secrets.add(mk_secret("ns-0", "unused", b"cert-1", b"key-1"));
        let used = ResourceId::new("ns-0", "used");
        let certs_dir = Path::new("/certs");

        secrets.reset_marks();
        assert!(secrets.mark_for_write(&used));
        assert!(!secrets.mark_for_write(&ResourceId::new("ns-0", "missing")));

        let certs = secrets.collect_marked(certs_dir);
        assert_eq!(
            certs,
            maplit::btreemap! {
                PathBuf::from("/certs/ns-0/used/tls.crt") => b"cert-0".to_vec(),
                PathBuf::from("/certs/ns-0/used/tls.key") => b"key-0".to_vec(),
            }
        );

        // Marks don't survive a reset.
        secrets.reset_marks();
        assert!(!secrets.is_marked(&used));
        assert!(secrets.collect_marked(certs_dir).is_empty());
    }

    #[test]
    fn tls_paths_require_cert_and_key() {
        let mut secrets = Secrets::default();
        let mut partial = mk_secret("ns-0", "partial", b"cert", b"key");
        partial
            .data
            .as_mut()
            .unwrap()
            .remove(TLS_PRIVATE_KEY_KEY);
        secrets.add(partial);
        secrets.add(mk_secret("ns-0", "full", b"cert", b"key"));

        let dir = Path::new("/certs");
        assert_eq!(
            secrets.tls_paths(&ResourceId::new("ns-0", "partial"), dir),
            None
        );
        assert_eq!(secrets.tls_paths(&ResourceId::new("ns-0", "nope"), dir), None);
        assert_eq!(
            secrets.tls_paths(&ResourceId::new("ns-0", "full"), dir),
            Some(TlsPaths {
                cert: "/certs/ns-0/full/tls.crt".into(),
                key: "/certs/ns-0/full/tls.key".into(),
            })
        );
    }
}
