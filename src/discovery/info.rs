//! Structured view of the JSON blob a CRI runtime returns under the `info`
//! key of a verbose container status.
//!
//! Only the fields the scanner reads are modelled; everything else in the
//! blob is ignored by serde.
use std::collections::BTreeMap;

/// Key of the verbose status `info` map holding the JSON encoded record.
pub const INFO_KEY: &str = "info";

#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    pub config: Option<ContainerConfig>,
    pub runtime_spec: Option<RuntimeSpec>,
}

#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
pub struct ContainerConfig {
    #[serde(default)]
    pub envs: Vec<KeyValue>,
}

#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
pub struct KeyValue {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// The OCI runtime specification the container was started with.
#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
pub struct RuntimeSpec {
    pub process: Option<Process>,
    pub linux: Option<Linux>,
}

#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
pub struct Process {
    /// `KEY=VALUE` pairs.
    pub env: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Linux {
    pub resources: Option<LinuxResources>,
    #[serde(default)]
    pub cgroups_path: Option<String>,
}

/// Only the presence of the section matters; its limits are not read.
#[derive(Debug, Default, Clone, PartialEq, serde::Deserialize)]
pub struct LinuxResources {}

impl ContainerInfo {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn linux(&self) -> Option<&Linux> {
        self.runtime_spec.as_ref()?.linux.as_ref()
    }

    pub fn linux_resources(&self) -> Option<&LinuxResources> {
        self.linux()?.resources.as_ref()
    }

    /// cgroup path from the runtime spec, `None` when absent or blank.
    pub fn cgroups_path(&self) -> Option<&str> {
        self.linux()
            .and_then(|linux| linux.cgroups_path.as_deref())
            .map(str::trim)
            .filter(|path| !path.is_empty())
    }

    /// Environment of the container process.
    ///
    /// The runtime spec's process environment wins; the declared container
    /// config is used only when the spec carries none. Returns `None` when
    /// neither source has any variables.
    pub fn environment(&self) -> Option<BTreeMap<String, String>> {
        let from_spec = self
            .runtime_spec
            .as_ref()
            .and_then(|spec| spec.process.as_ref())
            .and_then(|process| process.env.as_ref())
            .filter(|env| !env.is_empty())
            .map(|env| {
                env.iter()
                    .map(|entry| match entry.split_once('=') {
                        Some((key, value)) => (key.to_owned(), value.to_owned()),
                        None => (entry.clone(), String::new()),
                    })
                    .collect::<BTreeMap<_, _>>()
            });
        if from_spec.is_some() {
            return from_spec;
        }

        self.config
            .as_ref()
            .filter(|config| !config.envs.is_empty())
            .map(|config| {
                config
                    .envs
                    .iter()
                    .map(|kv| (kv.key.clone(), kv.value.clone()))
                    .collect()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTAINERD_INFO: &str = r#"{
        "sandboxID": "a1b2",
        "pid": 4242,
        "removing": false,
        "snapshotKey": "c3d4",
        "snapshotter": "overlayfs",
        "runtimeType": "io.containerd.runc.v2",
        "runtimeOptions": {"systemd_cgroup": false},
        "config": {
            "metadata": {"name": "app"},
            "envs": [{"key": "PCIDEVICE_INTEL_COM_NET", "value": "0000:01:00.2"}]
        },
        "runtimeSpec": {
            "ociVersion": "1.0.2",
            "process": {"env": ["PATH=/usr/bin", "PCIDEVICE_INTEL_COM_NET=0000:01:00.2,0000:01:00.3"]},
            "linux": {
                "resources": {
                    "cpu": {"shares": 2048, "quota": 200000, "period": 100000, "cpus": "2-3"},
                    "memory": {"limit": 1073741824}
                },
                "cgroupsPath": "/kubepods/pod1/c3d4"
            }
        }
    }"#;

    #[test]
    fn test_decode_containerd_blob() {
        let info = ContainerInfo::from_json(CONTAINERD_INFO).unwrap();

        assert_eq!(info.cgroups_path(), Some("/kubepods/pod1/c3d4"));
        assert!(info.linux_resources().is_some());
    }

    #[test]
    fn test_unread_fields_do_not_break_decoding() {
        let info = ContainerInfo::from_json(
            r#"{
                "sandboxID": null,
                "pid": "not-a-number",
                "config": {"metadata": null, "envs": [{"key": "A", "value": "1"}]},
                "runtimeSpec": {
                    "linux": {
                        "resources": {"cpu": {"shares": null}, "memory": {"limit": null}},
                        "cgroupsPath": null
                    }
                }
            }"#,
        )
        .unwrap();

        assert!(info.linux_resources().is_some());
        assert_eq!(info.cgroups_path(), None);
        assert_eq!(info.environment().unwrap()["A"], "1");
    }

    #[test]
    fn test_environment_prefers_runtime_spec() {
        let info = ContainerInfo::from_json(CONTAINERD_INFO).unwrap();
        let env = info.environment().unwrap();

        assert_eq!(env["PATH"], "/usr/bin");
        assert_eq!(env["PCIDEVICE_INTEL_COM_NET"], "0000:01:00.2,0000:01:00.3");
    }

    #[test]
    fn test_environment_falls_back_to_config() {
        let info = ContainerInfo::from_json(
            r#"{"config": {"envs": [{"key": "A", "value": "1"}]}, "runtimeSpec": {"process": {}}}"#,
        )
        .unwrap();

        assert_eq!(
            info.environment(),
            Some(BTreeMap::from([("A".to_owned(), "1".to_owned())]))
        );
    }

    #[test]
    fn test_environment_missing() {
        let info = ContainerInfo::from_json(r#"{"runtimeSpec": {"linux": {}}}"#).unwrap();
        assert_eq!(info.environment(), None);
        assert!(info.linux_resources().is_none());
        assert_eq!(info.cgroups_path(), None);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(ContainerInfo::from_json("not json").is_err());
        assert!(ContainerInfo::from_json(r#"{"runtimeSpec": {"linux": []}}"#).is_err());
    }
}
