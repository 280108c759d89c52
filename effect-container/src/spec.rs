use serde::Serialize;

use crate::config::ContainerConfig;

/// A minimal OCI-runtime-spec-shaped description of the container to launch.
///
/// Only the fields the runtime actually needs to see are modeled; this is
/// not a complete `runtime-spec` implementation, just enough to drive a
/// low-level runtime binary for one builder invocation.
#[derive(Debug, Serialize)]
pub struct RuntimeSpec {
    #[serde(rename = "ociVersion")]
    pub oci_version: &'static str,
    pub root: Root,
    pub mounts: Vec<MountSpec>,
    pub process: ProcessSpec,
    pub hostname: String,
    pub linux: LinuxSpec,
}

#[derive(Debug, Serialize)]
pub struct Root {
    pub path: String,
    pub readonly: bool,
}

#[derive(Debug, Serialize)]
pub struct MountSpec {
    pub destination: String,
    #[serde(rename = "type")]
    pub ty: &'static str,
    pub source: String,
    pub options: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ProcessSpec {
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub cwd: String,
}

#[derive(Debug, Serialize)]
pub struct LinuxSpec {
    #[serde(rename = "uidMappings")]
    pub uid_mappings: Vec<IdMapping>,
    #[serde(rename = "gidMappings")]
    pub gid_mappings: Vec<IdMapping>,
    pub namespaces: Vec<NamespaceSpec>,
    pub capabilities: LinuxCapabilities,
}

#[derive(Debug, Serialize)]
pub struct IdMapping {
    #[serde(rename = "containerID")]
    pub container_id: u32,
    #[serde(rename = "hostID")]
    pub host_id: u32,
    pub size: u32,
}

#[derive(Debug, Serialize)]
pub struct NamespaceSpec {
    #[serde(rename = "type")]
    pub ty: &'static str,
}

/// The minimal set of capabilities a builder keeps, mirrored across the
/// bounding/effective/inheritable/permitted sets; nothing is added to the
/// ambient set.
#[derive(Debug, Serialize)]
pub struct LinuxCapabilities {
    pub bounding: Vec<&'static str>,
    pub effective: Vec<&'static str>,
    pub inheritable: Vec<&'static str>,
    pub permitted: Vec<&'static str>,
    pub ambient: Vec<&'static str>,
}

const MINIMAL_CAPABILITIES: &[&str] = &[
    "CAP_CHOWN",
    "CAP_DAC_OVERRIDE",
    "CAP_FOWNER",
    "CAP_FSETID",
    "CAP_KILL",
    "CAP_SETGID",
    "CAP_SETUID",
    "CAP_SETPCAP",
    "CAP_NET_BIND_SERVICE",
];

fn minimal_capabilities() -> LinuxCapabilities {
    let caps: Vec<&'static str> = MINIMAL_CAPABILITIES.to_vec();
    LinuxCapabilities {
        bounding: caps.clone(),
        effective: caps.clone(),
        inheritable: caps.clone(),
        permitted: caps,
        ambient: Vec::new(),
    }
}

/// Build the runtime spec for `config`, running as the invoking user's
/// uid/gid and sharing the host's network namespace (effects need outbound
/// network access).
pub fn build_spec(config: &ContainerConfig, invoking_uid: u32, invoking_gid: u32) -> RuntimeSpec {
    let mut mounts = vec![
        MountSpec {
            destination: "/proc".to_string(),
            ty: "proc",
            source: "proc".to_string(),
            options: vec![],
        },
        MountSpec {
            destination: "/dev".to_string(),
            ty: "tmpfs",
            source: "tmpfs".to_string(),
            options: vec!["nosuid", "strictatime", "mode=755"],
        },
    ];

    for bind in &config.extra_bind_mounts {
        let mut options = vec!["bind"];
        if bind.read_only {
            options.push("ro");
        } else {
            options.push("rw");
        }
        mounts.push(MountSpec {
            destination: bind.path_in_container.display().to_string(),
            ty: "none",
            source: bind.path_in_host.display().to_string(),
            options,
        });
    }

    let env = config
        .environment
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();

    let mut args = vec![config.executable.clone()];
    args.extend(config.arguments.clone());

    RuntimeSpec {
        oci_version: "1.0.2",
        root: Root {
            path: "/".to_string(),
            readonly: config.root_read_only,
        },
        mounts,
        process: ProcessSpec {
            args,
            env,
            cwd: config.working_directory.clone(),
        },
        hostname: config.hostname.clone(),
        linux: LinuxSpec {
            uid_mappings: vec![IdMapping {
                container_id: 0,
                host_id: invoking_uid,
                size: 1,
            }],
            gid_mappings: vec![IdMapping {
                container_id: 0,
                host_id: invoking_gid,
                size: 1,
            }],
            // Network namespace deliberately not listed: shared with the
            // host so effects retain outbound network access.
            namespaces: vec![
                NamespaceSpec { ty: "pid" },
                NamespaceSpec { ty: "mount" },
                NamespaceSpec { ty: "uts" },
                NamespaceSpec { ty: "user" },
            ],
            capabilities: minimal_capabilities(),
        },
    }
}
