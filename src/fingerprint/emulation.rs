//! Anti-emulation heuristics.
//!
//! Reads host-exposed hypervisor and vendor indicators: DMI strings, the SCSI
//! device listing, the `hypervisor` cpuinfo flag and container markers. Any
//! hit fails the check. Host access sits behind [`HostProbe`] so tests and
//! other platforms can supply their own facts.

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;

use super::{CheckName, CheckResult, HardwareCheck, Metrics};

/// Known hypervisor, emulator and cloud vendor names. Also applied
/// server-side to submitted hostnames and device models.
pub const KNOWN_VM_SIGNATURES: &[&str] = &[
    "vmware",
    "vmw",
    "esxi",
    "vsphere",
    "virtualbox",
    "vbox",
    "innotek",
    "oracle vm",
    "qemu",
    "kvm",
    "bochs",
    "proxmox",
    "pve",
    "xen",
    "xenserver",
    "citrix",
    "hyperv",
    "hyper-v",
    "microsoft virtual",
    "virtual machine",
    "virtual pc",
    "vpc",
    "parallels",
    "amazon ec2",
    "google compute",
    "azure",
    "digitalocean",
    "linode",
    "vultr",
];

static VM_SIGNATURE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives: Vec<String> = KNOWN_VM_SIGNATURES.iter().map(|s| regex::escape(s)).collect();
    Regex::new(&format!(r"\b({})\b", alternatives.join("|"))).expect("static pattern")
});

/// First known VM signature appearing as a whole word in `text`.
pub fn find_vm_signature(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    VM_SIGNATURE_PATTERN
        .find(&lowered)
        .map(|m| m.as_str().to_string())
}

/// Environment variables set inside common container runtimes.
pub const CONTAINER_ENV_VARS: &[&str] = &[
    "KUBERNETES_SERVICE_HOST",
    "KUBERNETES",
    "DOCKER",
    "VIRTUAL",
    "container",
];

/// Raw host facts gathered by a probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostIndicator {
    /// `(source, value)` pairs such as `("dmi:sys_vendor", "QEMU")`.
    pub strings: Vec<(String, String)>,
    pub hypervisor_flag: bool,
    /// Names of container markers found (env vars or marker files).
    pub container_markers: Vec<String>,
}

pub trait HostProbe: Send + Sync {
    fn gather(&self) -> Result<HostIndicator>;
}

/// Reads the running host. `root` is prefixed to every path.
pub struct SystemHostProbe {
    root: PathBuf,
}

impl Default for SystemHostProbe {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }
}

impl SystemHostProbe {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.root.join(relative)).ok()
    }
}

impl HostProbe for SystemHostProbe {
    fn gather(&self) -> Result<HostIndicator> {
        let mut facts = HostIndicator::default();

        for field in ["product_name", "sys_vendor", "board_vendor"] {
            if let Some(value) = self.read(&format!("sys/class/dmi/id/{}", field)) {
                facts
                    .strings
                    .push((format!("dmi:{}", field), value.trim().to_string()));
            }
        }
        if let Some(scsi) = self.read("proc/scsi/scsi") {
            facts.strings.push(("scsi".to_string(), scsi));
        }
        if let Some(cpuinfo) = self.read("proc/cpuinfo") {
            facts.hypervisor_flag = cpuinfo
                .lines()
                .filter(|line| line.starts_with("flags") || line.starts_with("Features"))
                .any(|line| line.split_whitespace().any(|flag| flag == "hypervisor"));
        }

        for var in CONTAINER_ENV_VARS {
            if std::env::var_os(var).is_some() {
                facts.container_markers.push(format!("env:{}", var));
            }
        }
        for marker in [".dockerenv", "run/.containerenv"] {
            if self.root.join(marker).exists() {
                facts.container_markers.push(format!("file:{}", marker));
            }
        }

        Ok(facts)
    }
}

pub struct AntiEmulationCheck {
    probe: Box<dyn HostProbe>,
}

impl AntiEmulationCheck {
    pub fn new(probe: Box<dyn HostProbe>) -> Self {
        Self { probe }
    }

    pub fn evaluate(facts: &HostIndicator) -> CheckResult {
        let mut hits: Vec<String> = facts
            .strings
            .iter()
            .filter_map(|(source, value)| {
                find_vm_signature(value).map(|sig| format!("{}:{}", source, sig))
            })
            .collect();
        if facts.hypervisor_flag {
            hits.push("cpuinfo:hypervisor".to_string());
        }
        hits.extend(facts.container_markers.iter().cloned());

        let metrics = Metrics::from([
            ("indicator_count".to_string(), hits.len() as f64),
            ("sources_checked".to_string(), facts.strings.len() as f64),
        ]);

        if hits.is_empty() {
            CheckResult::pass(metrics)
        } else {
            CheckResult::fail(format!("vm_detected: {}", hits.join(", ")), metrics)
        }
    }
}

impl HardwareCheck for AntiEmulationCheck {
    fn name(&self) -> CheckName {
        CheckName::AntiEmulation
    }

    fn run(&self) -> Result<CheckResult> {
        let facts = self.probe.gather()?;
        Ok(Self::evaluate(&facts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProbe(HostIndicator);

    impl HostProbe for StaticProbe {
        fn gather(&self) -> Result<HostIndicator> {
            Ok(self.0.clone())
        }
    }

    fn bare_metal() -> HostIndicator {
        HostIndicator {
            strings: vec![
                ("dmi:sys_vendor".to_string(), "Apple Computer, Inc.".to_string()),
                ("dmi:product_name".to_string(), "PowerMac3,6".to_string()),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_find_vm_signature() {
        assert_eq!(find_vm_signature("VMware Virtual Platform").as_deref(), Some("vmware"));
        assert_eq!(find_vm_signature("innotek GmbH").as_deref(), Some("innotek"));
        assert_eq!(find_vm_signature("Standard PC (Q35 + ICH9, 2009) QEMU").as_deref(), Some("qemu"));
        assert_eq!(find_vm_signature("Microsoft Hyper-V").as_deref(), Some("hyper-v"));
        assert_eq!(find_vm_signature("ThinkPad T60"), None);
        // whole words only
        assert_eq!(find_vm_signature("xenon-workstation"), None);
    }

    #[test]
    fn test_bare_metal_passes() {
        let check = AntiEmulationCheck::new(Box::new(StaticProbe(bare_metal())));
        let result = check.run().unwrap();
        assert!(result.passed);
        assert_eq!(result.metric("indicator_count"), Some(0.0));
    }

    #[test]
    fn test_dmi_vendor_detected() {
        let mut facts = bare_metal();
        facts.strings.push(("dmi:sys_vendor".to_string(), "QEMU".to_string()));
        let result = AntiEmulationCheck::evaluate(&facts);
        assert!(!result.passed);
        assert!(result.fail_reason.unwrap().contains("dmi:sys_vendor:qemu"));
    }

    #[test]
    fn test_hypervisor_flag_and_containers_detected() {
        let mut facts = bare_metal();
        facts.hypervisor_flag = true;
        facts.container_markers.push("env:KUBERNETES_SERVICE_HOST".to_string());
        let result = AntiEmulationCheck::evaluate(&facts);
        assert!(!result.passed);
        assert_eq!(result.metric("indicator_count"), Some(2.0));
    }

    #[test]
    fn test_system_probe_missing_root_reports_nothing() {
        let probe = SystemHostProbe::with_root("/nonexistent/antiquity-probe-root");
        let facts = probe.gather().unwrap();
        assert!(facts.strings.is_empty());
        assert!(!facts.hypervisor_flag);
    }
}
