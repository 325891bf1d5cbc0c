//! Certificate and key constants.

// ─── Key material ─────────────────────────────────────────────────────────

/// RSA modulus size for every key, CA included.
pub const RSA_KEY_BITS: usize = 2048;

// ─── Lifetimes ────────────────────────────────────────────────────────────

/// Validity of the root CA, in calendar years.
pub const CA_VALIDITY_YEARS: i32 = 10;

/// Validity of leaf certificates, in calendar years.
pub const LEAF_VALIDITY_YEARS: i32 = 1;

/// Serial number of the root CA. A store only ever holds one CA.
pub const CA_SERIAL_NUMBER: u64 = 1;

/// Size of a random leaf serial number in bytes (128 bits).
pub const LEAF_SERIAL_BYTES: usize = 16;

// ─── Subjects ─────────────────────────────────────────────────────────────

/// Common name of the cluster root CA.
pub const CA_COMMON_NAME: &str = "kubernetes-ca";

/// Group granting cluster-admin rights to the certificate holder.
pub const MASTERS_GROUP: &str = "system:masters";

// ─── Components ───────────────────────────────────────────────────────────

pub const KUBE_APISERVER: &str = "kube-apiserver";
pub const APISERVER_KUBELET_CLIENT: &str = "apiserver-kubelet-client";
pub const APISERVER_ETCD_CLIENT: &str = "apiserver-etcd-client";
pub const CONTROLLER_MANAGER: &str = "controller-manager";
pub const SCHEDULER: &str = "scheduler";
pub const ADMIN: &str = "admin";
pub const ETCD_SERVER: &str = "etcd-server";

/// Every leaf component in issuance order.
pub const CONTROL_PLANE_COMPONENTS: &[&str] = &[
    KUBE_APISERVER,
    APISERVER_KUBELET_CLIENT,
    APISERVER_ETCD_CLIENT,
    CONTROLLER_MANAGER,
    SCHEDULER,
    ADMIN,
    ETCD_SERVER,
];
