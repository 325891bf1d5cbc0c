//! Network-related constants.

use std::net::Ipv4Addr;

/// First address of the default service CIDR (`10.96.0.0/12`), taken by the
/// `kubernetes` service in the `default` namespace.
pub const KUBERNETES_SERVICE_IP: Ipv4Addr = Ipv4Addr::new(10, 96, 0, 1);

/// Default pod network CIDR accepted by `kubestrap init`.
pub const DEFAULT_POD_NETWORK_CIDR: &str = "10.244.0.0/16";

/// In-cluster DNS names the API server answers to.
pub const API_SERVER_DNS_ALIASES: &[&str] = &[
    "kubernetes",
    "kubernetes.default",
    "kubernetes.default.svc",
    "kubernetes.default.svc.cluster.local",
];

/// DNS name etcd is reached on from the local host.
pub const LOCALHOST: &str = "localhost";
