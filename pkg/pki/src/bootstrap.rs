//! Bootstrap orchestration.
//!
//! Issues the CA, then every identity in order, then the service-account
//! keypair. Each step must succeed before the next starts. The first failure
//! moves the run to [`Phase::Failed`] and stops it; files written by earlier
//! steps stay on disk.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

use tracing::{error, info};

use crate::ca::CertificateAuthority;
use crate::error::{PkiError, Result};
use crate::keys::ServiceAccountKeyPair;
use crate::leaf;
use crate::profile::{Identity, control_plane_identities};
use crate::store::PkiStore;

/// Inputs for the control-plane identity list.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Address the API server advertises; added to API server and etcd SANs.
    pub advertise_address: IpAddr,
    /// Local hostname; added to API server and etcd SANs.
    pub hostname: String,
}

/// A unit of work in a bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    CertificateAuthority,
    Leaf { index: usize, component: String },
    ServiceAccountKeys,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::CertificateAuthority => write!(f, "ca"),
            Step::Leaf { component, .. } => write!(f, "{}", component),
            Step::ServiceAccountKeys => write!(f, "service-account keys"),
        }
    }
}

/// Bootstrap lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    CaIssuing,
    CaIssued,
    /// Issuing the identity at this index.
    IssuingLeaf(usize),
    ServiceAccountKeys,
    Complete,
    /// A step failed; nothing after it ran.
    Failed { step: Step, reason: String },
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::NotStarted => write!(f, "not started"),
            Phase::CaIssuing => write!(f, "issuing CA"),
            Phase::CaIssued => write!(f, "CA issued"),
            Phase::IssuingLeaf(i) => write!(f, "issuing leaf #{}", i),
            Phase::ServiceAccountKeys => write!(f, "generating service-account keys"),
            Phase::Complete => write!(f, "complete"),
            Phase::Failed { step, reason } => write!(f, "failed at {}: {}", step, reason),
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub store_root: PathBuf,
    /// Components issued, in order.
    pub issued: Vec<String>,
}

pub struct Bootstrap {
    store: PkiStore,
    identities: Vec<Identity>,
    phase: Phase,
}

impl Bootstrap {
    pub fn new(store: PkiStore, identities: Vec<Identity>) -> Self {
        Self {
            store,
            identities,
            phase: Phase::NotStarted,
        }
    }

    /// A bootstrap issuing the standard control-plane identities.
    pub fn control_plane(store: PkiStore, config: &BootstrapConfig) -> Self {
        Self::new(
            store,
            control_plane_identities(config.advertise_address, &config.hostname),
        )
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn store(&self) -> &PkiStore {
        &self.store
    }

    /// Run every step in order, stopping at the first failure.
    pub fn run(&mut self) -> Result<BootstrapReport> {
        if self.phase != Phase::NotStarted {
            return Err(PkiError::AlreadyRun(self.phase.to_string()));
        }
        info!(
            "Bootstrapping PKI in {} ({} identities)",
            self.store.root().display(),
            self.identities.len()
        );

        self.phase = Phase::CaIssuing;
        let issued_ca = CertificateAuthority::create().and_then(|ca| ca.persist(&self.store));
        self.check(Step::CertificateAuthority, issued_ca)?;
        self.phase = Phase::CaIssued;

        let mut issued = Vec::with_capacity(self.identities.len());
        for index in 0..self.identities.len() {
            self.phase = Phase::IssuingLeaf(index);
            let identity = &self.identities[index];
            let component = identity.component.clone();
            let result = leaf::issue(&self.store, &component, &identity.profile);
            self.check(Step::Leaf { index, component: component.clone() }, result)?;
            issued.push(component);
        }

        self.phase = Phase::ServiceAccountKeys;
        let sa = ServiceAccountKeyPair::generate().and_then(|sa| sa.persist(&self.store));
        self.check(Step::ServiceAccountKeys, sa)?;

        self.phase = Phase::Complete;
        info!("PKI bootstrap complete");

        Ok(BootstrapReport {
            store_root: self.store.root().to_path_buf(),
            issued,
        })
    }

    fn check<T>(&mut self, step: Step, result: Result<T>) -> Result<T> {
        result.map_err(|e| {
            error!("[certificate] {} failed: {}", step, e);
            self.phase = Phase::Failed {
                step,
                reason: e.to_string(),
            };
            e
        })
    }
}
