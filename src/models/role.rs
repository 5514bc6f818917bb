//! Cluster service roles and their static keyring attributes.

use crate::core::paths::NodePaths;
use crate::error::{Error, Result};
use crate::models::identity::ClusterIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Mon,
    Osd,
    Mds,
    Rgw,
}

/// Static attributes of one role.
pub struct RoleSpec {
    pub name: &'static str,
    pub principal: &'static str,
    /// `(subsystem, permission)` pairs, in the order passed to the tool.
    pub capabilities: &'static [(&'static str, &'static str)],
    pub path: fn(&NodePaths, &ClusterIdentity) -> Result<PathBuf>,
}

static ADMIN: RoleSpec = RoleSpec {
    name: "admin",
    principal: "client.admin",
    capabilities: &[("mon", "allow *"), ("osd", "allow *"), ("mds", "allow *")],
    path: admin_path,
};

static MON: RoleSpec = RoleSpec {
    name: "mon",
    principal: "mon.",
    capabilities: &[("mon", "allow *")],
    path: mon_path,
};

static OSD: RoleSpec = RoleSpec {
    name: "osd",
    principal: "client.bootstrap-osd",
    capabilities: &[("mon", "allow profile bootstrap-osd")],
    path: osd_path,
};

static MDS: RoleSpec = RoleSpec {
    name: "mds",
    principal: "client.bootstrap-mds",
    capabilities: &[("mon", "allow profile bootstrap-mds")],
    path: mds_path,
};

static RGW: RoleSpec = RoleSpec {
    name: "rgw",
    principal: "client.bootstrap-rgw",
    capabilities: &[("mon", "allow profile bootstrap-rgw")],
    path: rgw_path,
};

fn admin_path(paths: &NodePaths, id: &ClusterIdentity) -> Result<PathBuf> {
    let cluster = id.cluster_name()?;
    Ok(paths
        .etc_ceph
        .join(format!("{}.client.admin.keyring", cluster)))
}

fn mon_path(paths: &NodePaths, id: &ClusterIdentity) -> Result<PathBuf> {
    let cluster = id.cluster_name()?;
    let host = id.host_name()?;
    Ok(paths
        .bootstrap_dir("mon")
        .join(format!("{}-{}.keyring", cluster, host)))
}

fn osd_path(paths: &NodePaths, id: &ClusterIdentity) -> Result<PathBuf> {
    bootstrap_path(paths, id, "osd")
}

fn mds_path(paths: &NodePaths, id: &ClusterIdentity) -> Result<PathBuf> {
    bootstrap_path(paths, id, "mds")
}

fn rgw_path(paths: &NodePaths, id: &ClusterIdentity) -> Result<PathBuf> {
    bootstrap_path(paths, id, "rgw")
}

fn bootstrap_path(paths: &NodePaths, id: &ClusterIdentity, kind: &str) -> Result<PathBuf> {
    let cluster = id.cluster_name()?;
    Ok(paths
        .bootstrap_dir(kind)
        .join(format!("{}.keyring", cluster)))
}

impl Role {
    pub const ALL: [Role; 5] = [Role::Admin, Role::Mon, Role::Osd, Role::Mds, Role::Rgw];

    /// Order in which purge revokes keyrings.
    pub const REVOCATION_ORDER: [Role; 5] =
        [Role::Mds, Role::Rgw, Role::Osd, Role::Mon, Role::Admin];

    pub fn spec(self) -> &'static RoleSpec {
        match self {
            Role::Admin => &ADMIN,
            Role::Mon => &MON,
            Role::Osd => &OSD,
            Role::Mds => &MDS,
            Role::Rgw => &RGW,
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn principal(self) -> &'static str {
        self.spec().principal
    }

    pub fn capabilities(self) -> &'static [(&'static str, &'static str)] {
        self.spec().capabilities
    }

    /// Canonical keyring path for this role under `identity`.
    pub fn keyring_path(self, paths: &NodePaths, identity: &ClusterIdentity) -> Result<PathBuf> {
        (self.spec().path)(paths, identity)
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Role::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| Error::InvalidRole(s.to_string()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
