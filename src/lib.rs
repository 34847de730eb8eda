/*
 * Copyright 2025 Oxide Computer Company
 */

/*
 * Compile desired device configuration (interfaces, port-channels, OSPF and
 * trust anchors) into ordered lists of path-addressed updates for a
 * model-driven management interface.
 */

pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod iface;
pub mod ifname;
pub mod l2;
pub mod l3;
pub mod loopback;
pub mod ospf;
pub mod path;
pub mod physical;
pub mod portchannel;
pub mod snapshot;
pub mod template;
pub mod trustpoint;
pub mod update;
pub mod vlan;

pub use client::{CertificateClient, Client, ClientError, Oracle};
pub use entity::Configurable;
pub use error::{Error, ErrorKind, Result};
pub use update::{Update, Updates};
