/*
 * Copyright 2025 Oxide Computer Company
 */

use std::path::Path;

use anyhow::{anyhow, bail, Result};
use gnmiconf::config;
use gnmiconf::entity::{self, Configurable};
use gnmiconf::snapshot::DeviceTree;
use gnmiconf::template;
use gnmiconf::trustpoint::{
    CertificateMaterial, TrustAnchor, DEFAULT_VALIDITY_DAYS,
};
use gnmiconf::{vlan, ClientError, Error};
use hiercmd::prelude::*;
use log::info;

#[derive(Default)]
struct Stuff {
    config: Option<config::ConfigFile>,
}

impl Stuff {
    fn config(&self) -> Result<&config::ConfigFile> {
        self.config.as_ref().ok_or_else(|| {
            anyhow!("{:?} is required for this command", config::CONFIG_FILE)
        })
    }

    fn snapshot(&self, name: &str) -> Result<&Path> {
        Ok(self.config()?.device(name)?.snapshot())
    }

    /*
     * A device that has never been written to starts with an empty tree.
     */
    fn open(&self, name: &str) -> Result<DeviceTree> {
        let p = self.snapshot(name)?;
        if p.exists() {
            DeviceTree::load(p)
        } else {
            info!("{name}: no snapshot at {p:?}, starting empty");
            Ok(DeviceTree::new())
        }
    }
}

async fn do_dump(mut l: Level<Stuff>) -> Result<()> {
    l.usage_args(Some("DEVICE..."));
    l.optopt("o", "", "output tree to file", "FILE");

    let a = args!(l);
    if a.args().is_empty() {
        bad_args!(l, "specify a device to dump");
    }

    if a.opts().opt_present("o") && a.args().len() > 1 {
        bad_args!(l, "-o only works with one device");
    }

    for name in a.args() {
        let tree = l.context().open(name)?;
        let out = serde_json::to_string_pretty(&tree.config())?;

        if let Some(o) = a.opts().opt_str("o") {
            std::fs::write(&o, format!("{out}\n"))?;
            return Ok(());
        }

        println!("{name:?} TREE:");
        println!("{out}");
        println!("-------------");
        println!();
    }

    Ok(())
}

/*
 * Push each entity through the device in turn, so that anything it depends
 * on has already been committed by the time it is compiled.  Returns false
 * if an entity had to wait for something the device does not have yet.
 */
async fn drive(
    name: &str,
    tree: &DeviceTree,
    entities: &[&dyn Configurable],
    reset: bool,
) -> Result<bool> {
    for e in entities {
        let res = if reset {
            entity::remove(tree, *e).await
        } else {
            entity::apply(tree, *e).await
        };

        match res {
            Ok(updates) if updates.is_empty() => {
                println!("{e}: no updates needed");
            }
            Ok(updates) => {
                println!("{e}: updates:");
                for u in &updates {
                    println!("    {u}");
                }
            }
            Err(err) if err.is_dependency() => {
                println!("{e}: waiting for dependencies: {err}");
                return Ok(false);
            }
            Err(err) => bail!("{name}: {e}: {err}"),
        }
    }

    Ok(true)
}

async fn apply_or_reset(mut l: Level<Stuff>, reset: bool) -> Result<()> {
    l.usage_args(Some("DEVICE..."));

    l.reqopt("A", "", "intent file", "INTENTS");
    l.optflag("n", "", "dry run only");
    l.optflag("v", "", "verbose output");

    let a = args!(l);
    if a.args().is_empty() {
        bad_args!(l, "specify a device");
    }

    let dryrun = a.opts().opt_present("n");
    let verbose = a.opts().opt_present("v");

    let tp = a.opts().opt_str("A").ok_or_else(|| anyhow!("-A is required"))?;
    let tpl = template::load(&tp)?;
    let owned = tpl.entities()?;
    let mut entities = owned.iter().map(|e| e.as_ref()).collect::<Vec<_>>();
    if reset {
        entities.reverse();
    }

    for name in a.args() {
        println!("{name:?}:");

        /*
         * The tree we load is a working copy; nothing reaches the snapshot
         * file until every entity has been processed.
         */
        let tree = l.context().open(name)?;
        if !drive(name, &tree, &entities, reset).await? {
            println!("{name:?}: not saved; waiting for dependencies");
        } else {
            if verbose {
                println!("{}", serde_json::to_string_pretty(&tree.config())?);
            }
            if dryrun {
                println!("{name:?}: dry run; not saved");
            } else {
                tree.save(l.context().snapshot(name)?)?;
            }
        }

        println!("-------------");
        println!();
    }

    Ok(())
}

async fn do_apply(l: Level<Stuff>) -> Result<()> {
    apply_or_reset(l, false).await
}

async fn do_reset(l: Level<Stuff>) -> Result<()> {
    apply_or_reset(l, true).await
}

async fn do_cert(mut l: Level<Stuff>) -> Result<()> {
    l.usage_args(Some("DEVICE..."));

    l.reqopt("T", "", "trust anchor to load into", "ANCHOR");
    l.optopt("d", "", "validity of a generated certificate", "DAYS");
    l.optopt("c", "", "use an existing certificate", "CERT");
    l.optopt("k", "", "use an existing private key", "KEY");

    let a = args!(l);
    if a.args().is_empty() {
        bad_args!(l, "specify a device");
    }

    let ta = a.opts().opt_str("T").ok_or_else(|| anyhow!("-T is required"))?;
    let ta = TrustAnchor::new(&ta)?;

    let m = match (a.opts().opt_str("c"), a.opts().opt_str("k")) {
        (Some(c), Some(k)) => {
            if a.opts().opt_present("d") {
                bail!("-d only applies to generated certificates");
            }
            let cert = std::fs::read(&c)
                .map_err(|e| anyhow!("reading {c:?}: {e}"))?;
            let key = std::fs::read(&k)
                .map_err(|e| anyhow!("reading {k:?}: {e}"))?;
            CertificateMaterial::from_pem(&cert, &key)?
        }
        (None, None) => {
            let days = if let Some(d) = a.opts().opt_str("d") {
                d.parse::<u32>().map_err(|e| {
                    anyhow!("{d:?} is not a valid day count: {e}")
                })?
            } else {
                DEFAULT_VALIDITY_DAYS
            };
            ta.self_signed(days)?
        }
        _ => bail!("-c and -k must be used together"),
    };

    for name in a.args() {
        let tree = l.context().open(name)?;

        match ta.load(&tree, &m).await {
            Ok(()) => (),
            Err(Error::Transport(ClientError::NotFound(_))) => {
                bail!("{name}: {ta} has not been configured");
            }
            Err(e) => bail!("{name}: {e}"),
        }

        tree.save(l.context().snapshot(name)?)?;
        println!("{name:?}: loaded certificate into {ta}");
    }

    Ok(())
}

async fn do_vlans(mut l: Level<Stuff>) -> Result<()> {
    l.usage_args(Some("LIST..."));

    let a = args!(l);
    if a.args().is_empty() {
        bad_args!(l, "specify a VLAN list");
    }

    for list in a.args() {
        let ids = vlan::expand(list)?;
        println!("{}", vlan::compress(&ids));
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut l = Level::new("gnmiconf", Stuff::default());

    l.cmd("dump", "dump the configuration tree of devices", cmd!(do_dump))?;
    l.cmd("apply", "apply an intent file to devices", cmd!(do_apply))?;
    l.cmd("reset", "remove an intent file from devices", cmd!(do_reset))?;
    l.cmd("cert", "load a certificate into a trust anchor", cmd!(do_cert))?;
    l.cmd("vlans", "normalise VLAN lists", cmd!(do_vlans))?;

    if Path::new(config::CONFIG_FILE).exists() {
        l.context_mut().config = Some(config::load()?);
    }

    env_logger::init();

    sel!(l).run().await
}
